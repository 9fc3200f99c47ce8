//! `serac CONFIG SUBCOMMAND [ARGS...]` (§6). `ls` and `restore` share the
//! `--at`/`--pattern` options; every subcommand takes the same leading
//! `CONFIG` path positional, which is why it lives on `Cli` itself rather
//! than being repeated per-subcommand.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "serac: incremental, encrypted, content-addressed archiver", long_about = None)]
pub struct Cli {
    /// Path to the INI config file (§6).
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse the config, connect to the store, verify the index is readable.
    Test,

    /// Create the index schema. Fails if the index already exists.
    Init,

    /// Scan the configured source, diff against the index, upload and record changes.
    Archive,

    /// List the filesystem state visible as of an instant.
    Ls {
        /// Instant to reconstruct, in any form from §6 (default: now).
        #[arg(long)]
        at: Option<String>,
        /// Restrict to one path or directory prefix.
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Materialize reconstructed state onto disk.
    Restore {
        /// Directory to restore into; created if absent.
        destination: PathBuf,
        /// Instant to reconstruct, in any form from §6 (default: now).
        #[arg(long)]
        at: Option<String>,
        /// Restrict to one path or directory prefix.
        #[arg(long)]
        pattern: Option<String>,
    },
}
