pub mod handlers;

use serac_core::error::Result;

use crate::presentation::cli::{Cli, Commands};
use clap::Parser;

/// Dispatches the parsed CLI to a handler and returns the process exit
/// code. Subcommand handlers that can end in a controlled partial
/// failure (`restore`, §6 exit code 3) report that in their return value
/// rather than as an `Err`; everything else that surfaces as `Err` here
/// is mapped to its `SeracError::exit_code()` by `main`.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Test => handlers::handle_test(&cli.config),
        Commands::Init => handlers::handle_init(&cli.config),
        Commands::Archive => handlers::handle_archive(&cli.config),
        Commands::Ls { at, pattern } => handlers::handle_ls(&cli.config, at, pattern),
        Commands::Restore {
            destination,
            at,
            pattern,
        } => handlers::handle_restore(&cli.config, &destination, at, pattern),
    }
}
