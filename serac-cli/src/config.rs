//! INI config parsing (§6). Sections: `[source]` (`include`/`exclude`,
//! each a multi-line list of absolute paths), `[archive]` (`storage` ∈
//! {local, s3}, plus backend-specific keys), `[index]` (`path`).
//! `rust-ini` is the parser; glob rejection happens here, once, so every
//! downstream `ExcludeRule` is already known-literal.
//!
//! spec.md §6 lists `password` only among the s3-specific `[archive]`
//! keys, but §4.1's envelope needs a passphrase regardless of backend.
//! Resolved (see DESIGN.md): `password` is always read from `[archive]`
//! and used as the encryption passphrase for both backends; for s3 it is
//! distinct from `secret` (the S3 credential).

use std::path::PathBuf;

use ini::Ini;
use serac_core::error::{Result, SeracError};

#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub include: Vec<PathBuf>,
    pub exclude: Vec<String>,
}

#[derive(Clone, Debug)]
pub enum StorageConfig {
    Local {
        path: PathBuf,
    },
    S3 {
        path: String,
        key: String,
        secret: String,
        bucket: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub source: SourceConfig,
    pub storage: StorageConfig,
    pub passphrase: String,
    pub index_path: PathBuf,
}

impl Config {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| SeracError::Config(format!("failed to read config {}: {e}", path.display())))?;

        let source_section = ini
            .section(Some("source"))
            .ok_or_else(|| SeracError::Config("missing [source] section".into()))?;
        let include = multi_value(source_section, "include")
            .into_iter()
            .map(PathBuf::from)
            .collect();
        let exclude = multi_value(source_section, "exclude");
        for pattern in &exclude {
            if pattern.contains('*') || pattern.contains('?') {
                return Err(SeracError::Config(format!(
                    "exclude pattern '{pattern}' looks like a glob; globs are not supported"
                )));
            }
        }

        let archive_section = ini
            .section(Some("archive"))
            .ok_or_else(|| SeracError::Config("missing [archive] section".into()))?;
        let storage = match archive_section.get("storage") {
            Some("local") => StorageConfig::Local {
                path: PathBuf::from(required(archive_section, "path")?),
            },
            Some("s3") => StorageConfig::S3 {
                path: required(archive_section, "path")?.to_string(),
                key: required(archive_section, "key")?.to_string(),
                secret: required(archive_section, "secret")?.to_string(),
                bucket: required(archive_section, "bucket")?.to_string(),
            },
            Some(other) => {
                return Err(SeracError::Config(format!(
                    "unknown [archive] storage kind '{other}'; expected 'local' or 's3'"
                )));
            }
            None => return Err(SeracError::Config("[archive] missing 'storage' key".into())),
        };
        let passphrase = required(archive_section, "password")?.to_string();

        let index_section = ini
            .section(Some("index"))
            .ok_or_else(|| SeracError::Config("missing [index] section".into()))?;
        let index_path = PathBuf::from(required(index_section, "path")?);

        Ok(Config {
            source: SourceConfig { include, exclude },
            storage,
            passphrase,
            index_path,
        })
    }
}

fn required<'a>(section: &'a ini::Properties, key: &str) -> Result<&'a str> {
    section
        .get(key)
        .ok_or_else(|| SeracError::Config(format!("missing required key '{key}'")))
}

/// `rust-ini` folds repeated keys into one value joined by its internal
/// separator only when configured to; the simpler and more robust
/// convention here is one path per non-empty line of the key's value.
fn multi_value(section: &ini::Properties, key: &str) -> Vec<String> {
    section
        .get(key)
        .map(|raw| {
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
