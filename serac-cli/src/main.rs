mod application;
mod config;
mod date;
mod presentation;
mod store;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match application::run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            tracing::error!(error = %err, "serac failed");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
