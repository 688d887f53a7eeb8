mod cmd;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use config::{Cli, Commands};
use error::MonitorError;

/// Без `RUST_LOG`: свои crate'ы на info, шум транспорта только warn.
const DEFAULT_FILTER: &str = "info,tungstenite=warn,tokio_tungstenite=warn";

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let result = match Cli::parse().command {
        Commands::Watch(args) => cmd::watch::run(args).await,
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ MonitorError::ConnectionFailed { .. }) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
