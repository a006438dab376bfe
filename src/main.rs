mod cli;
mod commands;
mod constants;
mod detectors;
mod error;
mod indicators;
mod models;
mod scan;
mod scoring;
mod services;
#[cfg(test)]
mod testutil;
mod utils;
mod worker;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = cli::run().await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}
