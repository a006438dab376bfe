use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::error::Result;
use crate::models::Period;

#[derive(Parser)]
#[command(name = "swingscan")]
#[command(about = "Equity swing-trade screener", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan the ticker universe once and update the recommendation snapshot
    Scan {
        /// History depth to request (3mo, 6mo, 1y, 2y)
        #[arg(long, default_value = "1y")]
        period: Period,

        /// Scan only the first N tickers of the universe
        #[arg(long)]
        limit: Option<usize>,

        /// File of currently-open tickers to scan first
        #[arg(long)]
        prioritize: Option<PathBuf>,
    },
    /// Run scheduled scans on an interval
    Watch {
        /// History depth to request (3mo, 6mo, 1y, 2y)
        #[arg(long, default_value = "1y")]
        period: Period,

        /// Seconds between scans
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,

        /// Scan only the first N tickers of the universe
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the current recommendation snapshot
    Status,
    /// Resolve and print the ticker universe
    Universe,
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            period,
            limit,
            prioritize,
        } => commands::scan::run(period, limit, prioritize).await,
        Commands::Watch {
            period,
            interval_secs,
            limit,
        } => commands::watch::run(period, interval_secs, limit).await,
        Commands::Status => commands::status::run().await,
        Commands::Universe => commands::universe::run().await,
    }
}
