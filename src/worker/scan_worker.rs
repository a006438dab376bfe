use rand::Rng;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::scan::{snapshot, Scanner};
use crate::services::UniverseSource;

/// Periodic scan loop. Each iteration re-resolves the universe, runs one
/// scan, writes the run report, and sleeps with a little jitter so scheduled
/// instances do not line up against the upstream.
pub async fn run(
    scanner: Scanner,
    universe_source: UniverseSource,
    report_dir: PathBuf,
    interval: Duration,
    limit: Option<usize>,
) {
    info!(interval_secs = interval.as_secs(), "scan worker started");

    let mut iteration = 0u64;

    loop {
        iteration += 1;

        let mut universe = universe_source.resolve().await;
        if let Some(limit) = limit {
            universe.truncate(limit);
        }

        info!(
            iteration,
            tickers = universe.len(),
            "scan worker: starting scan"
        );

        match scanner.run(universe).await {
            Ok(summary) => {
                info!(
                    iteration,
                    results = summary.results_found,
                    duration_secs = (summary.finished_at - summary.started_at).num_seconds(),
                    "scan worker: scan completed"
                );
                if let Err(e) = snapshot::write_scan_report(&report_dir, &summary).await {
                    warn!(iteration, error = %e, "scan worker: report write failed");
                }
            }
            Err(AppError::ScanInProgress) => {
                warn!(iteration, "scan worker: previous scan still running, skipping");
            }
            Err(e) => {
                // Failures are logged and the loop continues; the next
                // iteration starts clean.
                error!(iteration, error = %e, "scan worker: scan failed");
            }
        }

        let jitter = Duration::from_secs(rand::thread_rng().gen_range(0..30));
        sleep(interval + jitter).await;
    }
}
