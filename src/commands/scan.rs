use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use super::build_pipeline;
use crate::error::{AppError, Result};
use crate::models::{Period, RiskProfile};
use crate::scan::snapshot;
use crate::services::UniverseSource;

pub async fn run(
    period: Period,
    limit: Option<usize>,
    prioritize: Option<PathBuf>,
) -> Result<()> {
    let pipeline = build_pipeline(period).await?;

    let mut universe = UniverseSource::new(&pipeline.data_dir)?.resolve().await;
    if let Some(path) = prioritize {
        universe = prioritize_open_tickers(universe, &path).await;
    }
    if let Some(limit) = limit {
        universe.truncate(limit);
    }

    let total = universe.len() as u64;
    let progress = ProgressBar::new(total);
    progress.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
            .expect("static progress template"),
    );

    let scan_handle = {
        let scanner = pipeline.scanner.clone();
        tokio::spawn(async move { scanner.run(universe).await })
    };

    while !scan_handle.is_finished() {
        sleep(Duration::from_millis(200)).await;
        let status = pipeline.state.status().await;
        progress.set_position(status.processed as u64);
        if let Some(ticker) = status.last_ticker {
            progress.set_message(ticker);
        }
    }
    progress.finish_and_clear();

    let summary = scan_handle
        .await
        .map_err(|e| AppError::ScanFailed(e.to_string()))??;

    println!(
        "Scanned {} tickers, {} matches (benchmark 3mo return: {})",
        summary.tickers_scanned,
        summary.results_found,
        summary
            .benchmark_return
            .map(|r| format!("{:+.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
    );

    let recommendations = pipeline.state.recommendations().await;
    for profile in RiskProfile::ALL {
        let shortlist = recommendations.category(profile);
        if shortlist.is_empty() {
            continue;
        }
        println!("\n[{profile}]");
        for result in shortlist {
            println!(
                "  {:<6} {:>5.1} ({})  {}  entry {:.2} / stop {:.2}",
                result.ticker,
                result.score,
                result.grade,
                result.detector,
                result.pattern.levels.entry,
                result.pattern.levels.stop,
            );
        }
    }

    let report_dir = pipeline.data_dir.join("reports");
    if let Err(e) = snapshot::write_scan_report(&report_dir, &summary).await {
        warn!(error = %e, "scan report write failed");
    }

    Ok(())
}

/// Move the collaborator's currently-open tickers to the front of the
/// universe so they are scanned first.
async fn prioritize_open_tickers(universe: Vec<String>, path: &PathBuf) -> Vec<String> {
    let Ok(body) = tokio::fs::read_to_string(path).await else {
        warn!(path = ?path, "prioritize file unreadable; scanning in default order");
        return universe;
    };

    let open: Vec<String> = body
        .lines()
        .map(|l| l.trim().to_uppercase())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut ordered: Vec<String> = open
        .iter()
        .filter(|t| universe.contains(t))
        .cloned()
        .collect();
    let existing = ordered.clone();
    ordered.extend(universe.into_iter().filter(|t| !existing.contains(t)));
    ordered
}
