//! Snapshot persistence: the recommendation set and per-run scan reports.
//!
//! Snapshot writes go to a temp file first and rename into place, so a
//! concurrent reader sees either the previous complete document or the new
//! one, never a partial file.

use std::path::{Path, PathBuf};
use tracing::info;

use super::orchestrator::ScanSummary;
use crate::error::Result;
use crate::models::RecommendationSet;

/// Persist the recommendation set atomically.
pub async fn save_recommendations(path: &Path, set: &RecommendationSet) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(set)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;

    Ok(())
}

/// Load the snapshot written by a previous process. A missing file is a
/// clean start, not an error.
pub async fn load_recommendations(path: &Path) -> Result<Option<RecommendationSet>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let set: RecommendationSet = serde_json::from_slice(&bytes)?;
            Ok(Some(set))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a timestamped per-run report under `dir` for audit/history.
pub async fn write_scan_report(dir: &Path, summary: &ScanSummary) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let name = format!(
        "scan_report_{}.json",
        summary.finished_at.format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(name);

    let json = serde_json::to_vec_pretty(summary)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, &path).await?;

    info!(path = ?path, results = summary.results_found, "scan report written");
    Ok(path)
}
