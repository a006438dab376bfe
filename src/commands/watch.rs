use std::time::Duration;

use super::build_pipeline;
use crate::error::Result;
use crate::models::Period;
use crate::services::UniverseSource;
use crate::worker;

pub async fn run(period: Period, interval_secs: u64, limit: Option<usize>) -> Result<()> {
    let pipeline = build_pipeline(period).await?;

    let universe_source = UniverseSource::new(&pipeline.data_dir)?;
    let report_dir = pipeline.data_dir.join("reports");

    worker::run_scan_worker(
        pipeline.scanner,
        universe_source,
        report_dir,
        Duration::from_secs(interval_secs),
        limit,
    )
    .await;

    Ok(())
}
