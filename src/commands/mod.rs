pub mod scan;
pub mod status;
pub mod universe;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::constants::PRIMARY_RATE_LIMIT_PER_MINUTE;
use crate::error::Result;
use crate::models::Period;
use crate::scan::{snapshot, ScanConfig, ScanState, Scanner, SharedScanState};
use crate::services::{
    candle_store::default_store_path, CandleStore, ChartClient, ProviderChain, QuoteClient,
    QuoteSource,
};
use crate::utils::get_data_dir;

/// Everything a scanning command needs, wired once.
pub(crate) struct Pipeline {
    pub data_dir: PathBuf,
    pub scanner: Scanner,
    pub state: SharedScanState,
}

pub(crate) async fn build_pipeline(period: Period) -> Result<Pipeline> {
    let data_dir = get_data_dir();
    tokio::fs::create_dir_all(&data_dir).await?;

    let store = Arc::new(CandleStore::open(default_store_path(&data_dir)).await?);
    let chart = Arc::new(ChartClient::new(true, PRIMARY_RATE_LIMIT_PER_MINUTE)?);

    let quote = match QuoteClient::from_env()? {
        Some(client) => Some(Arc::new(client) as Arc<dyn QuoteSource>),
        None => {
            info!("secondary provider disabled (QUOTE_API_KEY not set)");
            None
        }
    };

    let chain = Arc::new(ProviderChain::new(chart, quote, store));

    let snapshot_path = data_dir.join("recommendations.json");
    let previous = snapshot::load_recommendations(&snapshot_path)
        .await?
        .unwrap_or_default();
    let state = Arc::new(ScanState::with_recommendations(previous));

    let config = ScanConfig {
        period,
        snapshot_path: Some(snapshot_path),
        ..ScanConfig::default()
    };

    let scanner = Scanner::new(chain, state.clone(), config);

    Ok(Pipeline {
        data_dir,
        scanner,
        state,
    })
}
