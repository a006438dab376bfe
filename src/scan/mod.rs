pub mod orchestrator;
pub mod snapshot;
pub mod sticky;

pub use orchestrator::{ScanConfig, ScanState, ScanSummary, Scanner, SharedScanState};
