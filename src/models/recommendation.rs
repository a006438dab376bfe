use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::ScanResult;

/// Recommendation categories, one shortlist each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Aggressive,
    Moderate,
    Conservative,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 3] = [
        RiskProfile::Aggressive,
        RiskProfile::Moderate,
        RiskProfile::Conservative,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskProfile::Aggressive => "aggressive",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Conservative => "conservative",
        }
    }
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted shortlist. Serialized with category names as top-level keys
/// so the snapshot file reads as `{"aggressive": [...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    #[serde(flatten)]
    pub categories: BTreeMap<RiskProfile, Vec<ScanResult>>,

    #[serde(rename = "lastScanTimestamp", skip_serializing_if = "Option::is_none")]
    pub last_scan: Option<DateTime<Utc>>,

    #[serde(rename = "isScanning", default)]
    pub is_scanning: bool,
}

impl RecommendationSet {
    pub fn category(&self, profile: RiskProfile) -> &[ScanResult] {
        self.categories
            .get(&profile)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn total_entries(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

/// Read-only view of scan progress, safe to poll while a run is underway.
/// `processed` is monotonically non-decreasing over the lifetime of a run and
/// equals `total_tickers` exactly once the run completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStatusSnapshot {
    pub total_tickers: usize,
    pub processed: usize,
    pub is_running: bool,
    pub last_ticker: Option<String>,

    /// Most recent completed run's ranked results; stays populated while a
    /// new run is in progress.
    pub results: Vec<ScanResult>,
}
