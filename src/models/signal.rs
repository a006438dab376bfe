use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::RiskProfile;
use crate::constants::{GRADE_A_MIN, GRADE_B_MIN, GRADE_C_MIN};

/// The pattern detectors shipped with the screener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Rally,
    WeeklyRsiReversal,
    Vcp,
    BullFlag,
    ElliottAbc,
}

impl DetectorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Rally => "rally",
            DetectorKind::WeeklyRsiReversal => "weekly_rsi_reversal",
            DetectorKind::Vcp => "vcp",
            DetectorKind::BullFlag => "bull_flag",
            DetectorKind::ElliottAbc => "elliott_abc",
        }
    }

    /// Risk category this detector's matches compete in.
    pub fn profile(&self) -> RiskProfile {
        match self {
            DetectorKind::Rally | DetectorKind::BullFlag => RiskProfile::Aggressive,
            DetectorKind::Vcp | DetectorKind::ElliottAbc => RiskProfile::Moderate,
            DetectorKind::WeeklyRsiReversal => RiskProfile::Conservative,
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived trade levels for a match. Targets are ordered nearest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop: f64,
    pub targets: Vec<f64>,
}

impl TradeLevels {
    /// Risk per share implied by entry and stop.
    pub fn risk(&self) -> f64 {
        self.entry - self.stop
    }
}

/// A detector's structured match for one ticker. Produced fresh each scan,
/// persisted only inside a [`ScanResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub ticker: String,
    pub detector: DetectorKind,
    pub matched_at: DateTime<Utc>,

    /// Detector-specific measurements, keyed by stable names the scorer reads.
    pub metrics: BTreeMap<String, f64>,

    pub levels: TradeLevels,

    /// Human-readable reasons, in presentation order.
    pub rationale: Vec<String>,

    /// Strict daily-trend confirmation, where the detector computes one.
    /// Downstream consumers decide how to weigh it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend_confirmed: Option<bool>,
}

impl PatternMatch {
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }
}

/// Letter grade mapped from a 0-100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= GRADE_A_MIN {
            Grade::A
        } else if score >= GRADE_B_MIN {
            Grade::B
        } else if score >= GRADE_C_MIN {
            Grade::C
        } else {
            Grade::D
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored match: the unit the orchestrator ranks and the sticky engine
/// selects from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub ticker: String,
    pub detector: DetectorKind,
    pub score: f64,
    pub grade: Grade,

    /// Ticker's 3-month return minus the benchmark's, when the benchmark
    /// was available this run; the raw return otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_strength: Option<f64>,

    #[serde(rename = "match")]
    pub pattern: PatternMatch,
}
