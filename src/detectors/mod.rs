//! Stateless pattern detectors.
//!
//! Each detector is a pure predicate over a normalized [`Series`]: it either
//! returns `Ok(None)` (no match, including "series too short") or a
//! [`PatternMatch`] with derived trade levels and a rationale. Detectors never
//! touch the network or the cache, so every one of them is testable against a
//! literal OHLCV fixture.

mod bull_flag;
mod elliott;
mod rally;
mod vcp;
mod weekly_rsi;

pub use bull_flag::BullFlagDetector;
pub use elliott::ElliottAbcDetector;
pub use rally::RallyDetector;
pub use vcp::VcpDetector;
pub use weekly_rsi::WeeklyRsiDetector;

use crate::error::Result;
use crate::models::{DetectorKind, PatternMatch, Series};

pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    /// Match the pattern against a daily series. Insufficient history is a
    /// non-match, not an error.
    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>>;
}

/// The full battery, in presentation order.
pub fn default_detectors() -> Vec<Box<dyn PatternDetector>> {
    vec![
        Box::new(RallyDetector),
        Box::new(WeeklyRsiDetector),
        Box::new(VcpDetector),
        Box::new(BullFlagDetector),
        Box::new(ElliottAbcDetector),
    ]
}

/// Mean volume over a candle slice.
pub(crate) fn average_volume(candles: &[crate::models::Candle]) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }
    candles.iter().map(|c| c.volume as f64).sum::<f64>() / candles.len() as f64
}

/// High-low extremes over a candle slice.
pub(crate) fn price_band(candles: &[crate::models::Candle]) -> (f64, f64) {
    let high = candles.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = candles.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    (high, low)
}
