mod candle;
mod interval;
mod recommendation;
mod signal;

pub use candle::{Candle, Series};
pub use interval::{Interval, Period};
pub use recommendation::{RecommendationSet, RiskProfile, ScanStatusSnapshot};
pub use signal::{DetectorKind, Grade, PatternMatch, ScanResult, TradeLevels};
