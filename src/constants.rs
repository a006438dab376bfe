//! Screening thresholds and pipeline defaults.
//!
//! Every numeric gate used by the detectors lives here so a threshold change
//! is a one-line edit, not a hunt through detector code.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Data pipeline
// ---------------------------------------------------------------------------

/// Hard timeout for a single primary-provider call. The call is issued on a
/// detached task; when the timeout fires the caller abandons the result
/// rather than waiting for the socket to die.
pub const PRIMARY_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// Retries against the primary provider after the first failed attempt.
pub const PRIMARY_MAX_RETRIES: u32 = 2;

/// Fixed pause between primary retries.
pub const PRIMARY_RETRY_PAUSE: Duration = Duration::from_secs(1);

/// Primary provider request budget (rolling per-minute window).
pub const PRIMARY_RATE_LIMIT_PER_MINUTE: u32 = 60;

/// Secondary provider request budget (free tier).
pub const SECONDARY_RATE_LIMIT_PER_MINUTE: u32 = 30;

/// Longest single wait the secondary's rate limiter may impose.
pub const SECONDARY_MAX_RATE_WAIT: Duration = Duration::from_secs(60);

/// Cached series younger than this are served without a network call.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60 * 12);

// ---------------------------------------------------------------------------
// Scan orchestration
// ---------------------------------------------------------------------------

/// Tickers per batch; batches run sequentially to cap in-flight calls.
pub const SCAN_BATCH_SIZE: usize = 40;

/// Concurrent per-ticker workers within one batch.
pub const SCAN_WORKERS: usize = 6;

/// Per-ticker pipeline timeout (fetch -> normalize -> detect -> score).
pub const SCAN_TICKER_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between batches to stay under upstream rate limits.
pub const SCAN_BATCH_PAUSE: Duration = Duration::from_millis(750);

/// Benchmark index used for relative-strength context.
pub const BENCHMARK_TICKER: &str = "SPY";

/// Slots per risk category in the recommendation shortlist.
pub const RECOMMENDATION_SLOTS: usize = 3;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Weekly bars required before weekly RSI and its EMAs are trusted.
pub const MIN_WEEKLY_BARS: usize = 40;

/// Classical Wilder period for RSI and ADX/DI.
pub const WILDER_PERIOD: usize = 14;

// ---------------------------------------------------------------------------
// Momentum rally detector
// ---------------------------------------------------------------------------

/// ~3 months of trading bars.
pub const RALLY_LOOKBACK: usize = 63;

/// ~1 month window used to judge the pullback.
pub const RALLY_PULLBACK_WINDOW: usize = 21;

/// Minimum 3-month return to qualify as a rally.
pub const RALLY_MIN_RETURN: f64 = 0.90;

/// Pullback band: corrective, not a collapse.
pub const RALLY_PULLBACK_MIN: f64 = -0.25;
pub const RALLY_PULLBACK_MAX: f64 = 0.0;

/// Trading bars in the "final week" momentum check.
pub const RALLY_FINAL_WEEK_BARS: usize = 5;

/// Minimum final-week return.
pub const RALLY_FINAL_WEEK_MIN_RETURN: f64 = 0.10;

/// Penny-stock floor.
pub const RALLY_MIN_PRICE: f64 = 5.0;

/// Illiquidity filter: 60-bar average volume floor.
pub const RALLY_MIN_AVG_VOLUME: f64 = 100_000.0;

pub const RALLY_ENTRY_BUFFER: f64 = 0.01;
pub const RALLY_STOP_BUFFER: f64 = 0.02;

// ---------------------------------------------------------------------------
// Weekly-RSI reversal detector
// ---------------------------------------------------------------------------

/// Early-reversal zone for the current weekly RSI.
pub const WRSI_ZONE_LOW: f64 = 30.0;
pub const WRSI_ZONE_HIGH: f64 = 50.0;

/// Spans for the fast/slow EMAs of weekly RSI.
pub const WRSI_FAST_SPAN: usize = 3;
pub const WRSI_SLOW_SPAN: usize = 14;

/// Daily EMA used by the trend-confirmation check.
pub const WRSI_TREND_EMA_SPAN: usize = 60;

/// Up-day volume comparison window (bars per side).
pub const WRSI_VOLUME_WINDOW: usize = 21;

pub const WRSI_ENTRY_BUFFER: f64 = 0.01;
pub const WRSI_STOP_BUFFER: f64 = 0.03;

// ---------------------------------------------------------------------------
// Volatility contraction (VCP) detector
// ---------------------------------------------------------------------------

/// Stage-2 structure SMAs.
pub const VCP_SMA_MID: usize = 50;
pub const VCP_SMA_LONG: usize = 200;

/// Trailing window segmented for the contraction count.
pub const VCP_SEGMENT_WINDOW: usize = 60;
pub const VCP_SEGMENTS: usize = 4;

/// A segment counts as contracting when its range is below the previous
/// segment's range times this tolerance.
pub const VCP_CONTRACTION_TOLERANCE: f64 = 1.10;

/// Minimum contracting segment transitions.
pub const VCP_MIN_CONTRACTIONS: usize = 2;

/// Pivot window: the trailing 10-bar range must stay within this fraction
/// of its low.
pub const VCP_PIVOT_WINDOW: usize = 10;
pub const VCP_MAX_PIVOT_RANGE: f64 = 0.20;

/// Volume dry-up: trailing 10-bar average at most this multiple of the
/// trailing 50-bar average.
pub const VCP_VOLUME_WINDOW: usize = 50;
pub const VCP_MAX_VOLUME_RATIO: f64 = 1.1;

/// Base depth band over the trailing 90 bars.
pub const VCP_BASE_WINDOW: usize = 90;
pub const VCP_MIN_BASE_DEPTH: f64 = 0.03;
pub const VCP_MAX_BASE_DEPTH: f64 = 0.50;

pub const VCP_ENTRY_BUFFER: f64 = 0.01;
pub const VCP_STOP_BUFFER: f64 = 0.02;

// ---------------------------------------------------------------------------
// Bull-flag detector
// ---------------------------------------------------------------------------

/// Search window for the mast.
pub const FLAG_SEARCH_WINDOW: usize = 63;

/// Mast duration bounds (bars) and minimum amplitude.
pub const FLAG_MAST_MIN_BARS: usize = 3;
pub const FLAG_MAST_MAX_BARS: usize = 35;
pub const FLAG_MAST_MIN_RETURN: f64 = 0.07;

/// Bars in the flag regression.
pub const FLAG_WINDOW: usize = 21;

/// Flat-to-down slope gate, normalized by price (per bar). Small positive
/// values are noise from the fit, not an ascending flag.
pub const FLAG_MAX_NORM_SLOPE: f64 = 0.001;

/// Reject when the flag pokes above the mast high by more than this.
pub const FLAG_MAX_OVERSHOOT: f64 = 0.02;

pub const FLAG_ENTRY_BUFFER: f64 = 0.005;
pub const FLAG_STOP_BUFFER: f64 = 0.05;

/// Cap on the projected time-to-target.
pub const FLAG_MAX_TARGET_DAYS: f64 = 90.0;

// ---------------------------------------------------------------------------
// Elliott ABC detector
// ---------------------------------------------------------------------------

/// Bars on each side a pivot must dominate.
pub const ELLIOTT_PIVOT_WINDOW: usize = 3;

/// Minimum pivots before a wave search is attempted.
pub const ELLIOTT_MIN_PIVOTS: usize = 5;

/// Fibonacci multiples projected from wave B for wave C targets.
pub const ELLIOTT_FIB_MULTIPLES: &[f64] = &[0.618, 1.0, 1.618, 2.0, 2.618];

/// Retracement of wave A below which the setup is high quality.
pub const ELLIOTT_HIGH_QUALITY_RETRACE: f64 = 0.70;

pub const ELLIOTT_ENTRY_BUFFER: f64 = 0.005;
pub const ELLIOTT_STOP_BUFFER: f64 = 0.03;

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

pub const GRADE_A_MIN: f64 = 85.0;
pub const GRADE_B_MIN: f64 = 70.0;
pub const GRADE_C_MIN: f64 = 55.0;
