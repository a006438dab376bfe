//! Detector-specific scoring.
//!
//! Each detector's match is mapped to 0-100 through weighted sub-scores read
//! from the match's metrics. Scoring is pure: the same match always produces
//! the same score, and every component is clamped so the total stays in
//! bounds no matter what the metrics say.

use crate::models::{DetectorKind, Grade, PatternMatch};

/// Score a match on the 0-100 scale.
pub fn score(m: &PatternMatch) -> f64 {
    let raw = match m.detector {
        DetectorKind::Rally => score_rally(m),
        DetectorKind::WeeklyRsiReversal => score_weekly_rsi(m),
        DetectorKind::Vcp => score_vcp(m),
        DetectorKind::BullFlag => score_bull_flag(m),
        DetectorKind::ElliottAbc => score_elliott(m),
    };
    raw.clamp(0.0, 100.0)
}

/// Score plus the letter grade it maps to.
pub fn score_and_grade(m: &PatternMatch) -> (f64, Grade) {
    let s = score(m);
    (s, Grade::from_score(s))
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

fn metric(m: &PatternMatch, key: &str) -> f64 {
    m.metric(key).unwrap_or(0.0)
}

/// Momentum strength 0-40 (full marks at a 100% three-month return),
/// consolidation quality 0-30 (peaking at the ideal -12.5% pullback),
/// volume surge 0-15, breakout proximity to the rally high 0-15.
fn score_rally(m: &PatternMatch) -> f64 {
    let momentum = 40.0 * clamp01(metric(m, "return_3m") / 1.0);

    let pullback = metric(m, "pullback_1m");
    let consolidation = 30.0 * (1.0 - ((pullback + 0.125).abs() / 0.125)).max(0.0);

    let volume = 15.0 * clamp01(metric(m, "volume_surge") - 1.0);

    let proximity = 15.0 * clamp01((metric(m, "breakout_proximity") - 0.80) / 0.20);

    momentum + consolidation + volume + proximity
}

/// Cross strength 0-30, RSI positioning 0-30 (peaking mid-zone at 40),
/// buying-volume trend 0-25, daily-trend confirmation 0-15.
fn score_weekly_rsi(m: &PatternMatch) -> f64 {
    let cross = 30.0 * clamp01(metric(m, "cross_strength") / 5.0);

    let rsi = metric(m, "weekly_rsi");
    let zone = 30.0 * (1.0 - (rsi - 40.0).abs() / 10.0).max(0.0);

    let volume = match m.metric("buying_volume_ratio") {
        Some(ratio) => 25.0 * clamp01((ratio - 1.0) / 0.5),
        None => 0.0,
    };

    let confirmation = if m.trend_confirmed == Some(true) { 15.0 } else { 0.0 };

    cross + zone + volume + confirmation
}

/// Tightness 0-35, volume dry-up 0-25, relative strength 0-20,
/// contraction count 0-20.
fn score_vcp(m: &PatternMatch) -> f64 {
    let tightness = 35.0 * clamp01((0.20 - metric(m, "tightness")) / 0.15);

    let dry_up = 25.0 * clamp01((1.1 - metric(m, "volume_ratio")) / 0.5);

    let strength = 20.0 * clamp01(metric(m, "return_3m") / 0.30);

    let contractions = (10.0 * (metric(m, "contractions") - 1.0)).clamp(0.0, 20.0);

    tightness + dry_up + strength + contractions
}

/// Mast strength 0-35, flag shallowness 0-30, volume contraction 0-20,
/// projected timeliness 0-15.
fn score_bull_flag(m: &PatternMatch) -> f64 {
    let mast = 35.0 * clamp01(metric(m, "mast_return") / 0.30);

    let shallow = 30.0 * (1.0 - metric(m, "flag_depth") / 0.25).max(0.0);

    let volume = 20.0 * clamp01((1.0 - metric(m, "volume_contraction")) / 0.5);

    let timeliness = 15.0 * clamp01(1.0 - metric(m, "expected_days") / 90.0);

    mast + shallow + volume + timeliness
}

/// Retracement quality 0-40, wave-A amplitude 0-30, recency of the B pivot
/// 0-30.
fn score_elliott(m: &PatternMatch) -> f64 {
    let retrace = 40.0 * clamp01((1.0 - metric(m, "retracement")) / 0.5);

    let amplitude = 30.0 * clamp01(metric(m, "wave_a_return") / 0.25);

    let recency = 30.0 * clamp01(1.0 - metric(m, "bars_since_b") / 30.0);

    retrace + amplitude + recency
}
