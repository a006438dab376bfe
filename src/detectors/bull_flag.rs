use std::collections::BTreeMap;

use super::{average_volume, price_band, PatternDetector};
use crate::constants::*;
use crate::error::Result;
use crate::indicators::linear_regression;
use crate::models::{DetectorKind, PatternMatch, Series, TradeLevels};

/// Bull flag: a steep recent advance (the mast) followed by a shallow,
/// flat-to-down consolidation channel (the flag), priced for a measured-move
/// breakout.
pub struct BullFlagDetector;

impl PatternDetector for BullFlagDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::BullFlag
    }

    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>> {
        if series.len() < FLAG_SEARCH_WINDOW {
            return Ok(None);
        }

        let window = series.tail(FLAG_SEARCH_WINDOW);
        let Some(mast) = find_mast(window) else {
            return Ok(None);
        };

        // Fit the flag channel over the highs of the trailing bars.
        let flag = series.tail(FLAG_WINDOW);
        let flag_highs: Vec<f64> = flag.iter().map(|c| c.high).collect();
        let (slope, intercept) = linear_regression(&flag_highs);

        let close = series.last().map(|c| c.close).unwrap_or(0.0);
        if close <= 0.0 {
            return Ok(None);
        }
        let norm_slope = slope / close;
        if norm_slope > FLAG_MAX_NORM_SLOPE {
            return Ok(None);
        }

        let (flag_high, flag_low) = price_band(flag);
        if flag_high > mast.high * (1.0 + FLAG_MAX_OVERSHOOT) {
            return Ok(None);
        }

        // Entry just above the regression channel at the most recent bar.
        let channel_now = intercept + slope * (flag.len() as f64 - 1.0);
        let entry = channel_now * (1.0 + FLAG_ENTRY_BUFFER);
        let stop = flag_low * (1.0 - FLAG_STOP_BUFFER);
        if entry <= stop {
            return Ok(None);
        }

        // Measured move: project the mast's height above the entry, and
        // estimate time-to-target from the mast's velocity.
        let target = entry + mast.height;
        let velocity = mast.height / mast.bars as f64;
        let expected_days = ((target - entry) / velocity).min(FLAG_MAX_TARGET_DAYS);

        let volume_contraction = average_volume(flag) / mast.avg_volume.max(1.0);
        let flag_depth = (mast.high - flag_low) / mast.high;

        let levels = TradeLevels {
            entry,
            stop,
            targets: vec![target],
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("mast_return".into(), mast.ret);
        metrics.insert("mast_bars".into(), mast.bars as f64);
        metrics.insert("mast_high".into(), mast.high);
        metrics.insert("flag_slope".into(), norm_slope);
        metrics.insert("flag_depth".into(), flag_depth);
        metrics.insert("volume_contraction".into(), volume_contraction);
        metrics.insert("expected_days".into(), expected_days);

        let rationale = vec![
            format!("mast +{:.1}% in {} bars", mast.ret * 100.0, mast.bars),
            format!("flag slope {:.3}%/bar over the last {FLAG_WINDOW} bars", norm_slope * 100.0),
            format!("flag volume {:.2}x the mast's", volume_contraction),
            format!("measured move to {:.2} in ~{:.0} days", target, expected_days),
        ];

        let matched_at = series.last().map(|c| c.time).unwrap_or_default();

        Ok(Some(PatternMatch {
            ticker: series.ticker.clone(),
            detector: self.kind(),
            matched_at,
            metrics,
            levels,
            rationale,
            trend_confirmed: None,
        }))
    }
}

struct Mast {
    ret: f64,
    bars: usize,
    high: f64,
    height: f64,
    avg_volume: f64,
}

/// Steepest close-to-close advance inside the window, bounded to 3-35 bars
/// and at least the minimum amplitude. Steepness is return per bar, so a
/// short sharp move beats a long grind of the same total gain.
fn find_mast(window: &[crate::models::Candle]) -> Option<Mast> {
    let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
    let mut best: Option<(f64, usize, usize)> = None;

    for start in 0..closes.len() {
        let max_end = (start + FLAG_MAST_MAX_BARS).min(closes.len() - 1);
        for end in (start + FLAG_MAST_MIN_BARS)..=max_end {
            if closes[start] <= 0.0 {
                continue;
            }
            let ret = closes[end] / closes[start] - 1.0;
            if ret < FLAG_MAST_MIN_RETURN {
                continue;
            }
            let steepness = ret / (end - start) as f64;
            if best.map_or(true, |(s, _, _)| steepness > s) {
                best = Some((steepness, start, end));
            }
        }
    }

    let (_, start, end) = best?;
    let (high, _) = price_band(&window[start..=end]);
    Some(Mast {
        ret: closes[end] / closes[start] - 1.0,
        bars: end - start,
        high,
        height: closes[end] - closes[start],
        avg_volume: average_volume(&window[start..=end]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{bull_flag_fixture, series_from_closes};

    #[test]
    fn test_flag_fixture_matches() {
        let series = bull_flag_fixture("AAA");
        let m = BullFlagDetector.detect(&series).unwrap().expect("flag should match");

        assert!(m.metric("mast_return").unwrap() >= FLAG_MAST_MIN_RETURN);
        assert!(m.metric("flag_slope").unwrap() <= FLAG_MAX_NORM_SLOPE);
        assert!(m.metric("expected_days").unwrap() <= FLAG_MAX_TARGET_DAYS);

        // Measured move: target is one mast-height above entry.
        let target = m.levels.targets[0];
        assert!(target > m.levels.entry);
        assert!(m.levels.stop < m.levels.entry);
    }

    #[test]
    fn test_no_mast_no_match() {
        let series = series_from_closes("BBB", &vec![10.0; 80]);
        assert!(BullFlagDetector.detect(&series).unwrap().is_none());
    }

    #[test]
    fn test_rising_flag_is_rejected() {
        // Mast then a continued steep rise: the "flag" slopes up hard.
        let mut closes: Vec<f64> = vec![10.0; 30];
        for i in 0..15 {
            closes.push(10.0 + i as f64 * 0.3); // mast
        }
        for i in 0..35 {
            closes.push(14.5 + i as f64 * 0.2); // still climbing
        }
        let series = series_from_closes("CCC", &closes);
        assert!(BullFlagDetector.detect(&series).unwrap().is_none());
    }
}
