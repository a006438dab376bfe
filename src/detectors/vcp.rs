use std::collections::BTreeMap;

use super::{average_volume, price_band, PatternDetector};
use crate::constants::*;
use crate::error::Result;
use crate::indicators::sma;
use crate::models::{DetectorKind, PatternMatch, Series, TradeLevels};

/// Volatility contraction pattern: a Stage-2 base whose price ranges tighten
/// segment over segment while volume dries up, priced for a breakout above
/// the pivot.
pub struct VcpDetector;

impl PatternDetector for VcpDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Vcp
    }

    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>> {
        if series.len() < VCP_SMA_LONG {
            return Ok(None);
        }

        let closes = series.closes();
        let last = closes.len() - 1;
        let close = closes[last];

        // Stage-2 structure: price above the 200-bar SMA, 50 above 200.
        let sma_mid = sma(&closes, VCP_SMA_MID);
        let sma_long = sma(&closes, VCP_SMA_LONG);
        if close <= sma_long[last] || sma_mid[last] <= sma_long[last] {
            return Ok(None);
        }

        // Segment the trailing window and count contracting transitions.
        let window = series.tail(VCP_SEGMENT_WINDOW);
        if window.len() < VCP_SEGMENT_WINDOW {
            return Ok(None);
        }
        let segment_len = VCP_SEGMENT_WINDOW / VCP_SEGMENTS;
        let ranges: Vec<f64> = (0..VCP_SEGMENTS)
            .map(|i| {
                let (high, low) = price_band(&window[i * segment_len..(i + 1) * segment_len]);
                high - low
            })
            .collect();
        let contractions = ranges
            .windows(2)
            .filter(|pair| pair[1] < pair[0] * VCP_CONTRACTION_TOLERANCE)
            .count();
        if contractions < VCP_MIN_CONTRACTIONS {
            return Ok(None);
        }

        // Pivot tightness: the trailing 10-bar range relative to its low.
        let (pivot_high, pivot_low) = price_band(series.tail(VCP_PIVOT_WINDOW));
        let tightness = (pivot_high - pivot_low) / pivot_low;
        if tightness > VCP_MAX_PIVOT_RANGE {
            return Ok(None);
        }

        // Volume dry-up into the pivot.
        let volume_ratio = average_volume(series.tail(VCP_PIVOT_WINDOW))
            / average_volume(series.tail(VCP_VOLUME_WINDOW));
        if volume_ratio > VCP_MAX_VOLUME_RATIO {
            return Ok(None);
        }

        // Base depth: peak-to-trough over the trailing base window.
        let (base_high, base_low) = price_band(series.tail(VCP_BASE_WINDOW));
        let base_depth = (base_high - base_low) / base_high;
        if !(VCP_MIN_BASE_DEPTH..=VCP_MAX_BASE_DEPTH).contains(&base_depth) {
            return Ok(None);
        }

        let return_3m = if last >= RALLY_LOOKBACK {
            close / closes[last - RALLY_LOOKBACK] - 1.0
        } else {
            0.0
        };

        let entry = pivot_high * (1.0 + VCP_ENTRY_BUFFER);
        let stop = pivot_low * (1.0 - VCP_STOP_BUFFER);
        let risk = entry - stop;
        let levels = TradeLevels {
            entry,
            stop,
            targets: vec![entry + risk, entry + 2.0 * risk, entry + 3.0 * risk],
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("tightness".into(), tightness);
        metrics.insert("volume_ratio".into(), volume_ratio);
        metrics.insert("contractions".into(), contractions as f64);
        metrics.insert("base_depth".into(), base_depth);
        metrics.insert("return_3m".into(), return_3m);
        metrics.insert("pivot_high".into(), pivot_high);
        metrics.insert("pivot_low".into(), pivot_low);

        let rationale = vec![
            format!("{contractions} contracting segments across the trailing {VCP_SEGMENT_WINDOW} bars"),
            format!("pivot range {:.1}% of its low", tightness * 100.0),
            format!("volume at {:.2}x the 50-bar average", volume_ratio),
            format!("base depth {:.1}%", base_depth * 100.0),
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
