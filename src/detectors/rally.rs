use std::collections::BTreeMap;

use super::{average_volume, price_band, PatternDetector};
use crate::constants::*;
use crate::error::Result;
use crate::models::{DetectorKind, PatternMatch, Series, TradeLevels};

/// 3-month momentum rally: a large advance that has paused into a lateral
/// pullback while short-term momentum is re-igniting.
pub struct RallyDetector;

impl PatternDetector for RallyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Rally
    }

    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>> {
        if series.len() < RALLY_LOOKBACK + 1 {
            return Ok(None);
        }

        let closes = series.closes();
        let last = closes.len() - 1;
        let close = closes[last];

        let return_3m = close / closes[last - RALLY_LOOKBACK] - 1.0;
        if return_3m < RALLY_MIN_RETURN {
            return Ok(None);
        }

        // Lateral or corrective over the last month, not still accelerating
        // and not collapsing.
        let pullback = close / closes[last - RALLY_PULLBACK_WINDOW] - 1.0;
        if !(RALLY_PULLBACK_MIN..=RALLY_PULLBACK_MAX).contains(&pullback) {
            return Ok(None);
        }

        let final_week = close / closes[last - RALLY_FINAL_WEEK_BARS] - 1.0;
        if final_week <= RALLY_FINAL_WEEK_MIN_RETURN {
            return Ok(None);
        }

        if close < RALLY_MIN_PRICE {
            return Ok(None);
        }

        let avg_volume_60 = average_volume(series.tail(60));
        if avg_volume_60 < RALLY_MIN_AVG_VOLUME {
            return Ok(None);
        }

        let (band_high, band_low) = price_band(series.tail(RALLY_LOOKBACK));
        let (_, pullback_low) = price_band(series.tail(RALLY_PULLBACK_WINDOW));
        let volume_surge = average_volume(series.tail(RALLY_FINAL_WEEK_BARS)) / avg_volume_60;

        let entry = band_high * (1.0 + RALLY_ENTRY_BUFFER);
        let stop = pullback_low * (1.0 - RALLY_STOP_BUFFER);
        let risk = entry - stop;
        let levels = TradeLevels {
            entry,
            stop,
            targets: vec![entry + risk, entry + 2.0 * risk],
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("return_3m".into(), return_3m);
        metrics.insert("pullback_1m".into(), pullback);
        metrics.insert("final_week_return".into(), final_week);
        metrics.insert("avg_volume_60".into(), avg_volume_60);
        metrics.insert("volume_surge".into(), volume_surge);
        metrics.insert("band_high".into(), band_high);
        metrics.insert("band_low".into(), band_low);
        metrics.insert("breakout_proximity".into(), close / band_high);

        let rationale = vec![
            format!("3-month return {:.0}% (minimum {:.0}%)", return_3m * 100.0, RALLY_MIN_RETURN * 100.0),
            format!("1-month pullback {:.1}% within corrective band", pullback * 100.0),
            format!("final week +{:.1}% on {:.1}x average volume", final_week * 100.0, volume_surge),
            format!("rally band {:.2}-{:.2}", band_low, band_high),
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
