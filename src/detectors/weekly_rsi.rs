use std::collections::BTreeMap;

use super::{price_band, PatternDetector};
use crate::constants::*;
use crate::error::Result;
use crate::indicators::{adx, ema, macd, resample_weekly, rsi_wilder};
use crate::models::{DetectorKind, PatternMatch, Series, TradeLevels};

/// Weekly-RSI reversal: weekly RSI momentum has crossed up (3-week EMA of
/// RSI above the 14-week EMA) while RSI itself still sits in the 30-50
/// early-reversal zone.
///
/// The buying-volume trend and the strict daily-trend confirmation are
/// surfaced as metrics/flags for the scorer and downstream consumers; neither
/// is a hard gate.
pub struct WeeklyRsiDetector;

impl PatternDetector for WeeklyRsiDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::WeeklyRsiReversal
    }

    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>> {
        let weekly = resample_weekly(series);
        if weekly.len() < MIN_WEEKLY_BARS {
            // Below the validity floor the smoothed RSI derivatives are
            // noise, so this is "no match", not a low-confidence number.
            return Ok(None);
        }

        let weekly_closes = weekly.closes();
        let wrsi = rsi_wilder(&weekly_closes, WILDER_PERIOD);
        let fast = ema(&wrsi, WRSI_FAST_SPAN);
        let slow = ema(&wrsi, WRSI_SLOW_SPAN);

        let last = wrsi.len() - 1;
        let rsi_now = wrsi[last];
        let fast_now = fast[last];
        let slow_now = slow[last];

        if fast_now <= slow_now {
            return Ok(None);
        }
        if !(WRSI_ZONE_LOW..=WRSI_ZONE_HIGH).contains(&rsi_now) {
            return Ok(None);
        }

        let buying_volume_ratio = buying_volume_trend(series);
        let trend_confirmed = daily_trend_confirmed(series);

        let close = series.last().map(|c| c.close).unwrap_or(0.0);
        let (_, recent_weekly_low) = price_band(weekly.tail(4));
        let entry = close * (1.0 + WRSI_ENTRY_BUFFER);
        let stop = recent_weekly_low * (1.0 - WRSI_STOP_BUFFER);
        let risk = entry - stop;
        let levels = TradeLevels {
            entry,
            stop,
            targets: vec![entry + risk, entry + 2.0 * risk],
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("weekly_rsi".into(), rsi_now);
        metrics.insert("rsi_ema_fast".into(), fast_now);
        metrics.insert("rsi_ema_slow".into(), slow_now);
        metrics.insert("cross_strength".into(), fast_now - slow_now);
        if let Some(ratio) = buying_volume_ratio {
            metrics.insert("buying_volume_ratio".into(), ratio);
        }

        let mut rationale = vec![
            format!("weekly RSI {:.1} in the {:.0}-{:.0} reversal zone", rsi_now, WRSI_ZONE_LOW, WRSI_ZONE_HIGH),
            format!("RSI {}-week EMA {:.1} above {}-week EMA {:.1}", WRSI_FAST_SPAN, fast_now, WRSI_SLOW_SPAN, slow_now),
        ];
        if let Some(ratio) = buying_volume_ratio {
            rationale.push(format!("up-day volume running {:.2}x the prior month", ratio));
        }
        rationale.push(if trend_confirmed {
            "daily trend confirms (MACD, 60-day EMA, DI)".to_string()
        } else {
            "daily trend not yet confirming".to_string()
        });

        let matched_at = series.last().map(|c| c.time).unwrap_or_default();

        Ok(Some(PatternMatch {
            ticker: series.ticker.clone(),
            detector: self.kind(),
            matched_at,
            metrics,
            levels,
            rationale,
            trend_confirmed: Some(trend_confirmed),
        }))
    }
}

/// Average up-day volume over the recent window versus the window before it.
/// Returns None when either window has no up-days.
fn buying_volume_trend(series: &Series) -> Option<f64> {
    let needed = 2 * WRSI_VOLUME_WINDOW + 1;
    if series.len() < needed {
        return None;
    }

    let candles = series.tail(needed);
    let up_day_avg = |range: std::ops::Range<usize>| -> Option<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for i in range {
            if candles[i].close > candles[i - 1].close {
                sum += candles[i].volume as f64;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f64)
    };

    let prior = up_day_avg(1..WRSI_VOLUME_WINDOW + 1)?;
    let recent = up_day_avg(WRSI_VOLUME_WINDOW + 1..needed)?;
    (prior > 0.0).then(|| recent / prior)
}

/// Strict daily confirmation: positive MACD, price above the 60-day EMA,
/// +DI above -DI, and +DI above ADX.
fn daily_trend_confirmed(series: &Series) -> bool {
    if series.len() < WRSI_TREND_EMA_SPAN {
        return false;
    }

    let closes = series.closes();
    let highs = series.highs();
    let lows = series.lows();
    let last = closes.len() - 1;

    let macd_result = macd(&closes, 12, 26, 9);
    let trend_ema = ema(&closes, WRSI_TREND_EMA_SPAN);
    let di = adx(&highs, &lows, &closes, WILDER_PERIOD);

    macd_result.macd[last] > 0.0
        && closes[last] > trend_ema[last]
        && di.plus_di[last] > di.minus_di[last]
        && di.plus_di[last] > di.adx[last]
}
