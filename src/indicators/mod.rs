//! Pure indicator math over price slices.
//!
//! Every function here is deterministic: the same input series yields
//! bit-identical output, and inputs are never mutated. Warm-up conventions
//! follow the classical definitions: EMAs are seeded with the first value
//! rather than truncated, and RSI/ADX use Wilder smoothing (alpha = 1/period)
//! applied recursively from the first sample.

use chrono::{Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};
use std::collections::BTreeMap;

use crate::models::{Candle, Interval, Series};

/// Exponential moving average with span `span` (alpha = 2 / (span + 1)),
/// seeded with the first value. Output length equals input length.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() || span == 0 {
        return Vec::new();
    }

    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = values[0];
    out.push(current);

    for &v in &values[1..] {
        current = current + alpha * (v - current);
        out.push(current);
    }

    out
}

/// Simple moving average. Positions before the first full window are 0.0;
/// callers gate on series length before reading them.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];

    if period == 0 || values.len() < period {
        return out;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    out[period - 1] = window_sum / period as f64;

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        out[i] = window_sum / period as f64;
    }

    out
}

/// Wilder RSI. Gains and losses are smoothed with alpha = 1/period applied
/// recursively from the first delta. avg_loss == 0 yields 100 by convention.
/// The first output (no prior bar) is the neutral 50. Output length equals
/// input length and every value is in [0, 100].
pub fn rsi_wilder(closes: &[f64], period: usize) -> Vec<f64> {
    if closes.is_empty() || period == 0 {
        return Vec::new();
    }

    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(closes.len());
    out.push(50.0);

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = avg_gain + alpha * (gain - avg_gain);
        avg_loss = avg_loss + alpha * (loss - avg_loss);

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
        out.push(rsi);
    }

    out
}

/// MACD line, signal line and histogram.
#[derive(Debug, Clone)]
pub struct MacdResult {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_span: usize) -> MacdResult {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();
    let signal = ema(&macd_line, signal_span);
    let histogram: Vec<f64> = macd_line
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| m - s)
        .collect();

    MacdResult {
        macd: macd_line,
        signal,
        histogram,
    }
}

/// Directional movement outputs, all Wilder-smoothed.
#[derive(Debug, Clone)]
pub struct DirectionalIndex {
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub adx: Vec<f64>,
}

/// ADX and +DI/-DI over `period`. +DM/-DM come from high/low deltas, true
/// range from high/low/prior-close; both sides use the same Wilder alpha,
/// and ADX is the Wilder-smoothed DX.
pub fn adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> DirectionalIndex {
    let len = highs.len();
    if len == 0 || len != lows.len() || len != closes.len() || period == 0 {
        return DirectionalIndex {
            plus_di: Vec::new(),
            minus_di: Vec::new(),
            adx: Vec::new(),
        };
    }

    let alpha = 1.0 / period as f64;
    let mut plus_di = vec![0.0; len];
    let mut minus_di = vec![0.0; len];
    let mut adx_out = vec![0.0; len];

    let mut smoothed_plus_dm = 0.0;
    let mut smoothed_minus_dm = 0.0;
    let mut smoothed_tr = 0.0;
    let mut smoothed_dx = 0.0;

    for i in 1..len {
        let up_move = highs[i] - highs[i - 1];
        let down_move = lows[i - 1] - lows[i];

        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        let tr = (highs[i] - lows[i])
            .max((highs[i] - closes[i - 1]).abs())
            .max((lows[i] - closes[i - 1]).abs());

        smoothed_plus_dm = smoothed_plus_dm + alpha * (plus_dm - smoothed_plus_dm);
        smoothed_minus_dm = smoothed_minus_dm + alpha * (minus_dm - smoothed_minus_dm);
        smoothed_tr = smoothed_tr + alpha * (tr - smoothed_tr);

        if smoothed_tr > 0.0 {
            plus_di[i] = 100.0 * smoothed_plus_dm / smoothed_tr;
            minus_di[i] = 100.0 * smoothed_minus_dm / smoothed_tr;
        }

        let di_sum = plus_di[i] + minus_di[i];
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di[i] - minus_di[i]).abs() / di_sum
        } else {
            0.0
        };
        smoothed_dx = smoothed_dx + alpha * (dx - smoothed_dx);
        adx_out[i] = smoothed_dx;
    }

    DirectionalIndex {
        plus_di,
        minus_di,
        adx: adx_out,
    }
}

/// Ordinary least-squares fit over `values` against bar index 0..n.
/// Returns (slope, intercept). A single point fits a flat line.
pub fn linear_regression(values: &[f64]) -> (f64, f64) {
    let n = values.len();
    if n == 0 {
        return (0.0, 0.0);
    }
    if n == 1 {
        return (0.0, values[0]);
    }

    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n_f;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }

    let slope = num / den;
    (slope, y_mean - slope * x_mean)
}

/// Group daily candles into Friday-ending weeks: last close, max high, min
/// low, first open, summed volume per week. The weekly bar carries the
/// Friday date even when Friday itself did not trade.
pub fn resample_weekly(series: &Series) -> Series {
    let mut weeks: BTreeMap<NaiveDate, Candle> = BTreeMap::new();

    for candle in &series.candles {
        let date = candle.time.date_naive();
        let friday = week_ending_friday(date);
        let time = Utc
            .from_utc_datetime(&friday.and_hms_opt(0, 0, 0).expect("midnight is valid"));

        weeks
            .entry(friday)
            .and_modify(|week| {
                week.high = week.high.max(candle.high);
                week.low = week.low.min(candle.low);
                week.close = candle.close;
                week.volume += candle.volume;
            })
            .or_insert(Candle {
                time,
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
            });
    }

    Series::new(
        series.ticker.clone(),
        Interval::Weekly,
        weeks.into_values().collect(),
    )
}

fn week_ending_friday(date: NaiveDate) -> NaiveDate {
    let days_ahead = match date.weekday() {
        Weekday::Sat => 6,
        Weekday::Sun => 5,
        Weekday::Mon => 4,
        Weekday::Tue => 3,
        Weekday::Wed => 2,
        Weekday::Thu => 1,
        Weekday::Fri => 0,
    };
    date + Duration::days(days_ahead)
}
