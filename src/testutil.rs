//! Literal OHLCV fixtures shared across unit tests. Nothing here touches the
//! network or the cache; every series is constructed bar by bar.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc, Weekday};

use crate::models::{Candle, Interval, Series};

/// `n` consecutive trading days (weekdays) starting 2023-01-02, a Monday.
pub fn trading_days(n: usize) -> Vec<DateTime<Utc>> {
    let mut days = Vec::with_capacity(n);
    let mut date = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    while days.len() < n {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
        }
        date += Duration::days(1);
    }
    days
}

/// Daily series from closes with synthetic highs/lows hugging the close and
/// a constant 500k volume.
pub fn series_from_closes(ticker: &str, closes: &[f64]) -> Series {
    let days = trading_days(closes.len());
    let candles = closes
        .iter()
        .zip(days)
        .map(|(&close, time)| {
            Candle::new(time, close, close * 1.005, close * 0.995, close, 500_000)
        })
        .collect();
    Series::new(ticker, Interval::Daily, candles)
}

/// Daily series from (close, volume) pairs.
pub fn series_from_closes_volumes(ticker: &str, bars: &[(f64, u64)]) -> Series {
    let days = trading_days(bars.len());
    let candles = bars
        .iter()
        .zip(days)
        .map(|(&(close, volume), time)| {
            Candle::new(time, close, close * 1.005, close * 0.995, close, volume)
        })
        .collect();
    Series::new(ticker, Interval::Daily, candles)
}

/// 130 bars: flat base, a 95% three-month advance measured to the current
/// close, a -10% one-month pullback, and a +12% final week on twice the
/// average volume. Satisfies every rally-detector gate.
pub fn rally_fixture(ticker: &str) -> Series {
    let close_now = 19.5;
    let peak = close_now / 0.9; // pullback lands exactly at -10%
    let week_ago = close_now / 1.12; // final week exactly +12%

    let mut bars: Vec<(f64, u64)> = Vec::with_capacity(130);
    for i in 0..130usize {
        let close = if i <= 66 {
            10.0
        } else if i <= 108 {
            10.0 + (peak - 10.0) * (i - 66) as f64 / 42.0
        } else if i <= 124 {
            peak + (week_ago - peak) * (i - 108) as f64 / 16.0
        } else {
            week_ago + (close_now - week_ago) * (i - 124) as f64 / 5.0
        };
        let volume = if i >= 125 { 1_200_000 } else { 500_000 };
        bars.push((close, volume));
    }

    series_from_closes_volumes(ticker, &bars)
}

/// 250 bars: a slow 10 -> 20 uptrend into a 50-bar base around 20. With
/// `tighten` the base's oscillation amplitude contracts segment over segment
/// and the last 10 bars trade on 0.7x volume; without it the amplitudes
/// widen instead, which must not match.
pub fn vcp_fixture(ticker: &str, tighten: bool) -> Series {
    let days = trading_days(250);
    let mut candles = Vec::with_capacity(250);

    for (i, time) in days.into_iter().enumerate() {
        if i < 200 {
            let close = 10.0 + 10.0 * i as f64 / 199.0;
            candles.push(Candle::new(
                time,
                close,
                close * 1.005,
                close * 0.995,
                close,
                1_000_000,
            ));
        } else {
            let amp = if tighten {
                match i {
                    200..=204 => 1.2,
                    205..=219 => 0.8,
                    220..=234 => 0.5,
                    _ => 0.25,
                }
            } else {
                match i {
                    200..=204 => 0.25,
                    205..=219 => 0.5,
                    220..=234 => 0.8,
                    _ => 1.2,
                }
            };
            let volume = if tighten && i >= 240 {
                700_000
            } else if tighten {
                1_075_000
            } else {
                1_000_000
            };
            candles.push(Candle::new(time, 20.0, 20.0 + amp, 20.0 - amp, 20.0, volume));
        }
    }

    Series::new(ticker, Interval::Daily, candles)
}

/// 80 bars: a flat base, a compounding 15-bar mast (+~45%), then a gently
/// sagging 25-bar flag that stays under the mast high.
pub fn bull_flag_fixture(ticker: &str) -> Series {
    let mast_top = 10.0 * 1.025f64.powi(15);

    let mut closes = Vec::with_capacity(80);
    for i in 0..80usize {
        let close = if i < 40 {
            10.0
        } else if i <= 54 {
            10.0 * 1.025f64.powi((i - 39) as i32)
        } else {
            mast_top - 0.7 * (i - 54) as f64 / 25.0
        };
        closes.push(close);
    }

    series_from_closes(ticker, &closes)
}

/// 60 bars of a clean zigzag: two early swings for pivot count, then the
/// ABC structure itself (low at 10, wave A to 14, wave B holding 11.5) and
/// a partial recovery into the last bar.
pub fn elliott_fixture(ticker: &str) -> Series {
    fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    let mut closes = Vec::with_capacity(60);
    for i in 0..60usize {
        let close = match i {
            0..=5 => lerp(12.0, 13.0, i as f64 / 5.0),
            6..=12 => lerp(13.0, 11.2, (i - 5) as f64 / 7.0),
            13..=16 => lerp(11.2, 12.2, (i - 12) as f64 / 4.0),
            17..=20 => lerp(12.2, 10.0, (i - 16) as f64 / 4.0),
            21..=35 => lerp(10.0, 14.0, (i - 20) as f64 / 15.0),
            36..=45 => lerp(14.0, 11.5, (i - 35) as f64 / 10.0),
            _ => lerp(11.5, 12.5, (i - 45) as f64 / 14.0),
        };
        closes.push(close);
    }

    series_from_closes(ticker, &closes)
}

/// ~60 weeks: a long decline, a flat shelf, then six weeks of modest gains.
/// The shape a weekly-RSI reversal wants to see.
pub fn reversal_fixture(ticker: &str) -> Series {
    let mut closes = Vec::with_capacity(300);
    for i in 0..300usize {
        let close = if i < 200 {
            100.0 - 40.0 * i as f64 / 199.0
        } else if i < 270 {
            60.0
        } else {
            60.0 + 3.0 * (i - 269) as f64 / 30.0
        };
        closes.push(close);
    }
    series_from_closes(ticker, &closes)
}
