use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Interval;

/// One OHLCV bar. Timestamps are dates (midnight UTC); there is no intraday
/// resolution anywhere in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl Candle {
    pub fn new(time: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64, volume: u64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// high >= max(open, close) >= min(open, close) >= low >= 0.
    pub fn is_well_formed(&self) -> bool {
        let body_high = self.open.max(self.close);
        let body_low = self.open.min(self.close);
        self.low >= 0.0
            && self.high >= body_high
            && body_low >= self.low
            && self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// An ordered daily or weekly series for a single ticker. Transformations
/// produce new series; nothing mutates candles in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub ticker: String,
    pub interval: Interval,
    pub candles: Vec<Candle>,
}

impl Series {
    pub fn new(ticker: impl Into<String>, interval: Interval, candles: Vec<Candle>) -> Self {
        Self {
            ticker: ticker.into(),
            interval,
            candles,
        }
    }

    pub fn empty(ticker: impl Into<String>, interval: Interval) -> Self {
        Self::new(ticker, interval, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Trailing `n` candles, or the whole series when shorter.
    pub fn tail(&self, n: usize) -> &[Candle] {
        let start = self.candles.len().saturating_sub(n);
        &self.candles[start..]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<u64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Strictly increasing timestamps and well-formed bars.
    pub fn is_well_formed(&self) -> bool {
        self.candles.iter().all(Candle::is_well_formed)
            && self.candles.windows(2).all(|w| w[0].time < w[1].time)
    }
}
