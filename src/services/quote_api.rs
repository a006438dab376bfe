//! Secondary market-data provider: a free-tier candle API, one ticker per
//! call.
//!
//! Free-tier limits are part of the contract: daily resolution only, ranges
//! no longer than three months, and a rolling per-minute call budget. The
//! client reports anything outside those limits as `Unsupported` so the
//! provider chain can move on instead of crashing the ticker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::rate_limit::SlidingWindowLimiter;
use crate::constants::{SECONDARY_MAX_RATE_WAIT, SECONDARY_RATE_LIMIT_PER_MINUTE};
use crate::error::{AppError, Result};
use crate::models::{Candle, Interval, Period, Series};

const DEFAULT_BASE_URL: &str = "https://finnhub.io/api/v1";

#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_series(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Series>;
}

pub struct QuoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<SlidingWindowLimiter>,
}

impl QuoteClient {
    pub fn new(api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            limiter: Arc::new(SlidingWindowLimiter::new(SECONDARY_RATE_LIMIT_PER_MINUTE)),
        })
    }

    /// Build from the environment; a missing key disables the secondary tier
    /// rather than failing the pipeline.
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var("QUOTE_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Some(Self::new(key)?)),
            _ => Ok(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn fetch_series(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Series> {
        if interval != Interval::Daily {
            return Err(AppError::Unsupported(format!(
                "free tier serves daily candles only, not {interval}"
            )));
        }
        if period != Period::ThreeMonths {
            return Err(AppError::Unsupported(format!(
                "free tier serves ranges up to 3 months, not {period}"
            )));
        }

        // Block until the window frees a slot, but never longer than the
        // single-wait bound.
        self.limiter
            .acquire_capped(Some(SECONDARY_MAX_RATE_WAIT))
            .await;

        let to = Utc::now().timestamp();
        let from = to - period.approx_days() * 86_400;
        let url = format!(
            "{}/stock/candle?symbol={}&resolution=D&from={}&to={}&token={}",
            self.base_url, ticker, from, to, self.api_key
        );

        debug!(ticker, "quote API fetch");

        let resp = self.http.get(&url).send().await?;
        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(AppError::RateLimit);
        }
        if !status.is_success() {
            return Err(AppError::Provider(format!("quote API error ({status})")));
        }

        let body: Value = resp.json().await?;
        parse_candle_response(&body, ticker)
    }
}

/// Parse the `{s, t, o, h, l, c, v}` columnar response.
fn parse_candle_response(body: &Value, ticker: &str) -> Result<Series> {
    match body.get("s").and_then(Value::as_str) {
        Some("ok") => {}
        Some("no_data") => return Ok(Series::empty(ticker, Interval::Daily)),
        other => {
            return Err(AppError::DataShape(format!(
                "unexpected quote API status: {other:?}"
            )))
        }
    }

    let column = |key: &str| -> Result<&Vec<Value>> {
        body.get(key)
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::DataShape(format!("missing column: {key}")))
    };

    let times = column("t")?;
    let opens = column("o")?;
    let highs = column("h")?;
    let lows = column("l")?;
    let closes = column("c")?;
    let volumes = column("v")?;

    let len = times.len();
    if [opens.len(), highs.len(), lows.len(), closes.len(), volumes.len()]
        .iter()
        .any(|&l| l != len)
    {
        return Err(AppError::DataShape("inconsistent column lengths".into()));
    }

    let mut candles = Vec::with_capacity(len);
    for i in 0..len {
        let ts = times[i]
            .as_i64()
            .ok_or_else(|| AppError::DataShape(format!("bad timestamp at index {i}")))?;
        let time = DateTime::<Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| AppError::DataShape(format!("timestamp out of range: {ts}")))?;

        let (Some(open), Some(high), Some(low), Some(close)) = (
            opens[i].as_f64(),
            highs[i].as_f64(),
            lows[i].as_f64(),
            closes[i].as_f64(),
        ) else {
            // Partial rows happen on the free tier; drop them.
            continue;
        };

        // Collapse to the trading date; intraday offsets vary by venue.
        let date = time.date_naive();
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .expect("midnight is valid")
            .and_utc();

        candles.push(Candle::new(
            midnight,
            open,
            high,
            low,
            close,
            volumes[i].as_u64().unwrap_or(0),
        ));
    }

    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);

    Ok(Series::new(ticker, Interval::Daily, candles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ok_response() {
        let body = json!({
            "s": "ok",
            "t": [1700006400, 1700092800],
            "o": [10.0, 10.5],
            "h": [10.6, 11.0],
            "l": [9.9, 10.4],
            "c": [10.5, 10.9],
            "v": [100000, 120000],
        });
        let series = parse_candle_response(&body, "AAA").unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.candles[0].close, 10.5);
        assert!(series.is_well_formed());
    }

    #[test]
    fn test_parse_no_data_is_empty_not_error() {
        let body = json!({"s": "no_data"});
        let series = parse_candle_response(&body, "AAA").unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_partial_rows_are_dropped() {
        let body = json!({
            "s": "ok",
            "t": [1700006400, 1700092800],
            "o": [10.0, null],
            "h": [10.6, 11.0],
            "l": [9.9, 10.4],
            "c": [10.5, 10.9],
            "v": [100000, 120000],
        });
        let series = parse_candle_response(&body, "AAA").unwrap();
        assert_eq!(series.len(), 1);
    }

    #[tokio::test]
    async fn test_long_range_is_unsupported() {
        let client = QuoteClient::new("test-key".into()).unwrap();
        let err = client
            .fetch_series("AAA", Period::OneYear, Interval::Daily)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unsupported(_)));
    }
}
