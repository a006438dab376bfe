//! Ordered provider fallback: primary chart API, secondary quote API, then
//! the candle store as last resort.
//!
//! A ticker always resolves to *some* outcome. The worst case is an empty
//! series labeled `DataSource::Empty`, which callers treat as "skip this
//! ticker this run", never as fatal. Successful network fetches populate
//! the store on the way out, so cache writes are a side effect of fetching,
//! not a separate step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::candle_store::CandleStore;
use super::chart_api::ChartSource;
use super::normalizer::normalize;
use super::quote_api::QuoteSource;
use crate::constants::{
    CACHE_TTL, PRIMARY_CALL_TIMEOUT, PRIMARY_MAX_RETRIES, PRIMARY_RETRY_PAUSE,
};
use crate::error::{AppError, Result};
use crate::models::{Interval, Period, Series};

/// Which tier produced a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Primary,
    Secondary,
    CacheFresh,
    CacheStale,
    Empty,
}

impl DataSource {
    pub fn is_stale(&self) -> bool {
        matches!(self, DataSource::CacheStale)
    }
}

/// A resolved fetch: the series, where it came from, and when that data was
/// originally pulled (the cache's stamp for stale reads).
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub series: Series,
    pub source: DataSource,
    pub fetched_at: DateTime<Utc>,
}

impl FetchOutcome {
    fn empty(ticker: &str, interval: Interval) -> Self {
        Self {
            series: Series::empty(ticker, interval),
            source: DataSource::Empty,
            fetched_at: Utc::now(),
        }
    }
}

/// One retry policy for the whole chain instead of ad-hoc loops at call
/// sites.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: PRIMARY_MAX_RETRIES,
            pause: PRIMARY_RETRY_PAUSE,
        }
    }
}

impl RetryPolicy {
    /// Malformed tables are retried alongside transient network failures;
    /// the upstream emits them intermittently.
    pub fn is_retryable(&self, err: &AppError) -> bool {
        err.is_transient() || matches!(err, AppError::DataShape(_))
    }
}

/// The seam the orchestrator scans through. Tests script it; production
/// wires it to [`ProviderChain`].
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fresh-cache lookup only; None means the caller must fetch.
    async fn cached(&self, ticker: &str, period: Period, interval: Interval)
        -> Option<FetchOutcome>;

    /// Full chain resolution for one ticker.
    async fn fetch_one(&self, ticker: &str, period: Period, interval: Interval) -> FetchOutcome;
}

pub struct ProviderChain {
    primary: Arc<dyn ChartSource>,
    secondary: Option<Arc<dyn QuoteSource>>,
    store: Arc<CandleStore>,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ProviderChain {
    pub fn new(
        primary: Arc<dyn ChartSource>,
        secondary: Option<Arc<dyn QuoteSource>>,
        store: Arc<CandleStore>,
    ) -> Self {
        Self {
            primary,
            secondary,
            store,
            retry: RetryPolicy::default(),
            call_timeout: PRIMARY_CALL_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Resolve a batch of tickers. The primary is asked once for the whole
    /// batch; tickers it fails to cover fall back individually.
    pub async fn fetch(
        &self,
        tickers: &[String],
        period: Period,
        interval: Interval,
    ) -> Vec<FetchOutcome> {
        let symbols = normalize_symbols(tickers);
        if symbols.is_empty() {
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(symbols.len());
        match self.primary_with_retries(&symbols, period, interval).await {
            Ok(table) => {
                for symbol in &symbols {
                    match normalize(&table, symbol, interval) {
                        Ok(series) if !series.is_empty() => {
                            let fetched_at = Utc::now();
                            self.store_series(period, &series, fetched_at).await;
                            outcomes.push(FetchOutcome {
                                series,
                                source: DataSource::Primary,
                                fetched_at,
                            });
                        }
                        Ok(_) => outcomes.push(self.fallback_for(symbol, period, interval).await),
                        Err(e) => {
                            debug!(ticker = %symbol, error = %e, "primary table missing ticker, falling back");
                            outcomes.push(self.fallback_for(symbol, period, interval).await);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, tickers = symbols.len(), "primary provider exhausted, falling back per ticker");
                for symbol in &symbols {
                    outcomes.push(self.fallback_for(symbol, period, interval).await);
                }
            }
        }

        outcomes
    }

    /// One attempt against the primary on a detached task. If the timeout
    /// fires we abandon the call rather than waiting for it to die; a zombie
    /// completion is harmless.
    async fn primary_attempt(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Value> {
        let primary = Arc::clone(&self.primary);
        let symbols = symbols.to_vec();
        let handle =
            tokio::spawn(async move { primary.fetch_table(&symbols, period, interval).await });

        match timeout(self.call_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(AppError::Provider(format!(
                "primary fetch task failed: {join_err}"
            ))),
            Err(_) => {
                warn!(
                    timeout_secs = self.call_timeout.as_secs(),
                    "primary call timed out; abandoning in-flight request"
                );
                Err(AppError::Provider(format!(
                    "primary call exceeded {}s",
                    self.call_timeout.as_secs()
                )))
            }
        }
    }

    async fn primary_with_retries(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                sleep(self.retry.pause).await;
            }

            match self.primary_attempt(symbols, period, interval).await {
                Ok(table) => {
                    // An empty table counts as a failed attempt.
                    if table_covers_any(&table, symbols, interval) {
                        return Ok(table);
                    }
                    last_err = Some(AppError::Provider("primary returned no rows".into()));
                }
                Err(e) if self.retry.is_retryable(&e) => {
                    debug!(attempt, error = %e, "primary attempt failed");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| AppError::Provider("primary exhausted".into())))
    }

    /// Secondary provider, then stale cache, then empty.
    async fn fallback_for(&self, ticker: &str, period: Period, interval: Interval) -> FetchOutcome {
        if let Some(secondary) = &self.secondary {
            match secondary.fetch_series(ticker, period, interval).await {
                Ok(series) if !series.is_empty() => {
                    let fetched_at = Utc::now();
                    self.store_series(period, &series, fetched_at).await;
                    return FetchOutcome {
                        series,
                        source: DataSource::Secondary,
                        fetched_at,
                    };
                }
                Ok(_) => {}
                Err(AppError::Unsupported(reason)) => {
                    debug!(ticker, reason = %reason, "secondary does not cover this request");
                }
                Err(e) => {
                    warn!(ticker, error = %e, "secondary provider failed");
                }
            }
        }

        match self.store.get_any(ticker, period, interval).await {
            Ok(Some(cached)) => {
                debug!(
                    ticker,
                    fetched_at = %cached.fetched_at,
                    "serving stale cache entry"
                );
                FetchOutcome {
                    series: cached.series,
                    source: DataSource::CacheStale,
                    fetched_at: cached.fetched_at,
                }
            }
            Ok(None) => FetchOutcome::empty(ticker, interval),
            Err(e) => {
                warn!(ticker, error = %e, "cache read failed");
                FetchOutcome::empty(ticker, interval)
            }
        }
    }

    async fn store_series(&self, period: Period, series: &Series, fetched_at: DateTime<Utc>) {
        if let Err(e) = self.store.put(period, series, fetched_at).await {
            // Cache population is best effort; the fetch already succeeded.
            warn!(ticker = %series.ticker, error = %e, "cache write failed");
        }
    }
}

#[async_trait]
impl MarketDataSource for ProviderChain {
    async fn cached(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Option<FetchOutcome> {
        match self.store.get_fresh(ticker, period, interval, CACHE_TTL).await {
            Ok(Some(cached)) => Some(FetchOutcome {
                series: cached.series,
                source: DataSource::CacheFresh,
                fetched_at: cached.fetched_at,
            }),
            Ok(None) => None,
            Err(e) => {
                warn!(ticker, error = %e, "cache lookup failed");
                None
            }
        }
    }

    async fn fetch_one(&self, ticker: &str, period: Period, interval: Interval) -> FetchOutcome {
        let mut outcomes = self.fetch(&[ticker.to_string()], period, interval).await;
        outcomes
            .pop()
            .unwrap_or_else(|| FetchOutcome::empty(ticker, interval))
    }
}

/// Trim, uppercase, dedupe; input order is preserved for the survivors.
pub fn normalize_symbols(tickers: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    tickers
        .iter()
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Cheap probe: does the table yield at least one candle for any requested
/// symbol?
fn table_covers_any(table: &Value, symbols: &[String], interval: Interval) -> bool {
    symbols
        .iter()
        .any(|s| matches!(normalize(table, s, interval), Ok(series) if !series.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::series_from_closes;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FailingChart {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ChartSource for FailingChart {
        async fn fetch_table(
            &self,
            _symbols: &[String],
            _period: Period,
            _interval: Interval,
        ) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Provider("connection refused".into()))
        }
    }

    struct TableChart {
        table: Value,
    }

    #[async_trait]
    impl ChartSource for TableChart {
        async fn fetch_table(
            &self,
            _symbols: &[String],
            _period: Period,
            _interval: Interval,
        ) -> Result<Value> {
            Ok(self.table.clone())
        }
    }

    struct ScriptedQuote {
        series: Series,
    }

    #[async_trait]
    impl QuoteSource for ScriptedQuote {
        async fn fetch_series(
            &self,
            _ticker: &str,
            _period: Period,
            _interval: Interval,
        ) -> Result<Series> {
            Ok(self.series.clone())
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            pause: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_stale_cache() {
        let store = Arc::new(CandleStore::open_in_memory().await.unwrap());
        let series = series_from_closes("AAA", &[10.0, 11.0, 12.0]);
        let old = Utc::now() - chrono::Duration::days(5);
        store.put(Period::OneYear, &series, old).await.unwrap();

        let chart = Arc::new(FailingChart { calls: AtomicU32::new(0) });
        let chain = ProviderChain::new(chart.clone(), None, store)
            .with_retry_policy(fast_retry());

        let outcome = chain.fetch_one("AAA", Period::OneYear, Interval::Daily).await;

        assert_eq!(outcome.source, DataSource::CacheStale);
        assert!(outcome.source.is_stale());
        assert_eq!(outcome.series, series);
        assert_eq!(outcome.fetched_at.timestamp(), old.timestamp());
        // Initial attempt plus two retries.
        assert_eq!(chart.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_cache_yields_empty_not_error() {
        let store = Arc::new(CandleStore::open_in_memory().await.unwrap());
        let chart = Arc::new(FailingChart { calls: AtomicU32::new(0) });
        let chain = ProviderChain::new(chart, None, store).with_retry_policy(fast_retry());

        let outcome = chain.fetch_one("ZZZ", Period::OneYear, Interval::Daily).await;

        assert_eq!(outcome.source, DataSource::Empty);
        assert!(outcome.series.is_empty());
    }

    #[tokio::test]
    async fn test_primary_success_populates_cache() {
        let store = Arc::new(CandleStore::open_in_memory().await.unwrap());
        let table = json!({
            "timestamp": [1704153600, 1704240000],
            "open": [10.0, 10.5],
            "high": [10.8, 10.9],
            "low": [9.9, 10.3],
            "close": [10.5, 10.4],
            "volume": [100000, 120000],
        });
        let chart = Arc::new(TableChart { table });
        let chain = ProviderChain::new(chart, None, store.clone());

        let outcome = chain.fetch_one("AAA", Period::OneYear, Interval::Daily).await;
        assert_eq!(outcome.source, DataSource::Primary);
        assert_eq!(outcome.series.len(), 2);

        // Cache population is a side effect of the fetch.
        let cached = store
            .get_any("AAA", Period::OneYear, Interval::Daily)
            .await
            .unwrap()
            .expect("fetch should have cached the series");
        assert_eq!(cached.series, outcome.series);
    }

    #[tokio::test]
    async fn test_secondary_covers_primary_failure() {
        let store = Arc::new(CandleStore::open_in_memory().await.unwrap());
        let chart = Arc::new(FailingChart { calls: AtomicU32::new(0) });
        let series = series_from_closes("AAA", &[10.0, 11.0]);
        let quote = Arc::new(ScriptedQuote { series: series.clone() });

        let chain = ProviderChain::new(chart, Some(quote), store.clone())
            .with_retry_policy(fast_retry());

        let outcome = chain.fetch_one("AAA", Period::OneYear, Interval::Daily).await;
        assert_eq!(outcome.source, DataSource::Secondary);
        assert_eq!(outcome.series, series);

        // Secondary fetches are cached too.
        assert!(store
            .get_any("AAA", Period::OneYear, Interval::Daily)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_hung_primary_is_abandoned() {
        struct HangingChart;

        #[async_trait]
        impl ChartSource for HangingChart {
            async fn fetch_table(
                &self,
                _symbols: &[String],
                _period: Period,
                _interval: Interval,
            ) -> Result<Value> {
                sleep(Duration::from_secs(600)).await;
                Ok(json!({}))
            }
        }

        let store = Arc::new(CandleStore::open_in_memory().await.unwrap());
        let chain = ProviderChain::new(Arc::new(HangingChart), None, store)
            .with_retry_policy(RetryPolicy { max_retries: 0, pause: Duration::ZERO })
            .with_call_timeout(Duration::from_millis(50));

        let start = std::time::Instant::now();
        let outcome = chain.fetch_one("AAA", Period::OneYear, Interval::Daily).await;

        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(outcome.source, DataSource::Empty);
    }

    #[test]
    fn test_normalize_symbols() {
        let input = vec![
            " aapl ".to_string(),
            "MSFT".to_string(),
            "aapl".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_symbols(&input), vec!["AAPL", "MSFT"]);
    }
}
