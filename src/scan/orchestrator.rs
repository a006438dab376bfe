//! Scan orchestration: universe -> batches -> bounded workers -> detectors
//! -> scorer, with progress visible to concurrent pollers.
//!
//! One run at a time (single-flight compare-and-swap on `running`); a start
//! request while running returns `ScanInProgress` and the caller reads the
//! current status instead. Per-ticker failures and timeouts are contained:
//! the ticker is recorded as processed and skipped, never aborting its batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use super::{snapshot, sticky};
use crate::constants::{
    BENCHMARK_TICKER, RALLY_LOOKBACK, SCAN_BATCH_PAUSE, SCAN_BATCH_SIZE, SCAN_TICKER_TIMEOUT,
    SCAN_WORKERS,
};
use crate::detectors::default_detectors;
use crate::error::{AppError, Result};
use crate::models::{
    Interval, Period, RecommendationSet, ScanResult, ScanStatusSnapshot, Series,
};
use crate::scoring::score_and_grade;
use crate::services::MarketDataSource;

#[derive(Clone)]
pub struct ScanConfig {
    pub period: Period,
    pub interval: Interval,
    pub batch_size: usize,
    pub workers: usize,
    pub ticker_timeout: Duration,
    pub batch_pause: Duration,
    pub benchmark: String,

    /// When set, the recommendation snapshot is persisted here after each
    /// successful run.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            period: Period::OneYear,
            interval: Interval::Daily,
            batch_size: SCAN_BATCH_SIZE,
            workers: SCAN_WORKERS,
            ticker_timeout: SCAN_TICKER_TIMEOUT,
            batch_pause: SCAN_BATCH_PAUSE,
            benchmark: BENCHMARK_TICKER.to_string(),
            snapshot_path: None,
        }
    }
}

/// Shared scan state owned by the scanner. Callers only ever see snapshots;
/// the raw fields stay private so nothing outside this module can tear them.
pub struct ScanState {
    total: AtomicUsize,
    processed: AtomicUsize,
    running: AtomicBool,
    last_ticker: RwLock<Option<String>>,
    results: RwLock<Vec<ScanResult>>,
    recommendations: RwLock<RecommendationSet>,
}

pub type SharedScanState = Arc<ScanState>;

impl ScanState {
    pub fn new() -> Self {
        Self::with_recommendations(RecommendationSet::default())
    }

    /// Seed from a persisted snapshot at startup.
    pub fn with_recommendations(recommendations: RecommendationSet) -> Self {
        Self {
            total: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            running: AtomicBool::new(false),
            last_ticker: RwLock::new(None),
            results: RwLock::new(Vec::new()),
            recommendations: RwLock::new(recommendations),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn status(&self) -> ScanStatusSnapshot {
        ScanStatusSnapshot {
            total_tickers: self.total.load(Ordering::SeqCst),
            processed: self.processed.load(Ordering::SeqCst),
            is_running: self.running.load(Ordering::SeqCst),
            last_ticker: self.last_ticker.read().await.clone(),
            results: self.results.read().await.clone(),
        }
    }

    pub async fn recommendations(&self) -> RecommendationSet {
        self.recommendations.read().await.clone()
    }
}

impl Default for ScanState {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-run summary, also the shape of the persisted scan report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tickers_scanned: usize,
    pub results_found: usize,

    /// Benchmark 3-month return this run, when it could be fetched.
    pub benchmark_return: Option<f64>,

    /// Ranked results, score descending.
    pub results: Vec<ScanResult>,
}

#[derive(Clone)]
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    state: SharedScanState,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(source: Arc<dyn MarketDataSource>, state: SharedScanState, config: ScanConfig) -> Self {
        Self {
            source,
            state,
            config,
        }
    }

    pub fn state(&self) -> SharedScanState {
        Arc::clone(&self.state)
    }

    /// Run one scan over `universe`. Returns `ScanInProgress` without side
    /// effects if a run is already underway.
    pub async fn run(&self, universe: Vec<String>) -> Result<ScanSummary> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AppError::ScanInProgress);
        }

        self.state.recommendations.write().await.is_scanning = true;

        let outcome = self.run_inner(universe).await;

        self.state.recommendations.write().await.is_scanning = false;
        self.state.running.store(false, Ordering::SeqCst);

        outcome
    }

    async fn run_inner(&self, universe: Vec<String>) -> Result<ScanSummary> {
        let started_at = Utc::now();

        if universe.is_empty() {
            return Err(AppError::ScanFailed("empty ticker universe".into()));
        }

        self.state.total.store(universe.len(), Ordering::SeqCst);
        self.state.processed.store(0, Ordering::SeqCst);

        info!(
            tickers = universe.len(),
            period = self.config.period.as_str(),
            batch_size = self.config.batch_size,
            workers = self.config.workers,
            "scan started"
        );

        let mut results: Vec<ScanResult> = Vec::new();
        for (batch_idx, batch) in universe.chunks(self.config.batch_size).enumerate() {
            if batch_idx > 0 {
                sleep(self.config.batch_pause).await;
            }
            results.extend(self.scan_batch(batch).await);
        }

        let benchmark_return = self.benchmark_return().await;
        if let Some(bench) = benchmark_return {
            for result in &mut results {
                if let Some(raw) = result.relative_strength {
                    result.relative_strength = Some(raw - bench);
                }
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        let finished_at = Utc::now();
        let summary = ScanSummary {
            started_at,
            finished_at,
            tickers_scanned: universe.len(),
            results_found: results.len(),
            benchmark_return,
            results: results.clone(),
        };

        // Sticky selection against the previous shortlist, then one atomic
        // swap so readers never observe a half-updated category map.
        let previous = self.state.recommendations.read().await.clone();
        let new_set = sticky::merge(&previous, &results, finished_at);
        *self.state.recommendations.write().await = new_set.clone();
        *self.state.results.write().await = results;

        if let Some(path) = &self.config.snapshot_path {
            if let Err(e) = snapshot::save_recommendations(path, &new_set).await {
                warn!(error = %e, "failed to persist recommendation snapshot");
            }
        }

        info!(
            results = summary.results_found,
            duration_secs = (finished_at - started_at).num_seconds(),
            "scan completed"
        );

        Ok(summary)
    }

    async fn scan_batch(&self, batch: &[String]) -> Vec<ScanResult> {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut handles = Vec::with_capacity(batch.len());

        for ticker in batch {
            let ticker = ticker.clone();
            let source = Arc::clone(&self.source);
            let state = Arc::clone(&self.state);
            let config = self.config.clone();
            let semaphore = Arc::clone(&semaphore);

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Vec::new(),
                };

                *state.last_ticker.write().await = Some(ticker.clone());

                match timeout(
                    config.ticker_timeout,
                    process_ticker(source, &ticker, &config),
                )
                .await
                {
                    Ok(Ok(results)) => results,
                    Ok(Err(e)) => {
                        warn!(ticker = %ticker, error = %e, "ticker pipeline failed; skipping");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(
                            ticker = %ticker,
                            timeout_secs = config.ticker_timeout.as_secs(),
                            "ticker pipeline timed out; skipping"
                        );
                        Vec::new()
                    }
                }
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(ticker_results) => results.extend(ticker_results),
                Err(e) => warn!(error = %e, "ticker worker panicked; skipping"),
            }
            // Processed counts successes, failures, and timeouts alike, so
            // progress is monotonic and lands exactly on the total.
            self.state.processed.fetch_add(1, Ordering::SeqCst);
        }
        results
    }

    async fn benchmark_return(&self) -> Option<f64> {
        let ticker = self.config.benchmark.clone();
        let outcome = match self
            .source
            .cached(&ticker, self.config.period, self.config.interval)
            .await
        {
            Some(hit) => hit,
            None => {
                self.source
                    .fetch_one(&ticker, self.config.period, self.config.interval)
                    .await
            }
        };

        if outcome.series.is_empty() {
            warn!(
                benchmark = %ticker,
                "benchmark unavailable; relative strength uses raw returns"
            );
            return None;
        }

        trailing_return(&outcome.series, RALLY_LOOKBACK)
    }
}

/// One ticker's pipeline: cache-first fetch, detect, score.
async fn process_ticker(
    source: Arc<dyn MarketDataSource>,
    ticker: &str,
    config: &ScanConfig,
) -> Result<Vec<ScanResult>> {
    let outcome = match source.cached(ticker, config.period, config.interval).await {
        Some(hit) => hit,
        None => source.fetch_one(ticker, config.period, config.interval).await,
    };

    if outcome.series.is_empty() {
        debug!(ticker, "no data from any tier; skipping this run");
        return Ok(Vec::new());
    }
    if outcome.source.is_stale() {
        debug!(ticker, fetched_at = %outcome.fetched_at, "scanning a stale series");
    }

    let series = outcome.series;
    let raw_return = trailing_return(&series, RALLY_LOOKBACK);

    let mut results = Vec::new();
    for detector in default_detectors() {
        match detector.detect(&series) {
            Ok(Some(pattern)) => {
                let (score, grade) = score_and_grade(&pattern);
                results.push(ScanResult {
                    ticker: series.ticker.clone(),
                    detector: pattern.detector,
                    score,
                    grade,
                    relative_strength: raw_return,
                    pattern,
                });
            }
            Ok(None) => {}
            Err(e) => {
                debug!(ticker, detector = %detector.kind(), error = %e, "detector declined");
            }
        }
    }

    Ok(results)
}

fn trailing_return(series: &Series, bars: usize) -> Option<f64> {
    let closes = series.closes();
    let last = closes.len().checked_sub(1)?;
    let base = closes[last.checked_sub(bars)?];
    (base > 0.0).then(|| closes[last] / base - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RiskProfile;
    use crate::services::{DataSource, FetchOutcome};
    use crate::testutil::rally_fixture;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct ScriptedSource {
        series: HashMap<String, Series>,
        delay: Duration,
    }

    impl ScriptedSource {
        fn new(series: HashMap<String, Series>) -> Self {
            Self {
                series,
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl MarketDataSource for ScriptedSource {
        async fn cached(
            &self,
            _ticker: &str,
            _period: Period,
            _interval: Interval,
        ) -> Option<FetchOutcome> {
            None
        }

        async fn fetch_one(
            &self,
            ticker: &str,
            _period: Period,
            _interval: Interval,
        ) -> FetchOutcome {
            if !self.delay.is_zero() {
                sleep(self.delay).await;
            }
            match self.series.get(ticker) {
                Some(series) => FetchOutcome {
                    series: series.clone(),
                    source: DataSource::Primary,
                    fetched_at: Utc::now(),
                },
                None => FetchOutcome {
                    series: Series::empty(ticker, Interval::Daily),
                    source: DataSource::Empty,
                    fetched_at: Utc::now(),
                },
            }
        }
    }

    fn quick_config() -> ScanConfig {
        ScanConfig {
            period: Period::ThreeMonths,
            batch_pause: Duration::from_millis(1),
            ..ScanConfig::default()
        }
    }

    #[tokio::test]
    async fn test_end_to_end_rally_lands_in_aggressive() {
        let mut series = HashMap::new();
        series.insert("AAA".to_string(), rally_fixture("AAA"));
        let source = Arc::new(ScriptedSource::new(series));

        let state = Arc::new(ScanState::new());
        let scanner = Scanner::new(source, state.clone(), quick_config());

        let summary = scanner.run(vec!["AAA".to_string()]).await.unwrap();

        assert_eq!(summary.tickers_scanned, 1);
        let rally = summary
            .results
            .iter()
            .find(|r| r.detector == crate::models::DetectorKind::Rally)
            .expect("rally result expected");
        assert!(rally.score >= 80.0);

        let status = state.status().await;
        assert_eq!(status.processed, status.total_tickers);
        assert_eq!(status.processed, 1);
        assert!(!status.is_running);

        let recs = state.recommendations().await;
        let aggressive = recs.category(RiskProfile::Aggressive);
        assert!(aggressive.iter().any(|r| r.ticker == "AAA"));
        assert!(!recs.is_scanning);
    }

    #[tokio::test]
    async fn test_missing_tickers_are_skipped_not_fatal() {
        let mut series = HashMap::new();
        series.insert("AAA".to_string(), rally_fixture("AAA"));
        let source = Arc::new(ScriptedSource::new(series));

        let state = Arc::new(ScanState::new());
        let scanner = Scanner::new(source, state.clone(), quick_config());

        let universe: Vec<String> = ["AAA", "NOPE", "MISSING", "GONE", "ZZZ"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let summary = scanner.run(universe).await.unwrap();

        let status = state.status().await;
        assert_eq!(status.total_tickers, 5);
        assert_eq!(status.processed, 5);
        assert!(summary.results.iter().all(|r| r.ticker == "AAA"));
    }

    #[tokio::test]
    async fn test_single_flight_guard() {
        let mut series = HashMap::new();
        series.insert("AAA".to_string(), rally_fixture("AAA"));
        let mut source = ScriptedSource::new(series);
        source.delay = Duration::from_millis(300);
        let source = Arc::new(source);

        let state = Arc::new(ScanState::new());
        let scanner = Scanner::new(source, state.clone(), quick_config());

        let first = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.run(vec!["AAA".to_string()]).await })
        };

        // Give the first run time to claim the guard.
        sleep(Duration::from_millis(50)).await;
        assert!(state.is_running());

        let second = scanner.run(vec!["AAA".to_string()]).await;
        assert!(matches!(second, Err(AppError::ScanInProgress)));

        // The first run is unaffected by the rejected start.
        let summary = first.await.unwrap().unwrap();
        assert_eq!(summary.tickers_scanned, 1);
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_empty_universe_is_structured_failure() {
        let source = Arc::new(ScriptedSource::new(HashMap::new()));
        let state = Arc::new(ScanState::new());
        let scanner = Scanner::new(source, state.clone(), quick_config());

        let err = scanner.run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, AppError::ScanFailed(_)));
        // The guard is released even on failure.
        assert!(!state.is_running());
    }

    #[tokio::test]
    async fn test_benchmark_adjusts_relative_strength() {
        let mut series = HashMap::new();
        series.insert("AAA".to_string(), rally_fixture("AAA"));
        // Benchmark with a flat 3-month return.
        series.insert(
            BENCHMARK_TICKER.to_string(),
            crate::testutil::series_from_closes(BENCHMARK_TICKER, &vec![100.0; 80]),
        );
        let source = Arc::new(ScriptedSource::new(series));

        let state = Arc::new(ScanState::new());
        let scanner = Scanner::new(source, state, quick_config());

        let summary = scanner.run(vec!["AAA".to_string()]).await.unwrap();
        assert_eq!(summary.benchmark_return, Some(0.0));

        let rally = &summary.results[0];
        // Flat benchmark: relative strength equals the raw 3-month return.
        assert!(rally.relative_strength.unwrap() > 0.90);
    }
}
