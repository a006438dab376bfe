//! Persistent candle cache keyed by (ticker, period, interval).
//!
//! One live entry per key: a refresh overwrites, never appends. Reads come
//! in two flavors: `get_fresh` respects the TTL, `get_any` returns whatever
//! is there with its original fetch timestamp so the caller can label it
//! stale. Series round-trip exactly (same candles, same order) through JSON
//! serialization.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::Result;
use crate::models::{Interval, Period, Series};

#[derive(Debug, Clone)]
pub struct CachedSeries {
    pub series: Series,
    pub fetched_at: DateTime<Utc>,
}

impl CachedSeries {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug)]
pub struct CandleStore {
    pool: SqlitePool,
}

impl CandleStore {
    pub async fn open(database_path: PathBuf) -> Result<Self> {
        info!(path = ?database_path, "opening candle store");

        if let Some(parent) = database_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePool::connect_with(options).await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// In-memory store for tests. Capped to one connection: each `:memory:`
    /// connection is a separate database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candle_cache (
                ticker TEXT NOT NULL,
                period TEXT NOT NULL,
                interval TEXT NOT NULL,
                fetched_at INTEGER NOT NULL,
                series_json TEXT NOT NULL,
                PRIMARY KEY (ticker, period, interval)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Upsert the series for its key, stamped `fetched_at`.
    pub async fn put(
        &self,
        period: Period,
        series: &Series,
        fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        let series_json = serde_json::to_string(series)?;

        sqlx::query(
            r#"
            INSERT INTO candle_cache (ticker, period, interval, fetched_at, series_json)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (ticker, period, interval) DO UPDATE SET
                fetched_at = excluded.fetched_at,
                series_json = excluded.series_json
            "#,
        )
        .bind(&series.ticker)
        .bind(period.as_str())
        .bind(series.interval.as_str())
        .bind(fetched_at.timestamp())
        .bind(series_json)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The entry for this key regardless of age, or None.
    pub async fn get_any(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
    ) -> Result<Option<CachedSeries>> {
        let row = sqlx::query(
            r#"
            SELECT fetched_at, series_json FROM candle_cache
            WHERE ticker = ? AND period = ? AND interval = ?
            "#,
        )
        .bind(ticker)
        .bind(period.as_str())
        .bind(interval.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fetched_ts: i64 = row.get("fetched_at");
        let series_json: String = row.get("series_json");

        let fetched_at = DateTime::<Utc>::from_timestamp(fetched_ts, 0).unwrap_or_default();
        let series: Series = serde_json::from_str(&series_json)?;

        Ok(Some(CachedSeries { series, fetched_at }))
    }

    /// The entry for this key only when younger than `ttl`.
    pub async fn get_fresh(
        &self,
        ticker: &str,
        period: Period,
        interval: Interval,
        ttl: Duration,
    ) -> Result<Option<CachedSeries>> {
        let entry = self.get_any(ticker, period, interval).await?;
        Ok(entry.filter(|e| e.age(Utc::now()) <= ttl))
    }

    pub async fn entry_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM candle_cache")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// Where the cache database lives under the data directory.
pub fn default_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join("candles.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::series_from_closes;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn test_round_trip_is_exact() {
        let store = CandleStore::open_in_memory().await.unwrap();
        let series = series_from_closes("AAA", &[10.0, 10.5, 10.2, 11.0]);
        let fetched_at = Utc::now();

        store.put(Period::OneYear, &series, fetched_at).await.unwrap();

        let cached = store
            .get_fresh("AAA", Period::OneYear, Interval::Daily, Duration::from_secs(60))
            .await
            .unwrap()
            .expect("entry should be fresh");

        assert_eq!(cached.series, series);
        assert_eq!(cached.fetched_at.timestamp(), fetched_at.timestamp());
    }

    #[tokio::test]
    async fn test_refresh_overwrites() {
        let store = CandleStore::open_in_memory().await.unwrap();
        let first = series_from_closes("AAA", &[10.0, 10.5]);
        let second = series_from_closes("AAA", &[10.0, 10.5, 11.0]);

        store.put(Period::OneYear, &first, Utc::now()).await.unwrap();
        store.put(Period::OneYear, &second, Utc::now()).await.unwrap();

        assert_eq!(store.entry_count().await.unwrap(), 1);
        let cached = store
            .get_any("AAA", Period::OneYear, Interval::Daily)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.series.len(), 3);
    }

    #[tokio::test]
    async fn test_keys_do_not_collide() {
        let store = CandleStore::open_in_memory().await.unwrap();
        let series = series_from_closes("AAA", &[10.0]);

        store.put(Period::OneYear, &series, Utc::now()).await.unwrap();
        store.put(Period::ThreeMonths, &series, Utc::now()).await.unwrap();

        assert_eq!(store.entry_count().await.unwrap(), 2);
        assert!(store
            .get_any("AAA", Period::SixMonths, Interval::Daily)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_visible_only_via_get_any() {
        let store = CandleStore::open_in_memory().await.unwrap();
        let series = series_from_closes("AAA", &[10.0, 11.0]);
        let old = Utc::now() - ChronoDuration::hours(48);

        store.put(Period::OneYear, &series, old).await.unwrap();

        let fresh = store
            .get_fresh("AAA", Period::OneYear, Interval::Daily, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(fresh.is_none());

        let any = store
            .get_any("AAA", Period::OneYear, Interval::Daily)
            .await
            .unwrap()
            .expect("stale entry still readable");
        assert_eq!(any.fetched_at.timestamp(), old.timestamp());
    }
}
