//! Primary market-data provider: a batched chart endpoint that accepts a
//! comma-joined symbol list and returns columnar OHLCV JSON.
//!
//! The response's column layout is treated as untrusted; batched requests
//! can come back grouped by field or by ticker depending on the endpoint's
//! mood. This client hands back the raw JSON table and leaves extraction
//! to the normalizer.

use async_trait::async_trait;
use isahc::{config::Configurable, prelude::*, HttpClient};
use rand::seq::SliceRandom;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

use super::rate_limit::SlidingWindowLimiter;
use crate::error::{AppError, Result};
use crate::models::{Interval, Period};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/spark";

/// Retries inside one logical call; the provider chain applies its own
/// retry policy on top of the hard call timeout.
const MAX_ATTEMPTS: u32 = 4;

#[async_trait]
pub trait ChartSource: Send + Sync {
    /// Fetch the raw chart table covering `symbols`. The shape is provider
    /// specific; see the normalizer for the layouts handled downstream.
    async fn fetch_table(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Value>;
}

pub struct ChartClient {
    client: HttpClient,
    base_url: String,
    user_agents: Vec<String>,
    random_agent: bool,
    limiter: SlidingWindowLimiter,
}

impl ChartClient {
    pub fn new(random_agent: bool, rate_limit_per_minute: u32) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let user_agents = vec![
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0".to_string(),
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15".to_string(),
        ];

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agents,
            random_agent,
            limiter: SlidingWindowLimiter::new(rate_limit_per_minute),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get_user_agent(&self) -> String {
        if self.random_agent {
            self.user_agents
                .choose(&mut rand::thread_rng())
                .unwrap_or(&self.user_agents[0])
                .clone()
        } else {
            self.user_agents[0].clone()
        }
    }

    async fn make_request(&self, url: &str) -> Result<Value> {
        let mut last_error: Option<String> = None;

        for attempt in 0..MAX_ATTEMPTS {
            self.limiter.acquire().await;

            if attempt > 0 {
                let delay = Duration::from_secs_f64(
                    2.0_f64.powi(attempt as i32 - 1) + rand::random::<f64>(),
                );
                let delay = delay.min(Duration::from_secs(60));
                let reason = last_error.as_deref().unwrap_or("unknown error");
                info!(
                    attempt = attempt + 1,
                    max_attempts = MAX_ATTEMPTS,
                    reason,
                    wait_secs = delay.as_secs_f64(),
                    "chart API retry backoff"
                );
                sleep(delay).await;
            }

            let request = isahc::Request::get(url)
                .header("Accept", "application/json, text/plain, */*")
                .header("Accept-Language", "en-US,en;q=0.9")
                .header("Connection", "keep-alive")
                .header("User-Agent", self.get_user_agent())
                .body(())
                .map_err(|e| AppError::Provider(format!("request build error: {e}")))?;

            debug!(url, attempt = attempt + 1, "chart API request");

            match self.client.send_async(request).await {
                Ok(mut resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        match resp.text().await {
                            Ok(text) => match serde_json::from_str::<Value>(&text) {
                                Ok(data) => return Ok(data),
                                Err(e) => {
                                    last_error = Some(format!("JSON parse error: {e}"));
                                    continue;
                                }
                            },
                            Err(e) => {
                                last_error = Some(format!("response body error: {e}"));
                                continue;
                            }
                        }
                    } else if status == 429 || status == 403 {
                        last_error = Some(format!("rate limited ({status})"));
                        continue;
                    } else if status.is_server_error() {
                        last_error = Some(format!("server error ({status})"));
                        continue;
                    } else {
                        // Remaining 4xx are request problems; retrying the
                        // same request cannot help.
                        return Err(AppError::Provider(format!(
                            "client error ({status}) - not retryable"
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(format!("network error: {e}"));
                    continue;
                }
            }
        }

        Err(AppError::Provider(format!(
            "max retries exceeded: {}",
            last_error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

#[async_trait]
impl ChartSource for ChartClient {
    async fn fetch_table(
        &self,
        symbols: &[String],
        period: Period,
        interval: Interval,
    ) -> Result<Value> {
        if symbols.is_empty() {
            return Err(AppError::Provider("symbol list cannot be empty".into()));
        }

        let url = format!(
            "{}?symbols={}&range={}&interval={}",
            self.base_url,
            symbols.join(","),
            period.as_str(),
            interval.as_str(),
        );

        debug!(
            symbols = symbols.len(),
            period = period.as_str(),
            interval = interval.as_str(),
            "chart API fetch"
        );

        self.make_request(&url).await
    }
}
