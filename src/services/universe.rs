//! Ticker universe resolution: public symbol directory over HTTP, then a
//! local override file, then a built-in list. The result is always uppercase,
//! deduplicated, order-preserving.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

const DIRECTORY_URL: &str = "https://www.nasdaqtrader.com/dynamic/symdir/nasdaqlisted.txt";

/// Small built-in universe so a fresh install can scan something even with
/// no network and no override file.
const FALLBACK_TICKERS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "TSLA", "AMD", "AVGO", "NFLX",
    "CRM", "ADBE", "COST", "PEP", "CSCO", "QCOM", "INTC", "TXN", "AMAT", "MU",
    "PANW", "SNPS", "CDNS", "MRVL", "ABNB", "PYPL", "SBUX", "BKNG", "ISRG", "REGN",
];

pub struct UniverseSource {
    http: reqwest::Client,
    directory_url: String,
    override_path: PathBuf,
}

impl UniverseSource {
    pub fn new(data_dir: &Path) -> crate::error::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                crate::error::AppError::Config(format!("failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            directory_url: DIRECTORY_URL.to_string(),
            override_path: data_dir.join("universe.txt"),
        })
    }

    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    /// Resolve the universe, falling through the tiers on failure. Never
    /// returns empty: the built-in list is the floor.
    pub async fn resolve(&self) -> Vec<String> {
        match self.fetch_directory().await {
            Ok(tickers) if !tickers.is_empty() => {
                info!(count = tickers.len(), "universe resolved from directory");
                return tickers;
            }
            Ok(_) => warn!("ticker directory returned no symbols"),
            Err(e) => warn!(error = %e, "ticker directory fetch failed"),
        }

        if let Some(tickers) = self.read_override().await {
            info!(count = tickers.len(), path = ?self.override_path, "universe resolved from override file");
            return tickers;
        }

        info!(count = FALLBACK_TICKERS.len(), "universe resolved from built-in list");
        dedupe_upper(FALLBACK_TICKERS.iter().map(|s| s.to_string()))
    }

    async fn fetch_directory(&self) -> crate::error::Result<Vec<String>> {
        let body = self
            .http
            .get(&self.directory_url)
            .send()
            .await?
            .error_for_status()
            .map_err(crate::error::AppError::from)?
            .text()
            .await?;

        Ok(parse_directory(&body))
    }

    async fn read_override(&self) -> Option<Vec<String>> {
        let body = tokio::fs::read_to_string(&self.override_path).await.ok()?;
        let tickers = dedupe_upper(
            body.lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        );
        (!tickers.is_empty()).then_some(tickers)
    }
}

/// Parse the pipe-separated symbol directory: first field per row, skipping
/// the header, test issues, and the file-creation-time footer.
fn parse_directory(body: &str) -> Vec<String> {
    dedupe_upper(body.lines().skip(1).filter_map(|line| {
        let mut fields = line.split('|');
        let symbol = fields.next()?.trim();
        if symbol.is_empty() || symbol.starts_with("File Creation Time") {
            return None;
        }
        // Column 4 flags test issues.
        let is_test = fields.nth(2).map(|f| f.trim() == "Y").unwrap_or(false);
        if is_test {
            return None;
        }
        Some(symbol.to_string())
    }))
}

fn dedupe_upper(iter: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    iter.map(|t| t.to_uppercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directory() {
        let body = "Symbol|Security Name|Market Category|Test Issue|Financial Status\n\
                    AAPL|Apple Inc.|Q|N|N\n\
                    ZAZZT|Test Issue|Q|Y|N\n\
                    msft|Microsoft Corp|Q|N|N\n\
                    File Creation Time: 0101202522:00|||||\n";
        let tickers = parse_directory(body);
        assert_eq!(tickers, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn test_fallback_list_is_clean() {
        let tickers = dedupe_upper(FALLBACK_TICKERS.iter().map(|s| s.to_string()));
        assert_eq!(tickers.len(), FALLBACK_TICKERS.len());
        assert!(tickers.iter().all(|t| t.chars().all(|c| c.is_ascii_uppercase())));
    }
}
