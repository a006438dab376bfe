pub mod candle_store;
pub mod chart_api;
pub mod normalizer;
pub mod provider_chain;
pub mod quote_api;
pub mod rate_limit;
pub mod universe;

pub use candle_store::{CachedSeries, CandleStore};
pub use chart_api::{ChartClient, ChartSource};
pub use normalizer::normalize;
pub use provider_chain::{DataSource, FetchOutcome, MarketDataSource, ProviderChain, RetryPolicy};
pub use quote_api::{QuoteClient, QuoteSource};
pub use rate_limit::SlidingWindowLimiter;
pub use universe::UniverseSource;
