use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Unsupported by provider: {0}")]
    Unsupported(String),

    #[error("Unexpected data shape: {0}")]
    DataShape(String),

    #[error("Ticker not present in response: {0}")]
    TickerNotPresent(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Scan already in progress")]
    ScanInProgress,

    #[error("Scan failed: {0}")]
    ScanFailed(String),
}

impl AppError {
    /// Transient failures worth another attempt against the same provider tier.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Provider(_) | AppError::RateLimit | AppError::Io(_)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(err.to_string())
    }
}

impl From<isahc::Error> for AppError {
    fn from(err: isahc::Error) -> Self {
        AppError::Provider(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Provider(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;
