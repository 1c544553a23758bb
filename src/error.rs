// src/error.rs
use thiserror::Error;

/// Failure modes of a single quote fetch.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connectivity, timeout or HTTP-layer failure. Worth retrying.
    #[error("Network error: {0}")]
    Network(String),

    /// The page came back but the quote elements were missing or unreadable.
    /// Treated as a permanent "not a listed symbol" signal.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Symbol {0} is already recorded")]
    DuplicateSymbol(String),

    #[error("Invalid ticker symbol: {0}")]
    InvalidSymbol(String),
}

#[derive(Error, Debug)]
pub enum CrawlerError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Thread error: {0}")]
    Thread(String),
}

pub type Result<T> = std::result::Result<T, CrawlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_transient() {
        assert!(FetchError::Network("timed out".into()).is_transient());
        assert!(!FetchError::Parse("no price".into()).is_transient());
    }

    #[test]
    fn store_errors_convert_into_crawler_errors() {
        let err: CrawlerError = StoreError::DuplicateSymbol("AAPL".into()).into();
        assert_eq!(err.to_string(), "Symbol AAPL is already recorded");
    }
}
