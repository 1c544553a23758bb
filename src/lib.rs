// src/lib.rs
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod mode;
pub mod store;
pub mod symbols;
pub mod types;

// Optional re-exports
pub use config::CrawlerConfig;
pub use crawler::{Crawler, RunningCrawler, ShutdownHandle, StatsSummary};
pub use error::{CrawlerError, FetchError, StoreError};
pub use fetcher::{HttpQuoteFetcher, QuoteSource};
pub use mode::{MarketClock, MarketHours, Mode, ModeSource};
pub use store::TickerStore;
pub use symbols::TickerSymbol;
pub use types::PriceSnapshot;
