// src/store/mod.rs
pub mod ticker_store;

pub use ticker_store::{TickerStore, TICKERS_DIR, TICKER_DATA_DIR};
