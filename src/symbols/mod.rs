// src/symbols/mod.rs
pub mod candidates;
pub mod ticker_symbol;

pub use candidates::{SurveyCandidates, ALPHABET};
pub use ticker_symbol::{bucket_letter, TickerSymbol};
