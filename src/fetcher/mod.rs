// src/fetcher/mod.rs
pub mod quote_fetcher;
pub mod quote_parser;

pub use quote_fetcher::{HttpQuoteFetcher, QuoteSource};
pub use quote_parser::QuotePageParser;
