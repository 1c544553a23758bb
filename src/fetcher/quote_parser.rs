// src/fetcher/quote_parser.rs
use crate::config::FetcherConfig;
use crate::error::{CrawlerError, FetchError};
use crate::types::PriceSnapshot;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Leading number with optional thousands separators and magnitude suffix,
/// e.g. "1,234.50", "171.20 x 900", "12.3M".
static NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?[0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmMbBtT])?\b")
        .expect("number pattern is valid")
});

/// Number of cells in the summary table: previous close, open, bid, ask,
/// volume, average volume.
pub const SUMMARY_FIELDS: usize = 6;

/// Extracts a `PriceSnapshot` from a quote page.
#[derive(Debug, Clone)]
pub struct QuotePageParser {
    price: Selector,
    table: Selector,
    field: Selector,
}

impl QuotePageParser {
    pub fn new(config: &FetcherConfig) -> Result<Self, CrawlerError> {
        Ok(Self {
            price: compile(&config.price_selector)?,
            table: compile(&config.table_selector)?,
            field: compile(&config.field_selector)?,
        })
    }

    /// A missing price element, an unreadable price, or a summary table
    /// without exactly six cells all mean the page is not a live quote.
    pub fn parse(&self, html: &str, timestamp: DateTime<Utc>) -> Result<PriceSnapshot, FetchError> {
        let document = Html::parse_document(html);

        let price_text = document
            .select(&self.price)
            .next()
            .map(element_text)
            .ok_or_else(|| FetchError::Parse("price element not found".into()))?;
        let price = parse_decimal(&price_text)
            .ok_or_else(|| FetchError::Parse(format!("unreadable price {:?}", price_text)))?;

        let table = document
            .select(&self.table)
            .next()
            .ok_or_else(|| FetchError::Parse("summary table not found".into()))?;
        let cells: Vec<String> = table.select(&self.field).map(element_text).collect();
        if cells.len() != SUMMARY_FIELDS {
            return Err(FetchError::Parse(format!(
                "summary table has {} fields, expected {}",
                cells.len(),
                SUMMARY_FIELDS
            )));
        }

        Ok(PriceSnapshot {
            timestamp,
            price,
            previous_close: parse_decimal(&cells[0]),
            open: parse_decimal(&cells[1]),
            bid: parse_decimal(&cells[2]),
            ask: parse_decimal(&cells[3]),
            volume: parse_count(&cells[4]),
            avg_volume: parse_count(&cells[5]),
        })
    }
}

fn compile(selector: &str) -> Result<Selector, CrawlerError> {
    Selector::parse(selector)
        .map_err(|e| CrawlerError::Config(format!("invalid CSS selector {:?}: {:?}", selector, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join("").trim().to_string()
}

/// Parses the leading number of a cell; "N/A", "-" and blanks yield `None`.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let caps = NUMBER_REGEX.captures(text)?;
    let base: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(unit) if unit == "k" => 1e3,
        Some(unit) if unit == "m" => 1e6,
        Some(unit) if unit == "b" => 1e9,
        Some(unit) if unit == "t" => 1e12,
        _ => 1.0,
    };
    Some(base * multiplier)
}

pub fn parse_count(text: &str) -> Option<u64> {
    parse_decimal(text)
        .filter(|value| *value >= 0.0)
        .map(|value| value.round() as u64)
}
