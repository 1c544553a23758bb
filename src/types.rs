// src/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One quote reading for a ticker. Fields the page did not supply (or showed
/// as "N/A") are `None`; only the headline price is mandatory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub previous_close: Option<f64>,
    pub open: Option<f64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<u64>,
    pub avg_volume: Option<u64>,
}

impl PriceSnapshot {
    /// Snapshot carrying only a price, stamped now.
    pub fn with_price(price: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            price,
            previous_close: None,
            open: None,
            bid: None,
            ask: None,
            volume: None,
            avg_volume: None,
        }
    }

    /// Percentage move against the previous close, when known.
    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .filter(|close| *close != 0.0)
            .map(|close| (self.price - close) / close * 100.0)
    }
}
