// src/symbols/ticker_symbol.rs
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange ticker made of 3 to 5 uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TickerSymbol(String);

impl TickerSymbol {
    pub const MIN_LEN: usize = 3;
    pub const MAX_LEN: usize = 5;

    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let valid_len = (Self::MIN_LEN..=Self::MAX_LEN).contains(&raw.len());
        let valid_chars = raw.bytes().all(|b| b.is_ascii_uppercase());

        if valid_len && valid_chars {
            Ok(Self(raw.to_string()))
        } else {
            Err(StoreError::InvalidSymbol(raw.to_string()))
        }
    }

    /// Lenient variant for user input: trims and uppercases before validating.
    pub fn from_query(query: &str) -> Result<Self, StoreError> {
        Self::parse(&query.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Position in survey order: shorter symbols first, then lexicographic.
    pub fn survey_rank(&self) -> (usize, &str) {
        (self.0.len(), &self.0)
    }

    /// Bucket letter the symbol is filed under.
    pub fn letter(&self) -> char {
        // Validated non-empty ASCII on construction.
        self.0.as_bytes()[0] as char
    }
}

impl fmt::Display for TickerSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TickerSymbol {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TickerSymbol {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TickerSymbol> for String {
    fn from(symbol: TickerSymbol) -> Self {
        symbol.0
    }
}

/// Normalizes a bucket letter, rejecting anything outside A-Z.
pub fn bucket_letter(raw: char) -> Result<char, StoreError> {
    let letter = raw.to_ascii_uppercase();
    if letter.is_ascii_uppercase() {
        Ok(letter)
    } else {
        Err(StoreError::InvalidSymbol(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_three_to_five_uppercase_letters() {
        assert!(TickerSymbol::parse("IBM").is_ok());
        assert!(TickerSymbol::parse("AAPL").is_ok());
        assert!(TickerSymbol::parse("GOOGL").is_ok());
    }

    #[test]
    fn rejects_bad_symbols() {
        assert!(TickerSymbol::parse("GE").is_err());
        assert!(TickerSymbol::parse("ABCDEF").is_err());
        assert!(TickerSymbol::parse("aapl").is_err());
        assert!(TickerSymbol::parse("BRK.B").is_err());
        assert!(TickerSymbol::parse("").is_err());
    }

    #[test]
    fn from_query_normalizes_input() {
        assert_eq!(TickerSymbol::from_query(" msft ").unwrap().as_str(), "MSFT");
    }

    #[test]
    fn letter_is_first_character() {
        assert_eq!(TickerSymbol::parse("NVDA").unwrap().letter(), 'N');
    }

    #[test]
    fn serializes_as_plain_string() {
        let symbol = TickerSymbol::parse("AMD").unwrap();
        assert_eq!(serde_json::to_string(&symbol).unwrap(), r#""AMD""#);

        let back: TickerSymbol = serde_json::from_str(r#""AMD""#).unwrap();
        assert_eq!(back, symbol);
        assert!(serde_json::from_str::<TickerSymbol>(r#""amd""#).is_err());
    }

    #[test]
    fn bucket_letter_uppercases() {
        assert_eq!(bucket_letter('q').unwrap(), 'Q');
        assert!(bucket_letter('1').is_err());
    }
}
