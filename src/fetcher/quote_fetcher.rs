// src/fetcher/quote_fetcher.rs
use super::quote_parser::QuotePageParser;
use crate::config::FetcherConfig;
use crate::error::{CrawlerError, FetchError};
use crate::symbols::TickerSymbol;
use crate::types::PriceSnapshot;
use async_trait::async_trait;
use chrono::Utc;
use log::trace;
use reqwest::Client;

/// Anything that can turn a ticker into a live quote.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch(&self, symbol: &TickerSymbol) -> Result<PriceSnapshot, FetchError>;
}

/// Downloads the public quote page for a ticker and scrapes it.
pub struct HttpQuoteFetcher {
    client: Client,
    url_template: String,
    parser: QuotePageParser,
}

impl HttpQuoteFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, CrawlerError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CrawlerError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url_template: config.url_template.clone(),
            parser: QuotePageParser::new(config)?,
        })
    }

    pub fn quote_url(&self, symbol: &TickerSymbol) -> String {
        self.url_template
            .replace("{symbol}", &urlencoding::encode(symbol.as_str()))
    }
}

#[async_trait]
impl QuoteSource for HttpQuoteFetcher {
    async fn fetch(&self, symbol: &TickerSymbol) -> Result<PriceSnapshot, FetchError> {
        let url = self.quote_url(symbol);
        trace!("Fetching quote page {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network(format!("{} returned {}", url, status)));
        }

        let body = response.text().await?;
        self.parser.parse(&body, Utc::now())
    }
}
