// src/config.rs
use crate::mode::MarketHours;
use anyhow::{anyhow, bail, Context, Result};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_QUOTE_URL_TEMPLATE: &str =
    "https://finance.yahoo.com/quote/{symbol}?p={symbol}&.tsrc=fin-srch";
pub const DEFAULT_PRICE_SELECTOR: &str = r#"div[class="My(6px) Pos(r) smartphone_Mt(6px)"] span"#;
pub const DEFAULT_TABLE_SELECTOR: &str = r#"div[class="D(ib) W(1/2) Bxz(bb) Pend(12px) Va(t) ie-7_D(i) smartphone_D(b) smartphone_W(100%) smartphone_Pend(0px) smartphone_BdY smartphone_Bdc($seperatorColor)"]"#;
pub const DEFAULT_FIELD_SELECTOR: &str = r#"span[class="Trsdu(0.3s)"]"#;
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Where and how to fetch quote pages.
#[derive(Clone, Debug)]
pub struct FetcherConfig {
    pub url_template: String,
    pub price_selector: String,
    pub table_selector: String,
    pub field_selector: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_QUOTE_URL_TEMPLATE.to_string(),
            price_selector: DEFAULT_PRICE_SELECTOR.to_string(),
            table_selector: DEFAULT_TABLE_SELECTOR.to_string(),
            field_selector: DEFAULT_FIELD_SELECTOR.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Pacing of the dispatcher and worker loops. Every value is independent.
#[derive(Clone, Debug)]
pub struct Cadence {
    /// Dispatcher sleep between mode polls.
    pub poll_interval: Duration,
    /// Survey worker sleep while waiting for a top-up.
    pub idle_backoff: Duration,
    /// Pause before the single retry of a transient fetch failure.
    pub retry_delay: Duration,
    /// Target length of one monitor cycle.
    pub monitor_interval: Duration,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            idle_backoff: Duration::from_millis(5000),
            retry_delay: Duration::from_millis(3000),
            monitor_interval: Duration::from_secs(1800),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CrawlerConfig {
    pub data_dir: PathBuf,
    pub workers: usize,
    pub market_hours: MarketHours,
    pub cadence: Cadence,
    pub fetcher: FetcherConfig,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("Data"),
            workers: default_workers(),
            market_hours: MarketHours::default(),
            cadence: Cadence::default(),
            fetcher: FetcherConfig::default(),
        }
    }
}

impl CrawlerConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timezone: Tz = env_or("MARKET_TIMEZONE", defaults.market_hours.timezone.name().to_string())?
            .parse()
            .map_err(|e| anyhow!("MARKET_TIMEZONE is not a known timezone: {}", e))?;

        let config = Self {
            data_dir: env_or("CRAWLER_DATA_DIR", defaults.data_dir)?,
            workers: env_or("CRAWLER_WORKERS", defaults.workers)?,
            market_hours: MarketHours {
                open_minute: env_or("MARKET_OPEN_MINUTE", defaults.market_hours.open_minute)?,
                close_minute: env_or("MARKET_CLOSE_MINUTE", defaults.market_hours.close_minute)?,
                timezone,
            },
            cadence: Cadence {
                poll_interval: Duration::from_millis(env_or("DISPATCH_POLL_MS", 1000u64)?),
                idle_backoff: Duration::from_millis(env_or("SURVEY_IDLE_BACKOFF_MS", 5000u64)?),
                retry_delay: Duration::from_millis(env_or("RETRY_DELAY_MS", 3000u64)?),
                monitor_interval: Duration::from_secs(env_or("MONITOR_INTERVAL_SECS", 1800u64)?),
            },
            fetcher: FetcherConfig {
                url_template: env_or("QUOTE_URL_TEMPLATE", defaults.fetcher.url_template)?,
                price_selector: env_or("QUOTE_PRICE_SELECTOR", defaults.fetcher.price_selector)?,
                table_selector: env_or("QUOTE_TABLE_SELECTOR", defaults.fetcher.table_selector)?,
                field_selector: env_or("QUOTE_FIELD_SELECTOR", defaults.fetcher.field_selector)?,
                user_agent: env_or("CRAWLER_USER_AGENT", defaults.fetcher.user_agent)?,
                timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT_SECS", 30u64)?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("CRAWLER_WORKERS must be at least 1");
        }
        let hours = &self.market_hours;
        if hours.open_minute >= hours.close_minute || hours.close_minute > 24 * 60 {
            bail!(
                "market hours must satisfy open < close <= 1440 (got {}..{})",
                hours.open_minute,
                hours.close_minute
            );
        }
        if !self.fetcher.url_template.contains("{symbol}") {
            bail!("QUOTE_URL_TEMPLATE must contain a {{symbol}} placeholder");
        }
        for (name, selector) in [
            ("QUOTE_PRICE_SELECTOR", &self.fetcher.price_selector),
            ("QUOTE_TABLE_SELECTOR", &self.fetcher.table_selector),
            ("QUOTE_FIELD_SELECTOR", &self.fetcher.field_selector),
        ] {
            scraper::Selector::parse(selector)
                .map_err(|e| anyhow!("{} is not a valid CSS selector: {:?}", name, e))?;
        }
        Ok(())
    }
}

/// One fewer than the available cores, leaving room for the dispatcher.
fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{}", e))
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CrawlerConfig::default();
        config.validate().unwrap();
        assert!(config.workers >= 1);
        assert_eq!(config.market_hours.open_minute, 570);
        assert_eq!(config.market_hours.close_minute, 960);
        assert_eq!(config.cadence.monitor_interval, Duration::from_secs(1800));
    }

    #[test]
    fn rejects_inverted_market_hours() {
        let mut config = CrawlerConfig::default();
        config.market_hours.open_minute = 1000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_template_without_placeholder() {
        let mut config = CrawlerConfig::default();
        config.fetcher.url_template = "https://example.com/quote".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_broken_selector() {
        let mut config = CrawlerConfig::default();
        config.fetcher.price_selector = "div[".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_or_parses_and_falls_back() {
        std::env::set_var("TICKER_CRAWLER_TEST_WORKERS", "7");
        assert_eq!(env_or("TICKER_CRAWLER_TEST_WORKERS", 1usize).unwrap(), 7);

        std::env::set_var("TICKER_CRAWLER_TEST_WORKERS", "seven");
        assert!(env_or("TICKER_CRAWLER_TEST_WORKERS", 1usize).is_err());

        assert_eq!(env_or("TICKER_CRAWLER_TEST_UNSET", 3usize).unwrap(), 3);
    }
}
