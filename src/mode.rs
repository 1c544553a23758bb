// src/mode.rs
use chrono::{Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating phase of the crawler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Nothing decided yet; the dispatcher has not polled the clock.
    #[default]
    Invalid,
    /// Market open: poll known tickers for quotes.
    RetrieveData,
    /// Market closed: probe candidate strings for new tickers.
    SurveyMarket,
    /// Terminal. Every loop drains and exits.
    ShutDown,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Invalid => "invalid",
            Mode::RetrieveData => "retrieve_data",
            Mode::SurveyMarket => "survey_market",
            Mode::ShutDown => "shut_down",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Regular session bounds, as minutes after local midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketHours {
    pub open_minute: u32,  // 570 for 9:30am
    pub close_minute: u32, // 960 for 4pm
    pub timezone: Tz,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            open_minute: 570,
            close_minute: 960,
            timezone: chrono_tz::America::New_York,
        }
    }
}

/// Maps a wall-clock instant to the mode the crawler should be in.
///
/// The market counts as open only strictly between the open and close
/// minutes, Monday through Friday. `now` is expected in the market's
/// local time.
pub fn derive_mode<T: Datelike + Timelike>(now: &T, hours: &MarketHours) -> Mode {
    let weekday = !matches!(now.weekday(), Weekday::Sat | Weekday::Sun);
    let minutes = now.hour() * 60 + now.minute();

    if weekday && minutes > hours.open_minute && minutes < hours.close_minute {
        Mode::RetrieveData
    } else {
        Mode::SurveyMarket
    }
}

/// Where the dispatcher learns which mode the crawler should be in.
pub trait ModeSource: Send + Sync {
    fn desired_mode(&self) -> Mode;
}

/// Reads the real clock in the market's timezone.
#[derive(Debug, Clone)]
pub struct MarketClock {
    hours: MarketHours,
}

impl MarketClock {
    pub fn new(hours: MarketHours) -> Self {
        Self { hours }
    }

    pub fn hours(&self) -> &MarketHours {
        &self.hours
    }
}

impl ModeSource for MarketClock {
    fn desired_mode(&self) -> Mode {
        let now = Utc::now().with_timezone(&self.hours.timezone);
        derive_mode(&now, &self.hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn weekday_morning_is_retrieve() {
        // 2024-01-10 was a Wednesday.
        let hours = MarketHours::default();
        assert_eq!(derive_mode(&at(2024, 1, 10, 10, 0), &hours), Mode::RetrieveData);
    }

    #[test]
    fn weekend_is_survey() {
        // 2024-01-13 was a Saturday.
        let hours = MarketHours::default();
        assert_eq!(derive_mode(&at(2024, 1, 13, 10, 0), &hours), Mode::SurveyMarket);
        assert_eq!(derive_mode(&at(2024, 1, 14, 12, 0), &hours), Mode::SurveyMarket);
    }

    #[test]
    fn weekday_evening_is_survey() {
        let hours = MarketHours::default();
        for day in 8..=12 {
            assert_eq!(derive_mode(&at(2024, 1, day, 20, 0), &hours), Mode::SurveyMarket);
        }
    }

    #[test]
    fn bounds_are_exclusive() {
        let hours = MarketHours::default();
        assert_eq!(derive_mode(&at(2024, 1, 10, 9, 30), &hours), Mode::SurveyMarket);
        assert_eq!(derive_mode(&at(2024, 1, 10, 9, 31), &hours), Mode::RetrieveData);
        assert_eq!(derive_mode(&at(2024, 1, 10, 15, 59), &hours), Mode::RetrieveData);
        assert_eq!(derive_mode(&at(2024, 1, 10, 16, 0), &hours), Mode::SurveyMarket);
    }

    #[test]
    fn custom_hours_are_respected() {
        let hours = MarketHours {
            open_minute: 9 * 60,
            close_minute: 15 * 60,
            timezone: chrono_tz::Asia::Ho_Chi_Minh,
        };
        assert_eq!(derive_mode(&at(2024, 1, 10, 14, 30), &hours), Mode::RetrieveData);
        assert_eq!(derive_mode(&at(2024, 1, 10, 15, 30), &hours), Mode::SurveyMarket);
    }

    #[test]
    fn works_with_zoned_datetimes() {
        use chrono::TimeZone;
        let hours = MarketHours::default();
        let open = chrono_tz::America::New_York
            .with_ymd_and_hms(2024, 1, 10, 10, 0, 0)
            .unwrap();
        assert_eq!(derive_mode(&open, &hours), Mode::RetrieveData);
    }

    #[test]
    fn mode_serializes_in_snake_case() {
        assert_eq!(serde_json::to_string(&Mode::SurveyMarket).unwrap(), r#""survey_market""#);
        assert_eq!(Mode::default(), Mode::Invalid);
        assert_eq!(Mode::ShutDown.to_string(), "shut_down");
    }
}
