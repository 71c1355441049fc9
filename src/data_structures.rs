use crate::config::MarketSessionConfig;
use chrono::{Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

// --- Core Data Structures ---

/// One trading day's closing price for one instrument.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub date: NaiveDate,
    pub close: f64,
}

/// Lookback windows accepted by the beta endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1M")]
    OneMonth,
    #[serde(rename = "3M")]
    ThreeMonths,
    #[serde(rename = "6M")]
    SixMonths,
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "2Y")]
    TwoYears,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneMonth => "1M",
            Period::ThreeMonths => "3M",
            Period::SixMonths => "6M",
            Period::OneYear => "1Y",
            Period::TwoYears => "2Y",
        }
    }

    /// Calendar days covered by the window, weekends and holidays included.
    pub fn lookback_days(&self) -> i64 {
        match self {
            Period::OneMonth => 31,
            Period::ThreeMonths => 93,
            Period::SixMonths => 186,
            Period::OneYear => 366,
            Period::TwoYears => 731,
        }
    }

    pub fn start_date(&self, today: NaiveDate) -> NaiveDate {
        today - chrono::Duration::days(self.lookback_days())
    }
}

impl Default for Period {
    fn default() -> Self {
        Period::OneYear
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- History Cache ---

#[derive(Clone, Debug)]
pub struct CachedHistory {
    pub fetched_at: Instant,
    pub samples: Vec<PriceSample>,
}

/// In-memory cache of fetched price series, keyed by instrument code and
/// lookback window. Entries expire by age; the TTL is supplied per lookup so
/// it can track the market session.
#[derive(Default)]
pub struct HistoryCache {
    entries: HashMap<(String, Period), CachedHistory>,
}

impl HistoryCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, code: &str, period: Period, ttl: Duration) -> Option<Vec<PriceSample>> {
        let entry = self.entries.get(&(code.to_string(), period))?;
        if entry.fetched_at.elapsed() < ttl {
            Some(entry.samples.clone())
        } else {
            None
        }
    }

    pub fn insert(&mut self, code: String, period: Period, samples: Vec<PriceSample>) {
        self.entries.insert(
            (code, period),
            CachedHistory {
                fetched_at: Instant::now(),
                samples,
            },
        );
    }
}

// --- Market Session Utility Functions ---

pub fn is_within_market_session(config: &MarketSessionConfig) -> bool {
    // Parse timezone
    let tz: Tz = match config.timezone.parse() {
        Ok(tz) => tz,
        Err(e) => {
            tracing::warn!("Failed to parse timezone '{}': {}", config.timezone, e);
            return false; // Treat as closed if the timezone is unparseable
        }
    };

    // Get current time in the exchange's timezone
    let now_utc = Utc::now();
    let now_local = now_utc.with_timezone(&tz);

    // Check weekday if weekdays_only is true
    if config.weekdays_only {
        match now_local.weekday() {
            Weekday::Sat | Weekday::Sun => {
                return false; // Weekend - market closed
            }
            _ => {
                // Continue to hour check
            }
        }
    }

    // Check hour range
    let current_hour = now_local.hour();
    current_hour >= config.start_hour && current_hour < config.end_hour
}

/// Short TTL while Tokyo is trading, long TTL once the day's closes are fixed.
pub fn current_cache_ttl(
    config: &MarketSessionConfig,
    session_ttl: Duration,
    off_session_ttl: Duration,
) -> Duration {
    if is_within_market_session(config) {
        session_ttl
    } else {
        off_session_ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(date: &str, close: f64) -> PriceSample {
        PriceSample {
            date: date.parse().unwrap(),
            close,
        }
    }

    #[test]
    fn test_period_wire_tokens() {
        let period: Period = serde_json::from_str("\"3M\"").unwrap();
        assert_eq!(period, Period::ThreeMonths);
        assert_eq!(serde_json::to_string(&Period::OneYear).unwrap(), "\"1Y\"");
        assert!(serde_json::from_str::<Period>("\"7D\"").is_err());
    }

    #[test]
    fn test_period_default_is_one_year() {
        assert_eq!(Period::default(), Period::OneYear);
    }

    #[test]
    fn test_period_lookbacks_are_ordered() {
        let periods = [
            Period::OneMonth,
            Period::ThreeMonths,
            Period::SixMonths,
            Period::OneYear,
            Period::TwoYears,
        ];
        for pair in periods.windows(2) {
            assert!(pair[0].lookback_days() < pair[1].lookback_days());
        }
    }

    #[test]
    fn test_period_start_date() {
        let today: NaiveDate = "2025-08-01".parse().unwrap();
        assert_eq!(
            Period::OneMonth.start_date(today),
            "2025-07-01".parse::<NaiveDate>().unwrap()
        );
    }

    #[test]
    fn test_cache_hit_within_ttl() {
        let mut cache = HistoryCache::new();
        cache.insert(
            "7203".to_string(),
            Period::OneYear,
            vec![sample("2025-08-01", 2500.0)],
        );
        let hit = cache.get("7203", Period::OneYear, Duration::from_secs(60));
        assert_eq!(hit.unwrap().len(), 1);
    }

    #[test]
    fn test_cache_expires_and_misses() {
        let mut cache = HistoryCache::new();
        cache.insert(
            "7203".to_string(),
            Period::OneYear,
            vec![sample("2025-08-01", 2500.0)],
        );
        // Zero TTL means every entry is already stale
        assert!(cache.get("7203", Period::OneYear, Duration::ZERO).is_none());
        // Different period is a distinct key
        assert!(
            cache
                .get("7203", Period::OneMonth, Duration::from_secs(60))
                .is_none()
        );
    }

    #[test]
    fn test_unparseable_timezone_counts_as_closed() {
        let config = MarketSessionConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..MarketSessionConfig::default()
        };
        assert!(!is_within_market_session(&config));
    }
}
