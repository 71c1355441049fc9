use crate::config::AppConfig;
use crate::csv_history::{CsvHistoryError, CsvHistoryStore};
use crate::data_structures::{HistoryCache, Period, PriceSample, current_cache_ttl};
use crate::jquants::{JquantsClient, JquantsError};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug)]
pub enum HistoryError {
    Jquants(JquantsError),
    Csv(CsvHistoryError),
}

impl From<JquantsError> for HistoryError {
    fn from(error: JquantsError) -> Self {
        HistoryError::Jquants(error)
    }
}

impl From<CsvHistoryError> for HistoryError {
    fn from(error: CsvHistoryError) -> Self {
        HistoryError::Csv(error)
    }
}

impl HistoryError {
    /// "No such instrument / no rows" as opposed to a transport or parse
    /// failure. The API maps the former to 404 and the rest to 500.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HistoryError::Jquants(JquantsError::NoData)
                | HistoryError::Csv(CsvHistoryError::NotFound(_))
        )
    }
}

/// Concrete price-series sources. The J-Quants client keeps mutable
/// rate-limit state, so it sits behind its own lock.
pub enum HistorySource {
    Jquants(Mutex<JquantsClient>),
    Csv(CsvHistoryStore),
}

/// Historical price series provider: one concrete source behind a
/// per-(code, period) cache whose TTL follows the Tokyo session clock.
pub struct HistoryProvider {
    source: HistorySource,
    cache: Mutex<HistoryCache>,
    config: AppConfig,
}

pub type SharedHistoryProvider = Arc<HistoryProvider>;

impl HistoryProvider {
    pub fn new(source: HistorySource, config: AppConfig) -> Self {
        Self {
            source,
            cache: Mutex::new(HistoryCache::new()),
            config,
        }
    }

    /// Daily closes for `code` over the period's lookback window, oldest
    /// first. Served from cache while fresh.
    pub async fn daily_history(
        &self,
        code: &str,
        period: Period,
    ) -> Result<Vec<PriceSample>, HistoryError> {
        let ttl = current_cache_ttl(
            &self.config.market_session,
            self.config.session_cache_ttl,
            self.config.off_session_cache_ttl,
        );

        {
            let cache = self.cache.lock().await;
            if let Some(samples) = cache.get(code, period, ttl) {
                debug!(code, period = %period, samples = samples.len(), "History cache hit");
                return Ok(samples);
            }
        }

        let today = Utc::now().date_naive();
        let from = period.start_date(today);

        let samples = match &self.source {
            HistorySource::Jquants(client) => {
                let mut client = client.lock().await;
                client.daily_history(code, from, today).await?
            }
            HistorySource::Csv(store) => store.daily_history(code, from, today)?,
        };

        info!(code, period = %period, samples = samples.len(), "Fetched daily history");

        let mut cache = self.cache.lock().await;
        cache.insert(code.to_string(), period, samples.clone());
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MarketSessionConfig;
    use std::fs;
    use std::time::Duration;

    fn csv_provider(test_name: &str, code: &str, content: &str) -> HistoryProvider {
        let dir = std::env::temp_dir()
            .join("stock-buddy-provider-tests")
            .join(test_name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}.csv", code)), content).unwrap();

        let config = AppConfig {
            market_index_code: "0000".to_string(),
            jquants_base_url: "https://api.jquants.com/v1/".to_string(),
            jquants_refresh_token: None,
            jquants_rate_limit_per_minute: 60,
            csv_data_dir: Some(dir.display().to_string()),
            session_cache_ttl: Duration::from_secs(300),
            off_session_cache_ttl: Duration::from_secs(300),
            market_session: MarketSessionConfig::default(),
            environment: "test".to_string(),
            port: 0,
        };
        HistoryProvider::new(HistorySource::Csv(CsvHistoryStore::new(dir)), config)
    }

    fn recent_csv(close_a: f64, close_b: f64) -> String {
        // Dates inside every lookback window so the provider's date filter
        // keeps them
        let today = Utc::now().date_naive();
        format!(
            "date,close\n{},{}\n{},{}\n",
            today - chrono::Duration::days(2),
            close_a,
            today - chrono::Duration::days(1),
            close_b,
        )
    }

    #[tokio::test]
    async fn test_fetches_from_csv_source() {
        let provider = csv_provider("fetches", "7203", &recent_csv(2480.0, 2505.5));
        let samples = provider.daily_history("7203", Period::OneMonth).await.unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples[0].date < samples[1].date);
    }

    #[tokio::test]
    async fn test_serves_second_read_from_cache() {
        let provider = csv_provider("caches", "7203", &recent_csv(2480.0, 2505.5));
        let first = provider.daily_history("7203", Period::OneMonth).await.unwrap();

        // Remove the backing file; a cache hit must not notice
        let path = std::env::temp_dir()
            .join("stock-buddy-provider-tests")
            .join("caches")
            .join("7203.csv");
        fs::remove_file(path).unwrap();

        let second = provider.daily_history("7203", Period::OneMonth).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unknown_code_maps_to_not_found() {
        let provider = csv_provider("not_found", "7203", &recent_csv(2480.0, 2505.5));
        let error = provider
            .daily_history("9999", Period::OneMonth)
            .await
            .unwrap_err();
        assert!(error.is_not_found());
    }
}
