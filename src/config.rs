use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

// Tokyo Stock Exchange session window, used to pick the history-cache TTL
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MarketSessionConfig {
    pub start_hour: u32,     // e.g., 9 for the 9:00 open
    pub end_hour: u32,       // e.g., 15 for the 15:00 close
    pub timezone: String,    // e.g., "Asia/Tokyo"
    pub weekdays_only: bool, // true for Monday-Friday only
}

impl Default for MarketSessionConfig {
    fn default() -> Self {
        Self {
            start_hour: 9,
            end_hour: 15,
            timezone: "Asia/Tokyo".to_string(),
            weekdays_only: true,
        }
    }
}

// YAML-serializable configuration structure
#[derive(Serialize, Deserialize, Debug)]
pub struct ConfigYaml {
    pub market_index_code: Option<String>,
    pub jquants_base_url: Option<String>,
    pub jquants_refresh_token: Option<String>,
    pub jquants_rate_limit_per_minute: Option<u32>,
    pub csv_data_dir: Option<String>,
    pub session_cache_ttl_secs: Option<u64>,
    pub off_session_cache_ttl_secs: Option<u64>,
    pub market_session: Option<MarketSessionConfig>,
    pub environment: String,
    pub port: u16,
}

// Holds application-wide settings
#[derive(Clone)]
pub struct AppConfig {
    pub market_index_code: String,
    pub jquants_base_url: String,
    pub jquants_refresh_token: Option<String>,
    pub jquants_rate_limit_per_minute: u32,
    pub csv_data_dir: Option<String>,
    pub session_cache_ttl: Duration,
    pub off_session_cache_ttl: Duration,
    pub market_session: MarketSessionConfig,
    pub environment: String,
    pub port: u16,
}

pub type SharedAppConfig = Arc<AppConfig>;

// "0000" is the J-Quants code for TOPIX
const DEFAULT_MARKET_INDEX_CODE: &str = "0000";
const DEFAULT_JQUANTS_BASE_URL: &str = "https://api.jquants.com/v1/";

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Self {
        // Check for CONFIG_FILE environment variable first
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    // Load configuration from YAML file
    pub fn from_yaml(file_path: &str) -> Self {
        let yaml_content = fs::read_to_string(file_path)
            .unwrap_or_else(|e| panic!("Failed to read config file {}: {}", file_path, e));

        let yaml_config: ConfigYaml = serde_yaml::from_str(&yaml_content)
            .unwrap_or_else(|e| panic!("Failed to parse YAML config: {}", e));

        Self {
            market_index_code: yaml_config
                .market_index_code
                .unwrap_or_else(|| DEFAULT_MARKET_INDEX_CODE.to_string()),
            jquants_base_url: yaml_config
                .jquants_base_url
                .unwrap_or_else(|| DEFAULT_JQUANTS_BASE_URL.to_string()),
            jquants_refresh_token: yaml_config.jquants_refresh_token,
            jquants_rate_limit_per_minute: yaml_config.jquants_rate_limit_per_minute.unwrap_or(60),
            csv_data_dir: yaml_config.csv_data_dir,
            session_cache_ttl: Duration::from_secs(yaml_config.session_cache_ttl_secs.unwrap_or(300)),
            off_session_cache_ttl: Duration::from_secs(
                yaml_config.off_session_cache_ttl_secs.unwrap_or(21_600),
            ),
            market_session: yaml_config.market_session.unwrap_or_default(),
            environment: yaml_config.environment,
            port: yaml_config.port,
        }
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok(); // Load .env file if present

        let market_index_code = env::var("MARKET_INDEX_CODE")
            .unwrap_or_else(|_| DEFAULT_MARKET_INDEX_CODE.to_string());

        let jquants_base_url = env::var("JQUANTS_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_JQUANTS_BASE_URL.to_string());

        let jquants_refresh_token = env::var("JQUANTS_REFRESH_TOKEN").ok();

        let jquants_rate_limit_per_minute = env::var("JQUANTS_RATE_LIMIT_PER_MINUTE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        let csv_data_dir = env::var("CSV_DATA_DIR").ok();

        let session_cache_ttl_secs = env::var("SESSION_CACHE_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300); // Default to 5 minutes while the session is open

        let off_session_cache_ttl_secs = env::var("OFF_SESSION_CACHE_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(21_600); // Default to 6 hours outside the session

        let environment = env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8888); // Default to 8888

        Self {
            market_index_code,
            jquants_base_url,
            jquants_refresh_token,
            jquants_rate_limit_per_minute,
            csv_data_dir,
            session_cache_ttl: Duration::from_secs(session_cache_ttl_secs),
            off_session_cache_ttl: Duration::from_secs(off_session_cache_ttl_secs),
            market_session: MarketSessionConfig::default(),
            environment,
            port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_config_parsing() {
        let yaml = r#"
market_index_code: "0000"
csv_data_dir: "./data"
session_cache_ttl_secs: 60
environment: "development"
port: 9000
"#;
        let parsed: ConfigYaml = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.market_index_code.as_deref(), Some("0000"));
        assert_eq!(parsed.csv_data_dir.as_deref(), Some("./data"));
        assert_eq!(parsed.session_cache_ttl_secs, Some(60));
        assert!(parsed.jquants_refresh_token.is_none());
        assert_eq!(parsed.port, 9000);
    }

    #[test]
    fn test_default_market_session_is_tokyo() {
        let session = MarketSessionConfig::default();
        assert_eq!(session.timezone, "Asia/Tokyo");
        assert_eq!(session.start_hour, 9);
        assert_eq!(session.end_hour, 15);
        assert!(session.weekdays_only);
    }
}
