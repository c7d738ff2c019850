use std::env;
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// Market-data source configuration
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// How many assets, ranked by market cap, a run tracks
    pub universe_size: u32,
    pub request_timeout_secs: u64,
}

/// Transactional email provider configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
}

/// Pipeline tuning knobs
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum fractional increase over the stored ATH before an event
    /// fires (0.0 = any positive delta)
    pub ath_threshold: f64,
    /// Per-asset notification cooldown window
    pub cooldown_secs: u64,
    /// Single-flight lock TTL; slightly above the expected run duration
    pub lock_ttl_secs: u64,
    /// Bounded fan-out when dispatching to recipients
    pub dispatch_concurrency: usize,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub market: MarketDataConfig,
    pub email: EmailConfig,
    pub pipeline: PipelineConfig,
    pub log_level: String,
    pub environment: String,
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse::<T>().ok())
        .unwrap_or(default)
}

impl DatabaseConfig {
    /// Create database config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL")
            .map_err(|_| "DATABASE_URL environment variable is required")?;

        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32);
        let acquire_timeout_secs = env_parse("DATABASE_ACQUIRE_TIMEOUT_SECS", 30u64);
        let idle_timeout_secs = env_parse("DATABASE_IDLE_TIMEOUT_SECS", 600u64);

        if max_connections == 0 {
            return Err("DATABASE_MAX_CONNECTIONS must be greater than 0".to_string());
        }

        Ok(Self {
            url,
            max_connections,
            acquire_timeout_secs,
            idle_timeout_secs,
        })
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/athwatch".to_string(),
            max_connections: 10,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl MarketDataConfig {
    pub fn from_env() -> Result<Self, String> {
        let base_url = env::var("MARKET_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.coingecko.com/api/v3".to_string());
        let universe_size = env_parse("TOP_ASSETS_LIMIT", 100u32);
        let request_timeout_secs = env_parse("MARKET_REQUEST_TIMEOUT_SECS", 10u64);

        if universe_size == 0 || universe_size > 250 {
            return Err("TOP_ASSETS_LIMIT must be between 1 and 250".to_string());
        }

        Ok(Self {
            base_url,
            universe_size,
            request_timeout_secs,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            universe_size: 100,
            request_timeout_secs: 10,
        }
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self, String> {
        let api_url = env::var("EMAIL_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string());
        let api_key =
            env::var("EMAIL_API_KEY").map_err(|_| "EMAIL_API_KEY environment variable is required")?;
        let from_address =
            env::var("EMAIL_FROM").unwrap_or_else(|_| "alerts@athwatch.app".to_string());

        if !from_address.contains('@') {
            return Err(format!("EMAIL_FROM is not a valid address: {}", from_address));
        }

        Ok(Self {
            api_url,
            api_key,
            from_address,
        })
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.resend.com/emails".to_string(),
            api_key: String::new(),
            from_address: "alerts@athwatch.app".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, String> {
        let ath_threshold = env_parse("ATH_THRESHOLD", 0.0f64);
        let cooldown_secs = env_parse("NOTIFY_COOLDOWN_SECS", 300u64);
        let lock_ttl_secs = env_parse("RUN_LOCK_TTL_SECS", 120u64);
        let dispatch_concurrency = env_parse("DISPATCH_CONCURRENCY", 8usize);

        if ath_threshold < 0.0 {
            return Err("ATH_THRESHOLD must not be negative".to_string());
        }
        if dispatch_concurrency == 0 {
            return Err("DISPATCH_CONCURRENCY must be greater than 0".to_string());
        }

        Ok(Self {
            ath_threshold,
            cooldown_secs,
            lock_ttl_secs,
            dispatch_concurrency,
        })
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ath_threshold: 0.0,
            cooldown_secs: 300,
            lock_ttl_secs: 120,
            dispatch_concurrency: 8,
        }
    }
}

impl AppConfig {
    /// Create application config from environment variables
    pub fn from_env() -> Result<Self, String> {
        let database = DatabaseConfig::from_env()?;
        let market = MarketDataConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let pipeline = PipelineConfig::from_env()?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid LOG_LEVEL: {}. Must be one of: {:?}",
                log_level, valid_log_levels
            ));
        }

        let valid_environments = ["development", "staging", "production"];
        if !valid_environments.contains(&environment.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid ENVIRONMENT: {}. Must be one of: {:?}",
                environment, valid_environments
            ));
        }

        Ok(Self {
            database,
            market,
            email,
            pipeline,
            log_level: log_level.to_lowercase(),
            environment: environment.to_lowercase(),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            market: MarketDataConfig::default(),
            email: EmailConfig::default(),
            pipeline: PipelineConfig::default(),
            log_level: "info".to_string(),
            environment: "development".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_default() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 30);
    }

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.ath_threshold, 0.0);
        assert_eq!(config.cooldown_secs, 300);
        assert!(config.lock_ttl_secs > 0);
        assert_eq!(config.dispatch_concurrency, 8);
    }

    #[test]
    fn test_market_config_default() {
        let config = MarketDataConfig::default();
        assert_eq!(config.universe_size, 100);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert!(!config.is_production());
        assert_eq!(config.log_level, "info");
    }
}
