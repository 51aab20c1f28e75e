use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,
    pub db_pool_max: u32,
    pub db_pool_min: u32,

    // API settings
    pub api_host: String,
    pub api_port: u16,
    /// Allowed CORS origin for the dashboard; `None` allows any origin
    pub frontend_url: Option<String>,
    pub request_timeout_seconds: u64,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_api_per_second: u64,
    pub rate_limit_api_burst: u32,
    pub rate_limit_ingest_per_second: u64,
    pub rate_limit_ingest_burst: u32,

    // Alerting
    pub threshold_cache_ttl_seconds: u64,
    pub notify_channel_capacity: usize,

    // Logging
    pub log_json: bool,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            db_pool_max: env_or("DB_POOL_MAX", 20),
            db_pool_min: env_or("DB_POOL_MIN", 2),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env_or("API_PORT", 3000),
            frontend_url: env::var("FRONTEND_URL").ok().filter(|s| !s.trim().is_empty()),
            request_timeout_seconds: env_or("REQUEST_TIMEOUT_SECONDS", 30),

            // Rate limiting
            disable_rate_limiting: env_or("DISABLE_RATE_LIMITING", false),
            rate_limit_api_per_second: env_or("RATE_LIMIT_API_PER_SECOND", 2),
            rate_limit_api_burst: env_or("RATE_LIMIT_API_BURST", 100),
            rate_limit_ingest_per_second: env_or("RATE_LIMIT_INGEST_PER_SECOND", 20),
            rate_limit_ingest_burst: env_or("RATE_LIMIT_INGEST_BURST", 200),

            // Alerting
            threshold_cache_ttl_seconds: env_or("THRESHOLD_CACHE_TTL_SECONDS", 60),
            notify_channel_capacity: env_or("NOTIFY_CHANNEL_CAPACITY", 1024),

            // Logging
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    #[must_use]
    pub fn threshold_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.threshold_cache_ttl_seconds)
    }
}

/// Parse an optional environment variable, falling back to `default` when it
/// is unset or malformed.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
