use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE: f64 = 0.10;
const DEFAULT_RETURN_WINDOW_DAYS: i64 = 30;
const DEFAULT_REVIEW_MIN_COMMENT_CHARS: usize = 10;
const DEV_DEFAULT_JWT_SECRET: &str =
    "this_is_a_development_secret_key_that_is_at_least_64_characters_long_for_testing";

/// Which purchases make a user eligible to review a product.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewEligibility {
    /// The user has a paid-or-later order containing that product.
    /// Recommended default.
    PurchasedProduct,
    /// The user has at least one paid order, for anything. Matches the
    /// legacy storefront behavior; not recommended.
    AnyPaidOrder,
}

impl Default for ReviewEligibility {
    fn default() -> Self {
        ReviewEligibility::PurchasedProduct
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to verify tokens issued by the identity provider
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Bounded retry for transient storage failures on write paths
    #[serde(default = "default_db_retry_attempts")]
    pub db_retry_attempts: u32,
    #[serde(default = "default_db_retry_base_delay_ms")]
    pub db_retry_base_delay_ms: u64,

    /// Tax rate applied to cart subtotals (decimal, e.g. 0.10 for 10%)
    #[serde(default = "default_tax_rate")]
    #[validate(custom = "validate_tax_rate")]
    pub tax_rate: f64,

    /// Flat shipping charge added to every order (0 = free shipping)
    #[serde(default)]
    pub shipping_flat_rate: f64,

    /// Days after purchase during which a return may be requested
    #[serde(default = "default_return_window_days")]
    #[validate(range(min = 1, max = 365))]
    pub return_window_days: i64,

    /// Minimum review comment length in characters
    #[serde(default = "default_review_min_comment_chars")]
    pub review_min_comment_chars: usize,

    /// Review eligibility policy
    #[serde(default)]
    pub review_eligibility: ReviewEligibility,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}
fn default_db_retry_attempts() -> u32 {
    3
}
fn default_db_retry_base_delay_ms() -> u64 {
    50
}
fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}
fn default_return_window_days() -> i64 {
    DEFAULT_RETURN_WINDOW_DAYS
}
fn default_review_min_comment_chars() -> usize {
    DEFAULT_REVIEW_MIN_COMMENT_CHARS
}
fn default_event_channel_capacity() -> usize {
    1024
}

fn validate_tax_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() || !(0.0..1.0).contains(&rate) {
        let mut err = ValidationError::new("tax_rate");
        err.message = Some("tax_rate must be a finite value between 0.0 and 1.0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Minimal constructor used by tests and tools.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            host: default_host(),
            port: default_port(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_retry_attempts: default_db_retry_attempts(),
            db_retry_base_delay_ms: default_db_retry_base_delay_ms(),
            tax_rate: default_tax_rate(),
            shipping_flat_rate: 0.0,
            return_window_days: default_return_window_days(),
            review_min_comment_chars: default_review_min_comment_chars(),
            review_eligibility: ReviewEligibility::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from defaults, an optional `config/{env}.toml`
/// file, and `APP__`-prefixed environment variables (highest priority).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder()
        .set_default("environment", environment.clone())?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    // Development gets a usable secret out of the box; anything else must
    // provide one explicitly.
    if environment == "development" || environment == "test" {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
        builder = builder.set_default("database_url", "sqlite://storefront.db?mode=rwc")?;
    }

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(
        environment = %cfg.environment,
        port = cfg.port,
        return_window_days = cfg.return_window_days,
        "configuration loaded"
    );
    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            DEV_DEFAULT_JWT_SECRET.into(),
            "test".into(),
        );
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tax_rate, 0.10);
        assert_eq!(cfg.return_window_days, 30);
        assert_eq!(cfg.review_min_comment_chars, 10);
        assert_eq!(cfg.review_eligibility, ReviewEligibility::PurchasedProduct);
    }

    #[test]
    fn tax_rate_must_be_a_fraction() {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".into(),
            DEV_DEFAULT_JWT_SECRET.into(),
            "test".into(),
        );
        cfg.tax_rate = 1.5;
        assert!(cfg.validate().is_err());
    }
}
