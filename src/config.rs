use chrono::{FixedOffset, Offset, Utc};
use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_TAX_RATE_PERCENT: u32 = 10;
/// Asia/Jakarta, the cafe's business day and the gateway's timestamp zone.
const DEFAULT_BUSINESS_UTC_OFFSET_MINUTES: i32 = 7 * 60;
const MIDTRANS_SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const MIDTRANS_PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret key shared with the identity provider
    #[validate(custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// JWT expiration time in seconds, used when issuing tokens from the CLI
    #[validate(range(min = 60, max = 86400))]
    pub jwt_expiration: usize,

    /// Expected `iss` claim
    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    /// Expected `aud` claim
    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[validate(custom = "validate_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
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

    /// DB connect timeout in seconds
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    /// DB idle timeout in seconds
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Tax applied to every order subtotal, in whole percent
    #[serde(default = "default_tax_rate_percent")]
    #[validate(range(max = 100))]
    pub tax_rate_percent: u32,

    /// Offset of the business day from UTC in minutes. Drives the order number
    /// date and the interpretation of gateway timestamps.
    #[serde(default = "default_business_utc_offset_minutes")]
    #[validate(custom = "validate_utc_offset_minutes")]
    pub business_utc_offset_minutes: i32,

    /// Default page size for list endpoints
    #[serde(default = "default_api_page_size")]
    pub api_default_page_size: u64,

    /// Maximum page size for list endpoints
    #[serde(default = "default_api_max_page_size")]
    pub api_max_page_size: u64,

    /// Midtrans server key, used for Snap calls and notification signatures
    #[serde(default)]
    pub midtrans_server_key: String,

    /// Midtrans client key, exposed to the storefront
    #[serde(default)]
    pub midtrans_client_key: String,

    /// "sandbox" or "production"
    #[serde(default = "default_midtrans_environment")]
    #[validate(custom = "validate_midtrans_environment")]
    pub midtrans_environment: String,

    /// Overrides the Snap base URL derived from `midtrans_environment`
    #[serde(default)]
    pub midtrans_base_url: Option<String>,
}

impl AppConfig {
    /// Creates a new configuration
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: usize,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            tax_rate_percent: default_tax_rate_percent(),
            business_utc_offset_minutes: default_business_utc_offset_minutes(),
            api_default_page_size: default_api_page_size(),
            api_max_page_size: default_api_max_page_size(),
            midtrans_server_key: String::new(),
            midtrans_client_key: String::new(),
            midtrans_environment: default_midtrans_environment(),
            midtrans_base_url: None,
        }
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .map(|origins| origins.split(',').any(|o| !o.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Tax rate as a fraction, e.g. `0.10`
    pub fn tax_rate(&self) -> Decimal {
        Decimal::new(i64::from(self.tax_rate_percent), 2)
    }

    /// Business-day offset from UTC. Falls back to UTC if the value is out of range.
    pub fn business_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.business_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Snap API base URL for the configured environment
    pub fn midtrans_base_url(&self) -> String {
        if let Some(url) = self.midtrans_base_url.as_deref() {
            return url.trim_end_matches('/').to_string();
        }
        if self.midtrans_environment.eq_ignore_ascii_case("production") {
            MIDTRANS_PRODUCTION_BASE_URL.to_string()
        } else {
            MIDTRANS_SANDBOX_BASE_URL.to_string()
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() {
            if self.midtrans_server_key.trim().is_empty() {
                let mut err = ValidationError::new("midtrans_server_key_required");
                err.message =
                    Some("Set APP__MIDTRANS_SERVER_KEY when running in production".into());
                errors.add("midtrans_server_key", err);
            }
            if self.midtrans_client_key.trim().is_empty() {
                let mut err = ValidationError::new("midtrans_client_key_required");
                err.message =
                    Some("Set APP__MIDTRANS_CLIENT_KEY when running in production".into());
                errors.add("midtrans_client_key", err);
            }
            if !self.has_cors_allowed_origins() {
                let mut err = ValidationError::new("cors_allowed_origins_required");
                err.message =
                    Some("Set APP__CORS_ALLOWED_ORIGINS when running in production".into());
                errors.add("cors_allowed_origins", err);
            }
        }

        if self.api_default_page_size == 0 || self.api_default_page_size > self.api_max_page_size
        {
            let mut err = ValidationError::new("api_default_page_size");
            err.message = Some("api_default_page_size must be between 1 and api_max_page_size".into());
            errors.add("api_default_page_size", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
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

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_tax_rate_percent() -> u32 {
    DEFAULT_TAX_RATE_PERCENT
}

fn default_business_utc_offset_minutes() -> i32 {
    DEFAULT_BUSINESS_UTC_OFFSET_MINUTES
}

fn default_api_page_size() -> u64 {
    20
}

fn default_api_max_page_size() -> u64 {
    100
}

fn default_midtrans_environment() -> String {
    "sandbox".to_string()
}

fn default_auth_issuer() -> String {
    "cafe-auth".to_string()
}

fn default_auth_audience() -> String {
    "cafe-api".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_environment(environment: &str) -> Result<(), ValidationError> {
    let valid = ["development", "staging", "production", "test"];
    if valid.contains(&environment.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("environment");
        err.message = Some("Must be one of: development, staging, production, test".into());
        Err(err)
    }
}

fn validate_midtrans_environment(environment: &str) -> Result<(), ValidationError> {
    match environment.to_lowercase().as_str() {
        "sandbox" | "production" => Ok(()),
        _ => {
            let mut err = ValidationError::new("midtrans_environment");
            err.message = Some("Must be either sandbox or production".into());
            Err(err)
        }
    }
}

fn validate_utc_offset_minutes(minutes: i32) -> Result<(), ValidationError> {
    if (-12 * 60..=14 * 60).contains(&minutes) {
        Ok(())
    } else {
        let mut err = ValidationError::new("business_utc_offset_minutes");
        err.message = Some("Must be between -720 and 840 minutes".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 32 {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be at least 32 characters".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("cafe_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration from `./config` and the environment.
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. `{dir}/default.toml`
/// 3. `{dir}/{RUN_ENV}.toml`
/// 4. Environment variables (`APP__*`)
pub fn load_config_from(dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://cafe.db?mode=rwc")?
        .set_default("jwt_expiration", 3600)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&dir.join("default").to_string_lossy()).required(false))
        .add_source(File::with_name(&dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET (minimum 32 characters).");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "a_sufficiently_long_and_random_jwt_secret_0123".into(),
            3600,
            "127.0.0.1".into(),
            8080,
            "development".into(),
        )
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.tax_rate(), dec!(0.10));
        assert_eq!(cfg.business_offset().local_minus_utc(), 7 * 3600);
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut cfg = base_config();
        cfg.jwt_secret = "too-short".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("jwt_secret"));
    }

    #[test]
    fn unknown_midtrans_environment_is_rejected() {
        let mut cfg = base_config();
        cfg.midtrans_environment = "staging".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("midtrans_environment"));
    }

    #[test]
    fn production_requires_gateway_keys_and_origins() {
        let mut cfg = base_config();
        cfg.environment = "production".into();
        let errors = cfg.validate_additional_constraints().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("midtrans_server_key"));
        assert!(fields.contains_key("midtrans_client_key"));
        assert!(fields.contains_key("cors_allowed_origins"));

        cfg.midtrans_server_key = "SB-Mid-server-abc".into();
        cfg.midtrans_client_key = "SB-Mid-client-abc".into();
        cfg.cors_allowed_origins = Some("https://order.example.com".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn midtrans_base_url_follows_environment() {
        let mut cfg = base_config();
        assert_eq!(cfg.midtrans_base_url(), MIDTRANS_SANDBOX_BASE_URL);
        cfg.midtrans_environment = "production".into();
        assert_eq!(cfg.midtrans_base_url(), MIDTRANS_PRODUCTION_BASE_URL);
        cfg.midtrans_base_url = Some("http://127.0.0.1:9000/".into());
        assert_eq!(cfg.midtrans_base_url(), "http://127.0.0.1:9000");
    }

    #[test]
    fn loads_from_config_directory() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            r#"
            database_url = "postgres://localhost/cafe"
            jwt_secret = "file_based_secret_that_is_long_enough_9876"
            port = 9090
            environment = "test"
            tax_rate_percent = 11
            "#
        )
        .unwrap();

        let cfg = load_config_from(dir.path()).unwrap();
        assert_eq!(cfg.database_url, "postgres://localhost/cafe");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.tax_rate(), dec!(0.11));
        assert_eq!(cfg.midtrans_environment, "sandbox");
    }
}
