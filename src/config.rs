use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_SHOP_URL: &str = "http://localhost:8080/";
const DEFAULT_SHOP_NAME: &str = "Your Store";
const DEFAULT_PLATFORM_VERSION: &str = "4.0.2.3";
const DEFAULT_NOTIFICATION_TOLERANCE_SECS: u64 = 600;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const LIVE_API_BASE_URL: &str = "https://api.multisafepay.com/v1/json";
pub const TEST_API_BASE_URL: &str = "https://testapi.multisafepay.com/v1/json";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port (1024-65535)
    #[serde(default = "default_port")]
    #[validate(range(min = 1024, max = 65535))]
    pub port: u16,

    /// Application environment
    #[validate(length(min = 1))]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Public root URL of the storefront; used for callback and return URLs
    #[serde(default = "default_shop_url")]
    #[validate(url)]
    pub shop_url: String,

    /// Store name used in the default order description
    #[serde(default = "default_shop_name")]
    pub shop_name: String,

    /// Storefront platform version reported to the vendor
    #[serde(default = "default_platform_version")]
    pub platform_version: String,

    /// Maximum age of a signed notification timestamp
    #[serde(default = "default_notification_tolerance_secs")]
    #[validate(range(min = 1, max = 86400))]
    pub notification_tolerance_secs: u64,

    /// Timeout applied to outbound vendor API calls
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 1, max = 300))]
    pub request_timeout_secs: u64,

    #[serde(default = "default_live_api_base_url")]
    #[validate(url)]
    pub live_api_base_url: String,

    #[serde(default = "default_test_api_base_url")]
    #[validate(url)]
    pub test_api_base_url: String,

    /// Optional JSON file used to seed the in-memory repositories
    #[serde(default)]
    pub seed_path: Option<String>,

    /// Colorize the operator log on the terminal
    #[serde(default)]
    pub operator_log_color: bool,
}

impl AppConfig {
    pub fn new(host: String, port: u16, environment: String) -> Self {
        Self {
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            shop_url: default_shop_url(),
            shop_name: default_shop_name(),
            platform_version: default_platform_version(),
            notification_tolerance_secs: default_notification_tolerance_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            live_api_base_url: default_live_api_base_url(),
            test_api_base_url: default_test_api_base_url(),
            seed_path: None,
            operator_log_color: false,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn notification_tolerance(&self) -> Duration {
        Duration::from_secs(self.notification_tolerance_secs)
    }

    /// Shop URL with exactly one trailing slash.
    pub fn shop_root_url(&self) -> String {
        format!("{}/", self.shop_url.trim_end_matches('/'))
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && !self.shop_url.starts_with("https://") {
            let mut err = ValidationError::new("shop_url_https_required");
            err.message = Some(
                "Set APP__SHOP_URL to the public https URL of the store; the vendor cannot deliver notifications to a plain http endpoint in production".into(),
            );
            errors.add("shop_url", err);
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

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_shop_url() -> String {
    DEFAULT_SHOP_URL.to_string()
}

fn default_shop_name() -> String {
    DEFAULT_SHOP_NAME.to_string()
}

fn default_platform_version() -> String {
    DEFAULT_PLATFORM_VERSION.to_string()
}

fn default_notification_tolerance_secs() -> u64 {
    DEFAULT_NOTIFICATION_TOLERANCE_SECS
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_live_api_base_url() -> String {
    LIVE_API_BASE_URL.to_string()
}

fn default_test_api_base_url() -> String {
    TEST_API_BASE_URL.to_string()
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

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("multisafepay_connector={},tower_http=debug", level);
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

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    load_config_from(CONFIG_DIR, &run_env)
}

pub(crate) fn load_config_from(dir: &str, run_env: &str) -> Result<AppConfig, AppConfigError> {
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(dir).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            dir
        );
    }

    let config = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", dir)).required(false))
        .add_source(File::with_name(&format!("{}/{}", dir, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration security validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod config_validation_tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new("127.0.0.1".into(), 8080, "production".into())
    }

    #[test]
    fn production_requires_https_shop_url() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn production_with_https_shop_url_passes() {
        let mut cfg = base_config();
        cfg.shop_url = "https://shop.example.com".into();
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.shop_root_url(), "https://shop.example.com/");
    }

    #[test]
    fn development_allows_plain_http() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        assert!(cfg.validate_additional_constraints().is_ok());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "verbose".into();
        let errors = cfg.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("log_level"));
    }

    #[test]
    fn tolerance_window_defaults_to_ten_minutes() {
        let cfg = base_config();
        assert_eq!(cfg.notification_tolerance(), Duration::from_secs(600));
    }
}

#[cfg(test)]
mod load_tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, filename: &str, content: &str) {
        let mut file = std::fs::File::create(dir.path().join(filename)).unwrap();
        writeln!(file, "{}", content).unwrap();
    }

    #[test]
    fn layers_environment_file_over_default() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
            shop_name = "Default Shop"
            request_timeout_secs = 10
            "#,
        );
        write_config(
            &dir,
            "staging.toml",
            r#"
            shop_name = "Staging Shop"
            "#,
        );

        let config = load_config_from(dir.path().to_str().unwrap(), "staging").unwrap();
        assert_eq!(config.shop_name, "Staging Shop");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.environment, "staging");
        assert_eq!(config.live_api_base_url, LIVE_API_BASE_URL);
    }

    #[test]
    fn invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            "default.toml",
            r#"
            log_level = "loud"
            notification_tolerance_secs = 0
            "#,
        );

        let result = load_config_from(dir.path().to_str().unwrap(), "ci");
        match result {
            Err(AppConfigError::Validation(errors)) => {
                assert!(errors.field_errors().contains_key("log_level"));
                assert!(errors
                    .field_errors()
                    .contains_key("notification_tolerance_secs"));
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }
}
