//! Configuration management for Quotaward.
//!
//! Policy thresholds are compiled in; only the service around them is
//! configurable.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{QuotawardError, Result};

/// Prefix for environment overrides, e.g. `QUOTAWARD_SERVER__HTTP_ADDR`.
pub const ENV_PREFIX: &str = "QUOTAWARD";

/// Main configuration for the Quotaward service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Background reclaimer configuration
    #[serde(default)]
    pub reclaimer: ReclaimerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}

/// Reclaimer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReclaimerConfig {
    /// Seconds between sweeps
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ReclaimerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

impl ReclaimerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_interval_secs() -> u64 {
    300
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| QuotawardError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Layer an optional YAML file with `QUOTAWARD_*` environment variables.
    ///
    /// Nested keys use a double underscore: `QUOTAWARD_RECLAIMER__INTERVAL_SECS=60`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            );
        }

        let config: AppConfig = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| QuotawardError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.reclaimer.interval_secs == 0 {
            return Err(QuotawardError::Config(
                "reclaimer.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(QuotawardError::Config(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io::Write;

    // Tests that go through `load` read the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.http_addr, "127.0.0.1:8787".parse().unwrap());
        assert_eq!(config.reclaimer.interval(), Duration::from_secs(300));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
server:
  http_addr: "0.0.0.0:9000"
reclaimer:
  interval_secs: 60
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.http_addr.port(), 9000);
        assert_eq!(config.reclaimer.interval_secs, 60);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = AppConfig::from_yaml("{}").unwrap();
        assert_eq!(config.reclaimer.interval_secs, 300);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let yaml = "reclaimer:\n  interval_secs: 0\n";
        assert!(matches!(
            AppConfig::from_yaml(yaml),
            Err(QuotawardError::Config(_))
        ));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        assert!(matches!(
            AppConfig::from_yaml("server: [not, a, map"),
            Err(QuotawardError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let _env = ENV_LOCK.lock();
        let path = std::env::temp_dir()
            .join(format!("quotaward-test-{}.yaml", std::process::id()));
        {
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "logging:\n  level: debug\n  json: true").unwrap();
        }

        let from_file = AppConfig::from_file(&path).unwrap();
        assert_eq!(from_file.logging.level, "debug");
        assert!(from_file.logging.json);

        let layered = AppConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(layered.logging.level, "debug");
        assert_eq!(layered.reclaimer.interval_secs, 300);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_applies_env_overrides() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("QUOTAWARD_RECLAIMER__INTERVAL_SECS", "60");
        std::env::set_var("QUOTAWARD_SERVER__HTTP_ADDR", "0.0.0.0:9100");

        let config = AppConfig::load(None);

        std::env::remove_var("QUOTAWARD_RECLAIMER__INTERVAL_SECS");
        std::env::remove_var("QUOTAWARD_SERVER__HTTP_ADDR");

        let config = config.unwrap();
        assert_eq!(config.reclaimer.interval_secs, 60);
        assert_eq!(config.server.http_addr.port(), 9100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_rejects_zero_interval_from_env() {
        let _env = ENV_LOCK.lock();
        std::env::set_var("QUOTAWARD_RECLAIMER__INTERVAL_SECS", "0");

        let result = AppConfig::load(None);

        std::env::remove_var("QUOTAWARD_RECLAIMER__INTERVAL_SECS");
        assert!(matches!(result, Err(QuotawardError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = AppConfig::from_file("/nonexistent/quotaward.yaml");
        assert!(matches!(result, Err(QuotawardError::Io(_))));
    }
}
