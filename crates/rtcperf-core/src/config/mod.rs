//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `RTCPERF_CONFIG` env var
//! 3. **Environment variables**: `RTCPERF__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`StatsConfig`]: tick interval, external stats timeout, CSV and console output
//! - [`AlertsConfig`]: alert rules and report file
//! - [`GatewayConfig`]: Prometheus pushgateway sink
//! - [`PushConfig`]: remote push sink and the shared ingestion secret
//! - [`LoggingConfig`]: Log level and format
//! - [`IngestConfig`]: HTTP ingestion endpoint of the agent
//!
//! # Example
//!
//! ```toml
//! [stats]
//! interval_seconds = 5
//! stats_path = "/var/log/rtcperf"
//!
//! [alerts]
//! rules = '{"cpu": {"tags": ["page"], "p95": {"$lt": 80}}}'
//! report_filename = "/var/log/rtcperf/alerts.json"
//!
//! [gateway]
//! url = "http://pushgateway:9091"
//! job_name = "load-test"
//! ```

use crate::alerts::AlertRules;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use thiserror::Error;
use url::Url;

/// Configuration could not be loaded or is invalid. Prevents the aggregator from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid alert rules: {0}")]
    AlertRules(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Collection cadence and local outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Seconds between ticks. Must be greater than 0. Defaults to `15`.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Seconds after which an unrefreshed external push is dropped. Raised to
    /// `interval_seconds` when lower. Defaults to `60`.
    #[serde(default = "default_rtc_stats_timeout_seconds")]
    pub rtc_stats_timeout_seconds: u64,

    /// Directory of the per-run CSV file. Empty disables CSV output.
    #[serde(default)]
    pub stats_path: String,

    /// Prints stats tables to the console every tick. Defaults to `true`.
    #[serde(default = "default_true")]
    pub show_stats: bool,

    /// Keeps previous console output instead of clearing the screen.
    #[serde(default)]
    pub show_page_log: bool,

    /// Extra metric names appended to the known catalogue.
    #[serde(default)]
    pub custom_metrics: Vec<String>,

    /// First id handed out by the session registry.
    #[serde(default)]
    pub start_session_id: u64,
}

fn default_interval_seconds() -> u64 {
    15
}

fn default_rtc_stats_timeout_seconds() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Alert rule settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Rule document as JSON text. Empty means no rules.
    #[serde(default)]
    pub rules: String,

    /// Report file; `.json` writes JSON, `.log` a framed text report, anything else text.
    #[serde(default)]
    pub report_filename: String,

    /// Percentile of fail amounts reported per rule and per tag. Defaults to `95`.
    #[serde(default = "default_fail_percentile")]
    pub fail_percentile: f64,
}

fn default_fail_percentile() -> f64 {
    95.0
}

/// Prometheus pushgateway sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URL. Empty disables the sink.
    #[serde(default)]
    pub url: String,

    /// Job the run's series are grouped under. Defaults to `default`.
    #[serde(default = "default_job_name")]
    pub job_name: String,

    /// Basic auth as `user:password`.
    #[serde(default)]
    pub auth: Option<String>,

    /// Gzip-compress pushes. Defaults to `true`.
    #[serde(default = "default_true")]
    pub gzip: bool,
}

fn default_job_name() -> String {
    "default".to_string()
}

/// Remote push sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Base URL of the receiving aggregator. Empty disables the sink.
    #[serde(default)]
    pub url: String,

    /// Submitter id sent with every push. Defaults to `default`.
    #[serde(default = "default_push_id")]
    pub id: String,

    /// Basic auth password for user `admin`. Also checked by the agent's ingestion endpoint.
    #[serde(default = "default_secret")]
    pub secret: String,
}

fn default_push_id() -> String {
    "default".to_string()
}

fn default_secret() -> String {
    "secret".to_string()
}

/// Log output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is unset. Defaults to `info`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`. Defaults to `pretty`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// HTTP ingestion endpoint served by the agent binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub enabled: bool,

    /// IP address to bind to. Defaults to `127.0.0.1`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on. Defaults to `5000`.
    #[serde(default = "default_ingest_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_ingest_port() -> u16 {
    5000
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            rtc_stats_timeout_seconds: default_rtc_stats_timeout_seconds(),
            stats_path: String::new(),
            show_stats: true,
            show_page_log: false,
            custom_metrics: Vec::new(),
            start_session_id: 0,
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            rules: String::new(),
            report_filename: String::new(),
            fail_percentile: default_fail_percentile(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { url: String::new(), job_name: default_job_name(), auth: None, gzip: true }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self { url: String::new(), id: default_push_id(), secret: default_secret() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { enabled: false, bind_address: default_bind_address(), port: default_ingest_port() }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `RTCPERF__` prefix can override any configuration value.
    /// Use `__` as a separator for nested fields (e.g., `RTCPERF__STATS__INTERVAL_SECONDS=5`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("stats.interval_seconds", default_interval_seconds())?
            .set_default("stats.rtc_stats_timeout_seconds", default_rtc_stats_timeout_seconds())?
            .set_default("stats.show_stats", true)?
            .set_default("alerts.fail_percentile", default_fail_percentile())?
            .set_default("gateway.job_name", default_job_name())?
            .set_default("gateway.gzip", true)?
            .set_default("push.id", default_push_id())?
            .set_default("push.secret", default_secret())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("RTCPERF").prefix_separator("__").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Loads configuration from `config/config.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `RTCPERF_CONFIG` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("RTCPERF_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Tick interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.stats.interval_seconds)
    }

    /// Effective external stats timeout: never shorter than the interval.
    #[must_use]
    pub fn rtc_stats_timeout(&self) -> Duration {
        Duration::from_secs(self.stats.rtc_stats_timeout_seconds.max(self.stats.interval_seconds))
    }

    /// Parses `alerts.rules`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlertRules`] if the document is malformed.
    pub fn alert_rules(&self) -> Result<AlertRules, ConfigError> {
        Ok(AlertRules::from_json(&self.alerts.rules)?)
    }

    /// Socket address of the agent's ingestion endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the address cannot be parsed.
    pub fn ingest_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        format!("{}:{}", self.ingest.bind_address, self.ingest.port).parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid socket address: {}:{}",
                self.ingest.bind_address, self.ingest.port
            ))
        })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - The tick interval is greater than zero
    /// - The fail percentile lies in `0..=100`
    /// - Gateway and push URLs, when set, are `http` or `https`
    /// - Gateway auth, when set, is `user:password`
    /// - Logging format is either `"json"` or `"pretty"`
    /// - Alert rules parse
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] describing the first failed check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stats.interval_seconds == 0 {
            return Err(ConfigError::Invalid("Stats interval must be greater than 0".to_string()));
        }

        if !(0.0..=100.0).contains(&self.alerts.fail_percentile) {
            return Err(ConfigError::Invalid(format!(
                "Alert fail percentile must be within 0..=100, got {}",
                self.alerts.fail_percentile
            )));
        }

        for (name, url) in [("gateway", &self.gateway.url), ("push", &self.push.url)] {
            if url.is_empty() {
                continue;
            }
            match Url::parse(url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => return Err(ConfigError::Invalid(format!("Invalid {name} URL: {url}"))),
            }
        }

        if let Some(auth) = self.gateway.auth.as_deref().filter(|a| !a.is_empty()) {
            if !auth.contains(':') {
                return Err(ConfigError::Invalid(
                    "Gateway auth must be formatted as 'user:password'".to_string(),
                ));
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid("Logging format must be 'json' or 'pretty'".to_string()));
        }

        if self.ingest.enabled {
            self.ingest_addr()?;
        }

        self.alert_rules()?;
        Ok(())
    }
}
