//! Configuration of both binaries.
//!
//! Values come from an optional file named by `REACHWATCH_CONFIG` (any format
//! the `config` crate detects from the extension), overridden by environment
//! variables carrying the binary's prefix, e.g. `PINGER_PACKETS_COUNT=5`.
//! List values are comma separated in the environment.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;

use crate::probe::ProbeSettings;

pub const CONFIG_PATH_VAR: &str = "REACHWATCH_CONFIG";
pub const PINGER_ENV_PREFIX: &str = "PINGER";
pub const BACKEND_ENV_PREFIX: &str = "BACKEND";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Layers the optional `file` under prefixed environment variables.
///
/// `env` replaces the process environment when set.
fn load_layered<T: DeserializeOwned>(
    prefix: &str,
    list_keys: &[&str],
    file: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<T> {
    let mut environment = Environment::with_prefix(prefix)
        .try_parsing(true)
        .list_separator(",")
        .source(env.map(|vars| vars.into_iter().collect()));
    for key in list_keys {
        environment = environment.with_list_parse_key(key);
    }

    let mut builder = Config::builder();
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(false));
    }
    let config = builder.add_source(environment).build()?;

    Ok(config.try_deserialize()?)
}

fn config_file() -> Option<PathBuf> {
    std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from)
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_queue() -> String {
    "pings".to_owned()
}

/// Where the pinger sends its batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitMode {
    #[default]
    Broker,
    Http,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct PingerConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "PingerConfig::default_packets_count")]
    pub packets_count: u16,
    #[serde(default = "PingerConfig::default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    #[serde(default = "PingerConfig::default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Name of the container the pinger runs in.
    pub service_name: String,
    /// Networks probed in addition to the pinger's own.
    #[serde(default)]
    pub networks: Vec<String>,
    pub access_list_path: Option<PathBuf>,
    #[serde(default = "PingerConfig::default_probe_concurrency")]
    pub probe_concurrency: usize,
    #[serde(default)]
    pub emit_mode: EmitMode,
    pub amqp_url: Option<String>,
    #[serde(default = "default_queue")]
    pub queue: String,
    pub ingest_url: Option<String>,
    pub api_key: Option<String>,
}

impl PingerConfig {
    fn default_packets_count() -> u16 {
        3
    }

    fn default_ping_timeout_ms() -> u64 {
        2000
    }

    fn default_scan_interval_secs() -> u64 {
        10
    }

    fn default_probe_concurrency() -> usize {
        64
    }

    /// Loads and validates the configuration from the file named by
    /// `REACHWATCH_CONFIG` and `PINGER_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_sources(config_file().as_deref(), None)
    }

    pub(crate) fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let config: Self = load_layered(PINGER_ENV_PREFIX, &["networks"], file, env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(invalid("service_name", "must not be empty"));
        }
        if self.packets_count == 0 {
            return Err(invalid("packets_count", "must be at least 1"));
        }
        if self.ping_timeout_ms == 0 {
            return Err(invalid("ping_timeout_ms", "must be at least 1"));
        }
        if self.scan_interval_secs == 0 {
            return Err(invalid("scan_interval_secs", "must be at least 1"));
        }
        if self.probe_concurrency == 0 {
            return Err(invalid("probe_concurrency", "must be at least 1"));
        }
        match self.emit_mode {
            EmitMode::Broker if self.amqp_url.is_none() => {
                Err(invalid("amqp_url", "required when emit_mode is `broker`"))
            }
            EmitMode::Http if self.ingest_url.is_none() => {
                Err(invalid("ingest_url", "required when emit_mode is `http`"))
            }
            _ => Ok(()),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            packet_count: self.packets_count,
            timeout: Duration::from_millis(self.ping_timeout_ms),
        }
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "BackendConfig::default_listen_addr")]
    pub listen_addr: String,
    pub database_url: String,
    /// The broker consumer only runs when set.
    pub amqp_url: Option<String>,
    #[serde(default = "default_queue")]
    pub queue: String,
    #[serde(default)]
    pub api_keys: Vec<String>,
    #[serde(default = "BackendConfig::default_require_api_key")]
    pub require_api_key: bool,
    /// Requests per client and window. 0 disables rate limiting.
    #[serde(default = "BackendConfig::default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "BackendConfig::default_rate_window_secs")]
    pub rate_window_secs: u64,
    /// Upper bound for handling one request. 0 disables the limit.
    #[serde(default = "BackendConfig::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8080".to_owned()
    }

    fn default_require_api_key() -> bool {
        true
    }

    fn default_rate_limit() -> u32 {
        100
    }

    fn default_rate_window_secs() -> u64 {
        60
    }

    fn default_request_timeout_secs() -> u64 {
        10
    }

    /// Loads and validates the configuration from the file named by
    /// `REACHWATCH_CONFIG` and `BACKEND_*` variables.
    pub fn load() -> Result<Self> {
        Self::from_sources(config_file().as_deref(), None)
    }

    pub(crate) fn from_sources(
        file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let config: Self = load_layered(BACKEND_ENV_PREFIX, &["api_keys"], file, env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(invalid("database_url", "must not be empty"));
        }
        if self.require_api_key && self.api_keys.iter().all(|key| key.trim().is_empty()) {
            return Err(invalid(
                "api_keys",
                "at least one key is required unless require_api_key is false",
            ));
        }
        if self.rate_window_secs == 0 {
            return Err(invalid("rate_window_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}
