use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;

use crate::redaction::RedactionKeys;

/// Prefix for environment overrides, e.g. `COLLECTOR_PORT=9000`
pub const ENV_PREFIX: &str = "COLLECTOR";

/// Config file read when no `--config` is given; optional
pub const DEFAULT_CONFIG_FILE: &str = "collector.toml";

/// Collector configuration, resolved once at startup and immutable afterwards
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// SQLite database path (default: "./data/events.db")
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Rows older than this many hours are deleted by retention
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    /// Upper bound on stored rows after a retention sweep
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Events written per transaction
    #[serde(default = "default_flush_batch_size")]
    pub flush_batch_size: usize,

    /// Queue length that triggers an immediate flush
    #[serde(default = "default_flush_queue_threshold")]
    pub flush_queue_threshold: usize,

    /// Queue capacity; beyond it the oldest events are dropped
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    #[serde(default = "default_retention_interval_ms")]
    pub retention_interval_ms: u64,

    /// Upper bound on the final drain when closing
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Payload keys replaced before storage (comma-separated or a list)
    #[serde(
        default = "default_redact_keys",
        deserialize_with = "deserialize_redact_keys"
    )]
    pub redact_keys: RedactionKeys,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            retention_hours: default_retention_hours(),
            max_rows: default_max_rows(),
            flush_interval_ms: default_flush_interval_ms(),
            flush_batch_size: default_flush_batch_size(),
            flush_queue_threshold: default_flush_queue_threshold(),
            max_queue_size: default_max_queue_size(),
            retention_interval_ms: default_retention_interval_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            redact_keys: default_redact_keys(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8787
}

fn default_db_path() -> String {
    "./data/events.db".to_string()
}

fn default_retention_hours() -> u64 {
    24
}

fn default_max_rows() -> u64 {
    200_000
}

fn default_flush_interval_ms() -> u64 {
    250
}

fn default_flush_batch_size() -> usize {
    200
}

fn default_flush_queue_threshold() -> usize {
    200
}

fn default_max_queue_size() -> usize {
    50_000
}

fn default_retention_interval_ms() -> u64 {
    60_000
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

fn default_redact_keys() -> RedactionKeys {
    RedactionKeys::parse("email,token,authorization,password")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn deserialize_redact_keys<'de, D>(deserializer: D) -> Result<RedactionKeys, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum KeyList {
        Csv(String),
        List(Vec<String>),
    }

    Ok(match KeyList::deserialize(deserializer)? {
        KeyList::Csv(list) => RedactionKeys::parse(&list),
        KeyList::List(keys) => RedactionKeys::new(keys),
    })
}

/// Explicit values that win over the environment and the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub db_path: Option<String>,
    pub retention_hours: Option<u64>,
    pub max_rows: Option<u64>,
    pub flush_interval_ms: Option<u64>,
    pub flush_batch_size: Option<usize>,
    pub flush_queue_threshold: Option<usize>,
    pub max_queue_size: Option<usize>,
    pub retention_interval_ms: Option<u64>,
    pub shutdown_timeout_ms: Option<u64>,
    pub redact_keys: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
}

fn as_int<T: TryInto<i64>>(value: Option<T>) -> Option<i64> {
    value.map(|v| v.try_into().unwrap_or(i64::MAX))
}

/// Resolve configuration: overrides > `COLLECTOR_*` environment > config
/// file > built-in defaults.
///
/// An explicitly named config file must exist; the default one is optional.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> anyhow::Result<Config> {
    resolve(path, overrides, None)
}

fn resolve(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    env: Option<HashMap<String, String>>,
) -> anyhow::Result<Config> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(config::Environment::with_prefix(ENV_PREFIX).source(env))
        .set_override_option("host", overrides.host.clone())?
        .set_override_option("port", as_int(overrides.port))?
        .set_override_option("db_path", overrides.db_path.clone())?
        .set_override_option("retention_hours", as_int(overrides.retention_hours))?
        .set_override_option("max_rows", as_int(overrides.max_rows))?
        .set_override_option("flush_interval_ms", as_int(overrides.flush_interval_ms))?
        .set_override_option("flush_batch_size", as_int(overrides.flush_batch_size))?
        .set_override_option(
            "flush_queue_threshold",
            as_int(overrides.flush_queue_threshold),
        )?
        .set_override_option("max_queue_size", as_int(overrides.max_queue_size))?
        .set_override_option(
            "retention_interval_ms",
            as_int(overrides.retention_interval_ms),
        )?
        .set_override_option("shutdown_timeout_ms", as_int(overrides.shutdown_timeout_ms))?
        .set_override_option("redact_keys", overrides.redact_keys.clone())?
        .set_override_option("log_level", overrides.log_level.clone())?
        .set_override_option("log_format", overrides.log_format.clone())?;

    let cfg: Config = builder.build()?.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.host.trim().is_empty() {
        anyhow::bail!("host cannot be empty");
    }
    if cfg.db_path.trim().is_empty() {
        anyhow::bail!("db_path cannot be empty");
    }
    if cfg.max_queue_size < 1 {
        anyhow::bail!("max_queue_size must be >= 1");
    }
    if cfg.flush_batch_size < 1 {
        anyhow::bail!("flush_batch_size must be >= 1");
    }
    if cfg.flush_queue_threshold < 1 {
        anyhow::bail!("flush_queue_threshold must be >= 1");
    }
    if cfg.max_rows < 1 {
        anyhow::bail!("max_rows must be >= 1");
    }
    if cfg.retention_hours < 1 {
        anyhow::bail!("retention_hours must be >= 1");
    }
    if cfg.flush_interval_ms == 0 {
        anyhow::bail!("flush_interval_ms must be > 0");
    }
    if cfg.retention_interval_ms == 0 {
        anyhow::bail!("retention_interval_ms must be > 0");
    }
    if cfg.flush_queue_threshold > cfg.max_queue_size {
        tracing::warn!(
            flush_queue_threshold = cfg.flush_queue_threshold,
            max_queue_size = cfg.max_queue_size,
            "flush_queue_threshold exceeds max_queue_size, threshold flushes will never trigger"
        );
    }
    Ok(())
}
