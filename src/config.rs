//! Service configuration from environment variables
//!
//! Environment:
//! - `USAGE_FILE_PATH`: usage log path (default `<cwd>/usage/usage.jsonl`)
//! - `USAGE_FLUSH_INTERVAL_SECS`: periodic flush in seconds (default 30)
//! - `USAGE_FLUSH_THRESHOLD`: buffered events that force a flush (default 50)
//! - `USAGE_STATS_ENABLED`: `0|false|no|off` disables collection (default on)
//! - `USAGE_BIND_ADDR`: HTTP listen address (default `127.0.0.1:3040`)
//! - `USAGE_LOG_LEVEL`: log filter when `RUST_LOG` is unset (default `info`)
//! - `USAGE_LOG_JSON`: emit JSON logs (default off)

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::event_store::{UsageStoreConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_FLUSH_THRESHOLD};
use crate::logging::LogConfig;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3040";

/// Everything the composition root needs
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub store: UsageStoreConfig,
    pub stats_enabled: bool,
    pub bind_addr: String,
    pub log: LogConfig,
}

impl ServiceConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Self {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(|key| std::env::var(key).ok(), &current_dir)
    }

    /// Read configuration through `lookup`, resolving relative paths against `base_dir`
    pub fn from_lookup<F>(lookup: F, base_dir: &Path) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = match lookup("USAGE_FILE_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => {
                let path = PathBuf::from(path.trim());
                if path.is_absolute() {
                    path
                } else {
                    base_dir.join(path)
                }
            }
            None => base_dir.join("usage").join("usage.jsonl"),
        };

        let interval_secs = parse_positive(
            &lookup,
            "USAGE_FLUSH_INTERVAL_SECS",
            DEFAULT_FLUSH_INTERVAL.as_secs(),
        );
        let threshold = parse_positive(
            &lookup,
            "USAGE_FLUSH_THRESHOLD",
            DEFAULT_FLUSH_THRESHOLD as u64,
        ) as usize;

        let store = UsageStoreConfig::new(path)
            .with_flush_interval(Duration::from_secs(interval_secs))
            .with_flush_threshold(threshold);

        let stats_enabled = lookup("USAGE_STATS_ENABLED")
            .map(|v| parse_bool(&v))
            .unwrap_or(true);

        let bind_addr = lookup("USAGE_BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let log = log_config_from_lookup(&lookup);

        Self {
            store,
            stats_enabled,
            bind_addr,
            log,
        }
    }
}

/// Read only the logging settings from the process environment.
///
/// Lets the subscriber be installed before `ServiceConfig::from_env`, whose
/// warnings about invalid values would otherwise go nowhere.
pub fn log_config_from_env() -> LogConfig {
    log_config_from_lookup(|key| std::env::var(key).ok())
}

/// Read only the logging settings through `lookup`
pub fn log_config_from_lookup<F>(lookup: F) -> LogConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut log = LogConfig::default();
    if let Some(level) = lookup("USAGE_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
        log.level = level;
    }
    if let Some(json) = lookup("USAGE_LOG_JSON") {
        log.json_format = parse_bool(&json);
    }
    log
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return default;
    };

    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => value,
        _ => {
            warn!(key, value = %raw, default, "ignoring invalid setting");
            default
        }
    }
}

fn parse_bool(raw: &str) -> bool {
    !matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}
