//! Configuration loading and management

use std::time::Duration;

use anyhow::Result;

use crate::gesture::DEFAULT_GRACE_PERIOD;

const GRACE_MS_VAR: &str = "CHORD_DAEMON_GRACE_MS";
const EMIT_JSON_VAR: &str = "CHORD_DAEMON_EMIT_JSON";
const LOG_LEVEL_VAR: &str = "CHORD_DAEMON_LOG_LEVEL";

/// Longest accepted grace period
const MAX_GRACE_MS: u64 = 2_000;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Delay before a Meta release turns quick command off
    pub grace_period: Duration,

    /// Print every emitted command as a JSON line on stdout
    pub emit_json: bool,

    /// Log filter used when RUST_LOG is unset
    pub log_level: String,
}

/// Errors from invalid configuration values
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CHORD_DAEMON_GRACE_MS must be between 1 and 2000 milliseconds, got {0:?}")]
    InvalidGracePeriod(String),

    #[error("{name} must be a boolean (1/0/true/false), got {value:?}")]
    InvalidFlag { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            emit_json: false,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Ok(Self::from_lookup(|name| std::env::var(name).ok())?)
    }

    /// Build configuration from a variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(GRACE_MS_VAR) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|ms| (1..=MAX_GRACE_MS).contains(ms))
                .ok_or_else(|| ConfigError::InvalidGracePeriod(raw.clone()))?;
            config.grace_period = Duration::from_millis(ms);
        }

        if let Some(raw) = lookup(EMIT_JSON_VAR) {
            config.emit_json = parse_flag(EMIT_JSON_VAR, &raw)?;
        }

        if let Some(level) = lookup(LOG_LEVEL_VAR) {
            if !level.trim().is_empty() {
                config.log_level = level.trim().to_string();
            }
        }

        Ok(config)
    }
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: raw.to_string(),
        }),
    }
}
