//! Service configuration, read from the environment.
//!
//! A `.env` file in the working directory is loaded once, before the first
//! read; variables already set in the process take precedence.

use std::env;
use std::time::Duration;

use once_cell::sync::Lazy;
use thiserror::Error;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenvy::dotenv();
});

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    /// `BIND_ADDR`
    pub bind_addr: String,
    /// `DATABASE_URL`; only used with persistent stores.
    pub database_url: Option<String>,
    /// `USE_PERSISTENT_STORES`
    pub use_persistent_stores: bool,
    /// `STALL_TIMEOUT_SECS`; the stall sweep is off when unset.
    pub stall_timeout: Option<Duration>,
    /// `STALL_SWEEP_INTERVAL_SECS`
    pub stall_sweep_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: None,
            use_persistent_stores: false,
            stall_timeout: None,
            stall_sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Lazy::force(&DOTENV_LOADED);
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source (tests, embedding).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let use_persistent_stores = match var("USE_PERSISTENT_STORES") {
            Some(v) => parse_bool("USE_PERSISTENT_STORES", &v)?,
            None => defaults.use_persistent_stores,
        };
        let stall_timeout = var("STALL_TIMEOUT_SECS")
            .map(|v| parse_secs("STALL_TIMEOUT_SECS", &v))
            .transpose()?;
        let stall_sweep_interval = var("STALL_SWEEP_INTERVAL_SECS")
            .map(|v| parse_secs("STALL_SWEEP_INTERVAL_SECS", &v))
            .transpose()?
            .unwrap_or(defaults.stall_sweep_interval);

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: var("DATABASE_URL"),
            use_persistent_stores,
            stall_timeout,
            stall_sweep_interval,
        })
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_secs(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}
