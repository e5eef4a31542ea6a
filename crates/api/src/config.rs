//! Process configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use portcullis_observability::LogFormat;

pub const BIND_VAR: &str = "PORTCULLIS_BIND";
pub const LOOKUP_TIMEOUT_VAR: &str = "PORTCULLIS_LOOKUP_TIMEOUT_MS";
pub const ROLE_REFRESH_VAR: &str = "PORTCULLIS_ROLE_REFRESH_SECS";
pub const SEED_VAR: &str = "PORTCULLIS_SEED";
pub const LOG_FORMAT_VAR: &str = "PORTCULLIS_LOG_FORMAT";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind: SocketAddr,
    /// Upper bound on actor and role-source lookups.
    pub lookup_timeout: Duration,
    pub role_refresh: Duration,
    pub seed_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            lookup_timeout: Duration::from_millis(250),
            role_refresh: Duration::from_secs(30),
            seed_path: None,
            log_format: LogFormat::Json,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = match lookup(BIND_VAR) {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| invalid(BIND_VAR, e))?,
            None => defaults.bind,
        };
        let lookup_timeout = match lookup(LOOKUP_TIMEOUT_VAR) {
            Some(raw) => Duration::from_millis(positive(LOOKUP_TIMEOUT_VAR, &raw)?),
            None => defaults.lookup_timeout,
        };
        let role_refresh = match lookup(ROLE_REFRESH_VAR) {
            Some(raw) => Duration::from_secs(positive(ROLE_REFRESH_VAR, &raw)?),
            None => defaults.role_refresh,
        };
        let seed_path = lookup(SEED_VAR).filter(|s| !s.is_empty()).map(PathBuf::from);
        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse::<LogFormat>().map_err(|e| invalid(LOG_FORMAT_VAR, e))?,
            None => defaults.log_format,
        };

        Ok(Self {
            bind,
            lookup_timeout,
            role_refresh,
            seed_path,
            log_format,
        })
    }
}

fn invalid(var: &'static str, err: impl core::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        var,
        message: err.to_string(),
    }
}

fn positive(var: &'static str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(invalid(var, "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(var, e)),
    }
}
