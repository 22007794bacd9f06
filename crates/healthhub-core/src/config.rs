//! Core runtime configuration.
//!
//! Resolved once at startup and handed to [`crate::HealthHubCore`]; nothing
//! reads the environment while serving requests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

pub const ENV_DATABASE_PATH: &str = "HEALTHHUB_DATABASE_PATH";
pub const ENV_CACHE_TTL_SECS: &str = "HEALTHHUB_CACHE_TTL_SECS";
pub const ENV_CACHE_CAPACITY: &str = "HEALTHHUB_CACHE_CAPACITY";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_CACHE_CAPACITY: u64 = 1_000;
const MAX_CACHE_TTL_SECS: u64 = 3_600;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreConfig {
    database_path: Option<PathBuf>,
    cache_ttl: Duration,
    cache_capacity: u64,
}

impl CoreConfig {
    /// Create a new `CoreConfig`. `None` for the path means an in-memory database.
    pub fn new(
        database_path: Option<PathBuf>,
        cache_ttl: Duration,
        cache_capacity: u64,
    ) -> Result<Self, ConfigError> {
        let ttl_secs = cache_ttl.as_secs();
        if cache_ttl.is_zero() || ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: ENV_CACHE_TTL_SECS,
                message: format!("must be between 1 and {} seconds", MAX_CACHE_TTL_SECS),
            });
        }
        if cache_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_CACHE_CAPACITY,
                message: "must be positive".into(),
            });
        }
        if database_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                key: ENV_DATABASE_PATH,
                message: "cannot be empty".into(),
            });
        }

        Ok(Self {
            database_path,
            cache_ttl,
            cache_capacity,
        })
    }

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset or blank keys use defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = get(ENV_DATABASE_PATH).map(PathBuf::from);

        let cache_ttl = match get(ENV_CACHE_TTL_SECS) {
            Some(raw) => Duration::from_secs(parse_u64(ENV_CACHE_TTL_SECS, &raw)?),
            None => DEFAULT_CACHE_TTL,
        };

        let cache_capacity = match get(ENV_CACHE_CAPACITY) {
            Some(raw) => parse_u64(ENV_CACHE_CAPACITY, &raw)?,
            None => DEFAULT_CACHE_CAPACITY,
        };

        Self::new(database_path, cache_ttl, cache_capacity)
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn cache_capacity(&self) -> u64 {
        self.cache_capacity
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key,
            message: format!("'{}' is not a whole number ({})", raw.trim(), e),
        })
}
