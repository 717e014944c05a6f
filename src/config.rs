//! Configuration types — read once from the environment at startup.

use std::str::FromStr;

use crate::error::ConfigError;

/// Service configuration.
///
/// The storage backend and execution mode are carried as the raw strings the
/// operator supplied; validating them is the storage factory's job, the one
/// place that branches on backend kind.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend kind: "embedded" or "networked".
    pub db_backend: String,
    /// Database file path (embedded) or connection DSN (networked).
    pub db_url: String,
    /// Execution mode: "blocking" or "non-blocking".
    pub db_mode: String,
    /// Base connection-pool size (networked backend only).
    pub pool_size: u32,
    /// Extra pool slots allowed beyond the base size.
    pub pool_max_overflow: u32,
    /// Conversation idle timeout in minutes.
    pub idle_timeout_min: u64,
    /// Conversations idle for longer than this many hours are swept.
    pub cleanup_retention_hours: u64,
    /// HTTP port for the webhook server.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_backend: "embedded".to_string(),
            db_url: "./data/dancelink.db".to_string(),
            db_mode: "non-blocking".to_string(),
            pool_size: 5,
            pool_max_overflow: 10,
            idle_timeout_min: 30,
            cleanup_retention_hours: 24,
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from `DANCELINK_*` environment variables,
    /// falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            db_backend: env_string("DANCELINK_DB_BACKEND", &defaults.db_backend),
            db_url: env_string("DANCELINK_DB_URL", &defaults.db_url),
            db_mode: env_string("DANCELINK_DB_MODE", &defaults.db_mode),
            pool_size: env_parse("DANCELINK_POOL_SIZE", defaults.pool_size)?,
            pool_max_overflow: env_parse("DANCELINK_POOL_MAX_OVERFLOW", defaults.pool_max_overflow)?,
            idle_timeout_min: env_parse("DANCELINK_IDLE_TIMEOUT_MIN", defaults.idle_timeout_min)?,
            cleanup_retention_hours: env_parse(
                "DANCELINK_CLEANUP_RETENTION_HOURS",
                defaults.cleanup_retention_hours,
            )?,
            port: env_parse("DANCELINK_PORT", defaults.port)?,
        })
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
