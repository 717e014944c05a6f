//! Storage factory — the single point of backend selection.
//!
//! No other component branches on backend kind or execution mode; everything
//! downstream holds an `Arc<dyn Storage>`.

use std::sync::Arc;

use tracing::info;

use crate::error::ConfigError;
use crate::store::libsql_backend::LibsqlStorage;
use crate::store::postgres_backend::PgStorage;
use crate::store::postgres_blocking_backend::PgBlockingStorage;
use crate::store::rusqlite_backend::RusqliteStorage;
use crate::store::traits::Storage;

/// Bounded pool sizing for the networked backends.
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    /// Base pool size.
    pub size: u32,
    /// Extra slots allowed beyond the base size.
    pub max_overflow: u32,
}

impl PoolConfig {
    pub fn new(size: u32, max_overflow: u32) -> Self {
        Self { size, max_overflow }
    }

    /// The hard connection ceiling: base size plus overflow.
    pub fn max_connections(&self) -> u32 {
        self.size + self.max_overflow
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: 5,
            max_overflow: 10,
        }
    }
}

/// Execution discipline for a backend's I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecMode {
    Blocking,
    NonBlocking,
}

/// Resolve a backend kind and execution mode into a concrete storage adapter.
///
/// Construction performs no I/O; connections are established lazily (or
/// eagerly via `Storage::connect`). Unrecognized `backend` or `mode` strings
/// fail with a `ConfigError`, which is fatal at startup.
pub fn create_storage(
    backend: &str,
    target: &str,
    mode: &str,
    pool: PoolConfig,
) -> Result<Arc<dyn Storage>, ConfigError> {
    let mode = match mode {
        "blocking" => ExecMode::Blocking,
        "non-blocking" | "nonblocking" => ExecMode::NonBlocking,
        other => return Err(ConfigError::UnknownMode(other.to_string())),
    };

    let storage: Arc<dyn Storage> = match backend {
        "embedded" => match mode {
            ExecMode::NonBlocking => Arc::new(LibsqlStorage::new(target)),
            ExecMode::Blocking => Arc::new(RusqliteStorage::new(target)),
        },
        "networked" => match mode {
            ExecMode::NonBlocking => Arc::new(PgStorage::new(target, pool)),
            ExecMode::Blocking => Arc::new(PgBlockingStorage::new(target, pool)),
        },
        other => return Err(ConfigError::UnknownBackend(other.to_string())),
    };

    info!(backend, mode = ?mode, "Storage backend selected");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::traits::Dialect;

    #[test]
    fn all_four_combinations_construct_without_io() {
        let cases = [
            ("embedded", ":memory:", "non-blocking", Dialect::Sqlite),
            ("embedded", ":memory:", "blocking", Dialect::Sqlite),
            (
                "networked",
                "postgres://u:p@127.0.0.1:1/db",
                "non-blocking",
                Dialect::Postgres,
            ),
            (
                "networked",
                "postgres://u:p@127.0.0.1:1/db",
                "blocking",
                Dialect::Postgres,
            ),
        ];
        for (backend, target, mode, dialect) in cases {
            let storage = create_storage(backend, target, mode, PoolConfig::default()).unwrap();
            assert_eq!(storage.dialect(), dialect, "{backend}/{mode}");
        }
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = create_storage("mainframe", "x", "blocking", PoolConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownBackend(name) if name == "mainframe"));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = create_storage("embedded", ":memory:", "psychic", PoolConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMode(name) if name == "psychic"));
    }

    #[test]
    fn pool_ceiling_is_size_plus_overflow() {
        assert_eq!(PoolConfig::new(5, 10).max_connections(), 15);
        assert_eq!(PoolConfig::default().max_connections(), 15);
    }
}
