//! Unified `Storage` trait — single async interface for all persistence.
//!
//! One object-safe trait covers both storage engines (embedded SQLite
//! family, networked PostgreSQL) in both execution disciplines. Blocking
//! drivers are bridged onto the runtime with `spawn_blocking` inside their
//! adapters; callers see the same async surface either way.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::store::value::{Row, Statement, Value};

/// SQL dialect spoken by a backend, used to pick the migration set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// Backend-agnostic storage trait.
///
/// Connections are established lazily on first use and memoized; `connect`
/// exists so startup can fail fast on an unreachable target. `fetch_one`
/// reports an absent row as `Ok(None)`, never as an error. `transaction`
/// applies a batch of statements atomically: all of them commit, or none do.
#[async_trait]
pub trait Storage: Send + Sync + std::fmt::Debug {
    /// The SQL dialect this backend speaks.
    fn dialect(&self) -> Dialect;

    /// Establish (and memoize) the connection or pool. Idempotent.
    async fn connect(&self) -> Result<(), StorageError>;

    /// Fetch at most one row.
    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, StorageError>;

    /// Fetch all matching rows, in query order.
    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError>;

    /// Run one mutating statement in the driver's implicit transaction.
    /// Returns the number of affected rows.
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError>;

    /// Apply all statements inside one transaction. Rolls back on the first
    /// failure; a dropped in-flight transaction (cancellation included)
    /// also rolls back and releases its connection.
    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), StorageError>;

    /// Release the held connection or pool. Idempotent.
    async fn close(&self) -> Result<(), StorageError>;
}
