//! rusqlite backend — embedded engine, blocking driver.
//!
//! The synchronous `rusqlite::Connection` is `!Sync`, so it lives behind an
//! `Arc<Mutex<_>>` and every operation hops onto `spawn_blocking`. The
//! adapter owns the mutual exclusion; callers never see the connection.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;
use tracing::info;

use crate::error::StorageError;
use crate::store::traits::{Dialect, Storage};
use crate::store::value::{Row, Statement, Value};

type SharedConn = Arc<Mutex<Connection>>;

/// Embedded SQLite storage over the blocking rusqlite driver.
pub struct RusqliteStorage {
    target: String,
    handle: tokio::sync::Mutex<Option<SharedConn>>,
}

impl std::fmt::Debug for RusqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusqliteStorage")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl RusqliteStorage {
    /// Create the adapter without touching the filesystem; the database is
    /// opened on first use.
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<SharedConn, StorageError> {
        let mut guard = self.handle.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(Arc::clone(conn));
        }

        if self.target != ":memory:" {
            if let Some(parent) = Path::new(&self.target).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Connection(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let target = self.target.clone();
        let conn = tokio::task::spawn_blocking(move || Connection::open(target))
            .await
            .map_err(join_err)?
            .map_err(|e| StorageError::Connection(format!("Failed to open SQLite database: {e}")))?;

        info!(target = %self.target, "SQLite database opened (blocking driver)");
        let shared = Arc::new(Mutex::new(conn));
        *guard = Some(Arc::clone(&shared));
        Ok(shared)
    }
}

fn join_err(e: tokio::task::JoinError) -> StorageError {
    StorageError::Query(format!("blocking task failed: {e}"))
}

fn map_err(e: rusqlite::Error) -> StorageError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        StorageError::Constraint(message)
    } else {
        StorageError::Query(message)
    }
}

fn to_rusqlite(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(i) => rusqlite::types::Value::Integer(*i),
        Value::Real(r) => rusqlite::types::Value::Real(*r),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
    }
}

fn from_value_ref(value: rusqlite::types::ValueRef<'_>) -> Result<Value, StorageError> {
    match value {
        rusqlite::types::ValueRef::Null => Ok(Value::Null),
        rusqlite::types::ValueRef::Integer(i) => Ok(Value::Integer(i)),
        rusqlite::types::ValueRef::Real(r) => Ok(Value::Real(r)),
        rusqlite::types::ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| Value::Text(s.to_string()))
            .map_err(|e| StorageError::Serialization(format!("invalid utf-8 in text column: {e}"))),
        rusqlite::types::ValueRef::Blob(_) => Err(StorageError::Serialization(
            "unexpected blob column".to_string(),
        )),
    }
}

fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
    let mut stmt = conn.prepare(sql).map_err(map_err)?;
    let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
    let mut rows = stmt
        .query(rusqlite::params_from_iter(params.iter().map(to_rusqlite)))
        .map_err(map_err)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_err)? {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let value = row.get_ref(i).map_err(map_err)?;
            columns.push((name.clone(), from_value_ref(value)?));
        }
        out.push(Row::new(columns));
    }
    Ok(out)
}

#[async_trait]
impl Storage for RusqliteStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<(), StorageError> {
        self.connection().await.map(|_| ())
    }

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, StorageError> {
        Ok(self.fetch_all(sql, params).await?.into_iter().next())
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        let shared = self.connection().await?;
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = shared.lock().expect("SQLite connection mutex poisoned");
            query_rows(&conn, &sql, &params)
        })
        .await
        .map_err(join_err)?
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError> {
        let shared = self.connection().await?;
        let sql = sql.to_string();
        let params = params.to_vec();
        tokio::task::spawn_blocking(move || {
            let conn = shared.lock().expect("SQLite connection mutex poisoned");
            conn.execute(&sql, rusqlite::params_from_iter(params.iter().map(to_rusqlite)))
                .map(|n| n as u64)
                .map_err(map_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), StorageError> {
        let shared = self.connection().await?;
        tokio::task::spawn_blocking(move || {
            let mut conn = shared.lock().expect("SQLite connection mutex poisoned");
            // Rolls back on drop unless committed.
            let tx = conn.transaction().map_err(map_err)?;
            for stmt in &statements {
                tx.execute(
                    &stmt.sql,
                    rusqlite::params_from_iter(stmt.params.iter().map(to_rusqlite)),
                )
                .map_err(map_err)?;
            }
            tx.commit().map_err(map_err)
        })
        .await
        .map_err(join_err)?
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.handle.lock().await.take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");
        let storage = RusqliteStorage::new(path.to_str().unwrap());

        storage
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();
        storage
            .execute("INSERT INTO t (name) VALUES (?)", &[Value::from("beta")])
            .await
            .unwrap();

        let rows = storage.fetch_all("SELECT id, name FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text("name").unwrap(), "beta");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn transaction_is_atomic() {
        let storage = RusqliteStorage::new(":memory:");
        storage
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT UNIQUE)", &[])
            .await
            .unwrap();
        storage
            .execute("INSERT INTO t (name) VALUES (?)", &[Value::from("taken")])
            .await
            .unwrap();

        let result = storage
            .transaction(vec![
                Statement::new("INSERT INTO t (name) VALUES (?)", vec![Value::from("fresh")]),
                Statement::new("INSERT INTO t (name) VALUES (?)", vec![Value::from("taken")]),
            ])
            .await;
        assert!(matches!(result, Err(StorageError::Constraint(_))));

        let rows = storage.fetch_all("SELECT name FROM t", &[]).await.unwrap();
        assert_eq!(rows.len(), 1, "partial transaction must not persist");
    }
}
