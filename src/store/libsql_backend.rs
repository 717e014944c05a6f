//! libSQL backend — embedded engine, non-blocking driver.
//!
//! A single lazily-opened connection is reused for all operations.
//! `libsql::Connection` is `Send + Sync` and safe for concurrent async use.

use std::path::Path;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::StorageError;
use crate::store::traits::{Dialect, Storage};
use crate::store::value::{Row, Statement, Value};

struct Handle {
    // Keeps the database object alive for the lifetime of its connection.
    _db: LibSqlDatabase,
    conn: Connection,
}

/// Embedded libSQL storage over a local file or `:memory:`.
pub struct LibsqlStorage {
    target: String,
    handle: Mutex<Option<Handle>>,
}

impl std::fmt::Debug for LibsqlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibsqlStorage")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl LibsqlStorage {
    /// Create the adapter without touching the filesystem; the database is
    /// opened on first use.
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
            handle: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<Connection, StorageError> {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.as_ref() {
            return Ok(handle.conn.clone());
        }

        if self.target != ":memory:" {
            if let Some(parent) = Path::new(&self.target).parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Connection(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(self.target.as_str())
            .build()
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StorageError::Connection(format!("Failed to create connection: {e}")))?;

        info!(target = %self.target, "libSQL database opened");
        *guard = Some(Handle {
            _db: db,
            conn: conn.clone(),
        });
        Ok(conn)
    }
}

fn to_libsql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Integer(i) => libsql::Value::Integer(*i),
        Value::Real(r) => libsql::Value::Real(*r),
        Value::Text(s) => libsql::Value::Text(s.clone()),
    }
}

fn from_libsql(value: libsql::Value) -> Result<Value, StorageError> {
    match value {
        libsql::Value::Null => Ok(Value::Null),
        libsql::Value::Integer(i) => Ok(Value::Integer(i)),
        libsql::Value::Real(r) => Ok(Value::Real(r)),
        libsql::Value::Text(s) => Ok(Value::Text(s)),
        libsql::Value::Blob(_) => Err(StorageError::Serialization(
            "unexpected blob column".to_string(),
        )),
    }
}

fn map_err(e: libsql::Error) -> StorageError {
    let message = e.to_string();
    if message.contains("UNIQUE constraint failed") {
        StorageError::Constraint(message)
    } else {
        StorageError::Query(message)
    }
}

async fn collect_rows(mut rows: libsql::Rows) -> Result<Vec<Row>, StorageError> {
    let count = rows.column_count();
    let names: Vec<String> = (0..count)
        .map(|i| rows.column_name(i).unwrap_or_default().to_string())
        .collect();

    let mut out = Vec::new();
    while let Some(row) = rows.next().await.map_err(map_err)? {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let value = row.get_value(i as i32).map_err(map_err)?;
            columns.push((name.clone(), from_libsql(value)?));
        }
        out.push(Row::new(columns));
    }
    Ok(out)
}

#[async_trait]
impl Storage for LibsqlStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn connect(&self) -> Result<(), StorageError> {
        self.connection().await.map(|_| ())
    }

    async fn fetch_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>, StorageError> {
        let conn = self.connection().await?;
        let rows = conn
            .query(sql, libsql::params_from_iter(params.iter().map(to_libsql)))
            .await
            .map_err(map_err)?;
        Ok(collect_rows(rows).await?.into_iter().next())
    }

    async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, StorageError> {
        let conn = self.connection().await?;
        let rows = conn
            .query(sql, libsql::params_from_iter(params.iter().map(to_libsql)))
            .await
            .map_err(map_err)?;
        collect_rows(rows).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64, StorageError> {
        let conn = self.connection().await?;
        conn.execute(sql, libsql::params_from_iter(params.iter().map(to_libsql)))
            .await
            .map_err(map_err)
    }

    async fn transaction(&self, statements: Vec<Statement>) -> Result<(), StorageError> {
        let conn = self.connection().await?;
        let tx = conn.transaction().await.map_err(map_err)?;
        for stmt in &statements {
            if let Err(e) = tx
                .execute(
                    &stmt.sql,
                    libsql::params_from_iter(stmt.params.iter().map(to_libsql)),
                )
                .await
            {
                tx.rollback().await.ok();
                return Err(map_err(e));
            }
        }
        tx.commit().await.map_err(map_err)
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.handle.lock().await.take();
        Ok(())
    }
}
