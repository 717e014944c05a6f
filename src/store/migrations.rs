//! Version-tracked database migrations, applied through the `Storage` trait
//! so one runner serves every backend.
//!
//! Each migration has a version number and a list of statements; `run()`
//! checks the current version and applies only the new ones sequentially.
//! A migration's statements and its ledger row commit in one transaction.

use tracing::info;

use crate::error::StorageError;
use crate::store::traits::{Dialect, Storage};
use crate::store::value::{Statement, Value};

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    statements: &'static [&'static str],
}

/// SQLite-dialect migrations, in order. Add new versions to the end.
static SQLITE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    statements: &[
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            role TEXT NOT NULL DEFAULT 'unknown',
            phone_number TEXT NOT NULL UNIQUE
        )",
        "CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone_number TEXT NOT NULL UNIQUE,
            user_type TEXT NOT NULL DEFAULT 'unknown',
            current_state TEXT NOT NULL DEFAULT 'start',
            state_data TEXT NOT NULL DEFAULT '{}',
            state_history TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_interaction TEXT NOT NULL,
            user_id INTEGER REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_conversations_last_interaction
            ON conversations(last_interaction)",
        "CREATE INDEX IF NOT EXISTS idx_conversations_user_type
            ON conversations(user_type)",
    ],
}];

/// PostgreSQL-dialect migrations. Same shape, dialect-specific DDL.
static POSTGRES_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "initial_schema",
    statements: &[
        "CREATE TABLE IF NOT EXISTS users (
            id BIGSERIAL PRIMARY KEY,
            role TEXT NOT NULL DEFAULT 'unknown',
            phone_number TEXT NOT NULL UNIQUE
        )",
        "CREATE TABLE IF NOT EXISTS conversations (
            id BIGSERIAL PRIMARY KEY,
            phone_number TEXT NOT NULL UNIQUE,
            user_type TEXT NOT NULL DEFAULT 'unknown',
            current_state TEXT NOT NULL DEFAULT 'start',
            state_data TEXT NOT NULL DEFAULT '{}',
            state_history TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_interaction TEXT NOT NULL,
            user_id BIGINT REFERENCES users(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_conversations_last_interaction
            ON conversations(last_interaction)",
        "CREATE INDEX IF NOT EXISTS idx_conversations_user_type
            ON conversations(user_type)",
    ],
}];

fn migrations_for(dialect: Dialect) -> &'static [Migration] {
    match dialect {
        Dialect::Sqlite => SQLITE_MIGRATIONS,
        Dialect::Postgres => POSTGRES_MIGRATIONS,
    }
}

/// Run all pending migrations. Idempotent.
pub async fn run(storage: &dyn Storage) -> Result<(), StorageError> {
    storage
        .execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            )",
            &[],
        )
        .await
        .map_err(migration_err)?;

    let current = current_version(storage).await?;
    let mut applied = 0;
    for migration in migrations_for(storage.dialect()) {
        if migration.version <= current {
            continue;
        }
        let mut statements: Vec<Statement> = migration
            .statements
            .iter()
            .map(|sql| Statement::new(*sql, vec![]))
            .collect();
        statements.push(Statement::new(
            "INSERT INTO _migrations (version, name, applied_at) VALUES (?, ?, ?)",
            vec![
                Value::Integer(migration.version),
                Value::from(migration.name),
                Value::from(chrono::Utc::now().to_rfc3339()),
            ],
        ));
        storage
            .transaction(statements)
            .await
            .map_err(migration_err)?;
        info!(version = migration.version, name = migration.name, "Migration applied");
        applied += 1;
    }

    if applied == 0 {
        info!(version = current, "Schema up to date");
    }
    Ok(())
}

async fn current_version(storage: &dyn Storage) -> Result<i64, StorageError> {
    let row = storage
        .fetch_one("SELECT MAX(version) AS version FROM _migrations", &[])
        .await
        .map_err(migration_err)?;
    match row {
        Some(row) => Ok(row.opt_integer("version").map_err(migration_err)?.unwrap_or(0)),
        None => Ok(0),
    }
}

fn migration_err(e: StorageError) -> StorageError {
    match e {
        StorageError::Connection(m) => StorageError::Connection(m),
        other => StorageError::Migration(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::libsql_backend::LibsqlStorage;

    #[tokio::test]
    async fn migrations_apply_and_are_idempotent() {
        let storage = LibsqlStorage::new(":memory:");
        run(&storage).await.unwrap();
        // Second run applies nothing and must not fail.
        run(&storage).await.unwrap();

        let row = storage
            .fetch_one("SELECT MAX(version) AS version FROM _migrations", &[])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.integer("version").unwrap(), 1);

        // Both tables exist.
        storage
            .fetch_all("SELECT id FROM users", &[])
            .await
            .unwrap();
        storage
            .fetch_all("SELECT id FROM conversations", &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn runner_works_on_blocking_adapter() {
        let storage = crate::store::rusqlite_backend::RusqliteStorage::new(":memory:");
        run(&storage).await.unwrap();
        storage
            .fetch_all("SELECT id FROM conversations", &[])
            .await
            .unwrap();
    }
}
