//! Error types for dancelink.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors. Fatal at startup, never per-message.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown storage backend: {0} (expected \"embedded\" or \"networked\")")]
    UnknownBackend(String),

    #[error("Unknown execution mode: {0} (expected \"blocking\" or \"non-blocking\")")]
    UnknownMode(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Storage-related errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
