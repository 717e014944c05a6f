//! Persistence layer — one async `Storage` trait over two engines
//! (embedded SQLite family, networked PostgreSQL) in two execution modes
//! (blocking drivers bridged via `spawn_blocking`, native async drivers).

pub mod conversations;
pub mod factory;
pub mod libsql_backend;
pub mod migrations;
pub mod postgres_backend;
pub mod postgres_blocking_backend;
pub mod rusqlite_backend;
pub mod traits;
pub mod users;
pub mod value;

pub use conversations::ConversationStore;
pub use factory::{PoolConfig, create_storage};
pub use traits::{Dialect, Storage};
pub use users::UserStore;
pub use value::{Row, Statement, Value};
