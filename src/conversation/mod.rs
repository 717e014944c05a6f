//! Conversation state machine — per-phone-number multi-turn exchanges.
//!
//! The engine resolves each inbound message to a persisted conversation,
//! advances it through the closed state set, and commits exactly one
//! mutation per effective message. Handlers are pure functions; persistence
//! stays in the engine and store.

pub mod engine;
pub mod handlers;
pub mod locks;
pub mod maintenance;
pub mod model;
pub mod reply;
pub mod state;

pub use engine::ConversationEngine;
pub use maintenance::spawn_cleanup_task;
pub use model::{Conversation, User};
pub use reply::Reply;
pub use state::{ConversationState, UserType};
