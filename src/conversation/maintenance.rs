//! Background maintenance — periodic sweep of long-idle conversations.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::store::ConversationStore;

/// Spawn the cleanup sweep task.
///
/// Every `interval`, conversations whose last interaction predates
/// `now - retention` are deleted. Runs outside the per-message path.
pub fn spawn_cleanup_task(
    store: ConversationStore,
    interval: std::time::Duration,
    retention: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match store.delete_idle_since(Utc::now() - retention).await {
                Ok(0) => {}
                Ok(deleted) => info!(deleted, "Swept idle conversations"),
                Err(e) => warn!(error = %e, "Conversation sweep failed"),
            }
        }
    })
}
