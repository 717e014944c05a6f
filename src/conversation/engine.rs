//! ConversationEngine — the per-message state machine driver.
//!
//! Each inbound message is one unit of work: resolve the conversation,
//! check back-navigation, check the idle timeout, dispatch to the current
//! state's handler, and commit the resulting mutation exactly once. The
//! per-phone lock is held for the whole of `handle_message`, so a
//! read-modify-commit cycle never loses a concurrent update.

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::store::ConversationStore;

use super::handlers::{HandlerOutcome, handler_for};
use super::locks::PhoneLocks;
use super::model::Conversation;
use super::reply::Reply;
use super::state::ConversationState;

/// Drives conversations in response to inbound messages.
pub struct ConversationEngine {
    store: ConversationStore,
    locks: PhoneLocks,
    idle_timeout: Duration,
}

impl ConversationEngine {
    pub fn new(store: ConversationStore, idle_timeout: Duration) -> Self {
        Self {
            store,
            locks: PhoneLocks::new(),
            idle_timeout,
        }
    }

    /// Handle one inbound message and return the reply descriptor.
    ///
    /// Storage failures propagate; unknown states and unrecognized input
    /// are recovered into descriptors without committing anything.
    pub async fn handle_message(
        &self,
        phone_number: &str,
        text: &str,
    ) -> Result<Reply, StorageError> {
        let _guard = self.locks.acquire(phone_number).await;

        let mut conversation = match self.store.load(phone_number).await? {
            Some(existing) => existing,
            // Persisted only by the single commit below, together with its
            // owning user.
            None => Conversation::new(phone_number),
        };

        // Back-navigation wins over everything else, including the idle
        // timeout. An empty stack falls through to normal processing.
        if text.eq_ignore_ascii_case("back") {
            if let Some(restored) = conversation.go_back() {
                self.store.save(&conversation).await?;
                info!(phone = %phone_number, state = %restored, "Navigated back");
                return Ok(Reply::for_state(&conversation));
            }
        }

        if conversation.idle_timed_out(self.idle_timeout, Utc::now()) {
            // Reset to the start; the push rule applies as for any other
            // transition and existing history survives the reset. The
            // triggering message itself is not dispatched.
            conversation.update_state(ConversationState::Start);
            conversation.state_data.clear();
            // A no-op reset (already at start) must still count as an
            // interaction, or the conversation would answer with timeouts
            // forever.
            conversation.last_interaction = Utc::now();
            self.store.save(&conversation).await?;
            info!(phone = %phone_number, "Conversation timed out, reset to start");
            return Ok(Reply::timeout(phone_number));
        }

        let Some(handler) = handler_for(conversation.current_state) else {
            warn!(
                phone = %phone_number,
                state = %conversation.current_state,
                "No handler for state"
            );
            return Ok(Reply::error());
        };

        match handler(&mut conversation, text) {
            HandlerOutcome::Advanced(reply) => {
                self.store.save(&conversation).await?;
                debug!(
                    phone = %phone_number,
                    state = %conversation.current_state,
                    template = %reply.template,
                    "Message handled"
                );
                Ok(reply)
            }
            HandlerOutcome::Invalid(reply) => {
                debug!(
                    phone = %phone_number,
                    state = %conversation.current_state,
                    "Unrecognized input"
                );
                Ok(reply)
            }
        }
    }
}
