//! Conversation and user data models.

use chrono::{DateTime, Duration, Utc};

use super::state::{ConversationState, UserType};

/// A registered phone number's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub role: UserType,
    pub phone_number: String,
}

/// One persisted multi-turn exchange, keyed by phone number.
///
/// The history stack records previously visited states in arrival order and
/// is only ever touched by [`Conversation::update_state`] (push on a real
/// transition) and [`Conversation::go_back`] (pop).
#[derive(Debug, Clone)]
pub struct Conversation {
    /// Row id; `None` until the first save assigns one.
    pub id: Option<i64>,
    pub phone_number: String,
    pub user_type: UserType,
    pub current_state: ConversationState,
    pub state_data: serde_json::Map<String, serde_json::Value>,
    pub state_history: Vec<ConversationState>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    /// Owning user's id; `None` until resolved by a save.
    pub user_id: Option<i64>,
}

impl Conversation {
    /// Fresh in-memory conversation for a previously-unseen phone number.
    /// Not persisted until the engine's single per-message commit.
    pub fn new(phone_number: &str) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            phone_number: phone_number.to_string(),
            user_type: UserType::default(),
            current_state: ConversationState::default(),
            state_data: serde_json::Map::new(),
            state_history: Vec::new(),
            created_at: now,
            updated_at: now,
            last_interaction: now,
            user_id: None,
        }
    }

    /// Transition to `new_state`, maintaining the history stack.
    ///
    /// A state is pushed if and only if the transition actually changes
    /// `current_state`; no-op transitions leave history and
    /// `last_interaction` untouched.
    pub fn update_state(&mut self, new_state: ConversationState) {
        if self.current_state != new_state {
            self.state_history.push(self.current_state);
            self.current_state = new_state;
            self.last_interaction = Utc::now();
        }
    }

    /// Pop the history stack and return to the previous state.
    ///
    /// Returns the restored state, or `None` (and changes nothing) when the
    /// stack is empty. "Back" replays exactly the states visited in arrival
    /// order; it does not walk a logical parent graph.
    pub fn go_back(&mut self) -> Option<ConversationState> {
        let previous = self.state_history.pop()?;
        self.current_state = previous;
        self.last_interaction = Utc::now();
        Some(previous)
    }

    /// Whether the conversation has been idle for longer than `threshold`.
    pub fn idle_timed_out(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_interaction) > threshold
    }
}
