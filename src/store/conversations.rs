//! ConversationStore — typed persistence operations for conversations.
//!
//! All writes go through `Storage::transaction`, so a conversation's
//! `current_state` is never committed without its matching history mutation,
//! and creation of the owning user rides in the same transaction as the
//! conversation row it backs.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::conversation::model::Conversation;
use crate::conversation::state::UserType;
use crate::error::StorageError;
use crate::store::traits::Storage;
use crate::store::value::{Row, Statement, Value};

const CONVERSATION_COLUMNS: &str = "id, phone_number, user_type, current_state, state_data, \
     state_history, created_at, updated_at, last_interaction, user_id";

/// Persistent conversation storage over any backend.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<dyn Storage>,
}

impl ConversationStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load the conversation for a phone number, if one exists.
    pub async fn load(&self, phone_number: &str) -> Result<Option<Conversation>, StorageError> {
        let row = self
            .storage
            .fetch_one(
                &format!(
                    "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE phone_number = ?"
                ),
                &[Value::from(phone_number)],
            )
            .await?;
        row.as_ref().map(row_to_conversation).transpose()
    }

    /// Fetch the conversation for a phone number, creating it (and its
    /// owning user, if absent) in one transaction when unseen.
    ///
    /// Creation is conflict-tolerant: if a concurrent caller wins the
    /// insert race, the unique phone index makes ours a no-op and we return
    /// the winner's row.
    pub async fn get_or_create(&self, phone_number: &str) -> Result<Conversation, StorageError> {
        if let Some(existing) = self.load(phone_number).await? {
            return Ok(existing);
        }

        let fresh = Conversation::new(phone_number);
        self.storage
            .transaction(creation_statements(&fresh))
            .await?;
        debug!(phone = %phone_number, "Conversation created");

        self.load(phone_number).await?.ok_or_else(|| {
            StorageError::Query(format!(
                "conversation for {phone_number} missing after creation"
            ))
        })
    }

    /// Persist the full conversation state in one transaction.
    ///
    /// The batch also carries the ensure-created inserts, so a conversation
    /// built in memory this turn commits its creation and its first
    /// mutation atomically. For existing rows the inserts no-op.
    pub async fn save(&self, conversation: &Conversation) -> Result<(), StorageError> {
        let mut statements = creation_statements(conversation);
        statements.push(Statement::new(
            "UPDATE conversations SET user_type = ?, current_state = ?, state_data = ?, \
             state_history = ?, updated_at = ?, last_interaction = ?, \
             user_id = (SELECT id FROM users WHERE phone_number = ?) \
             WHERE phone_number = ?",
            vec![
                Value::from(conversation.user_type.to_string()),
                Value::from(conversation.current_state.to_string()),
                Value::from(encode_state_data(conversation)?),
                Value::from(encode_history(conversation)?),
                Value::from(format_ts(Utc::now())),
                Value::from(format_ts(conversation.last_interaction)),
                Value::from(conversation.phone_number.as_str()),
                Value::from(conversation.phone_number.as_str()),
            ],
        ));
        self.storage.transaction(statements).await?;
        debug!(
            phone = %conversation.phone_number,
            state = %conversation.current_state,
            "Conversation saved"
        );
        Ok(())
    }

    /// Delete conversations whose last interaction predates `cutoff`.
    /// Maintenance only; never called on the per-message path.
    pub async fn delete_idle_since(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.storage
            .execute(
                "DELETE FROM conversations WHERE last_interaction < ?",
                &[Value::from(format_ts(cutoff))],
            )
            .await
    }

    /// Conversation counts per user type, including zeroes.
    pub async fn user_type_statistics(&self) -> Result<BTreeMap<String, i64>, StorageError> {
        let mut stats: BTreeMap<String, i64> = [
            UserType::StudioHead,
            UserType::Parent,
            UserType::Dancer,
            UserType::Admin,
            UserType::Unknown,
        ]
        .iter()
        .map(|ut| (ut.to_string(), 0))
        .collect();

        let rows = self
            .storage
            .fetch_all(
                "SELECT user_type, COUNT(*) AS total FROM conversations GROUP BY user_type",
                &[],
            )
            .await?;
        for row in rows {
            stats.insert(row.text("user_type")?.to_string(), row.integer("total")?);
        }
        Ok(stats)
    }
}

/// Conflict-tolerant inserts ensuring the user and conversation rows exist.
fn creation_statements(conversation: &Conversation) -> Vec<Statement> {
    vec![
        Statement::new(
            "INSERT INTO users (role, phone_number) VALUES (?, ?) \
             ON CONFLICT (phone_number) DO NOTHING",
            vec![
                Value::from(UserType::Unknown.to_string()),
                Value::from(conversation.phone_number.as_str()),
            ],
        ),
        Statement::new(
            "INSERT INTO conversations (phone_number, user_type, current_state, state_data, \
             state_history, created_at, updated_at, last_interaction, user_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, (SELECT id FROM users WHERE phone_number = ?)) \
             ON CONFLICT (phone_number) DO NOTHING",
            vec![
                Value::from(conversation.phone_number.as_str()),
                Value::from(conversation.user_type.to_string()),
                Value::from(conversation.current_state.to_string()),
                Value::from("{}"),
                Value::from("[]"),
                Value::from(format_ts(conversation.created_at)),
                Value::from(format_ts(conversation.updated_at)),
                Value::from(format_ts(conversation.last_interaction)),
                Value::from(conversation.phone_number.as_str()),
            ],
        ),
    ]
}

fn encode_state_data(conversation: &Conversation) -> Result<String, StorageError> {
    serde_json::to_string(&conversation.state_data)
        .map_err(|e| StorageError::Serialization(format!("state_data: {e}")))
}

fn encode_history(conversation: &Conversation) -> Result<String, StorageError> {
    serde_json::to_string(&conversation.state_history)
        .map_err(|e| StorageError::Serialization(format!("state_history: {e}")))
}

fn row_to_conversation(row: &Row) -> Result<Conversation, StorageError> {
    Ok(Conversation {
        id: Some(row.integer("id")?),
        phone_number: row.text("phone_number")?.to_string(),
        user_type: row
            .text("user_type")?
            .parse()
            .map_err(StorageError::Serialization)?,
        current_state: row
            .text("current_state")?
            .parse()
            .map_err(StorageError::Serialization)?,
        state_data: serde_json::from_str(row.text("state_data")?)
            .map_err(|e| StorageError::Serialization(format!("state_data: {e}")))?,
        state_history: serde_json::from_str(row.text("state_history")?)
            .map_err(|e| StorageError::Serialization(format!("state_history: {e}")))?,
        created_at: parse_ts(row.text("created_at")?)?,
        updated_at: parse_ts(row.text("updated_at")?)?,
        last_interaction: parse_ts(row.text("last_interaction")?)?,
        user_id: row.opt_integer("user_id")?,
    })
}

/// Fixed-width RFC 3339 with microseconds: stored strings sort
/// lexicographically in time order, which the maintenance sweep relies on.
pub(crate) fn format_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("timestamp {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::state::ConversationState;
    use crate::store::libsql_backend::LibsqlStorage;
    use crate::store::migrations;

    async fn store() -> ConversationStore {
        let storage = Arc::new(LibsqlStorage::new(":memory:"));
        migrations::run(storage.as_ref()).await.unwrap();
        ConversationStore::new(storage)
    }

    #[tokio::test]
    async fn get_or_create_creates_user_and_conversation_once() {
        let store = store().await;

        let first = store.get_or_create("+15551230000").await.unwrap();
        assert_eq!(first.current_state, ConversationState::Start);
        assert!(first.id.is_some());
        assert!(first.user_id.is_some(), "owning user must be linked");

        let second = store.get_or_create("+15551230000").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.user_id, first.user_id);
    }

    #[tokio::test]
    async fn save_roundtrips_full_state() {
        let store = store().await;
        let mut conv = store.get_or_create("+15551230000").await.unwrap();

        conv.user_type = UserType::StudioHead;
        conv.update_state(ConversationState::UserTypeSelection);
        conv.update_state(ConversationState::StudioHeadMenu);
        conv.state_data
            .insert("studio".to_string(), "Arabesque".into());
        store.save(&conv).await.unwrap();

        let loaded = store.load("+15551230000").await.unwrap().unwrap();
        assert_eq!(loaded.user_type, UserType::StudioHead);
        assert_eq!(loaded.current_state, ConversationState::StudioHeadMenu);
        assert_eq!(
            loaded.state_history,
            vec![ConversationState::Start, ConversationState::UserTypeSelection]
        );
        assert_eq!(loaded.state_data["studio"], "Arabesque");
        assert_eq!(
            loaded.last_interaction.timestamp_micros(),
            conv.last_interaction.timestamp_micros()
        );
    }

    #[tokio::test]
    async fn save_persists_an_unseen_conversation_in_one_call() {
        let store = store().await;

        let mut conv = Conversation::new("+15559990000");
        conv.update_state(ConversationState::UserTypeSelection);
        store.save(&conv).await.unwrap();

        let loaded = store.load("+15559990000").await.unwrap().unwrap();
        assert_eq!(loaded.current_state, ConversationState::UserTypeSelection);
        assert_eq!(loaded.state_history, vec![ConversationState::Start]);
        assert!(loaded.user_id.is_some());
    }

    #[tokio::test]
    async fn load_unknown_phone_is_none() {
        let store = store().await;
        assert!(store.load("+15550000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn idle_sweep_deletes_only_stale_conversations() {
        let store = store().await;

        let mut stale = store.get_or_create("+15551110001").await.unwrap();
        stale.last_interaction = Utc::now() - chrono::Duration::days(2);
        store.save(&stale).await.unwrap();
        store.get_or_create("+15551110002").await.unwrap();

        let deleted = store
            .delete_idle_since(Utc::now() - chrono::Duration::days(1))
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.load("+15551110001").await.unwrap().is_none());
        assert!(store.load("+15551110002").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn statistics_count_per_user_type() {
        let store = store().await;

        let mut a = store.get_or_create("+15551110001").await.unwrap();
        a.user_type = UserType::Dancer;
        store.save(&a).await.unwrap();
        let mut b = store.get_or_create("+15551110002").await.unwrap();
        b.user_type = UserType::Dancer;
        store.save(&b).await.unwrap();
        store.get_or_create("+15551110003").await.unwrap();

        let stats = store.user_type_statistics().await.unwrap();
        assert_eq!(stats["dancer"], 2);
        assert_eq!(stats["unknown"], 1);
        assert_eq!(stats["studio_head"], 0);
    }

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc::now();
        let late = early + chrono::Duration::milliseconds(1);
        let (a, b) = (format_ts(early), format_ts(late));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(
            parse_ts(&a).unwrap().timestamp_micros(),
            early.timestamp_micros()
        );
    }
}
