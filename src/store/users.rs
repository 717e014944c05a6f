//! UserStore — read-side lookups for registered users.

use std::sync::Arc;

use crate::conversation::model::User;
use crate::error::StorageError;
use crate::store::traits::Storage;
use crate::store::value::{Row, Value};

/// User lookups over any backend. Creation happens inside
/// `ConversationStore::get_or_create`/`save`, paired with the conversation
/// row it backs.
#[derive(Clone)]
pub struct UserStore {
    storage: Arc<dyn Storage>,
}

impl UserStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Look up a user by phone number.
    pub async fn find_by_phone(&self, phone_number: &str) -> Result<Option<User>, StorageError> {
        let row = self
            .storage
            .fetch_one(
                "SELECT id, role, phone_number FROM users WHERE phone_number = ?",
                &[Value::from(phone_number)],
            )
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    /// Whether a phone number has been seen before.
    pub async fn is_registered(&self, phone_number: &str) -> Result<bool, StorageError> {
        Ok(self.find_by_phone(phone_number).await?.is_some())
    }
}

fn row_to_user(row: &Row) -> Result<User, StorageError> {
    Ok(User {
        id: row.integer("id")?,
        role: row
            .text("role")?
            .parse()
            .map_err(StorageError::Serialization)?,
        phone_number: row.text("phone_number")?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::state::UserType;
    use crate::store::conversations::ConversationStore;
    use crate::store::libsql_backend::LibsqlStorage;
    use crate::store::migrations;

    #[tokio::test]
    async fn registration_follows_first_contact() {
        let storage: Arc<dyn Storage> = Arc::new(LibsqlStorage::new(":memory:"));
        migrations::run(storage.as_ref()).await.unwrap();
        let users = UserStore::new(Arc::clone(&storage));
        let conversations = ConversationStore::new(storage);

        assert!(!users.is_registered("+15551230000").await.unwrap());

        conversations.get_or_create("+15551230000").await.unwrap();

        assert!(users.is_registered("+15551230000").await.unwrap());
        let user = users
            .find_by_phone("+15551230000")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.role, UserType::Unknown);
        assert_eq!(user.phone_number, "+15551230000");
    }
}
