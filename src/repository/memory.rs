use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::UserRepository;
use crate::domain::{UpdateUser, User};
use crate::error::DatabaseError;

/// Process-local identity store keyed by user id.
///
/// Cloning shares the underlying map. The compare-and-swap guard on
/// updates is evaluated under the write lock, so concurrent rotations for
/// the same user serialize here.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserRepository {
    users: Arc<RwLock<HashMap<String, User>>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn find(&self, id: &str) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }
}

impl UserRepository for InMemoryUserRepository {
    async fn get_by_username(&self, username: &str) -> Result<User, DatabaseError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("user with username {username}")))
    }

    async fn get_by_id(&self, id: &str) -> Result<User, DatabaseError> {
        self.users
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("user with id {id}")))
    }

    async fn update(&self, id: &str, input: UpdateUser) -> Result<(), DatabaseError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| DatabaseError::NotFound(format!("user with id {id}")))?;

        if !input.precondition_holds(user.refresh_token_hash.as_deref()) {
            return Err(DatabaseError::Conflict(format!(
                "refresh token hash for user {id} changed"
            )));
        }

        if let Some(hash) = input.refresh_token_hash {
            user.refresh_token_hash = Some(hash);
        }
        Ok(())
    }
}
