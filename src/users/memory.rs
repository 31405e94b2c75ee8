use std::collections::BTreeMap;

use axum::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::dto::UserFields;
use super::repo::{StoreError, UserStore};
use super::repo_types::User;

/// Process-local store; ids are handed out as max(id) + 1.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<i64, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict(users: &BTreeMap<i64, User>, own_id: i64, fields: &UserFields) -> Option<&'static str> {
    users.values().filter(|u| u.id != own_id).find_map(|u| {
        if u.username == fields.username {
            Some("username")
        } else if u.email == fields.email {
            Some("email")
        } else {
            None
        }
    })
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn find(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn insert(&self, id: Option<i64>, fields: &UserFields) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let id = match id {
            Some(id) if users.contains_key(&id) => {
                return Err(StoreError::Other(anyhow::anyhow!("user {id} already exists")));
            }
            Some(id) => id,
            None => match users.keys().next_back() {
                None => 1,
                Some(max) => max
                    .checked_add(1)
                    .ok_or_else(|| StoreError::Other(anyhow::anyhow!("user id space exhausted")))?,
            },
        };
        if let Some(field) = conflict(&users, id, fields) {
            return Err(StoreError::Conflict { field });
        }

        let now = OffsetDateTime::now_utc();
        let user = User {
            id,
            name: fields.name.clone(),
            username: fields.username.clone(),
            email: fields.email.clone(),
            phone: fields.phone.clone(),
            website: fields.website.clone(),
            created_at: now,
            updated_at: now,
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: i64, fields: &UserFields) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if let Some(field) = conflict(&users, id, fields) {
            return Err(StoreError::Conflict { field });
        }
        let user = users.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        user.name = fields.name.clone();
        user.username = fields.username.clone();
        user.email = fields.email.clone();
        user.phone = fields.phone.clone();
        user.website = fields.website.clone();
        user.updated_at = OffsetDateTime::now_utc();
        Ok(user.clone())
    }

    async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}
