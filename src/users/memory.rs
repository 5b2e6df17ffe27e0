use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    repo::{StoreError, UserRepository},
    repo_types::{User, UserFilter, UserImage},
};

struct Entry {
    user: User,
    image: Option<UserImage>,
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, Entry>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn email_clash(users: &HashMap<Uuid, Entry>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|e| Some(e.user.id) != except && same_email(&e.user.email, email))
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn list(&self, filter: UserFilter) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        let mut out: Vec<User> = users
            .values()
            .map(|e| &e.user)
            .filter(|u| filter == UserFilter::All || u.active_status)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date_created.cmp(&b.date_created).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).map(|e| e.user.clone()))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|e| same_email(&e.user.email, email))
            .map(|e| e.user.clone()))
    }

    async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool, StoreError> {
        Ok(email_clash(&*self.users.read().await, email, except))
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if email_clash(&users, &user.email, None) {
            return Err(StoreError::DuplicateEmail);
        }
        users.insert(
            user.id,
            Entry {
                user: user.clone(),
                image: None,
            },
        );
        Ok(())
    }

    async fn update_profile(&self, user: &User) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        if email_clash(&users, &user.email, Some(user.id)) {
            return Err(StoreError::DuplicateEmail);
        }
        let Some(entry) = users.get_mut(&user.id) else {
            return Ok(false);
        };
        // Status flag and creation time are owned by other operations.
        entry.user = User {
            active_status: entry.user.active_status,
            date_created: entry.user.date_created,
            ..user.clone()
        };
        Ok(true)
    }

    async fn set_active(
        &self,
        id: Uuid,
        active: bool,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(entry) => {
                entry.user.active_status = active;
                entry.user.last_updated = at;
                true
            }
            None => false,
        })
    }

    async fn set_image(
        &self,
        id: Uuid,
        image: UserImage,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut users = self.users.write().await;
        Ok(match users.get_mut(&id) {
            Some(entry) => {
                entry.image = Some(image);
                entry.user.last_updated = at;
                true
            }
            None => false,
        })
    }

    async fn find_image(&self, id: Uuid) -> Result<Option<UserImage>, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(&id)
            .and_then(|e| e.image.clone()))
    }
}
