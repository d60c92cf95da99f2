//! User registry: the single owner of every [`User`] record.
//!
//! All reads and writes go through one `RwLock`. Scheduler workers take the
//! write guard for the whole validate-and-apply step so that a transfer is
//! atomic with respect to other workers and to callers.

use std::collections::HashMap;
use tokio::sync::{RwLock, RwLockWriteGuard};

use tally_types::{User, UserId};

#[derive(Default)]
pub struct UserRegistry {
    users: RwLock<HashMap<UserId, User>>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user record.
    pub async fn insert(&self, user: User) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn get(&self, id: &UserId) -> Option<User> {
        self.users.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &UserId) -> bool {
        self.users.read().await.contains_key(id)
    }

    /// Copy of every user currently registered.
    pub async fn snapshot(&self) -> HashMap<UserId, User> {
        self.users.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Exclusive access for scheduler workers.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, HashMap<UserId, User>> {
        self.users.write().await
    }
}
