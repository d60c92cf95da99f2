//! Set of user ids awaiting verification.

use std::collections::HashSet;
use tokio::sync::Mutex;

use tally_types::UserId;

use crate::worker_pool::ClaimQueue;

/// Presence of an id means the user has not yet been confirmed verified.
/// Inserting an id that is already queued is a no-op.
#[derive(Default)]
pub struct VerificationQueue {
    pending: Mutex<HashSet<UserId>>,
}

impl VerificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a user for verification. Returns `false` if it was already queued.
    pub async fn enqueue(&self, id: UserId) -> bool {
        self.pending.lock().await.insert(id)
    }

    /// Remove an id. Returns `false` if it was not queued.
    pub async fn remove(&self, id: &UserId) -> bool {
        self.pending.lock().await.remove(id)
    }

    pub async fn contains(&self, id: &UserId) -> bool {
        self.pending.lock().await.contains(id)
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

impl ClaimQueue for VerificationQueue {
    type Item = UserId;

    async fn claim_up_to(&self, max: usize) -> Vec<UserId> {
        let mut pending = self.pending.lock().await;
        let claimed: Vec<UserId> = pending.iter().take(max).cloned().collect();
        for id in &claimed {
            pending.remove(id);
        }
        claimed
    }

    async fn peek_all(&self) -> Vec<UserId> {
        self.pending.lock().await.iter().cloned().collect()
    }
}
