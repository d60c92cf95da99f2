//! Pending transfers keyed by [`TransactionKey`].

use std::collections::HashMap;
use tokio::sync::Mutex;

use tally_types::{KeyMode, PendingTransaction, TransactionKey};

use crate::worker_pool::ClaimQueue;

/// Pending transactions awaiting the transaction scheduler.
///
/// Under [`KeyMode::Pair`] a submission for a pair that still has a queued
/// transaction replaces it.
pub struct TransactionQueue {
    pending: Mutex<HashMap<TransactionKey, PendingTransaction>>,
    key_mode: KeyMode,
}

impl TransactionQueue {
    pub fn new(key_mode: KeyMode) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            key_mode,
        }
    }

    pub fn key_mode(&self) -> KeyMode {
        self.key_mode
    }

    /// Insert a transaction under its key, returning the key and whatever
    /// transaction it replaced.
    pub async fn submit(
        &self,
        tx: PendingTransaction,
    ) -> (TransactionKey, Option<PendingTransaction>) {
        let key = tx.key(self.key_mode);
        let replaced = self.pending.lock().await.insert(key.clone(), tx);
        (key, replaced)
    }

    /// Remove and return the transaction under `key`, if any.
    pub async fn remove(&self, key: &TransactionKey) -> Option<PendingTransaction> {
        self.pending.lock().await.remove(key)
    }

    pub async fn get(&self, key: &TransactionKey) -> Option<PendingTransaction> {
        self.pending.lock().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

impl ClaimQueue for TransactionQueue {
    type Item = (TransactionKey, PendingTransaction);

    async fn claim_up_to(&self, max: usize) -> Vec<Self::Item> {
        let mut pending = self.pending.lock().await;
        let keys: Vec<TransactionKey> = pending.keys().take(max).cloned().collect();
        keys.into_iter()
            .filter_map(|key| pending.remove(&key).map(|tx| (key, tx)))
            .collect()
    }

    async fn peek_all(&self) -> Vec<Self::Item> {
        self.pending
            .lock()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
