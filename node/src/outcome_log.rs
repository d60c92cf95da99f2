//! Outcome log: where scheduler workers report what happened to each item.
//!
//! A bounded FIFO of recent [`OutcomeRecord`]s: when full, the oldest record
//! is evicted. Every record is also published on a broadcast channel so that
//! live subscribers see outcomes as they happen. Subscribers that fall behind
//! lose the oldest messages (`RecvError::Lagged`), never block the workers.

use std::collections::VecDeque;
use tokio::sync::{broadcast, Mutex};

use tally_types::{OutcomeKind, OutcomeRecord, RequestId, Timestamp};

/// Broadcast buffer per subscriber.
const SUBSCRIBER_BUFFER: usize = 256;

pub struct OutcomeLog {
    inner: Mutex<LogInner>,
    capacity: usize,
    tx: broadcast::Sender<OutcomeRecord>,
}

struct LogInner {
    records: VecDeque<OutcomeRecord>,
    next_sequence: u64,
}

impl OutcomeLog {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self {
            inner: Mutex::new(LogInner {
                records: VecDeque::with_capacity(capacity),
                next_sequence: 1,
            }),
            capacity,
            tx,
        }
    }

    /// Append a record, evicting the oldest if at capacity, and publish it.
    pub async fn record(&self, kind: OutcomeKind) -> OutcomeRecord {
        let record = {
            let mut inner = self.inner.lock().await;
            let record = OutcomeRecord {
                sequence: inner.next_sequence,
                at_ms: Timestamp::now().as_millis(),
                kind,
            };
            inner.next_sequence += 1;
            if self.capacity > 0 {
                if inner.records.len() >= self.capacity {
                    inner.records.pop_front();
                }
                inner.records.push_back(record.clone());
            }
            record
        };
        // no subscribers is fine
        let _ = self.tx.send(record.clone());
        record
    }

    /// Up to `limit` most recent records, oldest first.
    pub async fn recent(&self, limit: usize) -> Vec<OutcomeRecord> {
        let inner = self.inner.lock().await;
        let skip = inner.records.len().saturating_sub(limit);
        inner.records.iter().skip(skip).cloned().collect()
    }

    /// The retained record for a submission, if it has been processed and not
    /// yet evicted.
    pub async fn for_request(&self, request_id: &RequestId) -> Option<OutcomeRecord> {
        let inner = self.inner.lock().await;
        inner
            .records
            .iter()
            .rev()
            .find(|r| r.request_id().as_ref() == Some(request_id))
            .cloned()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutcomeRecord> {
        self.tx.subscribe()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
