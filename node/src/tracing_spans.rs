//! Pre-built [`tracing::Span`] constructors for scheduler activity.
//!
//! Consistent span names and fields make it easy to follow one tick, or one
//! claimed item, through the logs.

use tracing::{debug_span, info_span, Span};

use tally_types::{RequestId, TransactionKey, UserId};

/// Span covering one verification tick.
pub fn verification_tick_span(tick: u64, workers: usize) -> Span {
    info_span!("verification_tick", tick = tick, workers = workers)
}

/// Span covering one transaction tick.
pub fn transaction_tick_span(tick: u64, workers: usize) -> Span {
    info_span!("transaction_tick", tick = tick, workers = workers)
}

/// Span covering a worker's handling of one claimed user id.
pub fn verify_user_span(worker: usize, user: &UserId) -> Span {
    debug_span!("verify_user", worker = worker, user = %user)
}

/// Span covering a worker's handling of one claimed transaction.
pub fn apply_transaction_span(worker: usize, request_id: &RequestId, key: &TransactionKey) -> Span {
    debug_span!("apply_transaction", worker = worker, request = %request_id, key = %key)
}
