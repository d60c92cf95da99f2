//! Transaction scheduler: periodically applies queued transfers.
//!
//! Checks run in a fixed order and the first failure is terminal for that
//! transaction:
//!
//! 1. either party unknown: dropped
//! 2. receiver unverified: receiver re-queued for verification, dropped
//! 3. sender unverified: sender re-queued for verification, dropped
//! 4. `sender.balance - amount < 0`: dropped
//! 5. otherwise the sender is debited and the receiver credited
//!
//! The whole check-and-apply runs under the registry write guard, so two
//! workers never interleave on the same balances. Dropped transactions are
//! not retried; the submitter has to resubmit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use tally_types::{
    OutcomeKind, OutcomeRecord, PendingTransaction, ProcessingError, TransactionKey,
    TransactionOutcome,
};

use crate::config::{ClaimPolicy, SchedulerConfig};
use crate::metrics::PipelineMetrics;
use crate::outcome_log::OutcomeLog;
use crate::registry::UserRegistry;
use crate::tracing_spans::{apply_transaction_span, transaction_tick_span};
use crate::transaction_queue::TransactionQueue;
use crate::verification_queue::VerificationQueue;
use crate::worker_pool::{dispatch, run_every, TickReport};

pub const SCHEDULER_NAME: &str = "transaction";

pub struct TransactionScheduler {
    registry: Arc<UserRegistry>,
    queue: Arc<TransactionQueue>,
    verification_queue: Arc<VerificationQueue>,
    outcomes: Arc<OutcomeLog>,
    metrics: Arc<PipelineMetrics>,
    config: SchedulerConfig,
    policy: ClaimPolicy,
    ticks: AtomicU64,
}

impl TransactionScheduler {
    pub fn new(
        registry: Arc<UserRegistry>,
        queue: Arc<TransactionQueue>,
        verification_queue: Arc<VerificationQueue>,
        outcomes: Arc<OutcomeLog>,
        metrics: Arc<PipelineMetrics>,
        config: SchedulerConfig,
        policy: ClaimPolicy,
    ) -> Self {
        Self {
            registry,
            queue,
            verification_queue,
            outcomes,
            metrics,
            config,
            policy,
            ticks: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn ticks_run(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one tick now.
    pub async fn tick(&self) -> TickReport<OutcomeRecord> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let workers = self.config.workers;
        self.run_tick(workers)
            .instrument(transaction_tick_span(tick, workers))
            .await
    }

    async fn run_tick(&self, workers: usize) -> TickReport<OutcomeRecord> {
        let started = Instant::now();
        let registry = Arc::clone(&self.registry);
        let queue = Arc::clone(&self.queue);
        let verification_queue = Arc::clone(&self.verification_queue);
        let outcomes = Arc::clone(&self.outcomes);
        let metrics = Arc::clone(&self.metrics);
        let policy = self.policy;

        let handler = move |worker: usize, (key, claimed): (TransactionKey, PendingTransaction)| {
            let registry = Arc::clone(&registry);
            let queue = Arc::clone(&queue);
            let verification_queue = Arc::clone(&verification_queue);
            let outcomes = Arc::clone(&outcomes);
            let metrics = Arc::clone(&metrics);
            let span = apply_transaction_span(worker, &claimed.request_id, &key);
            async move {
                let tx = match policy {
                    ClaimPolicy::Guaranteed => claimed,
                    // The peeked copy may be stale: whatever is under the key
                    // now is what gets consumed.
                    ClaimPolicy::BestEffort => match queue.remove(&key).await {
                        Some(current) => current,
                        None => {
                            tracing::debug!("transaction already consumed");
                            return None;
                        }
                    },
                };

                let result = apply_transaction(&registry, &verification_queue, &tx).await;
                let outcome = match &result {
                    Ok(()) => TransactionOutcome::Completed,
                    Err(e) => TransactionOutcome::from(e),
                };
                match &result {
                    Ok(()) => tracing::info!(
                        sender = %tx.sender,
                        receiver = %tx.receiver,
                        amount = tx.amount,
                        "transaction completed"
                    ),
                    Err(e) => tracing::warn!(
                        outcome = outcome.as_str(),
                        error = %e,
                        "transaction dropped"
                    ),
                }
                metrics.record_transaction_outcome(outcome);

                let record = outcomes
                    .record(OutcomeKind::Transaction {
                        request_id: tx.request_id,
                        key,
                        sender: tx.sender,
                        receiver: tx.receiver,
                        amount: tx.amount,
                        outcome,
                        detail: result.err().map(|e| e.to_string()),
                    })
                    .await;
                Some(record)
            }
            .instrument(span)
        };

        let report = dispatch(&self.queue, self.policy, workers, handler).await;

        let remaining = self.queue.len().await;
        self.metrics.transaction_queue_depth.set(remaining as i64);
        self.metrics
            .verification_queue_depth
            .set(self.verification_queue.len().await as i64);
        self.metrics.record_tick(
            SCHEDULER_NAME,
            report.idle_workers,
            started.elapsed().as_secs_f64() * 1000.0,
        );

        if report.processed() > 0 {
            tracing::info!(
                processed = report.processed(),
                idle = report.idle_workers,
                remaining,
                "transaction tick complete"
            );
        } else {
            tracing::debug!(idle = report.idle_workers, remaining, "transaction tick idle");
        }
        report
    }

    /// Spawn the periodic task. It stops when `shutdown_rx` fires.
    pub fn spawn(self: &Arc<Self>, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        let period = scheduler.config.interval();
        tracing::info!(
            interval_ms = scheduler.config.interval_ms,
            workers = scheduler.config.workers,
            policy = scheduler.policy.as_str(),
            "transaction scheduler started"
        );
        tokio::spawn(run_every(SCHEDULER_NAME, period, shutdown_rx, move || {
            let scheduler = Arc::clone(&scheduler);
            async move {
                scheduler.tick().await;
            }
        }))
    }
}

/// Validate and apply one transfer.
///
/// Balance arithmetic that would overflow `i64` is reported as
/// [`ProcessingError::InsufficientFunds`].
pub(crate) async fn apply_transaction(
    registry: &UserRegistry,
    verification_queue: &VerificationQueue,
    tx: &PendingTransaction,
) -> Result<(), ProcessingError> {
    let mut users = registry.write().await;

    let (sender, receiver) = match (users.get(&tx.sender), users.get(&tx.receiver)) {
        (Some(s), Some(r)) => (s, r),
        _ => {
            return Err(ProcessingError::UnknownParty {
                sender: tx.sender.clone(),
                receiver: tx.receiver.clone(),
            })
        }
    };

    if !receiver.verified {
        drop(users);
        verification_queue.enqueue(tx.receiver.clone()).await;
        return Err(ProcessingError::ReceiverUnverified(tx.receiver.clone()));
    }
    if !sender.verified {
        drop(users);
        verification_queue.enqueue(tx.sender.clone()).await;
        return Err(ProcessingError::SenderUnverified(tx.sender.clone()));
    }

    let insufficient = ProcessingError::InsufficientFunds {
        needed: tx.amount,
        available: sender.balance,
    };
    let debited = match sender.balance.checked_sub(tx.amount) {
        Some(b) if b >= 0 => b,
        _ => return Err(insufficient),
    };

    if tx.is_self_transfer() {
        return Ok(());
    }

    let credited = receiver
        .balance
        .checked_add(tx.amount)
        .ok_or(insufficient)?;

    if let Some(s) = users.get_mut(&tx.sender) {
        s.balance = debited;
    }
    if let Some(r) = users.get_mut(&tx.receiver) {
        r.balance = credited;
    }
    Ok(())
}
