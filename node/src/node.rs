//! The ledger node: wires the registry, both queues and both schedulers
//! together and exposes the operations callers use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use tally_types::{
    OutcomeRecord, PendingTransaction, RequestId, Timestamp, TransactionKey, User, UserId,
};

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::PipelineMetrics;
use crate::outcome_log::OutcomeLog;
use crate::registry::UserRegistry;
use crate::shutdown::ShutdownController;
use crate::transaction_queue::TransactionQueue;
use crate::transaction_scheduler::TransactionScheduler;
use crate::verification_queue::VerificationQueue;
use crate::verification_scheduler::VerificationScheduler;
use crate::worker_pool::TickReport;

/// Timeout for waiting on scheduler tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Returned to the submitter of a transaction. Acceptance says nothing about
/// whether the transfer will eventually complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub request_id: RequestId,
    pub key: TransactionKey,
    /// A still-queued transaction under the same key was overwritten.
    pub replaced: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepths {
    pub verification: usize,
    pub transaction: usize,
}

pub struct LedgerNode {
    config: NodeConfig,
    registry: Arc<UserRegistry>,
    verification_queue: Arc<VerificationQueue>,
    transaction_queue: Arc<TransactionQueue>,
    outcomes: Arc<OutcomeLog>,
    metrics: Arc<PipelineMetrics>,
    verification: Arc<VerificationScheduler>,
    transactions: Arc<TransactionScheduler>,
    shutdown: ShutdownController,
    started: AtomicBool,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl LedgerNode {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;

        let registry = Arc::new(UserRegistry::new());
        let verification_queue = Arc::new(VerificationQueue::new());
        let transaction_queue = Arc::new(TransactionQueue::new(config.key_mode));
        let outcomes = Arc::new(OutcomeLog::new(config.outcome_log_capacity));
        let metrics = Arc::new(PipelineMetrics::new());

        let verification = Arc::new(VerificationScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&verification_queue),
            Arc::clone(&outcomes),
            Arc::clone(&metrics),
            config.verification.clone(),
            config.claim_policy,
        ));
        let transactions = Arc::new(TransactionScheduler::new(
            Arc::clone(&registry),
            Arc::clone(&transaction_queue),
            Arc::clone(&verification_queue),
            Arc::clone(&outcomes),
            Arc::clone(&metrics),
            config.transaction.clone(),
            config.claim_policy,
        ));

        Ok(Self {
            config,
            registry,
            verification_queue,
            transaction_queue,
            outcomes,
            metrics,
            verification,
            transactions,
            shutdown: ShutdownController::new(),
            started: AtomicBool::new(false),
            task_handles: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Register a new unverified user and queue it for verification.
    pub async fn create_user(&self, name: impl Into<String>) -> Result<User, NodeError> {
        let user = User::new(UserId::generate(), name, self.config.initial_balance);
        self.registry.insert(user.clone()).await;
        self.verification_queue.enqueue(user.id.clone()).await;

        self.metrics.users_created.inc();
        self.metrics.user_count.set(self.registry.len().await as i64);
        self.metrics
            .verification_queue_depth
            .set(self.verification_queue.len().await as i64);
        tracing::info!(user = %user.id, name = %user.name, "user created");
        Ok(user)
    }

    /// Queue a transfer. Only the shape of the request is checked here; the
    /// parties, their verification and the sender's balance are checked when
    /// a transaction worker picks it up.
    pub async fn submit_transaction(
        &self,
        sender: UserId,
        receiver: UserId,
        amount: i64,
    ) -> Result<SubmissionReceipt, NodeError> {
        let tx = PendingTransaction::new(sender, receiver, amount, Timestamp::now().as_millis())?;
        let request_id = tx.request_id;
        let (key, replaced) = self.transaction_queue.submit(tx).await;

        self.metrics.transactions_submitted.inc();
        if let Some(old) = &replaced {
            self.metrics.transactions_replaced.inc();
            tracing::debug!(
                key = %key,
                replaced_request = %old.request_id,
                "queued transaction overwritten"
            );
        }
        self.metrics
            .transaction_queue_depth
            .set(self.transaction_queue.len().await as i64);
        tracing::info!(request_id = %request_id, key = %key, amount, "transaction accepted");

        Ok(SubmissionReceipt {
            request_id,
            key,
            replaced: replaced.is_some(),
        })
    }

    /// Snapshot of every user. May lag in-flight worker updates.
    pub async fn list_users(&self) -> HashMap<UserId, User> {
        self.registry.snapshot().await
    }

    pub async fn get_user(&self, id: &UserId) -> Result<User, NodeError> {
        self.registry
            .get(id)
            .await
            .ok_or_else(|| tally_types::TallyError::UserNotFound(id.clone()).into())
    }

    pub async fn recent_outcomes(&self, limit: usize) -> Vec<OutcomeRecord> {
        self.outcomes.recent(limit).await
    }

    pub async fn outcome_for(&self, request_id: &RequestId) -> Option<OutcomeRecord> {
        self.outcomes.for_request(request_id).await
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<OutcomeRecord> {
        self.outcomes.subscribe()
    }

    pub async fn queue_depths(&self) -> QueueDepths {
        QueueDepths {
            verification: self.verification_queue.len().await,
            transaction: self.transaction_queue.len().await,
        }
    }

    /// Run one verification tick immediately, outside the schedule.
    pub async fn tick_verification(&self) -> TickReport<OutcomeRecord> {
        self.verification.tick().await
    }

    /// Run one transaction tick immediately, outside the schedule.
    pub async fn tick_transactions(&self) -> TickReport<OutcomeRecord> {
        self.transactions.tick().await
    }

    /// Spawn both periodic schedulers. A node can be started only once, and
    /// never after it has been stopped.
    pub async fn start(&self) -> Result<(), NodeError> {
        if self.shutdown.is_triggered() {
            return Err(NodeError::Stopped);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(NodeError::AlreadyStarted);
        }
        tracing::info!(
            claim_policy = self.config.claim_policy.as_str(),
            key_mode = ?self.config.key_mode,
            "ledger node starting"
        );

        let mut handles = self.task_handles.lock().await;
        handles.push(self.verification.spawn(self.shutdown.subscribe()));
        handles.push(self.transactions.spawn(self.shutdown.subscribe()));
        Ok(())
    }

    /// Signal the schedulers to stop and wait for them. A tick that is
    /// already running finishes first.
    pub async fn stop(&self) -> Result<(), NodeError> {
        tracing::info!("ledger node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.lock().await.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "scheduler task failed");
                }
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all).await.is_err() {
            tracing::warn!(
                "shutdown timeout ({:?}), scheduler tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
            return Err(NodeError::ShutdownTimeout);
        }

        tracing::info!("ledger node stopped");
        Ok(())
    }

    pub fn is_stopping(&self) -> bool {
        self.shutdown.is_triggered()
    }
}
