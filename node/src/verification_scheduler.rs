//! Verification scheduler: periodically promotes queued users to verified.
//!
//! Each tick dispatches a fixed number of workers through
//! [`worker_pool::dispatch`](crate::worker_pool::dispatch). A worker that
//! claims an id marks the matching user verified and removes the id from the
//! queue. Ids with no matching user are dropped. Ids beyond the worker count
//! wait for the next tick.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::Instrument;

use tally_types::{OutcomeKind, OutcomeRecord, UserId, VerificationOutcome};

use crate::config::{ClaimPolicy, SchedulerConfig};
use crate::metrics::PipelineMetrics;
use crate::outcome_log::OutcomeLog;
use crate::registry::UserRegistry;
use crate::tracing_spans::{verification_tick_span, verify_user_span};
use crate::verification_queue::VerificationQueue;
use crate::worker_pool::{dispatch, run_every, TickReport};

/// Label used in logs and metrics.
pub const SCHEDULER_NAME: &str = "verification";

pub struct VerificationScheduler {
    registry: Arc<UserRegistry>,
    queue: Arc<VerificationQueue>,
    outcomes: Arc<OutcomeLog>,
    metrics: Arc<PipelineMetrics>,
    config: SchedulerConfig,
    policy: ClaimPolicy,
    ticks: AtomicU64,
}

impl VerificationScheduler {
    pub fn new(
        registry: Arc<UserRegistry>,
        queue: Arc<VerificationQueue>,
        outcomes: Arc<OutcomeLog>,
        metrics: Arc<PipelineMetrics>,
        config: SchedulerConfig,
        policy: ClaimPolicy,
    ) -> Self {
        Self {
            registry,
            queue,
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

    /// Number of ticks run so far.
    pub fn ticks_run(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Run one tick now.
    pub async fn tick(&self) -> TickReport<OutcomeRecord> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let workers = self.config.workers;
        self.run_tick(workers)
            .instrument(verification_tick_span(tick, workers))
            .await
    }

    async fn run_tick(&self, workers: usize) -> TickReport<OutcomeRecord> {
        let started = Instant::now();
        let registry = Arc::clone(&self.registry);
        let queue = Arc::clone(&self.queue);
        let outcomes = Arc::clone(&self.outcomes);
        let metrics = Arc::clone(&self.metrics);

        let report = dispatch(&self.queue, self.policy, workers, move |worker, id: UserId| {
            let registry = Arc::clone(&registry);
            let queue = Arc::clone(&queue);
            let outcomes = Arc::clone(&outcomes);
            let metrics = Arc::clone(&metrics);
            let span = verify_user_span(worker, &id);
            async move {
                let outcome = verify_user(&registry, &queue, &id).await;
                match outcome {
                    VerificationOutcome::Verified => tracing::info!("user verified"),
                    VerificationOutcome::AlreadyVerified => {
                        tracing::debug!("user already verified")
                    }
                    VerificationOutcome::UnknownUser => {
                        tracing::warn!("dropping verification for unknown user")
                    }
                }
                metrics.record_verification_outcome(outcome);
                Some(
                    outcomes
                        .record(OutcomeKind::Verification { user: id, outcome })
                        .await,
                )
            }
            .instrument(span)
        })
        .await;

        let remaining = self.queue.len().await;
        self.metrics.verification_queue_depth.set(remaining as i64);
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
                "verification tick complete"
            );
        } else {
            tracing::debug!(idle = report.idle_workers, remaining, "verification tick idle");
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
            "verification scheduler started"
        );
        tokio::spawn(run_every(SCHEDULER_NAME, period, shutdown_rx, move || {
            let scheduler = Arc::clone(&scheduler);
            async move {
                scheduler.tick().await;
            }
        }))
    }
}

/// Verify one claimed id.
///
/// The id is removed from the queue whatever the outcome, even if the claim
/// already removed it.
pub(crate) async fn verify_user(
    registry: &UserRegistry,
    queue: &VerificationQueue,
    id: &UserId,
) -> VerificationOutcome {
    let outcome = {
        let mut users = registry.write().await;
        match users.get_mut(id) {
            Some(user) => {
                if user.verify() {
                    VerificationOutcome::Verified
                } else {
                    VerificationOutcome::AlreadyVerified
                }
            }
            None => VerificationOutcome::UnknownUser,
        }
    };
    queue.remove(id).await;
    outcome
}
