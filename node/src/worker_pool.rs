//! Per-tick worker dispatch shared by both schedulers.
//!
//! A tick spawns a fixed number of workers. Each worker handles at most one
//! item and then exits; how items reach the workers depends on the
//! [`ClaimPolicy`]:
//!
//! - `Guaranteed`: the dispatcher removes up to `workers` items from the queue
//!   under its lock, pre-loads them into a closed channel, and each worker
//!   receives at most one. Nothing claimed is ever lost.
//! - `BestEffort`: a feeder task streams a snapshot of the queue through a
//!   one-slot channel while each worker makes a single `try_recv`. A worker
//!   that sees the channel empty exits, even if the feeder has more to send.
//!   The queue itself is left untouched; the handler decides what to remove.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::config::ClaimPolicy;

/// A shared queue that scheduler workers claim items from.
pub trait ClaimQueue: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Atomically remove and return up to `max` items.
    fn claim_up_to(&self, max: usize) -> impl Future<Output = Vec<Self::Item>> + Send;

    /// Copy every queued item without removing anything.
    fn peek_all(&self) -> impl Future<Output = Vec<Self::Item>> + Send;
}

/// What one tick's workers did.
#[derive(Debug)]
pub struct TickReport<R> {
    /// One entry per worker that handled an item.
    pub results: Vec<R>,
    /// Workers that exited without an item.
    pub idle_workers: usize,
}

impl<R> TickReport<R> {
    pub fn processed(&self) -> usize {
        self.results.len()
    }
}

/// Run one tick: spawn `workers` workers and hand each at most one item.
///
/// `handler` receives the worker index and the item; `None` results (the
/// handler decided the item was stale) count as neither processed nor idle.
pub async fn dispatch<Q, H, Fut, R>(
    queue: &Arc<Q>,
    policy: ClaimPolicy,
    workers: usize,
    handler: H,
) -> TickReport<R>
where
    Q: ClaimQueue,
    H: Fn(usize, Q::Item) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Option<R>> + Send + 'static,
    R: Send + 'static,
{
    let (rx, feeder) = match policy {
        ClaimPolicy::Guaranteed => {
            let claimed = queue.claim_up_to(workers).await;
            let (tx, rx) = mpsc::channel(workers.max(1));
            for item in claimed {
                if tx.try_send(item).is_err() {
                    // capacity equals the claim limit
                    tracing::error!("claim channel rejected a claimed item");
                }
            }
            (rx, None)
        }
        ClaimPolicy::BestEffort => {
            let snapshot = queue.peek_all().await;
            let (tx, rx) = mpsc::channel(1);
            let feeder = tokio::spawn(async move {
                for item in snapshot {
                    if tx.send(item).await.is_err() {
                        break;
                    }
                }
            });
            (rx, Some(feeder))
        }
    };

    let rx = Arc::new(Mutex::new(rx));
    let mut handles: Vec<JoinHandle<WorkerResult<R>>> = Vec::with_capacity(workers);
    for worker in 0..workers {
        let rx = Arc::clone(&rx);
        let handler = handler.clone();
        handles.push(tokio::spawn(async move {
            let claimed = match policy {
                ClaimPolicy::Guaranteed => rx.lock().await.recv().await,
                ClaimPolicy::BestEffort => rx.lock().await.try_recv().ok(),
            };
            match claimed {
                Some(item) => match handler(worker, item).await {
                    Some(result) => WorkerResult::Handled(result),
                    None => WorkerResult::Skipped,
                },
                None => WorkerResult::Idle,
            }
        }));
    }
    drop(rx);

    let mut report = TickReport {
        results: Vec::new(),
        idle_workers: 0,
    };
    for handle in handles {
        match handle.await {
            Ok(WorkerResult::Handled(result)) => report.results.push(result),
            Ok(WorkerResult::Idle) => report.idle_workers += 1,
            Ok(WorkerResult::Skipped) => {}
            Err(e) => tracing::error!(error = %e, "scheduler worker failed"),
        }
    }

    // Every receiver is gone now, so a blocked feeder wakes with a send error.
    if let Some(feeder) = feeder {
        if let Err(e) = feeder.await {
            tracing::error!(error = %e, "queue feeder failed");
        }
    }

    report
}

enum WorkerResult<R> {
    Handled(R),
    Skipped,
    Idle,
}

/// Call `tick` every `period` until shutdown is signalled.
///
/// The first tick fires one full period after start. Ticks that fall behind
/// are caught up rather than skipped.
pub async fn run_every<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut tick: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = interval_at(Instant::now() + period, period);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => {
                tracing::info!(scheduler = name, "scheduler shutting down");
                break;
            }
            _ = interval.tick() => {
                tick().await;
            }
        }
    }
}
