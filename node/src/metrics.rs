//! Prometheus metrics for the tally pipeline.
//!
//! [`PipelineMetrics`] owns a dedicated [`Registry`]; the HTTP `/metrics`
//! endpoint encodes it into the Prometheus text exposition format.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, HistogramOpts,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use tally_types::{TransactionOutcome, VerificationOutcome};

/// Central collection of pipeline metrics.
pub struct PipelineMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    pub users_created: IntCounter,
    pub transactions_submitted: IntCounter,
    /// Submissions that overwrote a still-queued transaction with the same key.
    pub transactions_replaced: IntCounter,
    /// Claimed transactions by outcome label.
    pub transaction_outcomes: IntCounterVec,
    /// Claimed verifications by outcome label.
    pub verification_outcomes: IntCounterVec,
    /// Ticks run, by scheduler label.
    pub ticks: IntCounterVec,
    /// Workers that found nothing to claim, by scheduler label.
    pub idle_workers: IntCounterVec,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub verification_queue_depth: IntGauge,
    pub transaction_queue_depth: IntGauge,
    pub user_count: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of one tick, by scheduler label.
    pub tick_duration_ms: HistogramVec,
}

impl PipelineMetrics {
    /// Create a fresh set of metrics registered under a new [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        let users_created = register_int_counter_with_registry!(
            Opts::new("tally_users_created_total", "Total users created"),
            registry
        )
        .expect("failed to register users_created counter");

        let transactions_submitted = register_int_counter_with_registry!(
            Opts::new(
                "tally_transactions_submitted_total",
                "Total transactions accepted for processing"
            ),
            registry
        )
        .expect("failed to register transactions_submitted counter");

        let transactions_replaced = register_int_counter_with_registry!(
            Opts::new(
                "tally_transactions_replaced_total",
                "Queued transactions overwritten by a later submission for the same key"
            ),
            registry
        )
        .expect("failed to register transactions_replaced counter");

        let transaction_outcomes = register_int_counter_vec_with_registry!(
            Opts::new(
                "tally_transaction_outcomes_total",
                "Claimed transactions by outcome"
            ),
            &["outcome"],
            registry
        )
        .expect("failed to register transaction_outcomes counter");

        let verification_outcomes = register_int_counter_vec_with_registry!(
            Opts::new(
                "tally_verification_outcomes_total",
                "Claimed verifications by outcome"
            ),
            &["outcome"],
            registry
        )
        .expect("failed to register verification_outcomes counter");

        let ticks = register_int_counter_vec_with_registry!(
            Opts::new("tally_scheduler_ticks_total", "Scheduler ticks run"),
            &["scheduler"],
            registry
        )
        .expect("failed to register ticks counter");

        let idle_workers = register_int_counter_vec_with_registry!(
            Opts::new(
                "tally_scheduler_idle_workers_total",
                "Workers that exited without claiming an item"
            ),
            &["scheduler"],
            registry
        )
        .expect("failed to register idle_workers counter");

        let verification_queue_depth = register_int_gauge_with_registry!(
            Opts::new(
                "tally_verification_queue_depth",
                "User ids awaiting verification"
            ),
            registry
        )
        .expect("failed to register verification_queue_depth gauge");

        let transaction_queue_depth = register_int_gauge_with_registry!(
            Opts::new(
                "tally_transaction_queue_depth",
                "Transactions awaiting processing"
            ),
            registry
        )
        .expect("failed to register transaction_queue_depth gauge");

        let user_count = register_int_gauge_with_registry!(
            Opts::new("tally_user_count", "Registered users"),
            registry
        )
        .expect("failed to register user_count gauge");

        // 0.1 ms → ~1.6 s
        let tick_duration_ms = register_histogram_vec_with_registry!(
            HistogramOpts::new("tally_tick_duration_ms", "Scheduler tick duration in milliseconds")
                .buckets(prometheus::exponential_buckets(0.1, 2.0, 15).unwrap_or_default()),
            &["scheduler"],
            registry
        )
        .expect("failed to register tick_duration_ms histogram");

        // Pre-create every label so all series show up at zero.
        for outcome in TransactionOutcome::ALL {
            transaction_outcomes.with_label_values(&[outcome.as_str()]);
        }
        for outcome in VerificationOutcome::ALL {
            verification_outcomes.with_label_values(&[outcome.as_str()]);
        }

        Self {
            registry,
            users_created,
            transactions_submitted,
            transactions_replaced,
            transaction_outcomes,
            verification_outcomes,
            ticks,
            idle_workers,
            verification_queue_depth,
            transaction_queue_depth,
            user_count,
            tick_duration_ms,
        }
    }

    pub fn record_transaction_outcome(&self, outcome: TransactionOutcome) {
        self.transaction_outcomes
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_verification_outcome(&self, outcome: VerificationOutcome) {
        self.verification_outcomes
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_tick(&self, scheduler: &str, idle: usize, elapsed_ms: f64) {
        self.ticks.with_label_values(&[scheduler]).inc();
        self.idle_workers
            .with_label_values(&[scheduler])
            .inc_by(idle as u64);
        self.tick_duration_ms
            .with_label_values(&[scheduler])
            .observe(elapsed_ms);
    }

    /// Encode every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
