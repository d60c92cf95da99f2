//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use tally_types::{KeyMode, DEFAULT_INITIAL_BALANCE};

use crate::NodeError;

/// Upper bound on workers per tick; each tick spawns this many tasks.
pub const MAX_WORKERS: usize = 1024;

/// How a scheduler tick hands queued items to its workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimPolicy {
    /// A dispatcher claims up to `workers` items under the queue lock and
    /// hands each worker at most one. Every tick processes
    /// `min(workers, pending)` items.
    #[default]
    Guaranteed,
    /// A feeder streams a snapshot of the queue while workers make a single
    /// non-blocking receive; a worker that finds nothing exits. Items missed
    /// this way stay queued, but nothing guarantees a later tick claims them.
    BestEffort,
}

impl ClaimPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Guaranteed => "guaranteed",
            Self::BestEffort => "best_effort",
        }
    }
}

/// Period and pool size for one scheduler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between ticks.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Workers spawned per tick.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl SchedulerConfig {
    pub fn new(interval_ms: u64, workers: usize) -> Self {
        Self {
            interval_ms,
            workers,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            workers: default_workers(),
        }
    }
}

/// Configuration for a tally node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Verification scheduler settings.
    #[serde(default)]
    pub verification: SchedulerConfig,

    /// Transaction scheduler settings.
    #[serde(default)]
    pub transaction: SchedulerConfig,

    /// Claim policy shared by both schedulers.
    #[serde(default)]
    pub claim_policy: ClaimPolicy,

    /// How pending transactions are keyed.
    #[serde(default)]
    pub key_mode: KeyMode,

    /// Balance assigned to newly created users.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: i64,

    /// Number of outcome records retained.
    #[serde(default = "default_outcome_log_capacity")]
    pub outcome_log_capacity: usize,

    /// Address the HTTP surface binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to expose the Prometheus `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_interval_ms() -> u64 {
    10_000
}

fn default_workers() -> usize {
    1
}

fn default_initial_balance() -> i64 {
    DEFAULT_INITIAL_BALANCE
}

fn default_outcome_log_capacity() -> usize {
    1024
}

fn default_listen_addr() -> String {
    "0.0.0.0:3500".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the schedulers cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        for (name, sched) in [
            ("verification", &self.verification),
            ("transaction", &self.transaction),
        ] {
            if sched.workers == 0 {
                return Err(NodeError::Config(format!(
                    "{name}.workers must be at least 1"
                )));
            }
            if sched.workers > MAX_WORKERS {
                return Err(NodeError::Config(format!(
                    "{name}.workers must be at most {MAX_WORKERS}"
                )));
            }
            if sched.interval_ms == 0 {
                return Err(NodeError::Config(format!(
                    "{name}.interval_ms must be greater than 0"
                )));
            }
        }
        if self.outcome_log_capacity == 0 {
            return Err(NodeError::Config(
                "outcome_log_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            verification: SchedulerConfig::default(),
            transaction: SchedulerConfig::default(),
            claim_policy: ClaimPolicy::default(),
            key_mode: KeyMode::default(),
            initial_balance: default_initial_balance(),
            outcome_log_capacity: default_outcome_log_capacity(),
            listen_addr: default_listen_addr(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: default_true(),
        }
    }
}
