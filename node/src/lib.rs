//! Tally ledger node: owns the user registry and runs the pipeline.
//!
//! The node:
//! - Registers users and queues them for verification
//! - Accepts transfer requests into the transaction queue
//! - Runs the verification and transaction schedulers on fixed intervals
//! - Records every per-item outcome in a bounded, subscribable log

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod outcome_log;
pub mod registry;
pub mod shutdown;
pub mod tracing_spans;
pub mod transaction_queue;
pub mod transaction_scheduler;
pub mod verification_queue;
pub mod verification_scheduler;
pub mod worker_pool;

pub use config::{ClaimPolicy, NodeConfig, SchedulerConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::PipelineMetrics;
pub use node::{LedgerNode, QueueDepths, SubmissionReceipt};
pub use outcome_log::OutcomeLog;
pub use registry::UserRegistry;
pub use shutdown::ShutdownController;
pub use transaction_queue::TransactionQueue;
pub use transaction_scheduler::TransactionScheduler;
pub use verification_queue::VerificationQueue;
pub use verification_scheduler::VerificationScheduler;
pub use worker_pool::{ClaimQueue, TickReport};
