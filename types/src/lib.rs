//! Shared domain types for the tally ledger pipeline.
//!
//! Defines the user record, pending transactions and their queue keys,
//! per-item processing outcomes, and the error enums shared by the node and
//! the RPC surface.

pub mod error;
pub mod outcome;
pub mod time;
pub mod transaction;
pub mod user;

pub use error::{ProcessingError, TallyError};
pub use outcome::{OutcomeKind, OutcomeRecord, TransactionOutcome, VerificationOutcome};
pub use time::Timestamp;
pub use transaction::{KeyMode, PendingTransaction, RequestId, TransactionKey};
pub use user::{User, UserId, DEFAULT_INITIAL_BALANCE};
