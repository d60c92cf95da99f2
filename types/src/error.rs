//! Error types shared across crates.

use thiserror::Error;

use crate::user::UserId;

/// Errors surfaced synchronously to callers of the ledger operations.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("invalid submission: {0}")]
    Validation(String),

    #[error("user not found: {0}")]
    UserNotFound(UserId),
}

/// Terminal failure of a claimed transaction inside a scheduler worker.
///
/// Never returned to a submitter; recorded in the outcome log only.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProcessingError {
    #[error("unknown party in transfer {sender} -> {receiver}")]
    UnknownParty { sender: UserId, receiver: UserId },

    #[error("receiver {0} is not verified")]
    ReceiverUnverified(UserId),

    #[error("sender {0} is not verified")]
    SenderUnverified(UserId),

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },
}
