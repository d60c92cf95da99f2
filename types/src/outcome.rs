//! Per-item processing results produced by the scheduler workers.

use serde::{Deserialize, Serialize};

use crate::error::ProcessingError;
use crate::transaction::{RequestId, TransactionKey};
use crate::user::UserId;

/// How a claimed transaction ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    /// Funds moved from sender to receiver.
    Completed,
    /// Sender or receiver is not registered.
    UnknownParty,
    /// Receiver not yet verified; receiver re-queued for verification.
    ReceiverUnverified,
    /// Sender not yet verified; sender re-queued for verification.
    SenderUnverified,
    /// Sender balance would go negative.
    InsufficientFunds,
}

impl TransactionOutcome {
    pub const ALL: [TransactionOutcome; 5] = [
        Self::Completed,
        Self::UnknownParty,
        Self::ReceiverUnverified,
        Self::SenderUnverified,
        Self::InsufficientFunds,
    ];

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::UnknownParty => "unknown_party",
            Self::ReceiverUnverified => "receiver_unverified",
            Self::SenderUnverified => "sender_unverified",
            Self::InsufficientFunds => "insufficient_funds",
        }
    }
}

impl From<&ProcessingError> for TransactionOutcome {
    fn from(err: &ProcessingError) -> Self {
        match err {
            ProcessingError::UnknownParty { .. } => Self::UnknownParty,
            ProcessingError::ReceiverUnverified(_) => Self::ReceiverUnverified,
            ProcessingError::SenderUnverified(_) => Self::SenderUnverified,
            ProcessingError::InsufficientFunds { .. } => Self::InsufficientFunds,
        }
    }
}

/// How a claimed verification ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified,
    /// The user was already verified; nothing changed.
    AlreadyVerified,
    /// No user exists for the claimed id; the id was dropped.
    UnknownUser,
}

impl VerificationOutcome {
    pub const ALL: [VerificationOutcome; 3] =
        [Self::Verified, Self::AlreadyVerified, Self::UnknownUser];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::AlreadyVerified => "already_verified",
            Self::UnknownUser => "unknown_user",
        }
    }
}

/// What a single outcome record describes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutcomeKind {
    Transaction {
        request_id: RequestId,
        key: TransactionKey,
        sender: UserId,
        receiver: UserId,
        amount: i64,
        outcome: TransactionOutcome,
        /// Human-readable failure reason, absent on completion.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Verification {
        user: UserId,
        outcome: VerificationOutcome,
    },
}

/// One entry in the outcome log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    /// Monotonically increasing per log.
    pub sequence: u64,
    pub at_ms: u64,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl OutcomeRecord {
    /// The request id, for transaction records.
    pub fn request_id(&self) -> Option<RequestId> {
        match &self.kind {
            OutcomeKind::Transaction { request_id, .. } => Some(*request_id),
            OutcomeKind::Verification { .. } => None,
        }
    }
}
