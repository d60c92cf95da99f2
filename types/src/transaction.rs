//! Pending transfers and the keys they are queued under.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::user::UserId;
use crate::TallyError;

/// Unique identity of one submission, independent of its queue key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(uuid::Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TallyError::Validation(format!("invalid request id {s:?}: {e}")))
    }
}

/// How pending transactions are keyed in the transaction queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMode {
    /// `sender-receiver`: a later submission for the same ordered pair
    /// replaces the earlier one while it is still queued.
    #[default]
    Pair,
    /// The submission's request id: every submission is queued separately.
    Request,
}

/// Key of an entry in the transaction queue.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionKey(String);

impl TransactionKey {
    /// `sender + "-" + receiver`.
    pub fn for_pair(sender: &UserId, receiver: &UserId) -> Self {
        Self(format!("{sender}-{receiver}"))
    }

    pub fn for_request(request_id: &RequestId) -> Self {
        Self(request_id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A transfer waiting for the transaction scheduler.
///
/// `amount` is deliberately not checked for sign or zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub request_id: RequestId,
    pub sender: UserId,
    pub receiver: UserId,
    pub amount: i64,
    pub submitted_at_ms: u64,
}

impl PendingTransaction {
    /// Build a pending transaction, rejecting blank party identifiers.
    pub fn new(
        sender: UserId,
        receiver: UserId,
        amount: i64,
        submitted_at_ms: u64,
    ) -> Result<Self, TallyError> {
        if sender.is_blank() {
            return Err(TallyError::Validation("sender_id must not be empty".into()));
        }
        if receiver.is_blank() {
            return Err(TallyError::Validation(
                "receiver_id must not be empty".into(),
            ));
        }
        Ok(Self {
            request_id: RequestId::generate(),
            sender,
            receiver,
            amount,
            submitted_at_ms,
        })
    }

    /// The key this transaction is queued under for the given mode.
    pub fn key(&self, mode: KeyMode) -> TransactionKey {
        match mode {
            KeyMode::Pair => TransactionKey::for_pair(&self.sender, &self.receiver),
            KeyMode::Request => TransactionKey::for_request(&self.request_id),
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.sender == self.receiver
    }
}
