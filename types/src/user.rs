//! User identity and the mutable user record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Balance every freshly created user starts with.
pub const DEFAULT_INITIAL_BALANCE: i64 = 1000;

/// Opaque user identifier.
///
/// Generated as a random UUID v4 string on user creation, but any non-empty
/// string is accepted when referring to an existing user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Allocate a fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A ledger participant.
///
/// `balance` and `verified` are only mutated by scheduler workers; callers
/// see copies taken from the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub balance: i64,
    pub verified: bool,
}

impl User {
    /// A new, unverified user holding `initial_balance`.
    pub fn new(id: UserId, name: impl Into<String>, initial_balance: i64) -> Self {
        Self {
            id,
            name: name.into(),
            balance: initial_balance,
            verified: false,
        }
    }

    /// Mark the user verified. Returns `false` if it already was.
    ///
    /// Verification is monotonic: nothing resets the flag.
    pub fn verify(&mut self) -> bool {
        if self.verified {
            return false;
        }
        self.verified = true;
        true
    }
}
