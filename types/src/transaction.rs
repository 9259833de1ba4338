//! Submitted transaction identifiers and results.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of leading characters kept when a hash is shown to the user.
const SHORT_HASH_LEN: usize = 6;

/// Hash of a submitted transaction, as returned by the ledger (`0x`-hex).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(String);

impl TransactionHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Truncated form for notifications (`0x1a2b...`).
    pub fn short(&self) -> String {
        let prefix: String = self.0.chars().take(SHORT_HASH_LEN).collect();
        format!("{prefix}...")
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Final result of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransactionOutcome {
    Confirmed(TransactionHash),
    Failed(String),
}

impl TransactionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionOutcome::Confirmed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        let hash = TransactionHash::new("0xdeadbeefcafe");
        assert_eq!(hash.short(), "0xdead...");
        assert_eq!(TransactionHash::new("0x1").short(), "0x1...");
    }
}
