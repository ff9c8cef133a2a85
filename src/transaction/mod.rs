//! Two-phase commit types shared between the coordinator and the
//! participant: the transaction outcome, a participant's phase, and
//! the error types in [`error`].

pub mod coordinator;
pub mod error;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use coordinator::{Coordinator, CoordinatorInactivityMonitor};
pub use error::{TransactionError, TransactionResult};

/// Final disposition of a transaction, written once per `txn_id` to
/// the coordinator's decision log and to a participant's
/// `decision_log` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum Outcome {
    Committed,
    Aborted,
}

impl Outcome {
    /// The exact string `execute_transaction` returns to the caller
    /// for this outcome.
    pub fn as_transaction_result(self) -> &'static str {
        match self {
            Outcome::Committed => "Transaction Committed",
            Outcome::Aborted => "Transaction Aborted",
        }
    }

    /// The exact string `handle_recovering_node` returns for this
    /// outcome.
    pub fn as_recovery_result(self) -> &'static str {
        match self {
            Outcome::Committed => "COMMITTED",
            Outcome::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_recovery_result())
    }
}

/// A participant's 2PC phase for its single outstanding transaction
/// slot (SPEC_FULL §3: at most one PREPARED transaction at a time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Prepared,
    Committed,
    Aborted,
}
