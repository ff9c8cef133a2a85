//! Transaction-subsystem error types.
//!
//! Each variant captures the error kinds SPEC_FULL §7 enumerates:
//! transport failures the coordinator treats as a negative vote,
//! participant-side rejections, and the state-mismatch conditions a
//! participant can hit when a stale or duplicate RPC arrives.

use thiserror::Error;

use crate::common::TxnId;

pub type TransactionResult<T> = std::result::Result<T, TransactionError>;

#[derive(Debug, Error)]
pub enum TransactionError {
    /// An outbound RPC call did not complete within its timeout.
    #[error("call to participant '{account}' for txn {txn_id} timed out")]
    TransportTimeout { txn_id: TxnId, account: String },

    /// The RPC layer reported a connection/transport failure.
    #[error("transport error calling participant '{account}' for txn {txn_id}: {reason}")]
    TransportError {
        txn_id: TxnId,
        account: String,
        reason: String,
    },

    /// A participant returned `false` to `prepare`.
    #[error("participant '{account}' rejected prepare for txn {txn_id}")]
    ParticipantReject { txn_id: TxnId, account: String },

    /// `execute_transaction` was called while the coordinator is
    /// shutting down.
    #[error("coordinator is shutting down, no new transactions are accepted")]
    CoordinatorShuttingDown,

    /// The balance file for an account could not be read.
    #[error("account '{0}' balance is missing")]
    AccountMissing(String),

    /// A negative delta exceeded the current balance.
    #[error("insufficient funds for account '{account}': balance {balance}, delta {delta}")]
    InsufficientFunds {
        account: String,
        balance: String,
        delta: String,
    },

    /// `commit`/`abort`/`roll_back_state` was called against a
    /// context that does not match (wrong phase or wrong pending
    /// txn_id).
    #[error("txn {0} does not match this participant's current state")]
    StateMismatch(TxnId),

    /// `roll_back_state` was called but no rollback snapshot exists
    /// for the given txn_id.
    #[error("no rollback snapshot recorded for txn {0}")]
    RollbackMissing(TxnId),

    /// The account named in a request is not one this coordinator
    /// knows how to route.
    #[error("unknown account '{0}'")]
    UnknownAccount(String),
}
