//! Wire types for the two RPC surfaces this crate exposes (SPEC_FULL
//! §6): one request/response pair addressed to the coordinator, one
//! addressed to a participant. Each is encoded with `bincode` and
//! framed with a 4-byte big-endian length prefix by [`super::server`]
//! and [`super::client`].

use serde::{Deserialize, Serialize};

/// Requests a client (or the coordinator, acting as a client of a
/// participant) can send to the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum CoordinatorRequest {
    InitializeNode { account: String, balance_cents: i64 },
    SetSimulationCase { case: u8 },
    GetAccountBalance { account: String },
    ExecuteTransaction {
        txn_id: String,
        deltas: Vec<(String, i64)>,
    },
    HandleRecoveringNode { txn_id: String, account: String },
    IsAlive,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum CoordinatorResponse {
    Bool(bool),
    /// `None` stands in for the RPC surface's `number | false`.
    Balance(Option<i64>),
    SimulationCaseSet(Vec<(String, bool)>),
    TransactionResult(String),
    RecoveryResult(String),
    Ack,
}

/// Requests the coordinator (or a test harness) sends directly to a
/// participant.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum ParticipantRequest {
    InitializeAccount { balance_cents: i64 },
    SimulationCase { case: u8 },
    GetBalance,
    Prepare { txn_id: String, delta_cents: i64 },
    Commit { txn_id: String },
    Abort { txn_id: String },
    RollBackState { txn_id: String },
    IsAlive,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub enum ParticipantResponse {
    Bool(bool),
    Balance(i64),
    Ack(String),
}
