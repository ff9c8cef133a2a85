//! The coordinator (SPEC_FULL §4.4, §4.5): routes accounts to
//! participant endpoints, runs 2PC per transaction with a per-call
//! timeout at each phase, and maintains the decision log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::common::{AccountId, Component, HealthStatus, Money, TxnId};
use crate::network::protocol::{ParticipantRequest, ParticipantResponse};
use crate::network::{ClientError, RpcClient};

use super::error::{TransactionError, TransactionResult};
use super::Outcome;

pub struct Coordinator {
    participants: DashMap<AccountId, RpcClient>,
    decision_log: DashMap<TxnId, Outcome>,
    shutting_down: Arc<AtomicBool>,
    last_activity: RwLock<Instant>,
    prepare_timeout: Duration,
    commit_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        participants: impl IntoIterator<Item = (AccountId, String)>,
        prepare_timeout: Duration,
        commit_timeout: Duration,
    ) -> Self {
        let map = DashMap::new();
        for (account, addr) in participants {
            map.insert(account, RpcClient::new(addr));
        }
        Self {
            participants: map,
            decision_log: DashMap::new(),
            shutting_down: Arc::new(AtomicBool::new(false)),
            last_activity: RwLock::new(Instant::now()),
            prepare_timeout,
            commit_timeout,
        }
    }

    /// Shared flag the accept loop in [`crate::network::server::serve`]
    /// watches to know when to stop taking new connections.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutting_down.clone()
    }

    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    async fn call_participant(
        &self,
        txn_id: &str,
        account: &str,
        request: ParticipantRequest,
        call_timeout: Duration,
    ) -> TransactionResult<ParticipantResponse> {
        let client = self
            .participants
            .get(account)
            .ok_or_else(|| TransactionError::UnknownAccount(account.to_string()))?
            .clone();
        client
            .call::<ParticipantRequest, ParticipantResponse>(&request, call_timeout)
            .await
            .map_err(|e| match e {
                ClientError::Timeout => TransactionError::TransportTimeout {
                    txn_id: txn_id.to_string(),
                    account: account.to_string(),
                },
                ClientError::Transport(reason) => TransactionError::TransportError {
                    txn_id: txn_id.to_string(),
                    account: account.to_string(),
                    reason,
                },
            })
    }

    /// RPC: `initialize_node`.
    pub async fn initialize_node(&self, account: &str, balance: Money) -> bool {
        let request = ParticipantRequest::InitializeAccount {
            balance_cents: balance.cents(),
        };
        matches!(
            self.call_participant("init", account, request, self.prepare_timeout).await,
            Ok(ParticipantResponse::Bool(true))
        )
    }

    /// RPC: `set_simulation_case`.
    pub async fn set_simulation_case(&self, case: u8) -> Vec<(AccountId, bool)> {
        let accounts: Vec<AccountId> = self.participants.iter().map(|e| e.key().clone()).collect();
        let mut results = Vec::with_capacity(accounts.len());
        for account in accounts {
            let request = ParticipantRequest::SimulationCase { case };
            let ok = matches!(
                self.call_participant("sim", &account, request, self.prepare_timeout).await,
                Ok(ParticipantResponse::Bool(true))
            );
            results.push((account, ok));
        }
        results
    }

    /// RPC: `get_account_balance`.
    pub async fn get_account_balance(&self, account: &str) -> Option<Money> {
        match self
            .call_participant("balance", account, ParticipantRequest::GetBalance, self.prepare_timeout)
            .await
        {
            Ok(ParticipantResponse::Balance(cents)) => Some(Money::from_cents(cents)),
            _ => None,
        }
    }

    /// RPC: `execute_transaction` (SPEC_FULL §4.4).
    ///
    /// Accounts are processed in the order given in `deltas`, which
    /// the caller is expected to supply deterministically; each call
    /// carries its own timeout so a stuck participant cannot stall
    /// its peers indefinitely.
    pub async fn execute_transaction(&self, txn_id: TxnId, deltas: Vec<(AccountId, Money)>) -> String {
        if self.is_shutting_down() {
            return "Coordinator is shutting down. No new transactions are accepted.".to_string();
        }
        self.touch();

        let mut prepared = Vec::with_capacity(deltas.len());
        let mut all_prepared = true;

        for (account, delta) in &deltas {
            let request = ParticipantRequest::Prepare {
                txn_id: txn_id.clone(),
                delta_cents: delta.cents(),
            };
            match self.call_participant(&txn_id, account, request, self.prepare_timeout).await {
                Ok(ParticipantResponse::Bool(true)) => prepared.push(account.clone()),
                Ok(_) => {
                    info!(txn = %txn_id, %account, "participant rejected prepare");
                    all_prepared = false;
                }
                Err(e) => {
                    warn!(txn = %txn_id, %account, error = %e, "prepare call failed");
                    all_prepared = false;
                }
            }
        }

        if !all_prepared {
            for account in &prepared {
                let request = ParticipantRequest::Abort { txn_id: txn_id.clone() };
                let _ = self.call_participant(&txn_id, account, request, self.prepare_timeout).await;
            }
            self.decision_log.insert(txn_id.clone(), Outcome::Aborted);
            info!(txn = %txn_id, "transaction aborted in prepare phase");
            return Outcome::Aborted.as_transaction_result().to_string();
        }

        let mut committed = Vec::with_capacity(deltas.len());
        let mut all_committed = true;

        for (account, _) in &deltas {
            let request = ParticipantRequest::Commit { txn_id: txn_id.clone() };
            match self.call_participant(&txn_id, account, request, self.commit_timeout).await {
                Ok(ParticipantResponse::Bool(true)) => committed.push(account.clone()),
                Ok(_) => {
                    warn!(txn = %txn_id, %account, "participant rejected commit");
                    all_committed = false;
                }
                Err(e) => {
                    warn!(txn = %txn_id, %account, error = %e, "commit call failed");
                    all_committed = false;
                }
            }
        }

        if !all_committed {
            for account in &committed {
                let request = ParticipantRequest::RollBackState { txn_id: txn_id.clone() };
                let _ = self.call_participant(&txn_id, account, request, self.commit_timeout).await;
            }
            self.decision_log.insert(txn_id.clone(), Outcome::Aborted);
            info!(txn = %txn_id, "transaction aborted in commit phase, rolled back committed participants");
            return Outcome::Aborted.as_transaction_result().to_string();
        }

        self.decision_log.insert(txn_id.clone(), Outcome::Committed);
        info!(txn = %txn_id, "transaction committed");
        Outcome::Committed.as_transaction_result().to_string()
    }

    /// RPC: `handle_recovering_node`. Pure lookup; presumed-abort if
    /// the decision log has no entry for `txn_id`.
    pub fn handle_recovering_node(&self, txn_id: &str, account: &str) -> String {
        let outcome = self
            .decision_log
            .get(txn_id)
            .map(|entry| *entry.value())
            .unwrap_or(Outcome::Aborted);
        info!(txn = %txn_id, %account, %outcome, "recovery query answered");
        outcome.as_recovery_result().to_string()
    }

    /// RPC: `is_alive`.
    pub fn is_alive(&self) -> bool {
        true
    }

    /// RPC: `shutdown`. Stops accepting new `execute_transaction`
    /// calls, then fans `Shutdown` out to every known participant on a
    /// best-effort basis (SPEC_FULL §4.4) so they stop accepting work
    /// too instead of waiting out their own inactivity threshold.
    /// Draining any in-flight RPC connection is [`crate::network::server::serve`]'s
    /// job, not the coordinator's; this call only sets the flag that
    /// tells that accept loop to stop and notifies peers.
    pub async fn shutdown(&self) {
        self.shutdown_flag_only();

        let accounts: Vec<AccountId> = self.participants.iter().map(|e| e.key().clone()).collect();
        for account in accounts {
            let request = ParticipantRequest::Shutdown;
            match self.call_participant("shutdown", &account, request, self.commit_timeout).await {
                Ok(_) => info!(%account, "notified participant of coordinator shutdown"),
                Err(e) => warn!(%account, error = %e, "failed to notify participant of shutdown"),
            }
        }
    }

    fn shutdown_flag_only(&self) {
        info!("coordinator shutting down");
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}

impl Component for Coordinator {
    fn shutdown(&self) {
        self.shutdown_flag_only();
    }

    fn health_check(&self) -> HealthStatus {
        if self.is_shutting_down() {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Background task sampling `last_activity`; past `threshold` idle
/// time it shuts the coordinator down (SPEC_FULL §4.5).
pub struct CoordinatorInactivityMonitor {
    coordinator: Arc<Coordinator>,
    threshold: Duration,
}

impl CoordinatorInactivityMonitor {
    pub fn new(coordinator: Arc<Coordinator>, threshold: Duration) -> Self {
        Self { coordinator, threshold }
    }

    pub async fn run(self) {
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;

            if self.coordinator.is_shutting_down() {
                return;
            }

            if self.coordinator.idle_for() > self.threshold {
                info!("coordinator inactivity threshold exceeded");
                self.coordinator.shutdown().await;
                return;
            }
        }
    }
}
