//! Participant state machine (SPEC_FULL §4.2): owns one [`BalanceStore`]
//! and a small in-memory transaction context guarded by a single
//! `parking_lot::Mutex`, since a participant services one RPC at a
//! time and this is the only place two connections could race.

pub mod inactivity;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::balance_store::BalanceStore;
use crate::common::{AccountId, Component, HealthStatus, Money, TxnId};
use crate::transaction::{Outcome, Phase};

pub use inactivity::ParticipantInactivityMonitor;

struct Context {
    phase: Phase,
    pending: Option<(TxnId, Money)>,
    rollback_snapshot: Option<(TxnId, Money)>,
    decision_log: HashMap<TxnId, (Outcome, bool)>,
    prev_txn: Option<TxnId>,
}

impl Context {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            pending: None,
            rollback_snapshot: None,
            decision_log: HashMap::new(),
            prev_txn: None,
        }
    }
}

/// What the inactivity monitor should recover, selected per SPEC_FULL
/// §4.3 step a.
pub struct RecoveryCandidate {
    pub txn_id: TxnId,
    pub local_phase: Phase,
}

pub struct Participant {
    account: AccountId,
    balance_store: BalanceStore,
    ctx: Mutex<Context>,
    simulation_case: AtomicU8,
    shutting_down: std::sync::Arc<AtomicBool>,
    last_activity: RwLock<Instant>,
}

impl Participant {
    pub fn new(account: impl Into<AccountId>, balance_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            account: account.into(),
            balance_store: BalanceStore::new(balance_path),
            ctx: Mutex::new(Context::new()),
            simulation_case: AtomicU8::new(0),
            shutting_down: std::sync::Arc::new(AtomicBool::new(false)),
            last_activity: RwLock::new(Instant::now()),
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Shared flag the accept loop in [`crate::network::server::serve`]
    /// watches to know when to stop taking new connections.
    pub fn shutdown_flag(&self) -> std::sync::Arc<AtomicBool> {
        self.shutting_down.clone()
    }

    /// Records that an RPC was just served; resets the inactivity
    /// clock the monitor in [`inactivity`] watches.
    pub fn touch(&self) {
        *self.last_activity.write() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.read().elapsed()
    }

    /// Writes `initial` unless the stored balance already equals it.
    /// Idempotent; does not touch transaction state.
    pub fn initialize_account(&self, initial: Money) -> bool {
        if self.balance_store.read() == Some(initial) {
            return true;
        }
        self.balance_store.write(initial)
    }

    pub fn get_balance(&self) -> Money {
        self.balance_store.read().unwrap_or(Money::ZERO)
    }

    pub fn simulation_case(&self, case: u8) -> bool {
        self.simulation_case.store(case, Ordering::SeqCst);
        true
    }

    /// SPEC_FULL §4.2 `prepare`.
    pub async fn prepare(&self, txn_id: TxnId, delta: Money) -> bool {
        {
            let mut ctx = self.ctx.lock();
            if ctx.decision_log.contains_key(&txn_id) {
                info!(account = %self.account, txn = %txn_id, "prepare for already-finalised txn rejected");
                return false;
            }
            match ctx.phase {
                Phase::Idle => {}
                Phase::Prepared => {
                    // Self-repair: restore from the orphaned prepare
                    // before considering this new request.
                    if let Some((_, before)) = ctx.rollback_snapshot.take() {
                        self.balance_store.write(before);
                    }
                    ctx.pending = None;
                    ctx.phase = Phase::Idle;
                }
                Phase::Committed | Phase::Aborted => {
                    warn!(account = %self.account, txn = %txn_id, "prepare arrived after finalisation");
                    return false;
                }
            }

            let current = self.balance_store.read();
            let Some(current) = current else {
                warn!(account = %self.account, txn = %txn_id, "prepare on missing balance");
                return false;
            };

            ctx.phase = Phase::Prepared;
            ctx.pending = Some((txn_id.clone(), delta));
            ctx.rollback_snapshot = Some((txn_id.clone(), current));

            if delta.is_negative() && delta.abs().cents() > current.cents() {
                info!(account = %self.account, txn = %txn_id, "insufficient funds, rejecting prepare");
                return false;
            }
        }

        if self.simulation_case.load(Ordering::SeqCst) == 1 {
            warn!(account = %self.account, txn = %txn_id, "simulation case 1: delaying prepare response");
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        info!(account = %self.account, txn = %txn_id, "prepared");
        true
    }

    /// SPEC_FULL §4.2 `commit`.
    pub async fn commit(&self, txn_id: TxnId) -> bool {
        if self.simulation_case.load(Ordering::SeqCst) == 2 {
            warn!(account = %self.account, txn = %txn_id, "simulation case 2: delaying commit response");
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut ctx = self.ctx.lock();
        let matches = matches!(&ctx.pending, Some((pending_id, _)) if *pending_id == txn_id);
        if ctx.phase != Phase::Prepared || !matches {
            return false;
        }

        let (_, delta) = ctx.pending.take().unwrap();
        let before = self.balance_store.read().unwrap_or(Money::ZERO);
        let after = before.checked_add(delta).unwrap_or(before);
        self.balance_store.write(after);

        ctx.decision_log.insert(txn_id.clone(), (Outcome::Committed, false));
        ctx.phase = Phase::Idle;
        ctx.prev_txn = Some(txn_id.clone());
        // rollback_snapshot is deliberately left in place: a coordinator
        // that later learns other participants failed to commit still
        // needs it to undo the delta just applied (roll_back_state).
        // The next prepare()/roll_back_state() for a different txn
        // supersedes it.

        info!(account = %self.account, txn = %txn_id, balance = %after, "committed");
        true
    }

    /// SPEC_FULL §4.2 `abort`.
    pub async fn abort(&self, txn_id: TxnId) -> bool {
        if self.simulation_case.load(Ordering::SeqCst) == 2 {
            warn!(account = %self.account, txn = %txn_id, "simulation case 2: delaying abort response");
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut ctx = self.ctx.lock();
        ctx.decision_log.insert(txn_id.clone(), (Outcome::Aborted, false));
        ctx.prev_txn = Some(txn_id.clone());

        let matches = matches!(&ctx.pending, Some((pending_id, _)) if *pending_id == txn_id);
        if ctx.phase == Phase::Prepared && matches {
            ctx.pending = None;
            ctx.rollback_snapshot = None;
            ctx.phase = Phase::Idle;
            info!(account = %self.account, txn = %txn_id, "aborted");
            true
        } else {
            false
        }
    }

    /// SPEC_FULL §4.2 `roll_back_state`.
    pub fn roll_back_state(&self, txn_id: &TxnId) -> bool {
        let mut ctx = self.ctx.lock();
        let matches = matches!(&ctx.rollback_snapshot, Some((snap_id, _)) if snap_id == txn_id);
        if !matches {
            return false;
        }
        let (_, before) = ctx.rollback_snapshot.take().unwrap();
        self.balance_store.write(before);
        ctx.pending = None;
        ctx.phase = Phase::Idle;
        info!(account = %self.account, txn = %txn_id, balance = %before, "rolled back");
        true
    }

    pub fn is_alive(&self) -> bool {
        !self.shutting_down.load(Ordering::SeqCst)
    }

    /// Selects the transaction the inactivity monitor should recover,
    /// per SPEC_FULL §4.3 step a.
    ///
    /// `pending` implies the live phase is `Prepared` (I1), so that
    /// case reads it directly. The `prev_txn` case, though, runs after
    /// `commit`/`abort` has already reset `phase` to `Idle` (I3), so
    /// the recovered phase has to come from the *logged* outcome
    /// rather than the live phase, or `Committed` is never
    /// recoverable.
    pub fn recovery_candidate(&self) -> Option<RecoveryCandidate> {
        let ctx = self.ctx.lock();
        if let Some((txn_id, _)) = &ctx.pending {
            return Some(RecoveryCandidate {
                txn_id: txn_id.clone(),
                local_phase: Phase::Prepared,
            });
        }
        if let Some(prev) = &ctx.prev_txn {
            if let Some((outcome, verified)) = ctx.decision_log.get(prev) {
                if !verified {
                    let local_phase = match outcome {
                        Outcome::Committed => Phase::Committed,
                        Outcome::Aborted => Phase::Aborted,
                    };
                    return Some(RecoveryCandidate {
                        txn_id: prev.clone(),
                        local_phase,
                    });
                }
            }
        }
        None
    }

    /// Applies the reconciliation table in SPEC_FULL §4.3 and marks
    /// the decision as verified. `local_phase` is the phase
    /// [`Participant::recovery_candidate`] selected the recovery on,
    /// not the live `ctx.phase` (which `commit`/`abort` may already
    /// have reset to `Idle` by the time this runs).
    pub async fn reconcile(&self, txn_id: TxnId, local_phase: Phase, coordinator_outcome: Outcome) {
        match (local_phase, coordinator_outcome) {
            (Phase::Prepared, Outcome::Committed) => {
                self.commit(txn_id.clone()).await;
            }
            (Phase::Prepared, Outcome::Aborted) => {
                self.abort(txn_id.clone()).await;
                self.roll_back_state(&txn_id);
            }
            (Phase::Committed, Outcome::Aborted) => {
                self.roll_back_state(&txn_id);
            }
            (Phase::Aborted, _) => {}
            _ => {}
        }

        let mut ctx = self.ctx.lock();
        ctx.decision_log
            .entry(txn_id)
            .and_modify(|(outcome, verified)| {
                *outcome = coordinator_outcome;
                *verified = true;
            })
            .or_insert((coordinator_outcome, true));
    }
}

impl Component for Participant {
    fn shutdown(&self) {
        info!(account = %self.account, "shutting down");
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    fn health_check(&self) -> HealthStatus {
        if self.shutting_down.load(Ordering::SeqCst) {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
        }
    }
}
