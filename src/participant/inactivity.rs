//! Participant inactivity monitor (SPEC_FULL §4.3): wakes when the
//! participant has been idle past `inactivity_threshold`, probes the
//! coordinator, and either shuts down (coordinator unreachable) or
//! runs recovery against it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::common::Component;
use crate::network::protocol::{CoordinatorRequest, CoordinatorResponse};
use crate::network::RpcClient;
use crate::transaction::Outcome;

use super::Participant;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

pub struct ParticipantInactivityMonitor {
    participant: Arc<Participant>,
    coordinator: RpcClient,
    threshold: Duration,
}

impl ParticipantInactivityMonitor {
    pub fn new(participant: Arc<Participant>, coordinator: RpcClient, threshold: Duration) -> Self {
        Self {
            participant,
            coordinator,
            threshold,
        }
    }

    /// Runs until the participant is marked unhealthy (shut down).
    pub async fn run(self) {
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if matches!(
                self.participant.health_check(),
                crate::common::HealthStatus::Unhealthy
            ) {
                return;
            }

            if self.participant.idle_for() < self.threshold {
                continue;
            }

            self.fire().await;

            if matches!(
                self.participant.health_check(),
                crate::common::HealthStatus::Unhealthy
            ) {
                return;
            }
        }
    }

    async fn fire(&self) {
        let account = self.participant.account().clone();

        let alive = self
            .coordinator
            .call::<CoordinatorRequest, CoordinatorResponse>(&CoordinatorRequest::IsAlive, PROBE_TIMEOUT)
            .await;

        if alive.is_err() {
            warn!(%account, "coordinator unreachable on inactivity probe, shutting down");
            self.participant.shutdown();
            return;
        }

        self.recover(&account).await;
        self.participant.touch();
    }

    async fn recover(&self, account: &str) {
        let Some(candidate) = self.participant.recovery_candidate() else {
            return;
        };

        info!(%account, txn = %candidate.txn_id, "running recovery against coordinator");

        let request = CoordinatorRequest::HandleRecoveringNode {
            txn_id: candidate.txn_id.clone(),
            account: account.to_string(),
        };

        let response = self
            .coordinator
            .call::<CoordinatorRequest, CoordinatorResponse>(&request, PROBE_TIMEOUT)
            .await;

        let outcome = match response {
            Ok(CoordinatorResponse::RecoveryResult(text)) if text == "COMMITTED" => Outcome::Committed,
            Ok(CoordinatorResponse::RecoveryResult(_)) => Outcome::Aborted,
            _ => {
                warn!(%account, txn = %candidate.txn_id, "recovery query failed, presuming abort");
                Outcome::Aborted
            }
        };

        self.participant
            .reconcile(candidate.txn_id, candidate.local_phase, outcome)
            .await;
    }
}
