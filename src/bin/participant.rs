//! Participant process entry point: loads `ParticipantConfig`, starts
//! the inactivity monitor, and serves the participant RPC surface
//! until shut down.

use std::env;
use std::sync::Arc;

use rustydb_2pc::common::{Component, Money};
use rustydb_2pc::config::{self, ParticipantConfig};
use rustydb_2pc::network::protocol::{ParticipantRequest, ParticipantResponse};
use rustydb_2pc::network::server::serve;
use rustydb_2pc::network::RpcClient;
use rustydb_2pc::participant::{Participant, ParticipantInactivityMonitor};
use rustydb_2pc::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = env::args().nth(1).map(std::path::PathBuf::from);
    let cfg: ParticipantConfig = config::load_or_default(config_path.as_deref())?;

    tracing::info!(account = %cfg.account, addr = %cfg.addr(), "starting participant");

    let participant = Arc::new(Participant::new(cfg.account.clone(), cfg.balance_file.clone()));

    let coordinator_client = RpcClient::new(cfg.coordinator_addr());
    let monitor = ParticipantInactivityMonitor::new(
        participant.clone(),
        coordinator_client,
        cfg.inactivity_threshold(),
    );
    let monitor_handle = tokio::spawn(monitor.run());

    let shutdown_flag = participant.shutdown_flag();
    let addr = cfg.addr();
    let handler_participant = participant.clone();

    let result = serve(&addr, shutdown_flag, move |request: ParticipantRequest| {
        let participant = handler_participant.clone();
        async move { handle(&participant, request).await }
    })
    .await;

    participant.shutdown();
    if let Err(e) = monitor_handle.await {
        tracing::warn!(error = %e, "inactivity monitor task panicked");
    }
    result
}

async fn handle(participant: &Participant, request: ParticipantRequest) -> ParticipantResponse {
    participant.touch();
    match request {
        ParticipantRequest::InitializeAccount { balance_cents } => {
            ParticipantResponse::Bool(participant.initialize_account(Money::from_cents(balance_cents)))
        }
        ParticipantRequest::SimulationCase { case } => {
            ParticipantResponse::Bool(participant.simulation_case(case))
        }
        ParticipantRequest::GetBalance => ParticipantResponse::Balance(participant.get_balance().cents()),
        ParticipantRequest::Prepare { txn_id, delta_cents } => {
            ParticipantResponse::Bool(participant.prepare(txn_id, Money::from_cents(delta_cents)).await)
        }
        ParticipantRequest::Commit { txn_id } => ParticipantResponse::Bool(participant.commit(txn_id).await),
        ParticipantRequest::Abort { txn_id } => ParticipantResponse::Bool(participant.abort(txn_id).await),
        ParticipantRequest::RollBackState { txn_id } => {
            ParticipantResponse::Bool(participant.roll_back_state(&txn_id))
        }
        ParticipantRequest::IsAlive => ParticipantResponse::Bool(participant.is_alive()),
        ParticipantRequest::Shutdown => {
            participant.shutdown();
            ParticipantResponse::Ack("Shutdown initiated".to_string())
        }
    }
}
