//! Coordinator process entry point: loads `CoordinatorConfig`, starts
//! the inactivity monitor, and serves the coordinator RPC surface
//! until shut down.

use std::env;
use std::sync::Arc;

use rustydb_2pc::common::Money;
use rustydb_2pc::config::{self, CoordinatorConfig};
use rustydb_2pc::network::protocol::{CoordinatorRequest, CoordinatorResponse};
use rustydb_2pc::network::server::serve;
use rustydb_2pc::transaction::{Coordinator, CoordinatorInactivityMonitor};
use rustydb_2pc::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config_path = env::args().nth(1).map(std::path::PathBuf::from);
    let cfg: CoordinatorConfig = config::load_or_default(config_path.as_deref())?;

    tracing::info!(
        addr = %cfg.addr(),
        participants = cfg.participants.len(),
        "starting coordinator"
    );

    let participants = cfg
        .participants
        .iter()
        .map(|p| (p.account.clone(), format!("{}:{}", p.host, p.port)));
    let coordinator = Arc::new(Coordinator::new(
        participants,
        cfg.prepare_timeout(),
        cfg.commit_timeout(),
    ));

    let monitor = CoordinatorInactivityMonitor::new(coordinator.clone(), cfg.inactivity_threshold());
    let monitor_handle = tokio::spawn(monitor.run());

    let shutdown_flag = coordinator.shutdown_flag();
    let addr = cfg.addr();
    let handler_coordinator = coordinator.clone();

    let result = serve(&addr, shutdown_flag, move |request: CoordinatorRequest| {
        let coordinator = handler_coordinator.clone();
        async move { handle(&coordinator, request).await }
    })
    .await;

    coordinator.shutdown().await;
    if let Err(e) = monitor_handle.await {
        tracing::warn!(error = %e, "inactivity monitor task panicked");
    }
    result
}

async fn handle(coordinator: &Coordinator, request: CoordinatorRequest) -> CoordinatorResponse {
    match request {
        CoordinatorRequest::InitializeNode { account, balance_cents } => CoordinatorResponse::Bool(
            coordinator
                .initialize_node(&account, Money::from_cents(balance_cents))
                .await,
        ),
        CoordinatorRequest::SetSimulationCase { case } => {
            CoordinatorResponse::SimulationCaseSet(coordinator.set_simulation_case(case).await)
        }
        CoordinatorRequest::GetAccountBalance { account } => CoordinatorResponse::Balance(
            coordinator.get_account_balance(&account).await.map(Money::cents),
        ),
        CoordinatorRequest::ExecuteTransaction { txn_id, deltas } => {
            let deltas = deltas
                .into_iter()
                .map(|(account, cents)| (account, Money::from_cents(cents)))
                .collect();
            CoordinatorResponse::TransactionResult(coordinator.execute_transaction(txn_id, deltas).await)
        }
        CoordinatorRequest::HandleRecoveringNode { txn_id, account } => {
            CoordinatorResponse::RecoveryResult(coordinator.handle_recovering_node(&txn_id, &account))
        }
        CoordinatorRequest::IsAlive => CoordinatorResponse::Bool(coordinator.is_alive()),
        CoordinatorRequest::Shutdown => {
            coordinator.shutdown().await;
            CoordinatorResponse::Ack
        }
    }
}
