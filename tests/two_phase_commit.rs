//! End-to-end scenarios from SPEC_FULL §8, driving a real `Coordinator`
//! against `Participant`s served over loopback TCP — this suite plays
//! the role of the external client driver the spec treats as an
//! out-of-scope collaborator.

use std::sync::Arc;
use std::time::Duration;

use rustydb_2pc::common::{Component, Money};
use rustydb_2pc::network::protocol::{
    CoordinatorRequest, CoordinatorResponse, ParticipantRequest, ParticipantResponse,
};
use rustydb_2pc::network::server::serve;
use rustydb_2pc::network::RpcClient;
use rustydb_2pc::participant::{Participant, ParticipantInactivityMonitor};
use rustydb_2pc::transaction::Coordinator;
use tempfile::tempdir;

async fn handle_participant(participant: &Participant, request: ParticipantRequest) -> ParticipantResponse {
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

async fn handle_coordinator(coordinator: &Coordinator, request: CoordinatorRequest) -> CoordinatorResponse {
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

async fn spawn_participant(account: &str, port: u16, dir: &std::path::Path) -> Arc<Participant> {
    let balance_path = dir.join(format!("{account}.balance"));
    let participant = Arc::new(Participant::new(account, balance_path));
    let shutdown_flag = participant.shutdown_flag();
    let addr = format!("127.0.0.1:{port}");
    let handler = participant.clone();
    tokio::spawn(async move {
        let _ = serve(&addr, shutdown_flag, move |req: ParticipantRequest| {
            let p = handler.clone();
            async move { handle_participant(&p, req).await }
        })
        .await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    participant
}

async fn spawn_coordinator_server(coordinator: Arc<Coordinator>, port: u16) {
    let shutdown_flag = coordinator.shutdown_flag();
    let addr = format!("127.0.0.1:{port}");
    let handler = coordinator.clone();
    tokio::spawn(async move {
        let _ = serve(&addr, shutdown_flag, move |req: CoordinatorRequest| {
            let c = handler.clone();
            async move { handle_coordinator(&c, req).await }
        })
        .await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn money(text: &str) -> Money {
    Money::parse(text).unwrap()
}

#[tokio::test]
async fn s1_commit_then_bonus_commit() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18001, dir.path()).await;
    let b = spawn_participant("B", 18002, dir.path()).await;
    a.initialize_account(money("200.00"));
    b.initialize_account(money("300.00"));

    let coordinator = Coordinator::new(
        vec![
            ("A".to_string(), "127.0.0.1:18001".to_string()),
            ("B".to_string(), "127.0.0.1:18002".to_string()),
        ],
        Duration::from_millis(500),
        Duration::from_millis(500),
    );

    let result = coordinator
        .execute_transaction(
            "txn1".to_string(),
            vec![("A".to_string(), money("-100.00")), ("B".to_string(), money("100.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Committed");
    assert_eq!(a.get_balance(), money("100.00"));
    assert_eq!(b.get_balance(), money("400.00"));

    let result = coordinator
        .execute_transaction(
            "txn2".to_string(),
            vec![("A".to_string(), money("20.00")), ("B".to_string(), money("20.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Committed");
    assert_eq!(a.get_balance(), money("120.00"));
    assert_eq!(b.get_balance(), money("420.00"));
}

#[tokio::test]
async fn s2_abort_for_insufficient_funds_then_commit() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18011, dir.path()).await;
    let b = spawn_participant("B", 18012, dir.path()).await;
    a.initialize_account(money("90.00"));
    b.initialize_account(money("50.00"));

    let coordinator = Coordinator::new(
        vec![
            ("A".to_string(), "127.0.0.1:18011".to_string()),
            ("B".to_string(), "127.0.0.1:18012".to_string()),
        ],
        Duration::from_millis(500),
        Duration::from_millis(500),
    );

    let result = coordinator
        .execute_transaction(
            "txn1".to_string(),
            vec![("A".to_string(), money("-100.00")), ("B".to_string(), money("100.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Aborted");
    assert_eq!(a.get_balance(), money("90.00"));
    assert_eq!(b.get_balance(), money("50.00"));

    let result = coordinator
        .execute_transaction(
            "txn2".to_string(),
            vec![("A".to_string(), money("18.00")), ("B".to_string(), money("18.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Committed");
    assert_eq!(a.get_balance(), money("108.00"));
    assert_eq!(b.get_balance(), money("68.00"));
}

#[tokio::test]
async fn s3_prepare_phase_timeout_aborts_and_leaves_balances_untouched() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18021, dir.path()).await;
    let b = spawn_participant("B", 18022, dir.path()).await;
    a.initialize_account(money("200.00"));
    b.initialize_account(money("300.00"));
    a.simulation_case(1);

    let coordinator = Coordinator::new(
        vec![
            ("A".to_string(), "127.0.0.1:18021".to_string()),
            ("B".to_string(), "127.0.0.1:18022".to_string()),
        ],
        Duration::from_millis(200),
        Duration::from_millis(500),
    );

    let result = coordinator
        .execute_transaction(
            "txn1".to_string(),
            vec![("A".to_string(), money("-100.00")), ("B".to_string(), money("100.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Aborted");
    assert_eq!(a.get_balance(), money("200.00"));
    assert_eq!(b.get_balance(), money("300.00"));
}

#[tokio::test]
async fn s4_commit_phase_timeout_rolls_back_the_other_participant() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18031, dir.path()).await;
    let b = spawn_participant("B", 18032, dir.path()).await;
    a.initialize_account(money("200.00"));
    b.initialize_account(money("300.00"));
    a.simulation_case(2);

    let coordinator = Coordinator::new(
        vec![
            ("A".to_string(), "127.0.0.1:18031".to_string()),
            ("B".to_string(), "127.0.0.1:18032".to_string()),
        ],
        Duration::from_millis(500),
        Duration::from_millis(200),
    );

    let result = coordinator
        .execute_transaction(
            "txn1".to_string(),
            vec![("A".to_string(), money("-100.00")), ("B".to_string(), money("100.00"))],
        )
        .await;
    assert_eq!(result, "Transaction Aborted");
    assert_eq!(a.get_balance(), money("200.00"));
    assert_eq!(b.get_balance(), money("300.00"));
}

#[tokio::test]
async fn s5_recovery_restores_an_orphaned_prepared_participant() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18041, dir.path()).await;
    a.initialize_account(money("200.00"));
    a.simulation_case(2);

    let coordinator = Arc::new(Coordinator::new(
        vec![("A".to_string(), "127.0.0.1:18041".to_string())],
        Duration::from_millis(500),
        Duration::from_millis(200),
    ));
    spawn_coordinator_server(coordinator.clone(), 18042).await;

    let result = coordinator
        .execute_transaction("txn1".to_string(), vec![("A".to_string(), money("-100.00"))])
        .await;
    assert_eq!(result, "Transaction Aborted");
    // A's commit call timed out with the lock not yet reacquired; it
    // is still sitting in PREPARED, orphaned, with no rollback sent
    // because it never made it into the coordinator's `committed` set.

    let coordinator_client = RpcClient::new("127.0.0.1:18042");
    let monitor = ParticipantInactivityMonitor::new(a.clone(), coordinator_client, Duration::from_millis(300));
    tokio::spawn(monitor.run());

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(a.get_balance(), money("200.00"));
}

#[tokio::test]
async fn s6_graceful_shutdown_rejects_new_transactions() {
    let dir = tempdir().unwrap();
    let a = spawn_participant("A", 18051, dir.path()).await;
    a.initialize_account(money("200.00"));

    let coordinator = Coordinator::new(
        vec![("A".to_string(), "127.0.0.1:18051".to_string())],
        Duration::from_millis(500),
        Duration::from_millis(500),
    );
    coordinator.shutdown().await;

    let result = coordinator
        .execute_transaction("txn1".to_string(), vec![("A".to_string(), money("-50.00"))])
        .await;
    assert_eq!(
        result,
        "Coordinator is shutting down. No new transactions are accepted."
    );
    assert_eq!(a.get_balance(), money("200.00"));
}
