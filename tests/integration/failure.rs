//! Partial-failure semantics: tasks before the failure stay confirmed,
//! the failed task is reported, later tasks are never attempted.

use std::sync::Arc;

use dtrust_deploy::artifact::ContractArtifact;
use dtrust_deploy::core::{presets, ArgValue, TaskStatus};
use dtrust_deploy::deployer::{ChainConfig, DeployError, LocalChain};
use dtrust_deploy::{Error, SequencerEvent};

use crate::fixtures::{manager, ChainHarness, RecordingDeployer, RecordingHarness};

/// Given the governance plan and a deployer that fails on DTRUSTFactory
/// When the plan runs
/// Then Governance and DTtoken stay confirmed and PRtoken is never attempted
#[tokio::test]
async fn test_failure_at_third_task() {
    let plan = presets::governance(manager());
    let deployer = RecordingDeployer::failing_on(
        "DTRUSTFactory",
        DeployError::Reverted("governance not initialized".to_string()),
    );
    let harness = RecordingHarness::with_deployer(&plan, deployer);

    let err = harness.sequencer.run(&plan).await.unwrap_err();

    let failure = match err {
        Error::DeploymentFailure(failure) => failure,
        other => panic!("expected DeploymentFailure, got {:?}", other),
    };
    assert_eq!(failure.task, "DTRUSTFactory");
    assert_eq!(failure.position, 2);
    assert_eq!(
        failure.cause,
        DeployError::Reverted("governance not initialized".to_string())
    );
    let confirmed: Vec<&str> = failure.confirmed.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(confirmed, vec!["Governance", "DTtoken"]);

    assert_eq!(
        harness.deployer.contracts(),
        vec!["Governance", "DTtoken", "DTRUSTFactory"]
    );
}

#[tokio::test]
async fn test_failure_report_statuses() {
    let plan = presets::governance(manager());
    let mut harness = ChainHarness::new(&plan);
    harness
        .chain
        .revert_on("DTRUSTFactory", "governance not initialized")
        .await;

    let report = harness.sequencer.execute(&plan).await.unwrap();

    assert!(!report.is_success());
    let statuses: Vec<&TaskStatus> = report.records.iter().map(|r| &r.status).collect();
    assert_eq!(statuses[0], &TaskStatus::Confirmed);
    assert_eq!(statuses[1], &TaskStatus::Confirmed);
    assert!(matches!(statuses[2], TaskStatus::Failed { error } if error.contains("reverted")));
    assert_eq!(statuses[3], &TaskStatus::Pending);
    assert_eq!(statuses[4], &TaskStatus::Pending);
    assert!(report.records[2].address.is_none());

    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SequencerEvent::TaskFailed { position: 2, name, .. } if name == "DTRUSTFactory"
    )));
    assert!(matches!(
        events.last(),
        Some(SequencerEvent::RunComplete {
            confirmed: 2,
            success: false,
            ..
        })
    ));
}

#[tokio::test]
async fn test_unreachable_on_first_task() {
    let plan = presets::governance(manager());
    let harness = ChainHarness::new(&plan);
    harness.chain.set_online(false).await;

    let err = harness.sequencer.run(&plan).await.unwrap_err();

    match err {
        Error::DeploymentFailure(failure) => {
            assert_eq!(failure.position, 0);
            assert!(failure.confirmed.is_empty());
            assert!(matches!(failure.cause, DeployError::Unreachable(_)));
        }
        other => panic!("expected DeploymentFailure, got {:?}", other),
    }
    assert_eq!(harness.chain.nonce().await, 0);
}

/// Running out of funds part-way leaves the funded deployments in place.
#[tokio::test]
async fn test_insufficient_funds_midway() {
    let plan = presets::governance(manager());
    let code_len = ContractArtifact::placeholder("Governance")
        .bytecode_bytes()
        .unwrap()
        .len();
    let per_deploy = LocalChain::new(ChainConfig::default())
        .cost(code_len, &[ArgValue::Address(manager())])
        .unwrap();
    let chain = Arc::new(LocalChain::new(ChainConfig {
        balance: per_deploy,
        ..ChainConfig::default()
    }));
    let harness = ChainHarness::on_chain(&plan, chain);

    let err = harness.sequencer.run(&plan).await.unwrap_err();

    match err {
        Error::DeploymentFailure(failure) => {
            assert_eq!(failure.task, "DTtoken");
            assert_eq!(failure.confirmed.len(), 1);
            assert!(matches!(failure.cause, DeployError::InsufficientFunds { .. }));
        }
        other => panic!("expected DeploymentFailure, got {:?}", other),
    }
    assert_eq!(harness.chain.balance().await, 0);
    assert_eq!(harness.chain.nonce().await, 1);
}
