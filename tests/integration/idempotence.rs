//! Re-running a plan.
//!
//! Deployment is not idempotent: running the same plan again in a fresh
//! session creates new, independent contracts.

use std::sync::Arc;

use dtrust_deploy::core::presets;
use dtrust_deploy::deployer::{ChainConfig, LocalChain};
use dtrust_deploy::Sequencer;

use crate::fixtures::{manager, registry_for, ChainHarness};

/// Given a plan already deployed on a chain
/// When a fresh sequencer runs it again on the same chain
/// Then every contract gets a new address
#[tokio::test]
async fn test_rerun_creates_new_contracts() {
    let plan = presets::governance(manager());
    let chain = Arc::new(LocalChain::new(ChainConfig::default()));

    let first = Sequencer::new(registry_for(&plan), chain.clone())
        .run(&plan)
        .await
        .unwrap();
    let second = Sequencer::new(registry_for(&plan), chain.clone())
        .run(&plan)
        .await
        .unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.name, b.name);
        assert_ne!(a.address, b.address, "{} reused an address", a.name);
    }
    assert!(first
        .iter()
        .all(|a| second.iter().all(|b| a.address != b.address)));

    // The second DTtoken is bound to the second Governance, not the first.
    assert_eq!(second[1].args[1].as_address(), Some(second[0].address));
    assert_eq!(chain.deployments().await.len(), 10);
}

/// Two chains with the same account history assign the same addresses.
#[tokio::test]
async fn test_same_history_is_deterministic() {
    let plan = presets::governance(manager());

    let first = ChainHarness::new(&plan).sequencer.run(&plan).await.unwrap();
    let second = ChainHarness::new(&plan).sequencer.run(&plan).await.unwrap();

    let first: Vec<_> = first.iter().map(|d| d.address).collect();
    let second: Vec<_> = second.iter().map(|d| d.address).collect();
    assert_eq!(first, second);
}

/// A chain resumed from its snapshot continues where it stopped.
#[tokio::test]
async fn test_resumed_chain_continues_nonce() {
    let plan = presets::factory(manager());
    let chain = Arc::new(LocalChain::new(ChainConfig::default()));
    let first = ChainHarness::on_chain(&plan, chain.clone())
        .sequencer
        .run(&plan)
        .await
        .unwrap();

    let resumed = Arc::new(LocalChain::from_snapshot(
        ChainConfig::default(),
        chain.snapshot().await,
    ));
    let second = ChainHarness::on_chain(&plan, resumed.clone())
        .sequencer
        .run(&plan)
        .await
        .unwrap();

    assert_ne!(first[0].address, second[0].address);
    assert_eq!(second[0].address, resumed.deployer().create(1));
}
