//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - A recording deployer with failure injection
//! - Registries populated for a plan
//! - Sequencers wired to either deployer

use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;

use dtrust_deploy::artifact::{ContractArtifact, InMemoryRegistry};
use dtrust_deploy::core::{ArgValue, DeploymentPlan};
use dtrust_deploy::deployer::{ChainConfig, DeployError, DeployReceipt, Deployer, LocalChain};
use dtrust_deploy::{Sequencer, SequencerEvent};

pub fn manager() -> Address {
    "0xc42a2CD1C3783a7438E774Cfb82048827b894e21"
        .parse()
        .unwrap()
}

/// One call observed by the recording deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCall {
    pub contract: String,
    pub args: Vec<ArgValue>,
}

/// Deployer that records every call and hands out sequential addresses.
#[derive(Default)]
pub struct RecordingDeployer {
    calls: Mutex<Vec<DeployCall>>,
    fail_on: Mutex<Option<(String, DeployError)>>,
}

impl RecordingDeployer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the deploy of `contract` fail with `error`.
    pub fn failing_on(contract: &str, error: DeployError) -> Arc<Self> {
        let deployer = Self::default();
        *deployer.fail_on.lock().unwrap() = Some((contract.to_string(), error));
        Arc::new(deployer)
    }

    pub fn calls(&self) -> Vec<DeployCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn contracts(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.contract).collect()
    }

    /// Address handed out for the `n`th call (1-based).
    pub fn address_for(n: u8) -> Address {
        Address::with_last_byte(n)
    }
}

#[async_trait]
impl Deployer for RecordingDeployer {
    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        args: &[ArgValue],
    ) -> Result<DeployReceipt, DeployError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(DeployCall {
                contract: artifact.contract_name.clone(),
                args: args.to_vec(),
            });
            calls.len()
        };
        tokio::task::yield_now().await;

        if let Some((contract, error)) = self.fail_on.lock().unwrap().as_ref() {
            if *contract == artifact.contract_name {
                return Err(error.clone());
            }
        }
        Ok(DeployReceipt {
            address: Self::address_for(n as u8),
            tx_hash: B256::with_last_byte(n as u8),
            block_number: n as u64,
        })
    }
}

/// Registry holding a placeholder artifact for every contract in `plan`.
pub fn registry_for(plan: &DeploymentPlan) -> Arc<InMemoryRegistry> {
    Arc::new(InMemoryRegistry::with_placeholders(
        plan.tasks.iter().map(|t| t.contract.as_str()),
    ))
}

/// A sequencer over a recording deployer.
pub struct RecordingHarness {
    pub sequencer: Sequencer,
    pub deployer: Arc<RecordingDeployer>,
}

impl RecordingHarness {
    pub fn new(plan: &DeploymentPlan) -> Self {
        Self::with_deployer(plan, RecordingDeployer::new())
    }

    pub fn with_deployer(plan: &DeploymentPlan, deployer: Arc<RecordingDeployer>) -> Self {
        Self {
            sequencer: Sequencer::new(registry_for(plan), deployer.clone()),
            deployer,
        }
    }
}

/// A sequencer over a fresh local chain, with events.
pub struct ChainHarness {
    pub sequencer: Sequencer,
    pub chain: Arc<LocalChain>,
    pub event_rx: mpsc::Receiver<SequencerEvent>,
}

impl ChainHarness {
    pub fn new(plan: &DeploymentPlan) -> Self {
        Self::on_chain(plan, Arc::new(LocalChain::new(ChainConfig::default())))
    }

    pub fn on_chain(plan: &DeploymentPlan, chain: Arc<LocalChain>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(64);
        Self {
            sequencer: Sequencer::new(registry_for(plan), chain.clone()).with_events(event_tx),
            chain,
            event_rx,
        }
    }

    /// Drain every event emitted so far.
    pub fn drain_events(&mut self) -> Vec<SequencerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}
