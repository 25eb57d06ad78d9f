//! In-process chain that confirms deployments locally.
//!
//! Addresses follow the CREATE rule (sender + nonce), so they are
//! deterministic for a given account history. Every creation attempt,
//! reverted or not, consumes a nonce and is charged
//! `gas_per_byte * gas_price` per byte of bytecode and encoded arguments.

use alloy_primitives::{address, keccak256, Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{DeployError, DeployReceipt, Deployer};
use crate::artifact::ContractArtifact;
use crate::core::ArgValue;
use crate::error::Result;
use crate::{dlog_debug, dlog_trace};

/// First account of the default development mnemonic.
pub const DEFAULT_DEPLOYER: Address = address!("0x627306090abaB3A6e1400e9345bC60c78a8BEf57");

/// 100 ether in wei.
pub const DEFAULT_BALANCE: u128 = 100_000_000_000_000_000_000;

/// Parameters of a local chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainConfig {
    /// Account that sends every creation transaction.
    pub deployer: Address,
    /// Starting balance of the deployer account, in wei.
    pub balance: u128,
    pub gas_per_byte: u128,
    pub gas_price: u128,
    /// Delay before a submitted deployment is confirmed.
    pub block_time: Duration,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            deployer: DEFAULT_DEPLOYER,
            balance: DEFAULT_BALANCE,
            gas_per_byte: 200,
            gas_price: 20_000_000_000,
            block_time: Duration::ZERO,
        }
    }
}

/// Persistent part of a local chain's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub deployer: Address,
    pub nonce: u64,
    pub balance: u128,
    pub block_number: u64,
}

impl ChainSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[derive(Debug)]
struct ChainState {
    nonce: u64,
    balance: u128,
    block_number: u64,
    online: bool,
    reverts: HashMap<String, String>,
    deployments: Vec<(String, Address)>,
}

/// A local, single-account chain implementing [`Deployer`].
#[derive(Debug)]
pub struct LocalChain {
    config: ChainConfig,
    state: Mutex<ChainState>,
}

impl LocalChain {
    pub fn new(config: ChainConfig) -> Self {
        let balance = config.balance;
        Self::with_state(config, 0, balance, 0)
    }

    fn with_state(config: ChainConfig, nonce: u64, balance: u128, block_number: u64) -> Self {
        Self {
            config,
            state: Mutex::new(ChainState {
                nonce,
                balance,
                block_number,
                online: true,
                reverts: HashMap::new(),
                deployments: Vec::new(),
            }),
        }
    }

    /// Resume a chain from a snapshot. The snapshot's account wins over the config's.
    pub fn from_snapshot(mut config: ChainConfig, snapshot: ChainSnapshot) -> Self {
        config.deployer = snapshot.deployer;
        Self::with_state(
            config,
            snapshot.nonce,
            snapshot.balance,
            snapshot.block_number,
        )
    }

    /// Resume from the snapshot at `path` if there is one, else start fresh.
    pub fn load_or_new(path: &Path, config: ChainConfig) -> Result<Self> {
        if !path.exists() {
            dlog_debug!("No chain snapshot at {}, starting fresh", path.display());
            return Ok(Self::new(config));
        }
        let snapshot = ChainSnapshot::load(path)?;
        dlog_debug!(
            "Resuming chain at nonce={} block={}",
            snapshot.nonce,
            snapshot.block_number
        );
        Ok(Self::from_snapshot(config, snapshot))
    }

    pub fn deployer(&self) -> Address {
        self.config.deployer
    }

    pub async fn snapshot(&self) -> ChainSnapshot {
        let state = self.state.lock().await;
        ChainSnapshot {
            deployer: self.config.deployer,
            nonce: state.nonce,
            balance: state.balance,
            block_number: state.block_number,
        }
    }

    pub async fn nonce(&self) -> u64 {
        self.state.lock().await.nonce
    }

    pub async fn balance(&self) -> u128 {
        self.state.lock().await.balance
    }

    /// Contracts created so far, in creation order.
    pub async fn deployments(&self) -> Vec<(String, Address)> {
        self.state.lock().await.deployments.clone()
    }

    /// Make every deployment of `contract` revert with `reason`.
    pub async fn revert_on(&self, contract: &str, reason: &str) {
        self.state
            .lock()
            .await
            .reverts
            .insert(contract.to_string(), reason.to_string());
    }

    /// Take the chain offline (or back online).
    pub async fn set_online(&self, online: bool) {
        self.state.lock().await.online = online;
    }

    /// Wei charged for creating `code_len` bytes of code with `args`, or
    /// `None` if it does not fit in a u128.
    pub fn cost(&self, code_len: usize, args: &[ArgValue]) -> Option<u128> {
        let bytes = (code_len + encoded_len(args)) as u128;
        bytes
            .checked_mul(self.config.gas_per_byte)?
            .checked_mul(self.config.gas_price)
    }
}

/// ABI-encoded size of constructor arguments: one word per static value,
/// plus length word and padded data for strings.
fn encoded_len(args: &[ArgValue]) -> usize {
    args.iter()
        .map(|arg| match arg {
            ArgValue::String(s) => 32 + 32 + s.len().div_ceil(32) * 32,
            _ => 32,
        })
        .sum()
}

fn transaction_hash(sender: Address, nonce: u64, code: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(20 + 8 + code.len());
    preimage.extend_from_slice(sender.as_slice());
    preimage.extend_from_slice(&nonce.to_be_bytes());
    preimage.extend_from_slice(code);
    keccak256(preimage)
}

#[async_trait]
impl Deployer for LocalChain {
    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        args: &[ArgValue],
    ) -> std::result::Result<DeployReceipt, DeployError> {
        let name = artifact.contract_name.as_str();
        let code = artifact
            .bytecode_bytes()
            .map_err(|e| DeployError::InvalidArtifact {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        if code.is_empty() {
            return Err(DeployError::InvalidArtifact {
                name: name.to_string(),
                reason: "empty bytecode".to_string(),
            });
        }

        let receipt = {
            let mut state = self.state.lock().await;
            if !state.online {
                return Err(DeployError::Unreachable("local chain is offline".to_string()));
            }

            let required = match self.cost(code.len(), args) {
                Some(required) if required <= state.balance => required,
                cost => {
                    return Err(DeployError::InsufficientFunds {
                        required: cost.unwrap_or(u128::MAX),
                        available: state.balance,
                    });
                }
            };

            let nonce = state.nonce;
            state.nonce += 1;
            state.balance -= required;
            state.block_number += 1;

            if let Some(reason) = state.reverts.get(name) {
                return Err(DeployError::Reverted(reason.clone()));
            }

            let address = self.config.deployer.create(nonce);
            state.deployments.push((name.to_string(), address));
            DeployReceipt {
                address,
                tx_hash: transaction_hash(self.config.deployer, nonce, &code),
                block_number: state.block_number,
            }
        };

        if !self.config.block_time.is_zero() {
            tokio::time::sleep(self.config.block_time).await;
        }
        dlog_trace!(
            "LocalChain confirmed {} tx={} block={}",
            name,
            receipt.tx_hash,
            receipt.block_number
        );
        Ok(receipt)
    }
}
