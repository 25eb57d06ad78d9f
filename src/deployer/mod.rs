//! The deployer seam.
//!
//! A [`Deployer`] submits a contract-creation transaction and resolves
//! once the transaction is confirmed. The sequencer depends on this trait
//! only; [`LocalChain`] is the in-process implementation used by the CLI
//! and tests.

mod simulated;

pub use simulated::{ChainConfig, ChainSnapshot, LocalChain};

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::ContractArtifact;
use crate::core::ArgValue;

/// Why a deploy call failed. Deploys are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeployError {
    #[error("network unreachable: {0}")]
    Unreachable(String),

    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u128, available: u128 },

    #[error("constructor reverted: {0}")]
    Reverted(String),

    #[error("invalid artifact {name}: {reason}")]
    InvalidArtifact { name: String, reason: String },
}

/// Confirmation of a contract-creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployReceipt {
    /// Address of the created contract.
    pub address: Address,
    pub tx_hash: B256,
    pub block_number: u64,
}

/// Submits contract deployments and awaits their confirmation.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy `artifact` with already-resolved constructor arguments.
    ///
    /// Resolves only after the creation transaction is confirmed; the
    /// returned address is final.
    async fn deploy(
        &self,
        artifact: &ContractArtifact,
        args: &[ArgValue],
    ) -> Result<DeployReceipt, DeployError>;
}
