//! The address log: contract name to address, in deployment order.
//!
//! This is the only artifact a run leaves behind. It is printed to the
//! console and saved as JSON, one file per run under the runs directory.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{DeployedContract, RunId};
use crate::error::{Error, Result};
use crate::{dlog_debug, dlog_warn};

/// One deployed contract in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub name: String,
    pub contract: String,
    pub address: Address,
    pub position: usize,
}

impl From<&DeployedContract> for AddressEntry {
    fn from(deployed: &DeployedContract) -> Self {
        Self {
            name: deployed.name.clone(),
            contract: deployed.contract.clone(),
            address: deployed.address,
            position: deployed.position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressLog {
    pub run_id: RunId,
    pub plan: String,
    pub created_at: DateTime<Utc>,
    /// Set when the run stopped early; the entries are what was confirmed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<String>,
    pub contracts: Vec<AddressEntry>,
}

impl AddressLog {
    pub fn new(run_id: RunId, plan: &str, deployed: &[DeployedContract]) -> Self {
        Self {
            run_id,
            plan: plan.to_string(),
            created_at: Utc::now(),
            failed_task: None,
            contracts: deployed.iter().map(AddressEntry::from).collect(),
        }
    }

    /// Mark the log as partial, stopped at `task`.
    pub fn failed_at(mut self, task: &str) -> Self {
        self.failed_task = Some(task.to_string());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.failed_task.is_none()
    }

    /// Address of the contract deployed under `name`.
    pub fn get(&self, name: &str) -> Option<Address> {
        self.contracts
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.address)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Console rendering, one `name: address` line per contract.
    pub fn lines(&self) -> Vec<String> {
        let width = self
            .contracts
            .iter()
            .map(|e| e.name.len())
            .max()
            .unwrap_or(0);
        self.contracts
            .iter()
            .map(|e| format!("{:width$}  {}", e.name, e.address, width = width))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        dlog_debug!("Address log saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    /// Save as `<dir>/<run_id>.json` and return the path.
    pub fn save_in(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(format!("{}.json", self.run_id));
        self.save(&path)?;
        Ok(path)
    }

    /// Every readable log in `dir`, oldest first.
    pub fn list(dir: &Path) -> Result<Vec<Self>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut logs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::load(&path) {
                Ok(log) => logs.push(log),
                Err(e) => dlog_warn!("Skipping unreadable address log {}: {}", path.display(), e),
            }
        }
        logs.sort_by_key(|log| log.created_at);
        Ok(logs)
    }

    /// Most recent log in `dir`.
    pub fn latest(dir: &Path) -> Result<Self> {
        Self::list(dir)?
            .pop()
            .ok_or_else(|| Error::RunNotFound("no saved runs".to_string()))
    }

    /// Log whose run id starts with `prefix` (the short id works).
    pub fn find(dir: &Path, prefix: &str) -> Result<Self> {
        let mut matches: Vec<Self> = Self::list(dir)?
            .into_iter()
            .filter(|log| log.run_id.to_string().starts_with(prefix))
            .collect();
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(Error::RunNotFound(prefix.to_string())),
            n => Err(Error::Validation(format!(
                "run id prefix {} is ambiguous ({} runs)",
                prefix, n
            ))),
        }
    }
}
