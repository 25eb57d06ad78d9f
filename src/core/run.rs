//! Run identity and the per-run report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::task::{DeployedContract, TaskRecord, TaskStatus};
use crate::deployer::DeployError;
use crate::error::{DeploymentFailure, Result};

/// Unique identifier for one sequencer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Outcome of executing a plan, success or not.
///
/// `records` has one entry per plan task in plan order. On failure the
/// failing task is `Failed` and every later task is still `Pending`.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: RunId,
    pub plan: String,
    pub records: Vec<TaskRecord>,
    /// Confirmed contracts in plan order.
    pub deployed: Vec<DeployedContract>,
    /// Position and cause of the failed task, if any.
    pub failure: Option<(usize, DeployError)>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn confirmed_count(&self) -> usize {
        self.deployed.len()
    }

    /// Number of tasks that were never attempted.
    pub fn pending_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status == TaskStatus::Pending)
            .count()
    }

    /// Convert into the deployed list, or a `DeploymentFailure` carrying the
    /// contracts confirmed before the failure.
    pub fn into_result(self) -> Result<Vec<DeployedContract>> {
        match self.failure {
            None => Ok(self.deployed),
            Some((position, cause)) => {
                let task = self
                    .records
                    .get(position)
                    .map(|r| r.name.clone())
                    .unwrap_or_default();
                Err(DeploymentFailure {
                    task,
                    position,
                    cause,
                    confirmed: self.deployed,
                }
                .into())
            }
        }
    }
}
