//! Deployment task data model.
//!
//! A task names one contract to instantiate and the constructor arguments
//! to pass it. Arguments may refer to the address of an earlier task; those
//! placeholders are only resolved once the earlier task is confirmed.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A constructor argument as written in a plan.
///
/// `AddressOf` is a placeholder for the address of another task in the same
/// plan. Every other variant is a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConstructorArg {
    /// Address of a task deployed earlier in the run.
    AddressOf {
        /// Name of the task whose address is substituted.
        address_of: String,
    },
    /// Literal 20-byte address.
    Address(Address),
    Bool(bool),
    Uint(u64),
    String(String),
}

impl ConstructorArg {
    /// Placeholder for the address of the task named `task`.
    pub fn address_of(task: &str) -> Self {
        Self::AddressOf {
            address_of: task.to_string(),
        }
    }

    pub fn string(value: &str) -> Self {
        Self::String(value.to_string())
    }

    /// Name of the task this argument refers to, if it is a placeholder.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::AddressOf { address_of } => Some(address_of),
            _ => None,
        }
    }

    /// Resolve into a concrete value, looking up placeholders with `lookup`.
    ///
    /// Returns `None` when a placeholder names a task with no address yet.
    pub fn resolve<F>(&self, lookup: F) -> Option<ArgValue>
    where
        F: Fn(&str) -> Option<Address>,
    {
        match self {
            Self::AddressOf { address_of } => lookup(address_of).map(ArgValue::Address),
            Self::Address(addr) => Some(ArgValue::Address(*addr)),
            Self::Bool(b) => Some(ArgValue::Bool(*b)),
            Self::Uint(n) => Some(ArgValue::Uint(*n)),
            Self::String(s) => Some(ArgValue::String(s.clone())),
        }
    }
}

impl std::fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddressOf { address_of } => write!(f, "<{}.address>", address_of),
            Self::Address(addr) => write!(f, "{}", addr),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Uint(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<Address> for ConstructorArg {
    fn from(addr: Address) -> Self {
        Self::Address(addr)
    }
}

/// A fully resolved constructor argument, as handed to the deployer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Address(Address),
    Bool(bool),
    Uint(u64),
    String(String),
}

impl ArgValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address(addr) => Some(*addr),
            _ => None,
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(addr) => write!(f, "{}", addr),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Uint(n) => write!(f, "{}", n),
            Self::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// One unit of work in a deployment plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTask {
    /// Unique name of the task within its plan.
    pub name: String,
    /// Artifact to deploy. Usually the same as `name`.
    pub contract: String,
    /// Ordered constructor arguments.
    #[serde(default)]
    pub args: Vec<ConstructorArg>,
    /// Tasks that must be confirmed first even though no argument refers to them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl DeploymentTask {
    /// Create a task deploying the artifact of the same name with no arguments.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            contract: name.to_string(),
            args: Vec::new(),
            depends_on: Vec::new(),
        }
    }

    /// Deploy a differently named artifact under this task's name.
    pub fn contract(mut self, contract: &str) -> Self {
        self.contract = contract.to_string();
        self
    }

    pub fn arg(mut self, arg: impl Into<ConstructorArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a placeholder for the address of `task`.
    pub fn address_of(self, task: &str) -> Self {
        self.arg(ConstructorArg::address_of(task))
    }

    pub fn depends_on(mut self, task: &str) -> Self {
        self.depends_on.push(task.to_string());
        self
    }

    /// Every task name this task needs confirmed before it can run,
    /// in declaration order, arguments first.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args
            .iter()
            .filter_map(ConstructorArg::reference)
            .chain(self.depends_on.iter().map(String::as_str))
    }
}

/// Lifecycle of a task within one run.
///
/// `Pending -> Submitting -> Confirmed`, or `Pending -> Submitting -> Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    /// Not yet attempted.
    #[default]
    Pending,
    /// Deploy call issued, awaiting confirmation.
    Submitting,
    /// Deployment transaction confirmed.
    Confirmed,
    /// Deploy call failed.
    Failed {
        /// Error message describing the failure.
        error: String,
    },
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Confirmed | TaskStatus::Failed { .. })
    }

    /// Check whether moving to `target` is a legal transition.
    pub fn can_transition(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Pending, TaskStatus::Submitting)
                | (TaskStatus::Submitting, TaskStatus::Confirmed)
                | (TaskStatus::Submitting, TaskStatus::Failed { .. })
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Submitting => write!(f, "submitting"),
            TaskStatus::Confirmed => write!(f, "confirmed"),
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Per-task progress within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub contract: String,
    pub status: TaskStatus,
    /// Address, once confirmed.
    pub address: Option<Address>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    pub fn new(task: &DeploymentTask) -> Self {
        Self {
            name: task.name.clone(),
            contract: task.contract.clone(),
            status: TaskStatus::Pending,
            address: None,
            submitted_at: None,
            finished_at: None,
        }
    }

    fn transition(&mut self, target: TaskStatus) -> Result<()> {
        if !self.status.can_transition(&target) {
            return Err(Error::InvalidTaskTransition {
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }
        if target.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.status = target;
        Ok(())
    }

    /// Mark the deploy call as issued.
    pub fn submit(&mut self) -> Result<()> {
        self.transition(TaskStatus::Submitting)?;
        self.submitted_at = Some(Utc::now());
        Ok(())
    }

    /// Record the confirmed address.
    pub fn confirm(&mut self, address: Address) -> Result<()> {
        self.transition(TaskStatus::Confirmed)?;
        self.address = Some(address);
        Ok(())
    }

    pub fn fail(&mut self, error: &str) -> Result<()> {
        self.transition(TaskStatus::Failed {
            error: error.to_string(),
        })
    }
}

/// A contract instance created by a confirmed task. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    /// Task name.
    pub name: String,
    /// Artifact that was deployed.
    pub contract: String,
    pub address: Address,
    /// Zero-based position of the task in the plan.
    pub position: usize,
    /// Constructor arguments exactly as passed to the deployer.
    pub args: Vec<ArgValue>,
    pub deployed_at: DateTime<Utc>,
}
