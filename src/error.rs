use thiserror::Error;

use crate::core::DeployedContract;
use crate::deployer::DeployError;

/// Static plan validation failures. Raised before any deployment is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Plan contains no tasks")]
    Empty,

    #[error("Duplicate task name: {0}")]
    DuplicateTask(String),

    #[error("Task {task} references unknown task {target}")]
    UnknownReference { task: String, target: String },

    #[error("Task {0} references its own address")]
    SelfReference(String),

    #[error("Dependency cycle detected at task: {0}")]
    Cycle(String),

    #[error("Task {task} references {target} before it is deployed")]
    ForwardReference { task: String, target: String },
}

/// A task's deploy call failed. Everything confirmed before it stays valid.
#[derive(Error, Debug, Clone)]
#[error("{task} (task #{position}) failed: {cause}")]
pub struct DeploymentFailure {
    /// Name of the task that failed.
    pub task: String,
    /// Position of the failed task in the plan.
    pub position: usize,
    /// Underlying cause reported by the deployer.
    pub cause: DeployError,
    /// Contracts confirmed before the failure, in plan order.
    pub confirmed: Vec<DeployedContract>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid plan: {0}")]
    PlanInvalid(#[from] PlanError),

    #[error("Deployment failed: {0}")]
    DeploymentFailure(Box<DeploymentFailure>),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Artifact has no deployable bytecode: {0}")]
    UndeployableArtifact(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown plan preset: {0}")]
    UnknownPreset(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid task transition from {from} to {to}")]
    InvalidTaskTransition { from: String, to: String },
}

impl From<DeploymentFailure> for Error {
    fn from(failure: DeploymentFailure) -> Self {
        Error::DeploymentFailure(Box::new(failure))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
