//! Core domain models for deployment runs.
//!
//! Tasks and their constructor arguments, plans and their dependency
//! graph, the built-in presets, and per-run reporting types.

pub mod plan;
mod plan_file;
pub mod presets;
pub mod run;
pub mod task;

pub use plan::{DependencyKind, DeploymentPlan, PlanGraph};
pub use plan_file::MANAGER_VARIABLE;
pub use run::{RunId, RunReport};
pub use task::{ArgValue, ConstructorArg, DeployedContract, DeploymentTask, TaskRecord, TaskStatus};
