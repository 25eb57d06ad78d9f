//! TOML plan files.
//!
//! ```toml
//! name = "governance"
//!
//! [[task]]
//! name = "Governance"
//! args = ["$manager"]
//!
//! [[task]]
//! name = "DTtoken"
//! args = ["$manager", { address_of = "Governance" }]
//! ```
//!
//! String arguments equal to `$manager` are replaced by the manager address
//! supplied when the file is loaded.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::plan::DeploymentPlan;
use crate::core::presets;
use crate::core::task::{ConstructorArg, DeploymentTask};
use crate::error::{Error, Result};
use crate::dlog_debug;

pub const MANAGER_VARIABLE: &str = "$manager";

#[derive(Debug, Serialize, Deserialize)]
struct PlanFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, rename = "task")]
    tasks: Vec<TaskEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TaskEntry {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contract: Option<String>,
    #[serde(default)]
    args: Vec<ConstructorArg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

fn substitute(arg: ConstructorArg, manager: Option<Address>, task: &str) -> Result<ConstructorArg> {
    match arg {
        ConstructorArg::String(s) if s == MANAGER_VARIABLE => manager
            .map(ConstructorArg::Address)
            .ok_or_else(|| {
                Error::Validation(format!(
                    "task {} uses {} but no manager address is configured",
                    task, MANAGER_VARIABLE
                ))
            }),
        other => Ok(other),
    }
}

impl DeploymentPlan {
    /// Parse a plan from TOML. `default_name` is used when the file has no `name`.
    pub fn from_toml_str(
        source: &str,
        default_name: &str,
        manager: Option<Address>,
    ) -> Result<Self> {
        let file: PlanFile = toml::from_str(source)?;
        let mut plan = DeploymentPlan::new(file.name.as_deref().unwrap_or(default_name));

        for entry in file.tasks {
            let mut task = DeploymentTask::new(&entry.name);
            if let Some(contract) = entry.contract {
                task.contract = contract;
            }
            task.args = entry
                .args
                .into_iter()
                .map(|arg| substitute(arg, manager, &entry.name))
                .collect::<Result<Vec<_>>>()?;
            task.depends_on = entry.depends_on;
            plan.push(task);
        }

        Ok(plan)
    }

    /// Load a plan file. The plan is named after the file stem unless it names itself.
    pub fn load(path: &Path, manager: Option<Address>) -> Result<Self> {
        dlog_debug!("DeploymentPlan::load path={}", path.display());
        let source = fs::read_to_string(path)?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("plan");
        let plan = Self::from_toml_str(&source, stem, manager)?;
        dlog_debug!("Loaded plan {} with {} tasks", plan.name, plan.len());
        Ok(plan)
    }

    /// Build the plan named by `plan`: a `.toml` file path or a preset name.
    pub fn from_name_or_path(plan: &str, manager: Address) -> Result<Self> {
        let path = Path::new(plan);
        if path.extension().is_some_and(|ext| ext == "toml") || path.is_file() {
            Self::load(path, Some(manager))
        } else {
            presets::preset(plan, manager)
        }
    }

    /// Render the plan as a TOML plan file.
    pub fn to_toml_string(&self) -> Result<String> {
        let file = PlanFile {
            name: Some(self.name.clone()),
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskEntry {
                    name: t.name.clone(),
                    contract: (t.contract != t.name).then(|| t.contract.clone()),
                    args: t.args.clone(),
                    depends_on: t.depends_on.clone(),
                })
                .collect(),
        };
        Ok(toml::to_string_pretty(&file)?)
    }
}
