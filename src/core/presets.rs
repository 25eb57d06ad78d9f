//! Built-in plans for the DTRUST contract suite.
//!
//! Each preset reproduces one of the historical migration sequences.
//! `governance` is the default: it is the only sequence with real
//! inter-contract dependencies.

use alloy_primitives::Address;

use crate::core::plan::DeploymentPlan;
use crate::core::task::{ConstructorArg, DeploymentTask};
use crate::error::{Error, Result};

pub const DEFAULT_PRESET: &str = "governance";

/// A named plan template parameterized by the manager account.
#[derive(Debug, Clone, Copy)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    build: fn(Address) -> DeploymentPlan,
}

impl Preset {
    pub fn build(&self, manager: Address) -> DeploymentPlan {
        (self.build)(manager)
    }
}

pub const PRESETS: &[Preset] = &[
    Preset {
        name: "governance",
        description: "Governance, DTtoken, DTRUSTFactory, PRtoken, ControlKey",
        build: governance,
    },
    Preset {
        name: "factory",
        description: "DTRUSTFactory only",
        build: factory,
    },
    Preset {
        name: "dtrust",
        description: "a single DTRUST trust owned by the manager",
        build: dtrust,
    },
];

/// Look up a preset by name.
pub fn find(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name == name)
}

/// Build the preset named `name` for `manager`.
pub fn preset(name: &str, manager: Address) -> Result<DeploymentPlan> {
    find(name)
        .map(|p| p.build(manager))
        .ok_or_else(|| Error::UnknownPreset(name.to_string()))
}

/// Governance first; the token and the factory are bound to its address.
pub fn governance(manager: Address) -> DeploymentPlan {
    DeploymentPlan::new("governance")
        .task(DeploymentTask::new("Governance").arg(manager))
        .task(
            DeploymentTask::new("DTtoken")
                .arg(manager)
                .address_of("Governance"),
        )
        .task(DeploymentTask::new("DTRUSTFactory").address_of("Governance"))
        .task(DeploymentTask::new("PRtoken").arg(manager))
        .task(DeploymentTask::new("ControlKey"))
}

pub fn factory(_manager: Address) -> DeploymentPlan {
    DeploymentPlan::new("factory").task(DeploymentTask::new("DTRUSTFactory"))
}

pub fn dtrust(manager: Address) -> DeploymentPlan {
    DeploymentPlan::new("dtrust").task(
        DeploymentTask::new("DTRUST")
            .arg(ConstructorArg::string(""))
            .arg(ConstructorArg::string(""))
            .arg(ConstructorArg::string(""))
            .arg(manager),
    )
}
