//! Deployment sequencer.
//!
//! The Sequencer executes a validated plan one task at a time. Each deploy
//! call is awaited to confirmation before the next task starts, so an
//! address is only ever read once the contract behind it exists. Later
//! tasks see earlier addresses through their `AddressOf` arguments.

use alloy_primitives::Address;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::artifact::{ArtifactRegistry, ContractArtifact};
use crate::core::{
    ArgValue, DeployedContract, DeploymentPlan, DeploymentTask, RunId, RunReport, TaskRecord,
};
use crate::deployer::Deployer;
use crate::error::{Error, PlanError, Result};
use crate::{dlog, dlog_debug, dlog_error};

/// Events emitted as the sequencer works through a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequencerEvent {
    /// A deploy call was issued for the task at `position`.
    TaskSubmitted { position: usize, name: String },
    /// The task's deployment was confirmed.
    TaskConfirmed {
        position: usize,
        name: String,
        address: Address,
    },
    /// The task's deploy call failed; nothing after it will run.
    TaskFailed {
        position: usize,
        name: String,
        error: String,
    },
    /// The run finished, successfully or not.
    RunComplete {
        run_id: RunId,
        confirmed: usize,
        success: bool,
    },
}

/// Sequential executor for deployment plans.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use dtrust_deploy::artifact::InMemoryRegistry;
/// use dtrust_deploy::core::presets;
/// use dtrust_deploy::deployer::{ChainConfig, LocalChain};
/// use dtrust_deploy::sequencer::Sequencer;
///
/// let plan = presets::governance(manager);
/// let registry = Arc::new(InMemoryRegistry::with_placeholders(
///     plan.tasks.iter().map(|t| t.contract.as_str()),
/// ));
/// let chain = Arc::new(LocalChain::new(ChainConfig::default()));
/// let deployed = Sequencer::new(registry, chain).run(&plan).await?;
/// ```
pub struct Sequencer {
    registry: Arc<dyn ArtifactRegistry>,
    deployer: Arc<dyn Deployer>,
    event_tx: Option<mpsc::Sender<SequencerEvent>>,
}

impl Sequencer {
    pub fn new(registry: Arc<dyn ArtifactRegistry>, deployer: Arc<dyn Deployer>) -> Self {
        Self {
            registry,
            deployer,
            event_tx: None,
        }
    }

    /// Emit progress events on `event_tx`.
    pub fn with_events(mut self, event_tx: mpsc::Sender<SequencerEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    async fn emit(&self, event: SequencerEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event).await;
        }
    }

    /// Validate the plan and resolve every artifact it names.
    ///
    /// Fails before any deployment is attempted.
    pub fn prepare(&self, plan: &DeploymentPlan) -> Result<Vec<ContractArtifact>> {
        plan.validate()?;
        plan.tasks
            .iter()
            .map(|task| self.resolve_artifact(&task.contract))
            .collect()
    }

    fn resolve_artifact(&self, contract: &str) -> Result<ContractArtifact> {
        let artifact = match self.registry.require(contract) {
            Ok(artifact) => artifact,
            Err(Error::ArtifactNotFound(name)) => {
                dlog_debug!(
                    "No artifact for {}, registry has [{}]",
                    name,
                    self.registry.names().join(", ")
                );
                return Err(Error::ArtifactNotFound(name));
            }
            Err(e) => return Err(e),
        };
        match artifact.code_hash() {
            Ok(hash) if artifact.is_deployable() => {
                dlog_debug!("Artifact {} code hash {}", contract, hash);
                Ok(artifact)
            }
            _ => Err(Error::UndeployableArtifact(contract.to_string())),
        }
    }

    /// Run the plan and return the deployed contracts in plan order.
    ///
    /// # Errors
    ///
    /// - `Error::PlanInvalid` if validation fails; nothing was deployed.
    /// - `Error::ArtifactNotFound` if a contract has no artifact; nothing was deployed.
    /// - `Error::DeploymentFailure` if a deploy call fails. It carries the
    ///   contracts confirmed before the failure.
    pub async fn run(&self, plan: &DeploymentPlan) -> Result<Vec<DeployedContract>> {
        self.execute(plan).await?.into_result()
    }

    /// Run the plan and report per-task outcomes.
    ///
    /// Only plan and artifact problems are returned as errors; a failed
    /// deployment is recorded in the report.
    pub async fn execute(&self, plan: &DeploymentPlan) -> Result<RunReport> {
        let artifacts = match self.prepare(plan) {
            Ok(artifacts) => artifacts,
            Err(e) => {
                dlog_error!("Plan {} rejected: {}", plan.name, e);
                return Err(e);
            }
        };

        let run_id = RunId::new();
        let started_at = Utc::now();
        dlog!(
            "Run {} started: plan={} tasks={}",
            run_id.short(),
            plan.name,
            plan.len()
        );

        let mut records: Vec<TaskRecord> = plan.tasks.iter().map(TaskRecord::new).collect();
        let mut deployed: Vec<DeployedContract> = Vec::with_capacity(plan.len());
        let mut addresses: HashMap<&str, Address> = HashMap::with_capacity(plan.len());
        let mut failure = None;

        for (position, (task, artifact)) in plan.tasks.iter().zip(&artifacts).enumerate() {
            let args = resolve_args(task, &addresses)?;
            dlog_debug!(
                "Task #{} {} args=[{}]",
                position,
                task.name,
                args.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            let record = &mut records[position];
            record.submit()?;
            self.emit(SequencerEvent::TaskSubmitted {
                position,
                name: task.name.clone(),
            })
            .await;

            match self.deployer.deploy(artifact, &args).await {
                Ok(receipt) => {
                    record.confirm(receipt.address)?;
                    addresses.insert(task.name.as_str(), receipt.address);
                    deployed.push(DeployedContract {
                        name: task.name.clone(),
                        contract: task.contract.clone(),
                        address: receipt.address,
                        position,
                        args,
                        deployed_at: Utc::now(),
                    });
                    dlog!("{} deployed at {}", task.name, receipt.address);
                    self.emit(SequencerEvent::TaskConfirmed {
                        position,
                        name: task.name.clone(),
                        address: receipt.address,
                    })
                    .await;
                }
                Err(cause) => {
                    let error = cause.to_string();
                    record.fail(&error)?;
                    dlog_error!("{} failed: {}", task.name, error);
                    self.emit(SequencerEvent::TaskFailed {
                        position,
                        name: task.name.clone(),
                        error,
                    })
                    .await;
                    failure = Some((position, cause));
                    break;
                }
            }
        }

        let report = RunReport {
            run_id,
            plan: plan.name.clone(),
            records,
            deployed,
            failure,
            started_at,
            finished_at: Utc::now(),
        };
        dlog!(
            "Run {} finished: confirmed={}/{} success={}",
            run_id.short(),
            report.confirmed_count(),
            plan.len(),
            report.is_success()
        );
        self.emit(SequencerEvent::RunComplete {
            run_id,
            confirmed: report.confirmed_count(),
            success: report.is_success(),
        })
        .await;

        Ok(report)
    }
}

/// Substitute confirmed addresses into a task's constructor arguments.
fn resolve_args(task: &DeploymentTask, addresses: &HashMap<&str, Address>) -> Result<Vec<ArgValue>> {
    task.args
        .iter()
        .map(|arg| {
            arg.resolve(|name| addresses.get(name).copied()).ok_or_else(|| {
                Error::from(PlanError::ForwardReference {
                    task: task.name.clone(),
                    target: arg.reference().unwrap_or_default().to_string(),
                })
            })
        })
        .collect()
}
