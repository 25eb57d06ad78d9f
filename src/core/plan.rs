//! Deployment plans and their static validation.
//!
//! A plan is an ordered list of tasks. Validation builds the dependency
//! graph between tasks and rejects plans that could read an address before
//! it exists: references to unknown or later tasks, self references and
//! cycles. Validation never touches a deployer.

use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::task::DeploymentTask;
use crate::error::PlanError;

/// Why one task depends on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum DependencyKind {
    /// The dependent passes the dependency's address as a constructor argument.
    ConstructorArg {
        /// Index of the argument within the dependent's argument list.
        index: usize,
    },
    /// Declared through `depends_on` only.
    Ordering,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyKind::ConstructorArg { index } => write!(f, "arg #{}", index),
            DependencyKind::Ordering => write!(f, "ordering"),
        }
    }
}

/// An ordered sequence of deployment tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// Human-readable plan name, recorded in the address log.
    pub name: String,
    /// Tasks in execution order.
    pub tasks: Vec<DeploymentTask>,
}

impl DeploymentPlan {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tasks: Vec::new(),
        }
    }

    /// Append a task; it runs after every task already in the plan.
    pub fn task(mut self, task: DeploymentTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn push(&mut self, task: DeploymentTask) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Position of the task named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.name == name)
    }

    /// Validate the plan and return its dependency graph.
    ///
    /// Checks, in order: empty plan, duplicate names, unknown references,
    /// self references, cycles, forward references.
    pub fn validate(&self) -> Result<PlanGraph, PlanError> {
        if self.tasks.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut graph = DiGraph::with_capacity(self.tasks.len(), 0);
        let mut index: HashMap<&str, NodeIndex> = HashMap::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if index.contains_key(task.name.as_str()) {
                return Err(PlanError::DuplicateTask(task.name.clone()));
            }
            let node = graph.add_node(task.name.clone());
            index.insert(task.name.as_str(), node);
        }

        for task in &self.tasks {
            if let Some(target) = task.references().find(|t| !index.contains_key(t)) {
                return Err(PlanError::UnknownReference {
                    task: task.name.clone(),
                    target: target.to_string(),
                });
            }
        }
        for task in &self.tasks {
            if task.references().any(|t| t == task.name) {
                return Err(PlanError::SelfReference(task.name.clone()));
            }
        }

        for task in &self.tasks {
            let to = index[task.name.as_str()];
            for (target, kind) in dependencies(task) {
                graph.add_edge(index[target], to, kind);
            }
        }

        if is_cyclic_directed(&graph) {
            let at = toposort(&graph, None)
                .err()
                .and_then(|cycle| graph.node_weight(cycle.node_id()).cloned())
                .unwrap_or_default();
            return Err(PlanError::Cycle(at));
        }

        // Node indices follow plan order, so an edge pointing backwards in the
        // index space is a reference to a task that has not run yet.
        for edge in graph.raw_edges() {
            if edge.source().index() > edge.target().index() {
                return Err(PlanError::ForwardReference {
                    task: graph[edge.target()].clone(),
                    target: graph[edge.source()].clone(),
                });
            }
        }

        Ok(PlanGraph { graph })
    }
}

fn dependencies(task: &DeploymentTask) -> impl Iterator<Item = (&str, DependencyKind)> {
    let args = task.args.iter().enumerate().filter_map(|(index, arg)| {
        arg.reference()
            .map(|target| (target, DependencyKind::ConstructorArg { index }))
    });
    let ordering = task
        .depends_on
        .iter()
        .map(|target| (target.as_str(), DependencyKind::Ordering));
    args.chain(ordering)
}

/// Dependency graph of a validated plan.
///
/// Nodes are task names in plan order; an edge `a -> b` means `b` needs
/// `a` confirmed first.
pub struct PlanGraph {
    graph: DiGraph<String, DependencyKind>,
}

impl PlanGraph {
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn node(&self, name: &str) -> Option<NodeIndex> {
        self.graph.node_indices().find(|&i| self.graph[i] == name)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<(&str, DependencyKind)> {
        let Some(node) = self.node(name) else {
            return Vec::new();
        };
        let mut found: Vec<(NodeIndex, DependencyKind)> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (other, *edge.weight())
            })
            .collect();
        found.sort_by_key(|(i, _)| i.index());
        found
            .into_iter()
            .map(|(i, kind)| (self.graph[i].as_str(), kind))
            .collect()
    }

    /// Tasks that `name` waits on, in plan order.
    pub fn dependencies_of(&self, name: &str) -> Vec<(&str, DependencyKind)> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Tasks that wait on `name`, in plan order.
    pub fn dependents_of(&self, name: &str) -> Vec<(&str, DependencyKind)> {
        self.neighbors(name, Direction::Outgoing)
    }
}

impl std::fmt::Debug for PlanGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanGraph")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
