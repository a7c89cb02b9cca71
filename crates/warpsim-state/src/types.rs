//! Domain types for the cluster state container.
//!
//! These types describe the synthetic cluster (nodes), the workload (jobs
//! and their work groups), and the scheduler's traffic (evaluations, plans,
//! allocations). All types are serializable to/from JSON for storage in
//! redb tables.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resources::Resources;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Unique identifier for an allocation.
pub type AllocId = String;

/// Unique identifier for an evaluation.
pub type EvalId = String;

// ── Node ──────────────────────────────────────────────────────────

/// A worker node of the synthetic cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub datacenter: String,
    pub name: String,
    /// Arbitrary key/value data matched by constraints.
    pub attributes: BTreeMap<String, String>,
    /// Total capacity of the node.
    pub resources: Resources,
    /// Capacity held back from scheduling.
    pub reserved: Resources,
    pub links: BTreeMap<String, String>,
    pub meta: BTreeMap<String, String>,
    pub node_class: String,
    /// Draining nodes receive no new placements.
    pub drain: bool,
    pub status: NodeStatus,
    pub status_description: String,
}

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    #[default]
    Ready,
    Down,
}

impl Node {
    /// Whether the scheduler may place work on this node at all.
    pub fn is_schedulable(&self) -> bool {
        self.status == NodeStatus::Ready && !self.drain
    }
}

// ── Job ───────────────────────────────────────────────────────────

/// Selects which scheduler variant processes a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// One instance per eligible node.
    System,
    Batch,
    Service,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Batch => "batch",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job: an ordered list of work groups to place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub region: String,
    pub datacenters: Vec<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub priority: u32,
    pub constraints: Vec<Constraint>,
    pub groups: Vec<WorkGroup>,
}

impl Job {
    /// Look up a work group by name (names are unique within a job).
    pub fn group(&self, name: &str) -> Option<&WorkGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// A named, replicated unit of work within a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkGroup {
    pub name: String,
    /// Desired replica count.
    pub count: u32,
    /// Resources consumed by one replica.
    pub resources: Resources,
    pub constraints: Vec<Constraint>,
}

/// An attribute constraint evaluated against a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraint {
    /// `${node.datacenter}`, `${node.class}`, `${node.name}` or `${attr.<key>}`.
    pub attribute: String,
    #[serde(default)]
    pub operand: ConstraintOperand,
    pub value: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintOperand {
    #[default]
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

// ── Allocation ────────────────────────────────────────────────────

/// A binding of one work group replica to one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub id: AllocId,
    pub eval_id: EvalId,
    /// `{job}.{group}[{index}]`
    pub name: String,
    /// Empty for allocations that failed to place.
    pub node_id: NodeId,
    pub job_id: JobId,
    /// The owning job. Set on failed allocations so replica counts can be
    /// reconciled.
    pub job: Option<Job>,
    pub task_group: String,
    pub resources: Resources,
    pub desired_status: DesiredStatus,
    pub desired_description: String,
    pub metrics: AllocMetric,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredStatus {
    Run,
    Failed,
}

impl fmt::Display for DesiredStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run => f.write_str("run"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Placement bookkeeping recorded by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AllocMetric {
    pub nodes_evaluated: u32,
    pub nodes_filtered: u32,
    pub nodes_exhausted: u32,
    /// Exhausted dimension name → number of nodes.
    pub dimension_exhausted: BTreeMap<String, u32>,
    /// Time spent placing this allocation, in nanoseconds.
    pub allocation_time: i64,
}

// ── Evaluation ────────────────────────────────────────────────────

/// One request to the scheduler to (re)place a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evaluation {
    pub id: EvalId,
    pub priority: u32,
    pub job_id: JobId,
    pub triggered_by: EvalTrigger,
    pub status: EvalStatus,
    pub status_description: String,
}

impl Evaluation {
    /// A pending evaluation registering `job`.
    pub fn for_job(id: EvalId, job: &Job) -> Self {
        Self {
            id,
            priority: job.priority,
            job_id: job.id.clone(),
            triggered_by: EvalTrigger::JobRegister,
            status: EvalStatus::Pending,
            status_description: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalTrigger {
    JobRegister,
    NodeUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalStatus {
    Pending,
    Complete,
    Failed,
}

// ── Plan ──────────────────────────────────────────────────────────

/// Scheduler output for one evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub eval_id: EvalId,
    pub priority: u32,
    /// Node ID → allocations evicted from that node.
    pub node_update: BTreeMap<NodeId, Vec<Allocation>>,
    /// Node ID → allocations newly placed on that node.
    pub node_allocation: BTreeMap<NodeId, Vec<Allocation>>,
    /// Allocations that could not be placed.
    pub failed_allocs: Vec<Allocation>,
}

impl Plan {
    pub fn new(eval: &Evaluation) -> Self {
        Self {
            eval_id: eval.id.clone(),
            priority: eval.priority,
            ..Self::default()
        }
    }

    pub fn append_alloc(&mut self, alloc: Allocation) {
        self.node_allocation
            .entry(alloc.node_id.clone())
            .or_default()
            .push(alloc);
    }

    pub fn append_failed(&mut self, alloc: Allocation) {
        self.failed_allocs.push(alloc);
    }

    /// Every successful allocation, in node order.
    pub fn placed(&self) -> impl Iterator<Item = &Allocation> {
        self.node_allocation.values().flatten()
    }

    pub fn placed_count(&self) -> usize {
        self.node_allocation.values().map(Vec::len).sum()
    }

    pub fn is_noop(&self) -> bool {
        self.node_update.is_empty()
            && self.node_allocation.is_empty()
            && self.failed_allocs.is_empty()
    }

    /// Evictions, placements and failures flattened into one list, in that
    /// order.
    pub fn flatten(&self) -> Vec<Allocation> {
        self.node_update
            .values()
            .flatten()
            .chain(self.node_allocation.values().flatten())
            .chain(self.failed_allocs.iter())
            .cloned()
            .collect()
    }
}

/// Outcome of submitting a plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanResult {
    pub node_update: BTreeMap<NodeId, Vec<Allocation>>,
    pub node_allocation: BTreeMap<NodeId, Vec<Allocation>>,
    /// Version at which the plan was applied; 0 when nothing was applied.
    pub alloc_index: u64,
    /// Non-zero when the planner wants the scheduler to refresh its state
    /// view to at least this version before retrying.
    pub refresh_index: u64,
}

impl PlanResult {
    pub fn is_applied(&self) -> bool {
        self.alloc_index != 0
    }
}
