//! Report model — the JSON shape consumed by downstream tooling.
//!
//! Every type here is a pure projection of a state type; field names are
//! part of the output contract and must not change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warpsim_state::{Allocation, Job, Node, Resources};

/// Sentinel `final_time_stamp` for a job that placed nothing.
pub const NEVER_COMPLETED: i64 = -1;

/// Static description of a node, as loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimNode {
    pub id: String,
    pub datacenter: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub resources: Resources,
    pub reserved: Resources,
}

impl From<&Node> for SimNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            datacenter: node.datacenter.clone(),
            name: node.name.clone(),
            attributes: node.attributes.clone(),
            resources: node.resources,
            reserved: node.reserved,
        }
    }
}

/// Residual capacity of a node touched by an evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeUsageChange {
    pub id: String,
    pub available: Resources,
}

/// Summary of the evaluated job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMetrics {
    pub job_id: String,
    pub datacenters: Vec<String>,
    pub region: String,
    pub job_name: String,
    pub job_type: String,
    pub task_groups: Vec<String>,
    /// UNIX nanoseconds.
    pub start_time_stamp: i64,
    /// `start_time_stamp` plus the slowest placement, or [`NEVER_COMPLETED`].
    pub final_time_stamp: i64,
}

impl JobMetrics {
    /// Project a job; timestamps start out unset.
    pub fn from_job(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            datacenters: job.datacenters.clone(),
            region: job.region.clone(),
            job_name: job.name.clone(),
            job_type: job.job_type.to_string(),
            task_groups: job.groups.iter().map(|g| g.name.clone()).collect(),
            start_time_stamp: 0,
            final_time_stamp: NEVER_COMPLETED,
        }
    }
}

/// One allocation, successful or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocMetrics {
    pub node_id: String,
    pub job_id: String,
    pub task_group: String,
    /// Nanoseconds spent placing the allocation.
    pub allocation_time: i64,
    pub desired_description: String,
    pub desired_status: String,
    pub resources: Resources,
}

impl From<&Allocation> for AllocMetrics {
    fn from(alloc: &Allocation) -> Self {
        Self {
            node_id: alloc.node_id.clone(),
            job_id: alloc.job_id.clone(),
            task_group: alloc.task_group.clone(),
            allocation_time: alloc.metrics.allocation_time,
            desired_description: alloc.desired_description.clone(),
            desired_status: alloc.desired_status.to_string(),
            resources: alloc.resources,
        }
    }
}

/// Everything recorded for one job's evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvaluationMetrics {
    #[serde(rename = "evaluated_job")]
    pub job: JobMetrics,
    #[serde(rename = "successful_allocs_metrics")]
    pub successful: Vec<AllocMetrics>,
    /// Failure records with corrected per-group counts.
    #[serde(rename = "failed_allocs_metrics")]
    pub failed: Vec<AllocMetrics>,
    pub node_usage_changes: Vec<NodeUsageChange>,
}

/// The simulator's output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimOutput {
    pub nodes: Vec<SimNode>,
    pub job_evaluations: Vec<JobEvaluationMetrics>,
}
