//! Per-evaluation snapshot handed from the simulator to the metrics engine.

use std::sync::Arc;

use warpsim_state::{Evaluation, NodeId, Plan, StateStore};

/// Everything needed to account for one job's scheduling, captured right
/// after its scheduler invocation returned.
#[derive(Debug, Clone)]
pub struct SimSnapshot {
    /// The evaluation created for the job.
    pub eval: Evaluation,
    /// Every plan submitted so far, across all jobs.
    pub plans: Vec<Arc<Plan>>,
    pub state: StateStore,
    /// Node IDs in the cluster when the snapshot was taken.
    pub node_ids: Vec<NodeId>,
    /// State version observed once scheduling finished. Reads are pinned
    /// here so later jobs' placements never leak into this record.
    pub version: u64,
    /// Wall-clock start of the job's processing, UNIX nanoseconds.
    pub started_at: i64,
}
