//! System scheduler — `count` instances of every work group on every node.
//!
//! Every node in the cluster is an attempted placement target. A node that
//! is ineligible or too full counts as a failure for that group; as with
//! the generic scheduler only the first failure per group is reported.

use std::time::Instant;

use tracing::warn;
use warpsim_state::{Evaluation, Job, Plan, StateSnapshot};

use crate::convert::snapshot_to_resources;
use crate::driver;
use crate::error::SchedulerResult;
use crate::feasible::is_eligible;
use crate::scheduler::{Planner, Scheduler, SchedulerConfig};
use crate::scorer::{Ranking, ScoringWeights, score_node};

pub struct SystemScheduler<'a> {
    state: StateSnapshot,
    planner: &'a dyn Planner,
    weights: ScoringWeights,
    max_plan_attempts: u32,
}

pub fn new_system_scheduler<'a>(
    state: StateSnapshot,
    planner: &'a dyn Planner,
    config: &SchedulerConfig,
) -> Box<dyn Scheduler + 'a> {
    Box::new(SystemScheduler {
        state,
        planner,
        weights: config.weights.without_spread(),
        max_plan_attempts: config.max_plan_attempts,
    })
}

impl Scheduler for SystemScheduler<'_> {
    fn process(&mut self, eval: &Evaluation) -> SchedulerResult<()> {
        let weights = &self.weights;
        driver::process_eval(
            eval,
            &mut self.state,
            self.planner,
            self.max_plan_attempts,
            |state, job| compute_plan(eval, state, job, weights),
        )
    }
}

/// Compute the plan placing every group on every node.
pub fn compute_plan(
    eval: &Evaluation,
    state: &StateSnapshot,
    job: &Job,
    weights: &ScoringWeights,
) -> SchedulerResult<Plan> {
    let mut plan = Plan::new(eval);
    let mut nodes = snapshot_to_resources(state, &job.id)?;

    for group in &job.groups {
        // Replica index across the whole cluster.
        let mut index = 0;
        let mut failed = false;

        for node in nodes.iter_mut() {
            for _ in 0..group.count {
                let started = Instant::now();
                let mut ranking = Ranking::default();
                let eligible = is_eligible(node, job, group);
                if eligible {
                    match score_node(node, &group.resources, weights, node.utilization()) {
                        Ok(score) => ranking.scores.push(score),
                        Err(dim) => ranking.exhausted.push(dim),
                    }
                }
                let metrics = driver::alloc_metric(
                    usize::from(eligible),
                    usize::from(!eligible),
                    &ranking,
                    started,
                );

                if ranking.best().is_some() {
                    node.reserve(&group.resources);
                    plan.append_alloc(driver::placement(eval, job, group, index, &node.node_id, metrics));
                } else if !failed {
                    warn!(
                        job_id = %job.id,
                        group = %group.name,
                        node = %node.node_id,
                        "system work group could not be placed on node"
                    );
                    plan.append_failed(driver::failure(eval, job, group, index, metrics));
                    failed = true;
                }
                index += 1;
            }
        }
    }

    Ok(plan)
}
