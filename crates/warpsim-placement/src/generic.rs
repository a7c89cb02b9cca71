//! Generic scheduler — batch and service jobs.
//!
//! Places each work group's replicas one at a time on the best-ranked
//! eligible node. Service jobs additionally spread replicas of the same job
//! across nodes; batch jobs pack as tightly as possible.

use std::time::Instant;

use tracing::{debug, warn};
use warpsim_state::{Evaluation, Job, Plan, StateSnapshot};

use crate::convert::snapshot_to_resources;
use crate::driver;
use crate::error::SchedulerResult;
use crate::feasible::eligibility;
use crate::scheduler::{Planner, Scheduler, SchedulerConfig};
use crate::scorer::{ScoringWeights, rank_nodes};

pub struct GenericScheduler<'a> {
    state: StateSnapshot,
    planner: &'a dyn Planner,
    weights: ScoringWeights,
    max_plan_attempts: u32,
}

impl<'a> GenericScheduler<'a> {
    pub fn new(
        state: StateSnapshot,
        planner: &'a dyn Planner,
        weights: ScoringWeights,
        max_plan_attempts: u32,
    ) -> Self {
        Self {
            state,
            planner,
            weights,
            max_plan_attempts,
        }
    }
}

/// Batch scheduler: bin-packing without spread.
pub fn new_batch_scheduler<'a>(
    state: StateSnapshot,
    planner: &'a dyn Planner,
    config: &SchedulerConfig,
) -> Box<dyn Scheduler + 'a> {
    Box::new(GenericScheduler::new(
        state,
        planner,
        config.weights.without_spread(),
        config.max_plan_attempts,
    ))
}

/// Service scheduler: bin-packing with spread across nodes.
pub fn new_service_scheduler<'a>(
    state: StateSnapshot,
    planner: &'a dyn Planner,
    config: &SchedulerConfig,
) -> Box<dyn Scheduler + 'a> {
    Box::new(GenericScheduler::new(
        state,
        planner,
        config.weights.clone(),
        config.max_plan_attempts,
    ))
}

impl Scheduler for GenericScheduler<'_> {
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

/// Compute the plan for every work group of `job`.
///
/// Each placement reserves capacity on the chosen node before the next one
/// is ranked, so the plan never over-commits a node. Once a group fails to
/// place, its remaining replicas are skipped: only one failure per group is
/// reported.
pub fn compute_plan(
    eval: &Evaluation,
    state: &StateSnapshot,
    job: &Job,
    weights: &ScoringWeights,
) -> SchedulerResult<Plan> {
    let mut plan = Plan::new(eval);
    let mut nodes = snapshot_to_resources(state, &job.id)?;

    for group in &job.groups {
        let eligible = eligibility(&nodes, job, group);
        let evaluated = eligible.iter().filter(|ok| **ok).count();
        let filtered = nodes.len() - evaluated;

        for index in 0..group.count {
            let started = Instant::now();
            let candidates = nodes
                .iter()
                .zip(&eligible)
                .filter(|(_, ok)| **ok)
                .map(|(node, _)| node);
            let ranking = rank_nodes(candidates, &group.resources, weights);
            let metrics = driver::alloc_metric(evaluated, filtered, &ranking, started);

            let Some(best) = ranking.best() else {
                warn!(
                    job_id = %job.id,
                    group = %group.name,
                    placed = index,
                    wanted = group.count,
                    "work group could not be fully placed"
                );
                plan.append_failed(driver::failure(eval, job, group, index, metrics));
                break;
            };

            if let Some(node) = nodes.iter_mut().find(|n| n.node_id == best.node_id) {
                node.reserve(&group.resources);
            }
            debug!(
                job_id = %job.id,
                group = %group.name,
                node = %best.node_id,
                score = best.score,
                "placed instance"
            );
            plan.append_alloc(driver::placement(eval, job, group, index, &best.node_id, metrics));
        }
    }

    Ok(plan)
}
