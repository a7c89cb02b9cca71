//! Evaluation driver shared by every scheduler variant.
//!
//! Computes a plan, submits it, retries against refreshed state when the
//! planner rejects it, and reports the evaluation's final status.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;
use warpsim_state::{
    AllocMetric, Allocation, DesiredStatus, EvalStatus, Evaluation, Job, Plan, StateSnapshot,
    WorkGroup,
};

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Planner;
use crate::scorer::Ranking;

/// Run the compute/submit loop for one evaluation.
pub(crate) fn process_eval<F>(
    eval: &Evaluation,
    state: &mut StateSnapshot,
    planner: &dyn Planner,
    max_attempts: u32,
    mut compute: F,
) -> SchedulerResult<()>
where
    F: FnMut(&StateSnapshot, &Job) -> SchedulerResult<Plan>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempts = 0;
    loop {
        attempts += 1;

        let job = match state.job_by_id(&eval.job_id) {
            Ok(job) => job,
            Err(e) if e.is_not_found() => {
                set_status(planner, eval, EvalStatus::Failed, "job not found")?;
                return Err(SchedulerError::JobNotFound {
                    eval_id: eval.id.clone(),
                    job_id: eval.job_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let plan = compute(state, &job)?;
        if plan.is_noop() {
            debug!(eval_id = %eval.id, "nothing to place");
            return set_status(planner, eval, EvalStatus::Complete, "");
        }

        let placed = plan.placed_count();
        let failed = plan.failed_allocs.len();
        let (result, refreshed) = planner.submit_plan(plan)?;

        if result.is_applied() {
            debug!(
                eval_id = %eval.id,
                placed,
                failed,
                alloc_index = result.alloc_index,
                "plan applied"
            );
            let description = if failed == 0 {
                String::new()
            } else {
                format!("{failed} work group(s) not fully placed")
            };
            return set_status(planner, eval, EvalStatus::Complete, description);
        }

        if let Some(snapshot) = refreshed {
            *state = snapshot;
        }
        if attempts >= max_attempts {
            warn!(eval_id = %eval.id, attempts, "giving up on rejected plan");
            set_status(planner, eval, EvalStatus::Failed, "maximum attempts reached")?;
            return Err(SchedulerError::MaxAttempts {
                eval_id: eval.id.clone(),
                attempts,
            });
        }
        debug!(
            eval_id = %eval.id,
            attempt = attempts,
            refresh_index = result.refresh_index,
            "plan rejected, retrying"
        );
    }
}

fn set_status(
    planner: &dyn Planner,
    eval: &Evaluation,
    status: EvalStatus,
    description: impl Into<String>,
) -> SchedulerResult<()> {
    let mut updated = eval.clone();
    updated.status = status;
    updated.status_description = description.into();
    planner.update_eval(&updated)
}

// ── Allocation builders ───────────────────────────────────────────

/// `{job}.{group}[{index}]`
pub(crate) fn alloc_name(job: &Job, group: &WorkGroup, index: u32) -> String {
    format!("{}.{}[{}]", job.id, group.name, index)
}

/// A successful placement of replica `index` of `group` on `node_id`.
pub(crate) fn placement(
    eval: &Evaluation,
    job: &Job,
    group: &WorkGroup,
    index: u32,
    node_id: &str,
    metrics: AllocMetric,
) -> Allocation {
    Allocation {
        id: Uuid::new_v4().to_string(),
        eval_id: eval.id.clone(),
        name: alloc_name(job, group, index),
        node_id: node_id.to_string(),
        job_id: job.id.clone(),
        job: None,
        task_group: group.name.clone(),
        resources: group.resources,
        desired_status: DesiredStatus::Run,
        desired_description: String::new(),
        metrics,
    }
}

/// The representative failure for `group`. Carries the job so replica
/// counts can be reconciled later.
pub(crate) fn failure(
    eval: &Evaluation,
    job: &Job,
    group: &WorkGroup,
    index: u32,
    metrics: AllocMetric,
) -> Allocation {
    let description = failure_description(&metrics);
    Allocation {
        id: Uuid::new_v4().to_string(),
        eval_id: eval.id.clone(),
        name: alloc_name(job, group, index),
        node_id: String::new(),
        job_id: job.id.clone(),
        job: Some(job.clone()),
        task_group: group.name.clone(),
        resources: group.resources,
        desired_status: DesiredStatus::Failed,
        desired_description: description,
        metrics,
    }
}

/// Placement bookkeeping for one replica.
pub(crate) fn alloc_metric(
    evaluated: usize,
    filtered: usize,
    ranking: &Ranking,
    started: Instant,
) -> AllocMetric {
    let mut dimension_exhausted = BTreeMap::new();
    for dim in &ranking.exhausted {
        *dimension_exhausted.entry(dim.to_string()).or_insert(0) += 1;
    }
    AllocMetric {
        nodes_evaluated: evaluated as u32,
        nodes_filtered: filtered as u32,
        nodes_exhausted: ranking.exhausted.len() as u32,
        dimension_exhausted,
        allocation_time: elapsed_nanos(started),
    }
}

pub(crate) fn elapsed_nanos(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_nanos()).unwrap_or(i64::MAX)
}

fn failure_description(metrics: &AllocMetric) -> String {
    let worst = metrics
        .dimension_exhausted
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)));
    match worst {
        Some((dim, _)) => format!("resources exhausted: {dim}"),
        None if metrics.nodes_evaluated == 0 => "no eligible nodes".to_string(),
        None => "no node could fit the work group".to_string(),
    }
}
