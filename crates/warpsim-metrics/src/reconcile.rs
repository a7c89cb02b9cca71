//! Metrics reconciliation — turns a [`SimSnapshot`] into a
//! [`JobEvaluationMetrics`] record.
//!
//! Steps, per evaluation:
//! 1. Merge every plan submitted for the evaluation.
//! 2. Record successful allocations and the slowest placement time.
//! 3. Expand each group's single reported failure into its true count.
//! 4. Recompute residual capacity for every node that received a placement.

use std::collections::BTreeSet;

use tracing::{debug, warn};
use warpsim_state::{JobType, Resources, StateStore};

use crate::error::{MetricsError, MetricsResult};
use crate::report::{AllocMetrics, JobEvaluationMetrics, JobMetrics, NEVER_COMPLETED, NodeUsageChange};
use crate::snapshot::SimSnapshot;

/// Number of failed-allocation records to emit for one reported failure.
///
/// Schedulers report at most one failed allocation per work group per
/// plan, however many replicas failed. The desired replica count is the
/// group's count, times the node count for system jobs. A desired count of
/// one means the report is exact; otherwise the true number of failures is
/// the desired count minus the replicas of that group that were placed.
pub fn corrected_failure_count(
    group_count: u32,
    is_system: bool,
    node_count: usize,
    successes: usize,
) -> usize {
    let mut desired = group_count as usize;
    if is_system {
        desired *= node_count;
    }
    if desired == 1 {
        1
    } else {
        desired.saturating_sub(successes)
    }
}

/// Capacity left on a node as of `version`: total minus reserved minus
/// every allocation recorded against it.
pub fn residual_capacity(state: &StateStore, node_id: &str, version: u64) -> MetricsResult<Resources> {
    let node = state
        .node_by_id_at(node_id, version)
        .map_err(|e| MetricsError::from_lookup("node", node_id, e))?;
    let allocs = state.allocations_by_node_at(node_id, version)?;
    Ok(Resources::residual(
        &node.resources,
        &node.reserved,
        allocs.iter().map(|a| &a.resources),
    ))
}

/// Build the metrics record for the snapshot's evaluation.
pub fn get_metrics(snapshot: &SimSnapshot) -> MetricsResult<JobEvaluationMetrics> {
    let eval = &snapshot.eval;
    let state = &snapshot.state;
    let version = snapshot.version;

    let evaluated = state
        .job_by_id_at(&eval.job_id, version)
        .map_err(|e| MetricsError::from_lookup("job", &eval.job_id, e))?;
    let mut job = JobMetrics::from_job(&evaluated);
    job.start_time_stamp = snapshot.started_at;

    let mut successful = Vec::new();
    let mut failed = Vec::new();
    let mut slowest: Option<i64> = None;

    for plan in snapshot.plans.iter().filter(|p| p.eval_id == eval.id) {
        for alloc in plan.placed() {
            let metrics = AllocMetrics::from(alloc);
            slowest = Some(slowest.map_or(metrics.allocation_time, |t| t.max(metrics.allocation_time)));
            successful.push(metrics);
        }

        for failure in &plan.failed_allocs {
            let owner = failure.job.as_ref().unwrap_or(&evaluated);
            let Some(group) = owner.group(&failure.task_group) else {
                warn!(
                    job_id = %owner.id,
                    group = %failure.task_group,
                    "failed allocation names an unknown work group"
                );
                continue;
            };
            let successes = plan
                .placed()
                .filter(|a| a.task_group == failure.task_group)
                .count();
            let count = corrected_failure_count(
                group.count,
                owner.job_type == JobType::System,
                snapshot.node_ids.len(),
                successes,
            );
            failed.extend(std::iter::repeat_n(AllocMetrics::from(failure), count));
        }
    }

    job.final_time_stamp = slowest.map_or(NEVER_COMPLETED, |t| snapshot.started_at + t);

    let touched: BTreeSet<&str> = successful.iter().map(|a| a.node_id.as_str()).collect();
    let mut node_usage_changes = Vec::with_capacity(touched.len());
    for node_id in touched {
        node_usage_changes.push(NodeUsageChange {
            id: node_id.to_string(),
            available: residual_capacity(state, node_id, version)?,
        });
    }

    debug!(
        eval_id = %eval.id,
        job_id = %eval.job_id,
        successful = successful.len(),
        failed = failed.len(),
        nodes_changed = node_usage_changes.len(),
        "job metrics reconciled"
    );

    Ok(JobEvaluationMetrics {
        job,
        successful,
        failed,
        node_usage_changes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use warpsim_state::*;

    // ── Failure-count correction ───────────────────────────────────

    #[test]
    fn single_replica_failure_is_exact() {
        assert_eq!(corrected_failure_count(1, false, 10, 0), 1);
    }

    #[test]
    fn multi_replica_failure_is_desired_minus_placed() {
        assert_eq!(corrected_failure_count(5, false, 10, 3), 2);
        assert_eq!(corrected_failure_count(3, false, 1, 2), 1);
        assert_eq!(corrected_failure_count(4, false, 1, 0), 4);
    }

    #[test]
    fn system_jobs_multiply_by_node_count() {
        assert_eq!(corrected_failure_count(1, true, 3, 0), 3);
        assert_eq!(corrected_failure_count(1, true, 3, 1), 2);
        assert_eq!(corrected_failure_count(2, true, 3, 4), 2);
    }

    #[test]
    fn system_job_on_single_node_is_exact() {
        assert_eq!(corrected_failure_count(1, true, 1, 0), 1);
    }

    #[test]
    fn over_placement_never_underflows() {
        assert_eq!(corrected_failure_count(2, false, 1, 5), 0);
    }

    // ── Reconciliation ─────────────────────────────────────────────

    fn node(id: &str) -> Node {
        Node {
            id: id.to_string(),
            datacenter: "dc1".to_string(),
            name: id.to_string(),
            attributes: BTreeMap::new(),
            resources: Resources::new(4, 4096, 100, 10),
            reserved: Resources::new(0, 0, 0, 0),
            links: BTreeMap::new(),
            meta: BTreeMap::new(),
            node_class: String::new(),
            drain: false,
            status: NodeStatus::Ready,
            status_description: String::new(),
        }
    }

    fn job(id: &str, job_type: JobType, count: u32) -> Job {
        Job {
            id: id.to_string(),
            region: "global".to_string(),
            datacenters: vec!["dc1".to_string()],
            name: id.to_string(),
            job_type,
            priority: 50,
            constraints: Vec::new(),
            groups: vec![WorkGroup {
                name: "g".to_string(),
                count,
                resources: Resources::new(1, 512, 0, 0),
                constraints: Vec::new(),
            }],
        }
    }

    fn alloc(id: &str, eval_id: &str, node_id: &str, job: &Job, time: i64) -> Allocation {
        Allocation {
            id: id.to_string(),
            eval_id: eval_id.to_string(),
            name: format!("{}.g[0]", job.id),
            node_id: node_id.to_string(),
            job_id: job.id.clone(),
            job: None,
            task_group: "g".to_string(),
            resources: Resources::new(1, 512, 0, 0),
            desired_status: DesiredStatus::Run,
            desired_description: String::new(),
            metrics: AllocMetric {
                allocation_time: time,
                ..AllocMetric::default()
            },
        }
    }

    fn failure(id: &str, eval_id: &str, job: &Job) -> Allocation {
        let mut a = alloc(id, eval_id, "", job, 0);
        a.job = Some(job.clone());
        a.desired_status = DesiredStatus::Failed;
        a.desired_description = "resources exhausted: cpu".to_string();
        a
    }

    struct Fixture {
        store: StateStore,
        node_ids: Vec<String>,
    }

    impl Fixture {
        fn new(nodes: &[&str]) -> Self {
            let store = StateStore::open_in_memory().unwrap();
            for id in nodes {
                store.upsert_node(store.next_version(), &node(id)).unwrap();
            }
            Self {
                store,
                node_ids: nodes.iter().map(|s| s.to_string()).collect(),
            }
        }

        fn apply(&self, plan: &Plan) {
            self.store
                .upsert_allocations(self.store.next_version(), &plan.flatten())
                .unwrap();
        }

        fn snapshot(&self, eval: &Evaluation, plans: Vec<Plan>) -> SimSnapshot {
            SimSnapshot {
                eval: eval.clone(),
                plans: plans.into_iter().map(Arc::new).collect(),
                state: self.store.clone(),
                node_ids: self.node_ids.clone(),
                version: self.store.latest_version(),
                started_at: 1_000,
            }
        }
    }

    fn register(fx: &Fixture, job: &Job, eval_id: &str) -> Evaluation {
        fx.store.upsert_job(fx.store.next_version(), job).unwrap();
        Evaluation::for_job(eval_id.to_string(), job)
    }

    #[test]
    fn successful_placement_reduces_residual() {
        let fx = Fixture::new(&["n1"]);
        let job = job("web", JobType::Batch, 1);
        let eval = register(&fx, &job, "e1");
        let mut plan = Plan::new(&eval);
        plan.append_alloc(alloc("a1", "e1", "n1", &job, 250));
        fx.apply(&plan);

        let metrics = get_metrics(&fx.snapshot(&eval, vec![plan])).unwrap();

        assert_eq!(metrics.successful.len(), 1);
        assert!(metrics.failed.is_empty());
        assert_eq!(metrics.node_usage_changes.len(), 1);
        assert_eq!(metrics.node_usage_changes[0].available, Resources::new(3, 3584, 100, 10));
        assert_eq!(metrics.job.start_time_stamp, 1_000);
        assert_eq!(metrics.job.final_time_stamp, 1_250);
    }

    #[test]
    fn multi_count_failure_is_expanded() {
        let fx = Fixture::new(&["n1"]);
        let job = job("web", JobType::Service, 5);
        let eval = register(&fx, &job, "e1");
        let mut plan = Plan::new(&eval);
        for i in 0..3 {
            plan.append_alloc(alloc(&format!("a{i}"), "e1", "n1", &job, 10));
        }
        plan.append_failed(failure("f1", "e1", &job));
        fx.apply(&plan);

        let metrics = get_metrics(&fx.snapshot(&eval, vec![plan])).unwrap();

        assert_eq!(metrics.successful.len(), 3);
        assert_eq!(metrics.failed.len(), 2);
        assert!(metrics.failed.iter().all(|f| f.task_group == "g" && f.desired_status == "failed"));
    }

    #[test]
    fn system_failure_uses_cluster_size() {
        let fx = Fixture::new(&["n1", "n2", "n3"]);
        let job = job("agent", JobType::System, 1);
        let eval = register(&fx, &job, "e1");
        let mut plan = Plan::new(&eval);
        plan.append_failed(failure("f1", "e1", &job));
        fx.apply(&plan);

        let metrics = get_metrics(&fx.snapshot(&eval, vec![plan])).unwrap();

        assert_eq!(metrics.failed.len(), 3);
        assert!(metrics.node_usage_changes.is_empty());
        assert_eq!(metrics.job.final_time_stamp, NEVER_COMPLETED);
    }

    #[test]
    fn no_plan_yields_empty_record() {
        let fx = Fixture::new(&["n1"]);
        let job = job("web", JobType::Batch, 1);
        let eval = register(&fx, &job, "e1");

        let metrics = get_metrics(&fx.snapshot(&eval, Vec::new())).unwrap();

        assert!(metrics.successful.is_empty());
        assert!(metrics.failed.is_empty());
        assert!(metrics.node_usage_changes.is_empty());
        assert_eq!(metrics.job.start_time_stamp, 1_000);
        assert_eq!(metrics.job.final_time_stamp, NEVER_COMPLETED);
        assert_eq!(metrics.job.task_groups, vec!["g"]);
    }

    #[test]
    fn other_evaluations_plans_are_ignored() {
        let fx = Fixture::new(&["n1"]);
        let other = job("other", JobType::Batch, 1);
        let other_eval = register(&fx, &other, "e0");
        let mut other_plan = Plan::new(&other_eval);
        other_plan.append_alloc(alloc("a0", "e0", "n1", &other, 10));
        fx.apply(&other_plan);

        let job = job("web", JobType::Batch, 1);
        let eval = register(&fx, &job, "e1");
        let mut plan = Plan::new(&eval);
        plan.append_alloc(alloc("a1", "e1", "n1", &job, 10));
        fx.apply(&plan);

        let metrics = get_metrics(&fx.snapshot(&eval, vec![other_plan, plan])).unwrap();

        assert_eq!(metrics.successful.len(), 1);
        assert_eq!(metrics.successful[0].job_id, "web");
        // Residual includes the earlier job's allocation too.
        assert_eq!(metrics.node_usage_changes[0].available, Resources::new(2, 3072, 100, 10));
    }

    #[test]
    fn multiple_plans_for_one_eval_are_merged() {
        let fx = Fixture::new(&["n1", "n2"]);
        let job = job("web", JobType::Batch, 2);
        let eval = register(&fx, &job, "e1");
        let mut first = Plan::new(&eval);
        first.append_alloc(alloc("a1", "e1", "n1", &job, 10));
        let mut second = Plan::new(&eval);
        second.append_alloc(alloc("a2", "e1", "n2", &job, 40));
        fx.apply(&first);
        fx.apply(&second);

        let metrics = get_metrics(&fx.snapshot(&eval, vec![first, second])).unwrap();

        assert_eq!(metrics.successful.len(), 2);
        assert_eq!(metrics.node_usage_changes.len(), 2);
        assert_eq!(metrics.job.final_time_stamp, 1_040);
    }

    #[test]
    fn later_allocations_are_not_attributed() {
        let fx = Fixture::new(&["n1"]);
        let job = job("web", JobType::Batch, 1);
        let eval = register(&fx, &job, "e1");
        let mut plan = Plan::new(&eval);
        plan.append_alloc(alloc("a1", "e1", "n1", &job, 10));
        fx.apply(&plan);
        let snapshot = fx.snapshot(&eval, vec![plan]);

        let later = self::job("later", JobType::Batch, 1);
        let later_eval = register(&fx, &later, "e2");
        let mut later_plan = Plan::new(&later_eval);
        later_plan.append_alloc(alloc("a2", "e2", "n1", &later, 10));
        fx.apply(&later_plan);

        let metrics = get_metrics(&snapshot).unwrap();
        assert_eq!(metrics.node_usage_changes[0].available, Resources::new(3, 3584, 100, 10));
    }

    #[test]
    fn residual_with_no_allocations_is_total_minus_reserved() {
        let store = StateStore::open_in_memory().unwrap();
        let mut n = node("n1");
        n.reserved = Resources::new(1, 1024, 10, 0);
        store.upsert_node(store.next_version(), &n).unwrap();

        let v = store.latest_version();
        let first = residual_capacity(&store, "n1", v).unwrap();
        let second = residual_capacity(&store, "n1", v).unwrap();

        assert_eq!(first, Resources::new(3, 3072, 90, 10));
        assert_eq!(first, second);
    }

    #[test]
    fn missing_job_is_fatal() {
        let fx = Fixture::new(&["n1"]);
        let job = job("ghost", JobType::Batch, 1);
        let eval = Evaluation::for_job("e1".to_string(), &job);

        let err = get_metrics(&fx.snapshot(&eval, Vec::new())).unwrap_err();
        assert!(matches!(err, MetricsError::MissingEntity { kind: "job", .. }));
    }

    #[test]
    fn missing_node_is_fatal() {
        let store = StateStore::open_in_memory().unwrap();
        let err = residual_capacity(&store, "ghost", 0).unwrap_err();
        assert!(matches!(err, MetricsError::MissingEntity { kind: "node", .. }));
    }
}
