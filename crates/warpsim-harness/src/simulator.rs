//! Simulator — the per-job orchestration loop.
//!
//! Every job runs as its own tokio task: register the job, create an
//! evaluation, run the scheduler, snapshot, reconcile metrics. Only the
//! scheduler invocation is serialized, by one global lock, because the
//! schedulers' capacity bookkeeping assumes nobody else places work while
//! an evaluation is in flight.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;
use warpsim_metrics::{JobEvaluationMetrics, SimNode, SimOutput, SimSnapshot, get_metrics};
use warpsim_placement::{SchedulerConfig, factory_for};
use warpsim_state::{Evaluation, Job, Node};

use crate::error::{HarnessError, HarnessResult};
use crate::harness::SimHarness;

/// Settings for one simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulatorConfig {
    pub scheduler: SchedulerConfig,
    /// Deadline for a single scheduler invocation. `None` waits forever.
    pub schedule_timeout: Option<Duration>,
}

pub struct Simulator {
    harness: Arc<SimHarness>,
    config: Arc<SimulatorConfig>,
    schedule_lock: Arc<Mutex<()>>,
}

impl Simulator {
    pub fn new(harness: SimHarness, config: SimulatorConfig) -> Self {
        Self {
            harness: Arc::new(harness),
            config: Arc::new(config),
            schedule_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn harness(&self) -> &Arc<SimHarness> {
        &self.harness
    }

    /// Register the cluster, one version per node.
    pub fn load_nodes(&self, nodes: &[Node]) -> HarnessResult<()> {
        let state = self.harness.state();
        for node in nodes {
            state.upsert_node(state.next_version(), node)?;
        }
        info!(count = nodes.len(), "nodes loaded");
        Ok(())
    }

    /// Schedule every job concurrently and collect one metrics record per
    /// job, in completion order.
    ///
    /// The first failure aborts the run; outstanding jobs are cancelled.
    pub async fn run(&self, jobs: Vec<Job>) -> HarnessResult<SimOutput> {
        let total = jobs.len();
        let (tx, mut rx) = mpsc::channel(total.max(1));
        let mut tasks = JoinSet::new();

        for job in jobs {
            let tx = tx.clone();
            let harness = self.harness.clone();
            let config = self.config.clone();
            let lock = self.schedule_lock.clone();
            tasks.spawn(async move {
                let result = process_job(harness, config, lock, job).await;
                // The receiver only goes away once the run has already failed.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut job_evaluations = Vec::with_capacity(total);
        while job_evaluations.len() < total {
            match rx.recv().await {
                Some(result) => job_evaluations.push(result?),
                None => {
                    return Err(HarnessError::Task(format!(
                        "{} of {total} jobs exited without reporting",
                        total - job_evaluations.len()
                    )));
                }
            }
        }

        let nodes = self
            .harness
            .state()
            .nodes()?
            .iter()
            .map(SimNode::from)
            .collect();
        info!(jobs = total, "simulation finished");
        Ok(SimOutput {
            nodes,
            job_evaluations,
        })
    }
}

async fn process_job(
    harness: Arc<SimHarness>,
    config: Arc<SimulatorConfig>,
    lock: Arc<Mutex<()>>,
    job: Job,
) -> HarnessResult<JobEvaluationMetrics> {
    let started_at = unix_nanos();
    let state = harness.state().clone();
    state.upsert_job(state.next_version(), &job)?;
    let eval = Evaluation::for_job(Uuid::new_v4().to_string(), &job);
    let factory = factory_for(job.job_type);

    let (version, elapsed) = {
        let _guard = lock.lock().await;
        let started = Instant::now();
        debug!(job_id = %job.id, eval_id = %eval.id, job_type = %job.job_type, "scheduling job");

        let task = tokio::task::spawn_blocking({
            let harness = harness.clone();
            let eval = eval.clone();
            let scheduler = config.scheduler.clone();
            move || harness.process(factory, &scheduler, &eval)
        });
        let joined = match config.schedule_timeout {
            Some(after) => tokio::time::timeout(after, task)
                .await
                .map_err(|_| HarnessError::Timeout {
                    job_id: job.id.clone(),
                    after,
                })?,
            None => task.await,
        };
        joined
            .map_err(|e| HarnessError::Task(e.to_string()))?
            .map_err(|source| HarnessError::Scheduler {
                job_id: job.id.clone(),
                source,
            })?;

        (state.latest_version(), started.elapsed())
    };
    info!(job_id = %job.id, eval_id = %eval.id, ?elapsed, "job scheduled");

    let node_ids = state
        .nodes_at(version)?
        .into_iter()
        .map(|n| n.id)
        .collect();
    let snapshot = SimSnapshot {
        eval,
        plans: harness.plans(),
        state,
        node_ids,
        version,
        started_at,
    };
    Ok(get_metrics(&snapshot)?)
}

fn unix_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
