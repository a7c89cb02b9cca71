//! Plan acceptor — the environment schedulers run against.
//!
//! `SimHarness` implements [`Planner`]: it records every plan and
//! evaluation update, and applies plans to the shared [`StateStore`]
//! under a fresh version. Plan submissions are serialized by one lock so
//! two plans can never be applied out of order.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use warpsim_placement::{Factory, Planner, SchedulerConfig, SchedulerResult};
use warpsim_state::{Evaluation, Plan, PlanResult, StateSnapshot, StateStore};

#[derive(Debug, Default)]
struct History {
    plans: Vec<Arc<Plan>>,
    evals: Vec<Evaluation>,
    created_evals: Vec<Evaluation>,
}

pub struct SimHarness {
    state: StateStore,
    /// When set, plans and evaluation updates are forwarded here after
    /// being recorded instead of being applied.
    planner: Option<Box<dyn Planner + Send + Sync>>,
    history: Mutex<History>,
}

impl SimHarness {
    pub fn new(state: StateStore) -> Self {
        Self {
            state,
            planner: None,
            history: Mutex::new(History::default()),
        }
    }

    /// Forward plans and evaluation updates to `planner`.
    pub fn with_planner(mut self, planner: Box<dyn Planner + Send + Sync>) -> Self {
        self.planner = Some(planner);
        self
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn next_version(&self) -> u64 {
        self.state.next_version()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    /// Every plan submitted so far, in submission order.
    pub fn plans(&self) -> Vec<Arc<Plan>> {
        self.history.lock().plans.clone()
    }

    /// Every evaluation update, in order.
    pub fn evals(&self) -> Vec<Evaluation> {
        self.history.lock().evals.clone()
    }

    pub fn created_evals(&self) -> Vec<Evaluation> {
        self.history.lock().created_evals.clone()
    }

    /// Build a scheduler with `factory` against the current state and run
    /// it on `eval`.
    pub fn process(
        &self,
        factory: Factory,
        config: &SchedulerConfig,
        eval: &Evaluation,
    ) -> SchedulerResult<()> {
        let mut scheduler = factory(self.snapshot(), self, config);
        scheduler.process(eval)
    }
}

impl Planner for SimHarness {
    fn submit_plan(&self, plan: Plan) -> SchedulerResult<(PlanResult, Option<StateSnapshot>)> {
        let mut history = self.history.lock();
        let plan = Arc::new(plan);
        history.plans.push(plan.clone());

        if let Some(planner) = &self.planner {
            // Custom planners may call back into the harness.
            drop(history);
            return planner.submit_plan(Plan::clone(&plan));
        }

        let version = self.state.next_version();
        let allocs = plan.flatten();
        self.state.upsert_allocations(version, &allocs)?;
        debug!(
            eval_id = %plan.eval_id,
            version,
            placed = plan.placed_count(),
            failed = plan.failed_allocs.len(),
            "plan applied"
        );

        let result = PlanResult {
            node_update: plan.node_update.clone(),
            node_allocation: plan.node_allocation.clone(),
            alloc_index: version,
            refresh_index: 0,
        };
        Ok((result, None))
    }

    fn update_eval(&self, eval: &Evaluation) -> SchedulerResult<()> {
        self.history.lock().evals.push(eval.clone());
        match &self.planner {
            Some(planner) => planner.update_eval(eval),
            None => Ok(()),
        }
    }

    fn create_eval(&self, eval: &Evaluation) -> SchedulerResult<()> {
        self.history.lock().created_evals.push(eval.clone());
        match &self.planner {
            Some(planner) => planner.create_eval(eval),
            None => Ok(()),
        }
    }
}

/// Planner that rejects every plan, telling the scheduler to refresh its
/// state view and try again.
pub struct RejectPlan {
    state: StateStore,
}

impl RejectPlan {
    pub fn new(state: StateStore) -> Self {
        Self { state }
    }
}

impl Planner for RejectPlan {
    fn submit_plan(&self, plan: Plan) -> SchedulerResult<(PlanResult, Option<StateSnapshot>)> {
        let refresh_index = self.state.latest_version();
        debug!(eval_id = %plan.eval_id, refresh_index, "plan rejected");
        let result = PlanResult {
            refresh_index,
            ..PlanResult::default()
        };
        Ok((result, Some(self.state.snapshot_at(refresh_index))))
    }

    fn update_eval(&self, _eval: &Evaluation) -> SchedulerResult<()> {
        Ok(())
    }

    fn create_eval(&self, _eval: &Evaluation) -> SchedulerResult<()> {
        Ok(())
    }
}
