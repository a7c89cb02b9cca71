//! Scheduler contract — how schedulers are built and how they talk back to
//! their environment.
//!
//! A [`Scheduler`] consumes one [`Evaluation`] and emits at most one plan
//! through its [`Planner`]. Schedulers never mutate state directly; the
//! planner decides whether a plan is applied.

use serde::{Deserialize, Serialize};
use warpsim_state::{Evaluation, JobType, Plan, PlanResult, StateSnapshot};

use crate::error::SchedulerResult;
use crate::scorer::ScoringWeights;
use crate::{generic, system};

/// Environment callbacks a scheduler needs while processing an evaluation.
pub trait Planner {
    /// Submit a plan for application.
    ///
    /// An applied plan carries a non-zero `alloc_index`. A rejected plan
    /// carries a `refresh_index` and, optionally, a newer state view the
    /// scheduler should plan against on its next attempt.
    fn submit_plan(&self, plan: Plan) -> SchedulerResult<(PlanResult, Option<StateSnapshot>)>;

    /// Record the final status of an evaluation.
    fn update_eval(&self, eval: &Evaluation) -> SchedulerResult<()>;

    /// Record a follow-up evaluation created by the scheduler.
    fn create_eval(&self, eval: &Evaluation) -> SchedulerResult<()>;
}

/// A placement algorithm processing one evaluation at a time.
pub trait Scheduler {
    fn process(&mut self, eval: &Evaluation) -> SchedulerResult<()>;
}

/// Builds a scheduler planning against `state` and submitting to `planner`.
pub type Factory =
    for<'a> fn(StateSnapshot, &'a dyn Planner, &SchedulerConfig) -> Box<dyn Scheduler + 'a>;

/// Tunables shared by every scheduler variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub weights: ScoringWeights,
    /// Plan submissions allowed per evaluation before giving up.
    pub max_plan_attempts: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            max_plan_attempts: 5,
        }
    }
}

/// Select the scheduler variant for a job type.
pub fn factory_for(job_type: JobType) -> Factory {
    match job_type {
        JobType::System => system::new_system_scheduler,
        JobType::Batch => generic::new_batch_scheduler,
        JobType::Service => generic::new_service_scheduler,
    }
}
