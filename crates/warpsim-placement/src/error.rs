//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while processing an evaluation.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job not found for evaluation {eval_id}: {job_id}")]
    JobNotFound { eval_id: String, job_id: String },

    #[error("plan for evaluation {eval_id} rejected after {attempts} attempts")]
    MaxAttempts { eval_id: String, attempts: u32 },

    #[error("planner error: {0}")]
    Planner(String),

    #[error("state store error: {0}")]
    State(#[from] warpsim_state::StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
