//! Harness error types.

use std::time::Duration;

use thiserror::Error;
use warpsim_metrics::MetricsError;
use warpsim_placement::SchedulerError;
use warpsim_state::StateError;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("scheduler failed for job {job_id}: {source}")]
    Scheduler {
        job_id: String,
        #[source]
        source: SchedulerError,
    },

    #[error("scheduling job {job_id} did not finish within {after:?}")]
    Timeout { job_id: String, after: Duration },

    #[error("job task failed: {0}")]
    Task(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
