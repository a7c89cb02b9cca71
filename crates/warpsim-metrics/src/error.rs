//! Metrics error types.

use thiserror::Error;
use warpsim_state::StateError;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// A snapshot referenced an entity the state store does not hold. The
    /// harness guarantees this never happens; a record built without it
    /// would be corrupt.
    #[error("{kind} referenced by snapshot is missing from state: {id}")]
    MissingEntity { kind: &'static str, id: String },

    #[error("state store error: {0}")]
    State(#[from] StateError),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

impl MetricsError {
    /// Map a store lookup failure, turning not-found into
    /// [`MetricsError::MissingEntity`].
    pub(crate) fn from_lookup(kind: &'static str, id: &str, err: StateError) -> Self {
        if err.is_not_found() {
            Self::MissingEntity {
                kind,
                id: id.to_string(),
            }
        } else {
            Self::State(err)
        }
    }
}
