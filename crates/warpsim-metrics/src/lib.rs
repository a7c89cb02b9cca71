//! warpsim-metrics — accounting for what the schedulers did.
//!
//! Each processed job produces one [`SimSnapshot`]; [`get_metrics`] turns it
//! into a [`JobEvaluationMetrics`] record of successful placements,
//! corrected failure counts and the residual capacity of every node the
//! evaluation touched.
//!
//! # Architecture
//!
//! ```text
//! SimSnapshot ──get_metrics()──▶ JobEvaluationMetrics
//!   ├── plans filtered by eval ID
//!   ├── corrected_failure_count() per reported failure
//!   └── residual_capacity() per touched node, pinned at snapshot.version
//! ```

pub mod error;
pub mod reconcile;
pub mod report;
pub mod snapshot;

pub use error::{MetricsError, MetricsResult};
pub use reconcile::{corrected_failure_count, get_metrics, residual_capacity};
pub use report::{
    AllocMetrics, JobEvaluationMetrics, JobMetrics, NEVER_COMPLETED, NodeUsageChange, SimNode,
    SimOutput,
};
pub use snapshot::SimSnapshot;
