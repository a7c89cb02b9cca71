//! warpsim-harness — drives the schedulers against a synthetic cluster.
//!
//! # Architecture
//!
//! ```text
//! Simulator::run(jobs)
//!   └── one task per job
//!         ├── upsert job, create evaluation
//!         ├── [global lock] scheduler.process(eval)
//!         │        └── SimHarness::submit_plan → StateStore::upsert_allocations
//!         ├── SimSnapshot (pinned at the post-scheduling version)
//!         └── get_metrics → mpsc → collector
//! ```

pub mod error;
pub mod harness;
pub mod simulator;

pub use error::{HarnessError, HarnessResult};
pub use harness::{RejectPlan, SimHarness};
pub use simulator::{Simulator, SimulatorConfig};
