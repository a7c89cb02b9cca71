//! WarpSim schedulers — the scheduler/planner contract and the built-in
//! placement algorithms.
//!
//! Schedulers read a pinned [`warpsim_state::StateSnapshot`], decide where
//! each work group replica goes, and hand the resulting plan to a
//! [`Planner`]. They never write state themselves.
//!
//! # Components
//!
//! - **`scheduler`** — `Scheduler`/`Planner` traits, `Factory`, `factory_for`
//! - **`generic`** — batch and service variants
//! - **`system`** — one-per-node variant
//! - **`scorer`** — Node scoring (bin-packing, balance, spread)
//! - **`feasible`** — Datacenter, status and constraint filters
//! - **`convert`** — Type conversions from state store types

pub mod convert;
mod driver;
pub mod error;
pub mod feasible;
pub mod generic;
pub mod scheduler;
pub mod scorer;
pub mod system;

pub use error::{SchedulerError, SchedulerResult};
pub use generic::{GenericScheduler, new_batch_scheduler, new_service_scheduler};
pub use scheduler::{Factory, Planner, Scheduler, SchedulerConfig, factory_for};
pub use scorer::{NodeResources, NodeScore, Ranking, ScoringWeights, rank_nodes, score_node};
pub use system::{SystemScheduler, new_system_scheduler};
