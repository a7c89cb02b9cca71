//! warpsim-state — the cluster state container for the placement simulator.
//!
//! Backed by [redb](https://docs.rs/redb) with its in-memory backend; holds
//! nodes, jobs and allocations for one simulation run.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Entity tables are keyed by `(id, version)`: an upsert appends a revision
//! and a read at version `v` sees the newest revision `<= v`. Versions come
//! from one shared [`VersionCounter`].
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across tasks and threads.

pub mod error;
pub mod resources;
pub mod store;
pub mod tables;
pub mod types;
pub mod version;

pub use error::{StateError, StateResult};
pub use resources::{Dimension, Resources};
pub use store::{StateSnapshot, StateStore};
pub use types::*;
pub use version::VersionCounter;
