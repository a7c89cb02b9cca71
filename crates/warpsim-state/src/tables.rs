//! redb table definitions for the cluster state container.
//!
//! Entity tables are keyed by `(id, version)` so every upsert appends a new
//! revision instead of overwriting the previous one. Values are JSON-serialized
//! domain types.

use redb::{MultimapTableDefinition, TableDefinition};

/// A table of entity revisions keyed by `(id, version)`.
pub type VersionedTable = TableDefinition<'static, (&'static str, u64), &'static [u8]>;

/// Node revisions keyed by `(node_id, version)`.
pub const NODES: VersionedTable = TableDefinition::new("nodes");

/// Job revisions keyed by `(job_id, version)`.
pub const JOBS: VersionedTable = TableDefinition::new("jobs");

/// Allocation revisions keyed by `(alloc_id, version)`.
pub const ALLOCS: VersionedTable = TableDefinition::new("allocs");

/// Allocation IDs indexed by node ID.
pub const ALLOCS_BY_NODE: MultimapTableDefinition<'static, &'static str, &'static str> =
    MultimapTableDefinition::new("allocs_by_node");

/// Allocation IDs indexed by job ID.
pub const ALLOCS_BY_JOB: MultimapTableDefinition<'static, &'static str, &'static str> =
    MultimapTableDefinition::new("allocs_by_job");
