//! StateStore — versioned cluster state backed by an in-memory redb database.
//!
//! Every upsert is tagged with a version obtained from the shared
//! [`VersionCounter`] and appends a new revision keyed by `(id, version)`.
//! A read at version `v` observes, per entity, the revision with the highest
//! version `<= v`. Reads use redb read transactions, so they never wait on
//! writers; each write is a single write transaction, so a batch of
//! allocations lands all-or-nothing.

use std::collections::BTreeMap;
use std::sync::Arc;

use redb::{
    Database, MultimapTableDefinition, ReadTransaction, ReadableDatabase, ReadableMultimapTable,
    ReadableTable, Table, WriteTransaction,
};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;
use crate::version::VersionCounter;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe, multi-version state store.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    versions: Arc<VersionCounter>,
}

impl StateStore {
    /// Create an ephemeral in-memory state store with its own version counter.
    pub fn open_in_memory() -> StateResult<Self> {
        Self::open_in_memory_with(Arc::new(VersionCounter::new()))
    }

    /// Create an ephemeral in-memory state store sharing `versions`.
    pub fn open_in_memory_with(versions: Arc<VersionCounter>) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            versions,
        };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.open_table(ALLOCS).map_err(map_err!(Table))?;
        txn.open_multimap_table(ALLOCS_BY_NODE)
            .map_err(map_err!(Table))?;
        txn.open_multimap_table(ALLOCS_BY_JOB)
            .map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Versions ───────────────────────────────────────────────────

    /// Issue a fresh version for the next mutation.
    pub fn next_version(&self) -> u64 {
        self.versions.next()
    }

    /// The most recently issued version.
    pub fn latest_version(&self) -> u64 {
        self.versions.latest()
    }

    /// The counter shared by everything that mutates this store.
    pub fn versions(&self) -> Arc<VersionCounter> {
        self.versions.clone()
    }

    /// A consistent read view pinned at the latest issued version.
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot_at(self.latest_version())
    }

    /// A read view pinned at `version`.
    pub fn snapshot_at(&self, version: u64) -> StateSnapshot {
        StateSnapshot {
            store: self.clone(),
            version,
        }
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Insert a new revision of a node.
    pub fn upsert_node(&self, version: u64, node: &Node) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            insert_revision(&mut table, "node", &node.id, version, &value)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(node_id = %node.id, version, "node stored");
        Ok(())
    }

    /// Insert a new revision of a job.
    pub fn upsert_job(&self, version: u64, job: &Job) -> StateResult<()> {
        let value = serde_json::to_vec(job).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            insert_revision(&mut table, "job", &job.id, version, &value)?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(job_id = %job.id, version, "job stored");
        Ok(())
    }

    /// Insert new revisions of a batch of allocations in one transaction.
    ///
    /// Either every allocation is written or, on error, none is.
    pub fn upsert_allocations(&self, version: u64, allocs: &[Allocation]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
            for alloc in allocs {
                let value = serde_json::to_vec(alloc).map_err(map_err!(Serialize))?;
                insert_revision(&mut table, "allocation", &alloc.id, version, &value)?;
            }
        }
        index_allocations(&txn, ALLOCS_BY_NODE, allocs, |a| a.node_id.as_str())?;
        index_allocations(&txn, ALLOCS_BY_JOB, allocs, |a| a.job_id.as_str())?;
        // Dropping an uncommitted write transaction aborts it.
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(version, count = allocs.len(), "allocations stored");
        Ok(())
    }

    // ── Reads at the latest version ────────────────────────────────

    /// Get the latest revision of a node.
    pub fn node_by_id(&self, node_id: &str) -> StateResult<Node> {
        self.node_by_id_at(node_id, self.latest_version())
    }

    /// Get the latest revision of a job.
    pub fn job_by_id(&self, job_id: &str) -> StateResult<Job> {
        self.job_by_id_at(job_id, self.latest_version())
    }

    /// Every allocation currently recorded against a node.
    pub fn allocations_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        self.allocations_by_node_at(node_id, self.latest_version())
    }

    /// Every allocation owned by a job.
    pub fn allocations_by_job(&self, job_id: &str) -> StateResult<Vec<Allocation>> {
        self.allocations_by_job_at(job_id, self.latest_version())
    }

    /// Every node, sorted by ID.
    pub fn nodes(&self) -> StateResult<Vec<Node>> {
        self.nodes_at(self.latest_version())
    }

    // ── Reads at an explicit version ───────────────────────────────

    pub fn node_by_id_at(&self, node_id: &str, version: u64) -> StateResult<Node> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        latest_revision(&txn, NODES, node_id, version)?
            .ok_or_else(|| StateError::not_found("node", node_id))
    }

    pub fn job_by_id_at(&self, job_id: &str, version: u64) -> StateResult<Job> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        latest_revision(&txn, JOBS, job_id, version)?
            .ok_or_else(|| StateError::not_found("job", job_id))
    }

    pub fn allocation_by_id_at(&self, alloc_id: &str, version: u64) -> StateResult<Allocation> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        latest_revision(&txn, ALLOCS, alloc_id, version)?
            .ok_or_else(|| StateError::not_found("allocation", alloc_id))
    }

    pub fn allocations_by_node_at(
        &self,
        node_id: &str,
        version: u64,
    ) -> StateResult<Vec<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let allocs = indexed_allocations(&txn, ALLOCS_BY_NODE, node_id, version)?;
        // An allocation may have moved since it was indexed here.
        Ok(allocs.into_iter().filter(|a| a.node_id == node_id).collect())
    }

    pub fn allocations_by_job_at(&self, job_id: &str, version: u64) -> StateResult<Vec<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        indexed_allocations(&txn, ALLOCS_BY_JOB, job_id, version)
    }

    pub fn nodes_at(&self, version: u64) -> StateResult<Vec<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        // Keys iterate in (id, version) order, so the last visible revision
        // per id wins.
        let mut latest: BTreeMap<String, Node> = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let (id, rev) = key.value();
            if rev > version {
                continue;
            }
            let node: Node =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            latest.insert(id.to_string(), node);
        }
        Ok(latest.into_values().collect())
    }
}

/// Read-only view of the store pinned at one version.
///
/// Schedulers plan against a snapshot so that concurrent upserts never
/// change what they see mid-evaluation.
#[derive(Clone)]
pub struct StateSnapshot {
    store: StateStore,
    version: u64,
}

impl StateSnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_by_id(&self, node_id: &str) -> StateResult<Node> {
        self.store.node_by_id_at(node_id, self.version)
    }

    pub fn job_by_id(&self, job_id: &str) -> StateResult<Job> {
        self.store.job_by_id_at(job_id, self.version)
    }

    pub fn allocations_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        self.store.allocations_by_node_at(node_id, self.version)
    }

    pub fn allocations_by_job(&self, job_id: &str) -> StateResult<Vec<Allocation>> {
        self.store.allocations_by_job_at(job_id, self.version)
    }

    pub fn nodes(&self) -> StateResult<Vec<Node>> {
        self.store.nodes_at(self.version)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("latest_version", &self.latest_version())
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSnapshot")
            .field("version", &self.version)
            .finish()
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn insert_revision(
    table: &mut Table<'_, (&'static str, u64), &'static [u8]>,
    kind: &'static str,
    id: &str,
    version: u64,
    value: &[u8],
) -> StateResult<()> {
    if table.get((id, version)).map_err(map_err!(Read))?.is_some() {
        return Err(StateError::VersionReused {
            kind,
            id: id.to_string(),
            version,
        });
    }
    table.insert((id, version), value).map_err(map_err!(Write))?;
    Ok(())
}

fn index_allocations(
    txn: &WriteTransaction,
    index: MultimapTableDefinition<'static, &'static str, &'static str>,
    allocs: &[Allocation],
    key: impl Fn(&Allocation) -> &str,
) -> StateResult<()> {
    let mut table = txn.open_multimap_table(index).map_err(map_err!(Table))?;
    for alloc in allocs {
        let k = key(alloc);
        // Failed allocations have no node; there is nothing to index.
        if k.is_empty() {
            continue;
        }
        table.insert(k, alloc.id.as_str()).map_err(map_err!(Write))?;
    }
    Ok(())
}

fn latest_revision<T: DeserializeOwned>(
    txn: &ReadTransaction,
    def: VersionedTable,
    id: &str,
    version: u64,
) -> StateResult<Option<T>> {
    let table = txn.open_table(def).map_err(map_err!(Table))?;
    let mut revisions = table
        .range((id, 0u64)..=(id, version))
        .map_err(map_err!(Read))?;
    match revisions.next_back() {
        Some(entry) => {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let decoded = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            Ok(Some(decoded))
        }
        None => Ok(None),
    }
}

fn indexed_allocations(
    txn: &ReadTransaction,
    index: MultimapTableDefinition<'static, &'static str, &'static str>,
    key: &str,
    version: u64,
) -> StateResult<Vec<Allocation>> {
    let ids: Vec<String> = {
        let table = txn.open_multimap_table(index).map_err(map_err!(Table))?;
        let mut ids = Vec::new();
        for entry in table.get(key).map_err(map_err!(Read))? {
            ids.push(entry.map_err(map_err!(Read))?.value().to_string());
        }
        ids
    };
    let mut allocs = Vec::with_capacity(ids.len());
    for id in &ids {
        // Indexed after `version`: not visible yet.
        if let Some(alloc) = latest_revision::<Allocation>(txn, ALLOCS, id, version)? {
            allocs.push(alloc);
        }
    }
    Ok(allocs)
}
