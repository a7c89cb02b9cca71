//! Type conversions between state store types and placement types.
//!
//! Bridges `warpsim_state::{Node, Allocation}` to the scorer's
//! `NodeResources`.

use warpsim_state::{Allocation, Node, Resources, StateResult, StateSnapshot};

use crate::scorer::NodeResources;

/// Convert a [`Node`] and the allocations recorded against it to
/// [`NodeResources`] for placement of `job_id`.
pub fn node_to_resources(node: &Node, allocs: &[Allocation], job_id: &str) -> NodeResources {
    NodeResources {
        node_id: node.id.clone(),
        name: node.name.clone(),
        datacenter: node.datacenter.clone(),
        node_class: node.node_class.clone(),
        attributes: node.attributes.clone(),
        capacity: node.resources - node.reserved,
        used: allocs.iter().map(|a| &a.resources).sum::<Resources>(),
        job_instances: allocs.iter().filter(|a| a.job_id == job_id).count() as u32,
        schedulable: node.is_schedulable(),
    }
}

/// Every node in `state` converted for placement of `job_id`, sorted by ID.
pub fn snapshot_to_resources(state: &StateSnapshot, job_id: &str) -> StateResult<Vec<NodeResources>> {
    let nodes = state.nodes()?;
    let mut out = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let allocs = state.allocations_by_node(&node.id)?;
        out.push(node_to_resources(node, &allocs, job_id));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use warpsim_state::*;

    fn sample_node() -> Node {
        Node {
            id: "node-1".to_string(),
            datacenter: "dc1".to_string(),
            name: "worker-1".to_string(),
            attributes: BTreeMap::from([("arch".to_string(), "amd64".to_string())]),
            resources: Resources::new(4000, 8192, 100_000, 150),
            reserved: Resources::new(500, 1024, 0, 0),
            links: BTreeMap::new(),
            meta: BTreeMap::new(),
            node_class: "large".to_string(),
            drain: false,
            status: NodeStatus::Ready,
            status_description: String::new(),
        }
    }

    fn alloc(job_id: &str, cpu: i64, mem: i64) -> Allocation {
        Allocation {
            id: format!("{job_id}-{cpu}"),
            eval_id: "e".to_string(),
            name: format!("{job_id}.g[0]"),
            node_id: "node-1".to_string(),
            job_id: job_id.to_string(),
            job: None,
            task_group: "g".to_string(),
            resources: Resources::new(cpu, mem, 0, 0),
            desired_status: DesiredStatus::Run,
            desired_description: String::new(),
            metrics: AllocMetric::default(),
        }
    }

    #[test]
    fn capacity_excludes_reserved() {
        let res = node_to_resources(&sample_node(), &[], "job");

        assert_eq!(res.capacity, Resources::new(3500, 7168, 100_000, 150));
        assert_eq!(res.used, Resources::default());
        assert_eq!(res.free(), res.capacity);
    }

    #[test]
    fn used_sums_allocations_and_counts_job_instances() {
        let allocs = vec![alloc("web", 500, 256), alloc("web", 250, 128), alloc("db", 1000, 2048)];
        let res = node_to_resources(&sample_node(), &allocs, "web");

        assert_eq!(res.used, Resources::new(1750, 2432, 0, 0));
        assert_eq!(res.job_instances, 2);
    }

    #[test]
    fn preserves_identity_fields() {
        let res = node_to_resources(&sample_node(), &[], "job");

        assert_eq!(res.node_id, "node-1");
        assert_eq!(res.name, "worker-1");
        assert_eq!(res.node_class, "large");
        assert_eq!(res.attributes.get("arch"), Some(&"amd64".to_string()));
        assert!(res.schedulable);
    }

    #[test]
    fn draining_node_is_not_schedulable() {
        let mut node = sample_node();
        node.drain = true;
        assert!(!node_to_resources(&node, &[], "job").schedulable);

        let mut node = sample_node();
        node.status = NodeStatus::Down;
        assert!(!node_to_resources(&node, &[], "job").schedulable);
    }

    #[test]
    fn snapshot_conversion_reads_allocations() {
        let store = StateStore::open_in_memory().unwrap();
        store.upsert_node(store.next_version(), &sample_node()).unwrap();
        store
            .upsert_allocations(store.next_version(), &[alloc("web", 500, 256)])
            .unwrap();

        let nodes = snapshot_to_resources(&store.snapshot(), "web").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].used, Resources::new(500, 256, 0, 0));
        assert_eq!(nodes[0].job_instances, 1);
    }
}
