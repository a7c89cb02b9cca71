//! Node spec files.
//!
//! ```toml
//! id = "node-1"            # optional, a UUID is generated when absent
//! datacenter = "dc1"
//! name = "worker-1"
//! node_class = "large"
//! status = "ready"         # initializing | ready | down
//!
//! [attributes]
//! arch = "amd64"
//!
//! [resources]
//! cpu = 4000
//! memory_mb = 8192
//! disk_mb = 100000
//! iops = 150
//!
//! [reserved]
//! cpu = 100
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;
use warpsim_state::{Node, NodeStatus, Resources};

use crate::error::{SpecError, SpecResult};
use crate::source::{decode_file, read_paths};

/// On-disk node schema, decoded from JSON or TOML.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub id: Option<String>,
    pub datacenter: String,
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub resources: Resources,
    pub reserved: Resources,
    pub links: BTreeMap<String, String>,
    pub meta: BTreeMap<String, String>,
    pub node_class: String,
    pub drain: bool,
    pub status: NodeStatus,
    pub status_description: String,
}

impl NodeConfig {
    /// Convert into a state node, generating an ID when none was given.
    pub fn into_node(self) -> Node {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Node {
            id,
            datacenter: self.datacenter,
            name: self.name,
            attributes: self.attributes,
            resources: self.resources,
            reserved: self.reserved,
            links: self.links,
            meta: self.meta,
            node_class: self.node_class,
            drain: self.drain,
            status: self.status,
            status_description: self.status_description,
        }
    }
}

/// Load one node spec file.
pub fn load_node(path: &Path) -> SpecResult<Node> {
    let config: NodeConfig = decode_file(path)?;
    if !config.resources.is_non_negative() || !config.reserved.is_non_negative() {
        return Err(SpecError::invalid(path, "resources must not be negative"));
    }
    let node = config.into_node();
    debug!(node_id = %node.id, path = %path.display(), "node spec loaded");
    Ok(node)
}

/// Load every node listed in a path-list file, in list order.
pub fn load_nodes(list: &Path) -> SpecResult<Vec<Node>> {
    read_paths(list)?.iter().map(|p| load_node(p)).collect()
}
