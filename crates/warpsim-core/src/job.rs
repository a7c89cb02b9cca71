//! Job spec files.
//!
//! ```toml
//! name = "web"                  # `id` defaults to the name
//! type = "service"              # system | batch | service
//! region = "global"
//! datacenters = ["dc1"]
//! priority = 50
//!
//! [[constraints]]
//! attribute = "${attr.arch}"
//! value = "amd64"
//!
//! [[groups]]
//! name = "frontend"
//! count = 3
//! [groups.resources]
//! cpu = 500
//! memory_mb = 256
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use warpsim_state::{Constraint, Job, JobType, Resources, WorkGroup};

use crate::error::{SpecError, SpecResult};
use crate::source::{decode_file, read_paths};

fn default_region() -> String {
    "global".to_string()
}

fn default_priority() -> u32 {
    50
}

fn default_count() -> u32 {
    1
}

/// On-disk job schema, decoded from JSON or TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    #[serde(default = "default_region")]
    pub region: String,
    pub datacenters: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl JobConfig {
    /// Validate and convert into a state job.
    pub fn into_job(self, path: &Path) -> SpecResult<Job> {
        if self.name.trim().is_empty() {
            return Err(SpecError::invalid(path, "job name is empty"));
        }
        if self.datacenters.is_empty() {
            return Err(SpecError::invalid(path, "job lists no datacenters"));
        }
        let mut seen = BTreeSet::new();
        for group in &self.groups {
            if !seen.insert(group.name.as_str()) {
                return Err(SpecError::invalid(
                    path,
                    format!("duplicate work group name: {}", group.name),
                ));
            }
            if !group.resources.is_non_negative() {
                return Err(SpecError::invalid(
                    path,
                    format!("work group {} asks for negative resources", group.name),
                ));
            }
        }

        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.name.clone());
        Ok(Job {
            id,
            region: self.region,
            datacenters: self.datacenters,
            name: self.name,
            job_type: self.job_type,
            priority: self.priority,
            constraints: self.constraints,
            groups: self
                .groups
                .into_iter()
                .map(|g| WorkGroup {
                    name: g.name,
                    count: g.count,
                    resources: g.resources,
                    constraints: g.constraints,
                })
                .collect(),
        })
    }
}

/// Load one job spec file.
pub fn load_job(path: &Path) -> SpecResult<Job> {
    let config: JobConfig = decode_file(path)?;
    let job = config.into_job(path)?;
    debug!(
        job_id = %job.id,
        job_type = %job.job_type,
        groups = job.groups.len(),
        path = %path.display(),
        "job spec loaded"
    );
    Ok(job)
}

/// Load every job listed in a path-list file, in list order.
pub fn load_jobs(list: &Path) -> SpecResult<Vec<Job>> {
    read_paths(list)?.iter().map(|p| load_job(p)).collect()
}
