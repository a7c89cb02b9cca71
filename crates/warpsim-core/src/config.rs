//! warpsim.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use warpsim_placement::{SchedulerConfig, ScoringWeights};

use crate::error::{SpecError, SpecResult};

pub const DEFAULT_OUTPUT: &str = "simulator_output.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Where the JSON report is written.
    pub output: PathBuf,
    /// Deadline per scheduler invocation in milliseconds; 0 disables it.
    pub schedule_timeout_ms: u64,
    pub scoring: ScoringWeights,
    pub scheduler: SchedulerSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub max_plan_attempts: u32,
    /// Route plans to a planner that rejects all of them.
    pub reject_plans: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            schedule_timeout_ms: 0,
            scoring: ScoringWeights::default(),
            scheduler: SchedulerSection::default(),
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_plan_attempts: SchedulerConfig::default().max_plan_attempts,
            reject_plans: false,
        }
    }
}

impl SimConfig {
    pub fn from_file(path: &Path) -> SpecResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SpecError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SpecError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn schedule_timeout(&self) -> Option<Duration> {
        (self.schedule_timeout_ms > 0).then(|| Duration::from_millis(self.schedule_timeout_ms))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            weights: self.scoring.clone(),
            max_plan_attempts: self.scheduler.max_plan_attempts,
        }
    }
}
