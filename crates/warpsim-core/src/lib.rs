//! warpsim-core — everything the simulator reads from disk.
//!
//! # Components
//!
//! - **`source`** — path-list files and JSON/TOML decoding
//! - **`node`** — node spec files
//! - **`job`** — job spec files
//! - **`config`** — `warpsim.toml`

pub mod config;
pub mod error;
pub mod job;
pub mod node;
pub mod source;

pub use config::{DEFAULT_OUTPUT, SchedulerSection, SimConfig};
pub use error::{SpecError, SpecResult};
pub use job::{GroupConfig, JobConfig, load_job, load_jobs};
pub use node::{NodeConfig, load_node, load_nodes};
pub use source::{SpecFormat, decode_file, parse_paths, read_paths};
