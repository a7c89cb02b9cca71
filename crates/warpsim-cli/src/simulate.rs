use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tracing::info;
use warpsim_core::{SimConfig, load_jobs, load_nodes};
use warpsim_harness::{RejectPlan, SimHarness, Simulator, SimulatorConfig};
use warpsim_state::StateStore;

pub struct SimulateArgs {
    pub node_list: PathBuf,
    pub job_list: PathBuf,
    pub out_file: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Load the cluster and workload, run every job, write the report.
///
/// Nothing is written unless the whole run succeeds.
pub async fn simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SimConfig::default(),
    };
    let out_file = args.out_file.unwrap_or_else(|| config.output.clone());

    let nodes = load_nodes(&args.node_list)
        .with_context(|| format!("loading nodes from {}", args.node_list.display()))?;
    let jobs = load_jobs(&args.job_list)
        .with_context(|| format!("loading jobs from {}", args.job_list.display()))?;

    let mut node_ids = BTreeSet::new();
    for node in &nodes {
        if !node_ids.insert(node.id.as_str()) {
            bail!("duplicate node id: {}", node.id);
        }
    }
    let mut job_ids = BTreeSet::new();
    for job in &jobs {
        if !job_ids.insert(job.id.as_str()) {
            bail!("duplicate job id: {}", job.id);
        }
    }

    let store = StateStore::open_in_memory()?;
    let mut harness = SimHarness::new(store.clone());
    if config.scheduler.reject_plans {
        harness = harness.with_planner(Box::new(RejectPlan::new(store)));
    }
    let simulator = Simulator::new(
        harness,
        SimulatorConfig {
            scheduler: config.scheduler_config(),
            schedule_timeout: config.schedule_timeout(),
        },
    );
    simulator.load_nodes(&nodes)?;

    info!(nodes = nodes.len(), jobs = jobs.len(), "running simulator");
    let output = simulator.run(jobs).await?;

    let json = serde_json::to_string_pretty(&output)?;
    std::fs::write(&out_file, json)
        .with_context(|| format!("writing output to {}", out_file.display()))?;
    info!(path = %out_file.display(), records = output.job_evaluations.len(), "output written");
    Ok(())
}
