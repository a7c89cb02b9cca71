use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod simulate;

#[derive(Parser)]
#[command(
    name = "warpsim",
    about = "WarpSim — offline placement simulator for system, batch and service schedulers",
    version
)]
struct Cli {
    /// File listing node spec paths (.json or .toml), one per line
    #[arg(long = "node-list", alias = "nodeList")]
    node_list: PathBuf,
    /// File listing job spec paths (.json or .toml), one per line
    #[arg(long = "job-list", alias = "jobList")]
    job_list: PathBuf,
    /// Where to write the JSON report [default: simulator_output.json]
    #[arg(long = "out-file", alias = "outfile")]
    out_file: Option<PathBuf>,
    /// Optional warpsim.toml
    #[arg(long)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    // Logs go to stderr; stdout stays clean.
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    simulate::simulate(simulate::SimulateArgs {
        node_list: cli.node_list,
        job_list: cli.job_list,
        out_file: cli.out_file,
        config: cli.config,
    })
    .await
}
