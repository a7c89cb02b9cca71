//! End-to-end simulation scenarios: nodes and jobs in, metrics records out.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use warpsim_harness::{SimHarness, Simulator, SimulatorConfig};
use warpsim_metrics::{JobEvaluationMetrics, NEVER_COMPLETED, SimOutput};
use warpsim_state::*;

fn node(id: &str, dc: &str, cpu: i64, memory_mb: i64) -> Node {
    Node {
        id: id.to_string(),
        datacenter: dc.to_string(),
        name: format!("{id}-name"),
        attributes: BTreeMap::new(),
        resources: Resources::new(cpu, memory_mb, 0, 0),
        reserved: Resources::default(),
        links: BTreeMap::new(),
        meta: BTreeMap::new(),
        node_class: String::new(),
        drain: false,
        status: NodeStatus::Ready,
        status_description: String::new(),
    }
}

fn job(id: &str, job_type: JobType, count: u32, cpu: i64, memory_mb: i64) -> Job {
    Job {
        id: id.to_string(),
        region: "global".to_string(),
        datacenters: vec!["dc1".to_string()],
        name: id.to_string(),
        job_type,
        priority: 50,
        constraints: Vec::new(),
        groups: vec![WorkGroup {
            name: "group".to_string(),
            count,
            resources: Resources::new(cpu, memory_mb, 0, 0),
            constraints: Vec::new(),
        }],
    }
}

async fn simulate(nodes: &[Node], jobs: Vec<Job>) -> SimOutput {
    let store = StateStore::open_in_memory().unwrap();
    let sim = Simulator::new(SimHarness::new(store), SimulatorConfig::default());
    sim.load_nodes(nodes).unwrap();
    sim.run(jobs).await.unwrap()
}

fn record<'a>(output: &'a SimOutput, job_id: &str) -> &'a JobEvaluationMetrics {
    output
        .job_evaluations
        .iter()
        .find(|r| r.job.job_id == job_id)
        .unwrap()
}

#[tokio::test]
async fn single_batch_placement() {
    let output = simulate(
        &[node("n1", "dc1", 4, 4096)],
        vec![job("batch", JobType::Batch, 1, 2, 1024)],
    )
    .await;

    let r = record(&output, "batch");
    assert_eq!(r.successful.len(), 1);
    assert!(r.failed.is_empty());
    assert_eq!(r.node_usage_changes.len(), 1);
    assert_eq!(r.node_usage_changes[0].id, "n1");
    assert_eq!(r.node_usage_changes[0].available.cpu, 2);
    assert_eq!(r.node_usage_changes[0].available.memory_mb, 3072);
    assert!(r.job.final_time_stamp >= r.job.start_time_stamp);
}

#[tokio::test]
async fn service_overflow_reports_one_failure() {
    let output = simulate(
        &[node("n1", "dc1", 4, 4096)],
        vec![job("service", JobType::Service, 3, 2, 1024)],
    )
    .await;

    let r = record(&output, "service");
    assert_eq!(r.successful.len(), 2);
    assert_eq!(r.failed.len(), 1);
    assert_eq!(r.failed[0].desired_status, "failed");
    assert_eq!(r.node_usage_changes[0].available.cpu, 0);
}

#[tokio::test]
async fn multi_count_failures_are_corrected() {
    // Room for 3 of 5 replicas.
    let output = simulate(
        &[node("n1", "dc1", 3, 4096)],
        vec![job("batch", JobType::Batch, 5, 1, 256)],
    )
    .await;

    let r = record(&output, "batch");
    assert_eq!(r.successful.len(), 3);
    assert_eq!(r.failed.len(), 2);
}

#[tokio::test]
async fn system_job_counts_every_node() {
    let nodes = [
        node("n1", "dc1", 4, 4096),
        node("n2", "dc1", 4, 4096),
        node("n3", "dc2", 4, 4096),
    ];
    let output = simulate(&nodes, vec![job("agent", JobType::System, 1, 1, 128)]).await;

    let r = record(&output, "agent");
    assert_eq!(r.successful.len(), 2);
    // Desired 1 × 3 nodes, 2 placed.
    assert_eq!(r.failed.len(), 1);
    assert_eq!(r.node_usage_changes.len(), 2);
}

#[tokio::test]
async fn system_job_with_nothing_placeable() {
    let nodes = [
        node("n1", "dc1", 0, 4096),
        node("n2", "dc1", 0, 4096),
        node("n3", "dc1", 0, 4096),
    ];
    let output = simulate(&nodes, vec![job("agent", JobType::System, 1, 1, 128)]).await;

    let r = record(&output, "agent");
    assert!(r.successful.is_empty());
    assert_eq!(r.failed.len(), 3);
    assert_eq!(r.job.final_time_stamp, NEVER_COMPLETED);
}

#[tokio::test]
async fn job_without_groups_yields_empty_record() {
    let mut empty = job("empty", JobType::Service, 1, 1, 128);
    empty.groups.clear();
    let output = simulate(&[node("n1", "dc1", 4, 4096)], vec![empty]).await;

    let r = record(&output, "empty");
    assert!(r.successful.is_empty());
    assert!(r.failed.is_empty());
    assert!(r.node_usage_changes.is_empty());
    assert_eq!(r.job.final_time_stamp, NEVER_COMPLETED);
}

#[tokio::test]
async fn concurrent_jobs_never_double_count() {
    const JOBS: i64 = 6;
    let jobs = (0..JOBS)
        .map(|i| job(&format!("job-{i}"), JobType::Batch, 1, 1, 128))
        .collect();
    let output = simulate(&[node("n1", "dc1", 8, 8192)], jobs).await;

    assert_eq!(output.job_evaluations.len(), JOBS as usize);
    let residuals: BTreeSet<i64> = output
        .job_evaluations
        .iter()
        .map(|r| r.node_usage_changes[0].available.cpu)
        .collect();
    // Each job sees exactly the placements made up to and including its own.
    let expected: BTreeSet<i64> = (0..JOBS).map(|i| 8 - 1 - i).collect();
    assert_eq!(residuals, expected);
}

#[tokio::test]
async fn roster_reflects_loaded_nodes() {
    let mut n = node("n1", "dc1", 4, 4096);
    n.reserved = Resources::new(1, 512, 0, 0);
    n.attributes.insert("arch".to_string(), "amd64".to_string());
    let output = simulate(&[n], Vec::new()).await;

    assert_eq!(output.nodes.len(), 1);
    let roster = &output.nodes[0];
    assert_eq!(roster.name, "n1-name");
    assert_eq!(roster.reserved.memory_mb, 512);
    assert_eq!(roster.attributes["arch"], "amd64");
}

#[tokio::test]
async fn timeout_is_generous_enough_for_normal_runs() {
    let store = StateStore::open_in_memory().unwrap();
    let config = SimulatorConfig {
        schedule_timeout: Some(Duration::from_secs(30)),
        ..SimulatorConfig::default()
    };
    let sim = Simulator::new(SimHarness::new(store), config);
    sim.load_nodes(&[node("n1", "dc1", 4, 4096)]).unwrap();

    let output = sim
        .run(vec![job("batch", JobType::Batch, 1, 1, 128)])
        .await
        .unwrap();
    assert_eq!(output.job_evaluations.len(), 1);
}
