//! Node scoring for placement decisions.
//!
//! Evaluates candidate nodes using a weighted combination of:
//! - **Bin-packing** (best-fit): prefer nodes that will be most full after placement
//! - **Balance**: prefer nodes close to the cluster's average utilization
//! - **Spread**: prefer nodes running fewer instances of the same job
//! - **Resource availability**: reject nodes that can't fit the workload

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warpsim_state::{Dimension, Resources};

/// Resource capacity and usage for a single node, as seen by one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResources {
    pub node_id: String,
    pub name: String,
    pub datacenter: String,
    pub node_class: String,
    pub attributes: BTreeMap<String, String>,
    /// Schedulable capacity: total minus reserved.
    pub capacity: Resources,
    /// Consumed by existing allocations plus placements proposed so far.
    pub used: Resources,
    /// Instances of the job being evaluated already on this node.
    pub job_instances: u32,
    /// Ready and not draining.
    pub schedulable: bool,
}

impl NodeResources {
    pub fn free(&self) -> Resources {
        self.capacity - self.used
    }

    /// Mean of CPU and memory utilization, 0.0..=1.0 for healthy nodes.
    pub fn utilization(&self) -> f64 {
        utilization(&self.capacity, &self.used)
    }

    /// Record a proposed placement on this node.
    pub fn reserve(&mut self, ask: &Resources) {
        self.used += *ask;
        self.job_instances += 1;
    }
}

fn utilization(capacity: &Resources, used: &Resources) -> f64 {
    let dims = [
        (capacity.cpu, used.cpu),
        (capacity.memory_mb, used.memory_mb),
    ];
    let ratios: Vec<f64> = dims
        .iter()
        .filter(|(cap, _)| *cap > 0)
        .map(|(cap, used)| *used as f64 / *cap as f64)
        .collect();
    if ratios.is_empty() {
        0.5
    } else {
        ratios.iter().sum::<f64>() / ratios.len() as f64
    }
}

/// Scored placement result for a single node.
#[derive(Debug, Clone)]
pub struct NodeScore {
    pub node_id: String,
    /// Total composite score (higher = better). Range: 0.0..=100.0.
    pub score: f64,
    /// Breakdown of score components.
    pub breakdown: ScoreBreakdown,
}

/// Individual score components for debugging.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    /// Bin-packing score: how full the node will be (higher = more packed).
    pub bin_packing: f64,
    /// Balance score: closeness to the cluster average.
    pub balance: f64,
    /// Spread score: fewer instances of the same job score higher.
    pub spread: f64,
}

/// Weights for the scoring components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub bin_packing: f64,
    pub balance: f64,
    pub spread: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            bin_packing: 0.5,
            balance: 0.2,
            spread: 0.3,
        }
    }
}

impl ScoringWeights {
    /// The same weights with spreading switched off.
    pub fn without_spread(&self) -> Self {
        Self {
            spread: 0.0,
            ..self.clone()
        }
    }
}

/// Score a single node for one instance of `ask`.
///
/// Returns the exhausted dimension when the node cannot fit the instance.
pub fn score_node(
    node: &NodeResources,
    ask: &Resources,
    weights: &ScoringWeights,
    cluster_avg_utilization: f64,
) -> Result<NodeScore, Dimension> {
    node.free().superset(ask)?;

    // Bin-packing score: how full will the node be after placement?
    // Higher = more packed = better for bin-packing strategy.
    let projected = node.used + *ask;
    let bin_packing = utilization(&node.capacity, &projected).min(1.0) * 100.0;

    // Balance score: penalize nodes far from average utilization.
    let balance = (1.0 - (node.utilization() - cluster_avg_utilization).abs()).max(0.0) * 100.0;

    let spread = 100.0 / f64::from(1 + node.job_instances);

    let score = weights.bin_packing * bin_packing
        + weights.balance * balance
        + weights.spread * spread;

    Ok(NodeScore {
        node_id: node.node_id.clone(),
        score,
        breakdown: ScoreBreakdown {
            bin_packing,
            balance,
            spread,
        },
    })
}

/// Outcome of ranking every candidate for one instance.
#[derive(Debug, Clone, Default)]
pub struct Ranking {
    /// Nodes able to take the instance, best first.
    pub scores: Vec<NodeScore>,
    /// One entry per node rejected for lack of capacity.
    pub exhausted: Vec<Dimension>,
}

impl Ranking {
    pub fn best(&self) -> Option<&NodeScore> {
        self.scores.first()
    }
}

/// Score all nodes and return them sorted best first. Ties go to the lower
/// node ID so placement is deterministic.
pub fn rank_nodes<'a, I>(nodes: I, ask: &Resources, weights: &ScoringWeights) -> Ranking
where
    I: IntoIterator<Item = &'a NodeResources>,
    I::IntoIter: Clone,
{
    let nodes = nodes.into_iter();
    let (total_util, count) = nodes
        .clone()
        .fold((0.0, 0usize), |(sum, n), node| (sum + node.utilization(), n + 1));
    let cluster_avg = if count == 0 {
        0.5
    } else {
        total_util / count as f64
    };

    let mut ranking = Ranking::default();
    for node in nodes {
        match score_node(node, ask, weights, cluster_avg) {
            Ok(score) => ranking.scores.push(score),
            Err(dim) => ranking.exhausted.push(dim),
        }
    }

    ranking.scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.node_id.cmp(&b.node_id))
    });
    ranking
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_node(id: &str, cap_mem: i64, used_mem: i64, cap_cpu: i64, used_cpu: i64) -> NodeResources {
        NodeResources {
            node_id: id.to_string(),
            name: id.to_string(),
            datacenter: "dc1".to_string(),
            node_class: String::new(),
            attributes: BTreeMap::new(),
            capacity: Resources::new(cap_cpu, cap_mem, 0, 0),
            used: Resources::new(used_cpu, used_mem, 0, 0),
            job_instances: 0,
            schedulable: true,
        }
    }

    fn ask(cpu: i64, mem: i64) -> Resources {
        Resources::new(cpu, mem, 0, 0)
    }

    #[test]
    fn rejects_insufficient_memory() {
        let node = make_node("n1", 1024, 1000, 100, 0);
        let weights = ScoringWeights::default();

        let result = score_node(&node, &ask(10, 128), &weights, 0.5);
        assert_eq!(result.unwrap_err(), Dimension::Memory);
    }

    #[test]
    fn rejects_insufficient_cpu() {
        let node = make_node("n1", 1024, 0, 100, 95);
        let weights = ScoringWeights::default();

        let result = score_node(&node, &ask(10, 128), &weights, 0.5);
        assert_eq!(result.unwrap_err(), Dimension::Cpu);
    }

    #[test]
    fn exact_fit_is_accepted() {
        let node = make_node("n1", 1024, 0, 4, 2);
        let weights = ScoringWeights::default();

        assert!(score_node(&node, &ask(2, 1024), &weights, 0.5).is_ok());
    }

    #[test]
    fn bin_packing_prefers_fuller_node() {
        let nearly_full = make_node("n1", 1024, 800, 100, 0);
        let mostly_empty = make_node("n2", 1024, 100, 100, 0);
        let weights = ScoringWeights {
            bin_packing: 1.0,
            balance: 0.0,
            spread: 0.0,
        };

        let s1 = score_node(&nearly_full, &ask(10, 128), &weights, 0.5).unwrap();
        let s2 = score_node(&mostly_empty, &ask(10, 128), &weights, 0.5).unwrap();

        assert!(
            s1.score > s2.score,
            "nearly full ({}) should score higher than mostly empty ({}) for bin-packing",
            s1.score,
            s2.score
        );
    }

    #[test]
    fn spread_prefers_nodes_without_the_job() {
        let mut busy = make_node("n1", 1024, 0, 100, 0);
        busy.job_instances = 3;
        let idle = make_node("n2", 1024, 0, 100, 0);
        let weights = ScoringWeights {
            bin_packing: 0.0,
            balance: 0.0,
            spread: 1.0,
        };

        let s1 = score_node(&busy, &ask(10, 128), &weights, 0.5).unwrap();
        let s2 = score_node(&idle, &ask(10, 128), &weights, 0.5).unwrap();
        assert!(s2.score > s1.score);
    }

    #[test]
    fn rank_nodes_returns_sorted() {
        let nodes = vec![
            make_node("n1", 1024, 100, 100, 0), // Less full.
            make_node("n2", 1024, 800, 100, 0), // Fuller, so it scores higher for bin-packing.
            make_node("n3", 1024, 500, 100, 0), // Middle.
        ];
        let weights = ScoringWeights {
            bin_packing: 1.0,
            balance: 0.0,
            spread: 0.0,
        };

        let ranked = rank_nodes(&nodes, &ask(10, 128), &weights);

        assert_eq!(ranked.scores.len(), 3);
        assert_eq!(ranked.best().unwrap().node_id, "n2"); // Fullest node first.
        assert!(ranked.scores[0].score >= ranked.scores[1].score);
        assert!(ranked.scores[1].score >= ranked.scores[2].score);
    }

    #[test]
    fn ties_break_on_node_id() {
        let nodes = vec![make_node("n2", 1024, 0, 100, 0), make_node("n1", 1024, 0, 100, 0)];
        let ranked = rank_nodes(&nodes, &ask(10, 128), &ScoringWeights::default());
        assert_eq!(ranked.best().unwrap().node_id, "n1");
    }

    #[test]
    fn rank_nodes_counts_exhausted() {
        let nodes = vec![make_node("n1", 100, 0, 100, 0), make_node("n2", 1024, 0, 100, 0)];
        let ranked = rank_nodes(&nodes, &ask(10, 512), &ScoringWeights::default());

        assert_eq!(ranked.scores.len(), 1);
        assert_eq!(ranked.exhausted, vec![Dimension::Memory]);
    }

    #[test]
    fn reserve_tracks_proposed_usage() {
        let mut node = make_node("n1", 4096, 0, 4, 0);
        node.reserve(&ask(2, 1024));

        assert_eq!(node.free(), Resources::new(2, 3072, 0, 0));
        assert_eq!(node.job_instances, 1);
    }
}
