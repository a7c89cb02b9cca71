//! Node eligibility — the hard filters applied before any scoring.
//!
//! A node is eligible for a work group when it is schedulable, sits in one
//! of the job's datacenters, and satisfies every job- and group-level
//! constraint.

use warpsim_state::{Constraint, ConstraintOperand, Job, WorkGroup};

use crate::scorer::NodeResources;

/// Whether `node` may receive instances of `group`.
pub fn is_eligible(node: &NodeResources, job: &Job, group: &WorkGroup) -> bool {
    node.schedulable
        && job.datacenters.iter().any(|dc| *dc == node.datacenter)
        && job
            .constraints
            .iter()
            .chain(&group.constraints)
            .all(|c| constraint_met(node, c))
}

/// One flag per node, in the same order as `nodes`.
pub fn eligibility(nodes: &[NodeResources], job: &Job, group: &WorkGroup) -> Vec<bool> {
    nodes.iter().map(|n| is_eligible(n, job, group)).collect()
}

/// Evaluate one constraint against a node.
///
/// A target that does not resolve (unknown attribute) never matches, for
/// either operand.
pub fn constraint_met(node: &NodeResources, constraint: &Constraint) -> bool {
    let Some(left) = resolve_target(node, &constraint.attribute) else {
        return false;
    };
    let Some(right) = resolve_target(node, &constraint.value) else {
        return false;
    };
    match constraint.operand {
        ConstraintOperand::Equal => left == right,
        ConstraintOperand::NotEqual => left != right,
    }
}

/// Resolve `${node.*}` / `${attr.*}` interpolations; anything else is a
/// literal.
fn resolve_target<'a>(node: &'a NodeResources, target: &'a str) -> Option<&'a str> {
    let Some(inner) = target
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    else {
        return Some(target);
    };
    match inner {
        "node.datacenter" => Some(node.datacenter.as_str()),
        "node.class" => Some(node.node_class.as_str()),
        "node.name" => Some(node.name.as_str()),
        "node.unique.id" => Some(node.node_id.as_str()),
        _ => inner
            .strip_prefix("attr.")
            .and_then(|key| node.attributes.get(key))
            .map(String::as_str),
    }
}
