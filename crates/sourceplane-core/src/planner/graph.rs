//! Dependency graph construction and topological ordering
//!
//! Nodes and edges are ephemeral scratch values for the planner: a flat
//! node vector with integer indices, adjacency as index lists. Ordering
//! is deterministic: nodes enter the ready queue in insertion order,
//! which is the detector's emission order.

use std::collections::{HashMap, VecDeque};

use super::PlanError;

/// One changed component with its resolved actions and dependencies
#[derive(Debug, Clone)]
pub(crate) struct DependencyNode {
    pub component_name: String,
    pub provider: String,
    /// Action names in execution order
    pub actions: Vec<String>,
    /// Component names this node's first action must wait for
    pub dependencies: Vec<String>,
}

/// Kahn topological sort over the changed-component graph.
///
/// Edges whose dependency is not itself in the node set are dropped:
/// work on unchanged components is assumed already done. Duplicate
/// dependency entries are tolerated (the matching in-degree is
/// incremented and decremented symmetrically).
pub(crate) fn topological_sort(
    nodes: Vec<DependencyNode>,
) -> Result<Vec<DependencyNode>, PlanError> {
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree: Vec<usize> = vec![0; nodes.len()];

    {
        let index: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.component_name.as_str(), i))
            .collect();

        for (i, node) in nodes.iter().enumerate() {
            for dep in &node.dependencies {
                if let Some(&dep_idx) = index.get(dep.as_str()) {
                    dependents[dep_idx].push(i);
                    in_degree[i] += 1;
                }
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(current) = queue.pop_front() {
        order.push(current);
        for &dependent in &dependents[current] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                queue.push_back(dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        return Err(PlanError::CircularDependency);
    }

    let mut slots: Vec<Option<DependencyNode>> = nodes.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}
