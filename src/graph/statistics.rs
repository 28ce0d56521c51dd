//! Structural statistics and complexity metrics.
//!
//! Depth is the length of the longest chain of dependency edges below a node, so a
//! tool without dependencies has depth 0. Edges that close a cycle are ignored when
//! measuring depth.
//!
//! The component count is a single-pass approximation: the number of trees in a
//! depth-first forest over dependency edges, visiting roots in id order. It equals
//! the number of strongly connected components only for some graphs and is kept
//! for its low cost.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use super::view::GraphView;
use crate::core::Platform;
use crate::manifest::ToolCategory;

/// Complexity figures derived from node and edge counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityMetrics {
    /// `E − N + 2`
    pub cyclomatic_complexity: i64,
    /// `E / (N(N − 1))`, 0 for fewer than two nodes
    pub dependency_density: f64,
    /// Largest fan-in divided by largest fan-out
    pub fan_in_out_ratio: f64,
    /// Share of edges whose endpoints share a category
    pub modularity: f64,
    /// Average local clustering coefficient over undirected neighbour sets
    pub clustering_coefficient: f64,
}

/// Snapshot statistics of a graph revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStatistics {
    /// Number of nodes
    pub node_count: usize,
    /// Number of edges
    pub edge_count: usize,
    /// Depth of the deepest node
    pub max_depth: usize,
    /// `2E / N`
    pub average_degree: f64,
    /// Nodes per category
    pub category_distribution: BTreeMap<ToolCategory, usize>,
    /// Nodes supporting each platform
    pub platform_distribution: BTreeMap<Platform, usize>,
    /// Approximate component count
    pub strongly_connected_components: usize,
    /// Length of the longest dependency chain; equal to `max_depth`
    pub critical_path_length: usize,
    /// Complexity figures
    pub complexity: ComplexityMetrics,
    /// Depth of every node
    pub node_depths: BTreeMap<String, usize>,
}

pub(crate) fn compute(view: GraphView<'_>) -> GraphStatistics {
    let node_count = view.node_count();
    let edge_count = view.edge_count();
    let adjacency = view.adjacency();

    let node_depths = depths(adjacency);
    let max_depth = node_depths.values().copied().max().unwrap_or(0);

    let mut category_distribution = BTreeMap::new();
    let mut platform_distribution = BTreeMap::new();
    for node in view.nodes() {
        *category_distribution.entry(node.manifest.category).or_insert(0) += 1;
        for platform in &node.platform.supported {
            *platform_distribution.entry(*platform).or_insert(0) += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let average_degree = if node_count == 0 {
        0.0
    } else {
        (2 * edge_count) as f64 / node_count as f64
    };

    GraphStatistics {
        node_count,
        edge_count,
        max_depth,
        average_degree,
        category_distribution,
        platform_distribution,
        strongly_connected_components: dfs_forest_size(adjacency),
        critical_path_length: max_depth,
        complexity: complexity(view),
        node_depths,
    }
}

/// Longest outgoing chain for every node, computed bottom-up with an explicit stack.
fn depths(adjacency: &BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, usize> {
    let mut depth: HashMap<&str, usize> = HashMap::new();
    let mut on_path: HashSet<&str> = HashSet::new();

    for root in adjacency.keys() {
        if depth.contains_key(root.as_str()) {
            continue;
        }
        let mut stack: Vec<(&str, bool)> = vec![(root.as_str(), false)];
        while let Some((node, expanded)) = stack.pop() {
            let children = adjacency.get(node).into_iter().flatten().map(String::as_str);
            if expanded {
                let value = children.filter_map(|c| depth.get(c)).map(|d| d + 1).max().unwrap_or(0);
                depth.insert(node, value);
                on_path.remove(node);
                continue;
            }
            if depth.contains_key(node) || !on_path.insert(node) {
                continue;
            }
            stack.push((node, true));
            for child in children {
                if !depth.contains_key(child) && !on_path.contains(child) {
                    stack.push((child, false));
                }
            }
        }
    }

    depth.into_iter().map(|(id, d)| (id.to_string(), d)).collect()
}

fn dfs_forest_size(adjacency: &BTreeMap<String, BTreeSet<String>>) -> usize {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut trees = 0;
    for root in adjacency.keys() {
        if visited.contains(root.as_str()) {
            continue;
        }
        trees += 1;
        let mut stack = vec![root.as_str()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            stack.extend(adjacency.get(node).into_iter().flatten().map(String::as_str));
        }
    }
    trees
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn complexity(view: GraphView<'_>) -> ComplexityMetrics {
    let n = view.node_count();
    let e = view.edge_count();

    let dependency_density = if n > 1 {
        e as f64 / (n * (n - 1)) as f64
    } else {
        0.0
    };

    let max_fan_in = view.node_ids().map(|id| view.dependents(id).count()).max().unwrap_or(0);
    let max_fan_out = view.node_ids().map(|id| view.dependencies(id).count()).max().unwrap_or(0);
    let fan_in_out_ratio = match (max_fan_in, max_fan_out) {
        (0, 0) => 0.0,
        (fan_in, 0) => fan_in as f64,
        (fan_in, fan_out) => fan_in as f64 / fan_out as f64,
    };

    let same_category = view
        .edges()
        .filter(|edge| {
            match (view.node(&edge.from), view.node(&edge.to)) {
                (Some(a), Some(b)) => a.manifest.category == b.manifest.category,
                _ => false,
            }
        })
        .count();
    let modularity = if e == 0 {
        0.0
    } else {
        same_category as f64 / e as f64
    };

    ComplexityMetrics {
        cyclomatic_complexity: e as i64 - n as i64 + 2,
        dependency_density,
        fan_in_out_ratio,
        modularity,
        clustering_coefficient: clustering(view),
    }
}

#[allow(clippy::cast_precision_loss)]
fn clustering(view: GraphView<'_>) -> f64 {
    let n = view.node_count();
    if n == 0 {
        return 0.0;
    }

    let neighbours: BTreeMap<&str, BTreeSet<&str>> = view
        .node_ids()
        .map(|id| {
            let set = view.dependencies(id).chain(view.dependents(id)).filter(|other| *other != id).collect();
            (id, set)
        })
        .collect();

    let total: f64 = neighbours
        .values()
        .map(|set| {
            let k = set.len();
            if k < 2 {
                return 0.0;
            }
            let members: Vec<&str> = set.iter().copied().collect();
            let mut links = 0usize;
            for (i, a) in members.iter().enumerate() {
                for b in &members[i + 1..] {
                    if neighbours.get(a).is_some_and(|s| s.contains(b)) {
                        links += 1;
                    }
                }
            }
            links as f64 / (k * (k - 1) / 2) as f64
        })
        .sum();

    total / n as f64
}
