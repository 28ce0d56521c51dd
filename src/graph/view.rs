//! Adjacency state of a graph and the read-only view handed to queries.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::node::{GraphEdge, GraphNode};

/// The adjacency structure guarded by the graph's lock.
///
/// Invariant: every node id has an entry (possibly empty) in both `dependencies`
/// and `dependents`, and every edge key `(from, to)` appears as `to ∈
/// dependencies[from]` and `from ∈ dependents[to]`.
#[derive(Debug, Clone)]
pub(crate) struct GraphState {
    pub(crate) nodes: BTreeMap<String, GraphNode>,
    pub(crate) edges: BTreeMap<(String, String), GraphEdge>,
    pub(crate) dependencies: BTreeMap<String, BTreeSet<String>>,
    pub(crate) dependents: BTreeMap<String, BTreeSet<String>>,
    pub(crate) revision: u64,
    pub(crate) modified_at: DateTime<Utc>,
}

impl Default for GraphState {
    fn default() -> Self {
        Self {
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            dependencies: BTreeMap::new(),
            dependents: BTreeMap::new(),
            revision: 0,
            modified_at: Utc::now(),
        }
    }
}

/// Consistent read-only access to a graph while its read lock is held.
///
/// Obtained through [`DependencyGraph::read_view`](super::DependencyGraph::read_view);
/// all queries made through one view observe the same revision.
#[derive(Clone, Copy)]
pub struct GraphView<'a> {
    pub(crate) state: &'a GraphState,
}

impl<'a> GraphView<'a> {
    pub(crate) const fn new(state: &'a GraphState) -> Self {
        Self {
            state,
        }
    }

    /// Revision counter, bumped by every mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.state.revision
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.state.nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.state.edges.len()
    }

    /// Whether a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.state.nodes.contains_key(id)
    }

    /// Node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&'a GraphNode> {
        self.state.nodes.get(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &'a GraphNode> + 'a {
        self.state.nodes.values()
    }

    /// All node ids in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.state.nodes.keys().map(String::as_str)
    }

    /// Edge `from → to`, if present.
    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<&'a GraphEdge> {
        self.state.edges.get(&(from.to_string(), to.to_string()))
    }

    /// All edges ordered by `(from, to)`.
    pub fn edges(&self) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        self.state.edges.values()
    }

    /// Direct dependencies of `id`; empty for unknown ids.
    pub fn dependencies(&self, id: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.state.dependencies.get(id).into_iter().flatten().map(String::as_str)
    }

    /// Direct dependents of `id`; empty for unknown ids.
    pub fn dependents(&self, id: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.state.dependents.get(id).into_iter().flatten().map(String::as_str)
    }

    /// Outgoing edges of `id`.
    pub fn dependency_edges(&self, id: &str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        let state = self.state;
        let from = id.to_string();
        state
            .dependencies
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |to| state.edges.get(&(from.clone(), to.clone())))
    }

    /// Incoming edges of `id`.
    pub fn dependent_edges(&self, id: &str) -> impl Iterator<Item = &'a GraphEdge> + 'a {
        let state = self.state;
        let to = id.to_string();
        state
            .dependents
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(move |from| state.edges.get(&(from.clone(), to.clone())))
    }

    /// Forward adjacency map.
    #[must_use]
    pub fn adjacency(&self) -> &'a BTreeMap<String, BTreeSet<String>> {
        &self.state.dependencies
    }

    /// Every node reachable from `id` along dependency edges.
    ///
    /// The start node is included only when a cycle leads back to it.
    #[must_use]
    pub fn transitive_dependencies(&self, id: &str) -> BTreeSet<String> {
        reachable(&self.state.dependencies, id)
    }

    /// Every node from which `id` is reachable.
    ///
    /// The start node is included only when a cycle leads back to it.
    #[must_use]
    pub fn transitive_dependents(&self, id: &str) -> BTreeSet<String> {
        reachable(&self.state.dependents, id)
    }

    /// Whether `to` can be reached from `from`; trivially true when they are the
    /// same existing node.
    #[must_use]
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if !self.contains(from) || !self.contains(to) {
            return false;
        }
        if from == to {
            return true;
        }

        let mut visited = BTreeSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            for next in self.dependencies(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        false
    }
}

/// Iterative DFS closure over an adjacency map. A visited node is never expanded
/// twice, so cycles terminate.
pub(crate) fn reachable(adjacency: &BTreeMap<String, BTreeSet<String>>, start: &str) -> BTreeSet<String> {
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut stack: Vec<&str> = adjacency
        .get(start)
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect();

    while let Some(current) = stack.pop() {
        if !visited.insert(current.to_string()) {
            continue;
        }
        if let Some(next) = adjacency.get(current) {
            stack.extend(next.iter().map(String::as_str).filter(|n| !visited.contains(*n)));
        }
    }
    visited
}
