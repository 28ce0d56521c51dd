//! Directed dependency graph of tools.
//!
//! A [`DependencyGraph`] stores one node per tool id and at most one edge per
//! ordered pair of ids. An edge `from → to` means that `from` depends on `to`, so
//! an installation order always emits `to` first.
//!
//! # Storage
//!
//! Nodes and edges live in maps keyed by tool id (forward and reverse adjacency
//! sets plus an edge map keyed by `(from, to)`). Cycles are ordinary data and every
//! walk over the graph is iterative with an explicit visited set.
//!
//! # Concurrency
//!
//! The graph is shared by handle (`Arc<DependencyGraph>`) and all methods take
//! `&self`:
//!
//! - queries take the read lock and may run concurrently with each other
//! - mutations take the write lock, bump [`revision`](DependencyGraph::revision) and
//!   clear the statistics and validation caches before the lock is released, so no
//!   reader can observe a cache that disagrees with the adjacency maps
//!
//! Locks are always acquired in the order state, then caches.
//!
//! # Example
//!
//! ```rust
//! use toolgraph::graph::DependencyGraph;
//! use toolgraph::manifest::{ToolCategory, ToolDependency, ToolManifest};
//!
//! let graph = DependencyGraph::new();
//! graph.add_node(ToolManifest::new("node", ToolCategory::Runtime));
//! graph.add_node(ToolManifest::new("react", ToolCategory::Framework));
//! assert!(graph.add_edge("react", "node", ToolDependency::required("node")));
//!
//! assert_eq!(graph.get_dependencies("react"), vec!["node".to_string()]);
//! assert!(graph.has_path("react", "node"));
//! ```

pub mod builder;
pub mod cycles;
pub mod node;
pub mod statistics;
pub mod traversal;
pub mod validation;
mod view;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use semver::Version;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::core::ToolgraphError;
use crate::manifest::{DependencyType, ToolDependency, ToolManifest};

pub use builder::{GraphBuildResult, GraphBuilder};
pub use cycles::{CycleDetectionResult, format_cycle};
pub use node::{
    AppliedConstraint, EdgeConflictStatus, EdgeResolution, GraphEdge, GraphNode,
    InstallationStatus, NodeMetadata, PinnedVersion, PlatformMetadata, VersionMetadata,
};
pub use statistics::{ComplexityMetrics, GraphStatistics};
pub use traversal::{TraversalAlgorithm, TraversalConfig, TraversalDirection, TraversalResult};
pub use validation::{
    IssueCode, IssueSeverity, Strictness, ValidationConfig, ValidationIssue, ValidationResult,
    ValidationRule,
};
pub use view::GraphView;

pub(crate) use view::{GraphState, reachable};

#[derive(Debug, Default)]
struct GraphCaches {
    statistics: Option<Arc<GraphStatistics>>,
    validation: HashMap<validation::CacheKey, (Instant, Arc<ValidationResult>)>,
}

impl GraphCaches {
    fn clear(&mut self) {
        self.statistics = None;
        self.validation.clear();
    }
}

/// Thread-safe dependency graph of tools.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    state: RwLock<GraphState>,
    caches: Mutex<GraphCaches>,
}

impl Clone for DependencyGraph {
    /// Deep copy of the adjacency state with empty caches.
    fn clone(&self) -> Self {
        Self::from_state(self.state.read().clone())
    }
}

impl DependencyGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn from_state(state: GraphState) -> Self {
        Self {
            state: RwLock::new(state),
            caches: Mutex::new(GraphCaches::default()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, GraphState> {
        self.state.read()
    }

    /// Run `f` against a consistent view of the graph while holding the read lock.
    ///
    /// Do not call other methods of the same graph from inside `f`.
    pub fn read_view<R>(&self, f: impl FnOnce(GraphView<'_>) -> R) -> R {
        let state = self.state.read();
        f(GraphView::new(&state))
    }

    /// Apply `f` under the write lock. When it reports a change, the revision is
    /// bumped and derived caches are dropped before the lock is released.
    fn mutate<T>(&self, operation: &str, f: impl FnOnce(&mut GraphState) -> Option<T>) -> Option<T> {
        let mut state = self.state.write();
        let outcome = f(&mut state)?;
        state.revision += 1;
        state.modified_at = Utc::now();
        self.caches.lock().clear();
        debug!(operation, revision = state.revision, "Graph mutated");
        Some(outcome)
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Add a node for `manifest`.
    ///
    /// Returns `false` without changing the graph if a node with the same id exists.
    pub fn add_node(&self, manifest: impl Into<Arc<ToolManifest>>) -> bool {
        let manifest = manifest.into();
        let id = manifest.id.clone();
        let added = self
            .mutate("add_node", |state| {
                if state.nodes.contains_key(&id) {
                    return None;
                }
                state.nodes.insert(id.clone(), GraphNode::new(manifest));
                state.dependencies.insert(id.clone(), BTreeSet::new());
                state.dependents.insert(id.clone(), BTreeSet::new());
                Some(())
            })
            .is_some();
        if !added {
            trace!(tool = %id, "Node already present");
        }
        added
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns `false` if the node does not exist.
    pub fn remove_node(&self, id: &str) -> bool {
        self.mutate("remove_node", |state| {
            state.nodes.remove(id)?;
            let outgoing = state.dependencies.remove(id).unwrap_or_default();
            let incoming = state.dependents.remove(id).unwrap_or_default();

            for to in outgoing {
                state.edges.remove(&(id.to_string(), to.clone()));
                if let Some(set) = state.dependents.get_mut(&to) {
                    set.remove(id);
                }
                if let Some(node) = state.nodes.get_mut(&to) {
                    node.metadata.dependent_count = node.metadata.dependent_count.saturating_sub(1);
                    node.versions.constraints.retain(|c| c.required_by != id);
                }
            }
            for from in incoming {
                state.edges.remove(&(from.clone(), id.to_string()));
                if let Some(set) = state.dependencies.get_mut(&from) {
                    set.remove(id);
                }
                if let Some(node) = state.nodes.get_mut(&from) {
                    node.metadata.dependency_count =
                        node.metadata.dependency_count.saturating_sub(1);
                }
            }
            Some(())
        })
        .is_some()
    }

    /// Add the edge `from → to` carrying `dependency`.
    ///
    /// Returns `false` if either endpoint is missing or the edge already exists.
    /// A dependency with version bounds also records an [`AppliedConstraint`] on
    /// the target node.
    pub fn add_edge(&self, from: &str, to: &str, dependency: ToolDependency) -> bool {
        let added = self
            .mutate("add_edge", |state| {
                if !state.nodes.contains_key(from) || !state.nodes.contains_key(to) {
                    return None;
                }
                let key = (from.to_string(), to.to_string());
                if state.edges.contains_key(&key) {
                    return None;
                }

                let constraint = if dependency.has_version_bounds() {
                    match dependency.version_range() {
                        Ok(range) => Some(AppliedConstraint {
                            required_by: from.to_string(),
                            range,
                            dependency_type: dependency.dependency_type,
                        }),
                        Err(e) => {
                            warn!(from, to, error = %e, "Ignoring unparseable version bounds");
                            None
                        }
                    }
                } else {
                    None
                };

                state.edges.insert(key, GraphEdge::new(from.to_string(), to.to_string(), dependency));
                state.dependencies.entry(from.to_string()).or_default().insert(to.to_string());
                state.dependents.entry(to.to_string()).or_default().insert(from.to_string());
                if let Some(node) = state.nodes.get_mut(from) {
                    node.metadata.dependency_count += 1;
                }
                if let Some(node) = state.nodes.get_mut(to) {
                    node.metadata.dependent_count += 1;
                    if let Some(constraint) = constraint {
                        node.versions.constraints.push(constraint);
                    }
                }
                Some(())
            })
            .is_some();
        if !added {
            trace!(from, to, "Edge not added");
        }
        added
    }

    /// Add an edge from `from` to the tool named by `dependency.tool_id`.
    pub fn add_dependency(&self, from: &str, dependency: ToolDependency) -> bool {
        let to = dependency.tool_id.clone();
        self.add_edge(from, &to, dependency)
    }

    /// Remove the edge `from → to` and the constraint it placed on `to`.
    ///
    /// Returns `false` if the edge does not exist.
    pub fn remove_edge(&self, from: &str, to: &str) -> bool {
        self.mutate("remove_edge", |state| {
            state.edges.remove(&(from.to_string(), to.to_string()))?;
            if let Some(set) = state.dependencies.get_mut(from) {
                set.remove(to);
            }
            if let Some(set) = state.dependents.get_mut(to) {
                set.remove(from);
            }
            if let Some(node) = state.nodes.get_mut(from) {
                node.metadata.dependency_count = node.metadata.dependency_count.saturating_sub(1);
            }
            if let Some(node) = state.nodes.get_mut(to) {
                node.metadata.dependent_count = node.metadata.dependent_count.saturating_sub(1);
                node.versions.constraints.retain(|c| c.required_by != from);
            }
            Some(())
        })
        .is_some()
    }

    /// Record the caller-detected installation status of a tool.
    pub fn set_installation_status(
        &self,
        id: &str,
        status: InstallationStatus,
        installed_version: Option<Version>,
    ) -> bool {
        self.mutate("set_installation_status", |state| {
            let node = state.nodes.get_mut(id)?;
            node.status = status;
            node.installed_version = installed_version;
            Some(())
        })
        .is_some()
    }

    /// Pin a tool to `version`, recording the constraint string handed to installers.
    pub fn pin_version(&self, id: &str, version: Version, constraint: impl Into<String>) -> bool {
        let constraint = constraint.into();
        self.mutate("pin_version", |state| {
            let node = state.nodes.get_mut(id)?;
            node.versions.pinned = Some(PinnedVersion {
                version,
                constraint,
            });
            Some(())
        })
        .is_some()
    }

    /// Change the dependency type of an existing edge.
    pub fn set_edge_type(&self, from: &str, to: &str, dependency_type: DependencyType) -> bool {
        self.mutate("set_edge_type", |state| {
            let edge = state.edges.get_mut(&(from.to_string(), to.to_string()))?;
            edge.dependency.dependency_type = dependency_type;
            edge.weight = dependency_type.weight();
            if let Some(node) = state.nodes.get_mut(to) {
                for constraint in &mut node.versions.constraints {
                    if constraint.required_by == from {
                        constraint.dependency_type = dependency_type;
                    }
                }
            }
            Some(())
        })
        .is_some()
    }

    /// Set the conflict status of an edge and count the resolution attempt.
    pub fn mark_edge(&self, from: &str, to: &str, status: EdgeConflictStatus) -> bool {
        self.mutate("mark_edge", |state| {
            let edge = state.edges.get_mut(&(from.to_string(), to.to_string()))?;
            edge.resolution.status = status;
            edge.resolution.attempts += 1;
            Some(())
        })
        .is_some()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether a node with this id exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read().nodes.contains_key(id)
    }

    /// Snapshot of a node, with its depth taken from the statistics cache.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<GraphNode> {
        let depth = self.node_depth(id);
        let mut node = self.read().nodes.get(id).cloned()?;
        node.metadata.depth = depth;
        Some(node)
    }

    /// The manifest behind a node.
    #[must_use]
    pub fn manifest(&self, id: &str) -> Option<Arc<ToolManifest>> {
        self.read().nodes.get(id).map(|node| Arc::clone(&node.manifest))
    }

    /// Snapshot of the edge `from → to`.
    #[must_use]
    pub fn edge(&self, from: &str, to: &str) -> Option<GraphEdge> {
        self.read().edges.get(&(from.to_string(), to.to_string())).cloned()
    }

    /// All node ids in order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<String> {
        self.read().nodes.keys().cloned().collect()
    }

    /// Snapshot of all edges ordered by `(from, to)`.
    #[must_use]
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.read().edges.values().cloned().collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read().nodes.len()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.read().edges.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    /// Monotonic mutation counter.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.read().revision
    }

    /// Time of the last mutation (or of creation).
    #[must_use]
    pub fn modified_at(&self) -> DateTime<Utc> {
        self.read().modified_at
    }

    /// Direct dependencies of `id`.
    #[must_use]
    pub fn get_dependencies(&self, id: &str) -> Vec<String> {
        self.read().dependencies.get(id).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// Direct dependents of `id`.
    #[must_use]
    pub fn get_dependents(&self, id: &str) -> Vec<String> {
        self.read().dependents.get(id).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    /// Every tool `id` depends on, directly or transitively.
    #[must_use]
    pub fn get_transitive_dependencies(&self, id: &str) -> BTreeSet<String> {
        reachable(&self.read().dependencies, id)
    }

    /// Every tool that depends on `id`, directly or transitively.
    #[must_use]
    pub fn get_transitive_dependents(&self, id: &str) -> BTreeSet<String> {
        reachable(&self.read().dependents, id)
    }

    /// Whether `to` is reachable from `from`.
    #[must_use]
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        self.read_view(|view| view.has_path(from, to))
    }

    /// A new graph holding the given nodes and exactly the edges between them.
    ///
    /// Unknown ids are ignored. Node status and pins are carried over; version
    /// constraints are kept only when their declaring tool is part of the subgraph.
    #[must_use]
    pub fn get_subgraph<S: AsRef<str>>(&self, ids: &[S]) -> DependencyGraph {
        let state = self.read();
        let keep: BTreeSet<&str> =
            ids.iter().map(AsRef::as_ref).filter(|id| state.nodes.contains_key(*id)).collect();

        let mut sub = GraphState {
            revision: 0,
            modified_at: Utc::now(),
            ..GraphState::default()
        };
        for id in &keep {
            if let Some(node) = state.nodes.get(*id) {
                let mut node = node.clone();
                node.metadata.dependency_count = 0;
                node.metadata.dependent_count = 0;
                node.versions.constraints.retain(|c| keep.contains(c.required_by.as_str()));
                sub.nodes.insert((*id).to_string(), node);
                sub.dependencies.insert((*id).to_string(), BTreeSet::new());
                sub.dependents.insert((*id).to_string(), BTreeSet::new());
            }
        }
        for ((from, to), edge) in &state.edges {
            if !keep.contains(from.as_str()) || !keep.contains(to.as_str()) {
                continue;
            }
            sub.edges.insert((from.clone(), to.clone()), edge.clone());
            sub.dependencies.entry(from.clone()).or_default().insert(to.clone());
            sub.dependents.entry(to.clone()).or_default().insert(from.clone());
            if let Some(node) = sub.nodes.get_mut(from) {
                node.metadata.dependency_count += 1;
            }
            if let Some(node) = sub.nodes.get_mut(to) {
                node.metadata.dependent_count += 1;
            }
        }
        Self::from_state(sub)
    }

    // ------------------------------------------------------------------
    // Algorithms
    // ------------------------------------------------------------------

    /// Visit nodes in the order chosen by `config.algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::ToolNotFound`] for an unknown start node and
    /// [`ToolgraphError::CircularDependency`] when a topological traversal meets a
    /// cycle.
    pub fn traverse(&self, config: &TraversalConfig) -> Result<TraversalResult, ToolgraphError> {
        self.read_view(|view| traversal::traverse(view, config))
    }

    /// Like [`traverse`](Self::traverse), with the algorithm given by name.
    ///
    /// # Panics
    ///
    /// Panics if `algorithm` is not a known traversal algorithm name. Parse the
    /// name with [`TraversalAlgorithm::from_str`](std::str::FromStr::from_str) first
    /// to handle untrusted input.
    ///
    /// # Errors
    ///
    /// Same as [`traverse`](Self::traverse).
    pub fn traverse_named(
        &self,
        algorithm: &str,
        config: &TraversalConfig,
    ) -> Result<TraversalResult, ToolgraphError> {
        let algorithm: TraversalAlgorithm = match algorithm.parse() {
            Ok(algorithm) => algorithm,
            Err(e) => panic!("{e}"),
        };
        let config = TraversalConfig {
            algorithm,
            ..config.clone()
        };
        self.traverse(&config)
    }

    /// Find every cycle reachable by a depth-first search.
    #[must_use]
    pub fn detect_cycles(&self) -> CycleDetectionResult {
        let state = self.read();
        let result = CycleDetectionResult::from_cycles(cycles::find_cycles(&state.dependencies));
        if result.has_cycles {
            debug!(count = result.cycle_count, "Cycles detected");
        }
        result
    }

    /// Validate structure, platform compatibility, custom rules and cycles.
    ///
    /// With `config.use_cache`, results are reused for up to
    /// [`validation::CACHE_TTL`] while the graph is unchanged.
    #[must_use]
    pub fn validate(&self, config: &ValidationConfig) -> Arc<ValidationResult> {
        let state = self.read();
        let key = validation::CacheKey::new(config, state.revision);

        if config.use_cache {
            let caches = self.caches.lock();
            if let Some((stored_at, result)) = caches.validation.get(&key) {
                if stored_at.elapsed() < validation::CACHE_TTL {
                    trace!("Validation cache hit");
                    return Arc::clone(result);
                }
            }
        }

        let result = Arc::new(validation::run(GraphView::new(&state), config));
        if config.use_cache {
            self.caches.lock().validation.insert(key, (Instant::now(), Arc::clone(&result)));
        }
        result
    }

    /// Structural statistics, cached until the next mutation.
    ///
    /// Two calls without an intervening mutation return the same [`Arc`].
    #[must_use]
    pub fn calculate_statistics(&self) -> Arc<GraphStatistics> {
        let state = self.read();
        if let Some(stats) = &self.caches.lock().statistics {
            return Arc::clone(stats);
        }
        let computed = Arc::new(statistics::compute(GraphView::new(&state)));
        let mut caches = self.caches.lock();
        Arc::clone(caches.statistics.get_or_insert(computed))
    }

    /// Longest chain of dependency edges below `id`.
    #[must_use]
    pub fn node_depth(&self, id: &str) -> Option<usize> {
        self.calculate_statistics().node_depths.get(id).copied()
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Copy the graph into a petgraph [`DiGraph`] with tool ids as node weights.
    #[must_use]
    pub fn to_petgraph(&self) -> DiGraph<String, DependencyType> {
        let state = self.read();
        let mut graph = DiGraph::with_capacity(state.nodes.len(), state.edges.len());
        let indices: BTreeMap<&str, NodeIndex> =
            state.nodes.keys().map(|id| (id.as_str(), graph.add_node(id.clone()))).collect();
        for edge in state.edges.values() {
            if let (Some(&from), Some(&to)) = (indices.get(edge.from.as_str()), indices.get(edge.to.as_str())) {
                graph.add_edge(from, to, edge.dependency_type());
            }
        }
        graph
    }

    /// Graphviz DOT rendering with edges labelled by dependency type.
    #[must_use]
    pub fn to_dot(&self) -> String {
        let graph = self.to_petgraph();
        format!("{}", Dot::new(&graph))
    }
}
