//! Graph traversal algorithms.
//!
//! | Algorithm | Order |
//! |-----------|-------|
//! | [`DepthFirst`](TraversalAlgorithm::DepthFirst) | pre-order DFS from each start node |
//! | [`BreadthFirst`](TraversalAlgorithm::BreadthFirst) | level order from the start nodes |
//! | [`Topological`](TraversalAlgorithm::Topological) | Kahn's algorithm, dependencies first |
//! | [`DependencyFirst`](TraversalAlgorithm::DependencyFirst) | ascending direct-dependency count |
//! | [`CategoryFirst`](TraversalAlgorithm::CategoryFirst) | fixed category precedence |
//!
//! Start nodes bound the traversal to what they reach; with no start nodes the
//! whole graph is visited. Ties are broken by tool id so results are deterministic.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use super::cycles::{find_cycles, format_cycle};
use super::view::GraphView;
use crate::core::ToolgraphError;
use crate::manifest::DependencyType;

/// Traversal algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalAlgorithm {
    /// Depth-first pre-order
    DepthFirst,
    /// Breadth-first level order
    BreadthFirst,
    /// Kahn's algorithm
    #[default]
    Topological,
    /// Sorted by number of direct dependencies
    DependencyFirst,
    /// Sorted by category precedence
    CategoryFirst,
}

impl TraversalAlgorithm {
    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            TraversalAlgorithm::DepthFirst => "depth-first",
            TraversalAlgorithm::BreadthFirst => "breadth-first",
            TraversalAlgorithm::Topological => "topological",
            TraversalAlgorithm::DependencyFirst => "dependency-first",
            TraversalAlgorithm::CategoryFirst => "category-first",
        }
    }
}

impl fmt::Display for TraversalAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraversalAlgorithm {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "depth-first" | "dfs" => Ok(TraversalAlgorithm::DepthFirst),
            "breadth-first" | "bfs" => Ok(TraversalAlgorithm::BreadthFirst),
            "topological" | "topo" => Ok(TraversalAlgorithm::Topological),
            "dependency-first" => Ok(TraversalAlgorithm::DependencyFirst),
            "category-first" => Ok(TraversalAlgorithm::CategoryFirst),
            _ => Err(ToolgraphError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Which way DFS and BFS follow edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalDirection {
    /// From a tool to what it depends on
    #[default]
    Dependencies,
    /// From a tool to what depends on it
    Dependents,
}

/// Parameters of [`DependencyGraph::traverse`](super::DependencyGraph::traverse).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalConfig {
    /// Algorithm to run
    pub algorithm: TraversalAlgorithm,
    /// Roots of the traversal; empty means every node
    pub start_nodes: Vec<String>,
    /// Follow optional edges
    pub include_optional: bool,
    /// Follow suggested edges
    pub include_suggested: bool,
    /// Depth limit for DFS and BFS
    pub max_depth: Option<usize>,
    /// Edge direction for DFS and BFS
    pub direction: TraversalDirection,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            algorithm: TraversalAlgorithm::default(),
            start_nodes: Vec::new(),
            include_optional: true,
            include_suggested: true,
            max_depth: None,
            direction: TraversalDirection::default(),
        }
    }
}

impl TraversalConfig {
    /// Config for `algorithm` with every other field at its default.
    #[must_use]
    pub fn new(algorithm: TraversalAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Restrict the traversal to what `nodes` reach.
    #[must_use]
    pub fn starting_from<S: Into<String>>(mut self, nodes: impl IntoIterator<Item = S>) -> Self {
        self.start_nodes = nodes.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) const fn follows(&self, dependency_type: DependencyType) -> bool {
        match dependency_type {
            DependencyType::Required => true,
            DependencyType::Optional => self.include_optional,
            DependencyType::Suggested => self.include_suggested,
        }
    }
}

/// Output of a traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalResult {
    /// Algorithm that produced the order
    pub algorithm: TraversalAlgorithm,
    /// Visited node ids in visit order
    pub order: Vec<String>,
    /// Number of distinct nodes visited
    pub visited: usize,
    /// Number of edges followed
    pub edges_traversed: usize,
    /// Deepest level reached
    pub max_depth_reached: usize,
}

pub(crate) fn traverse(
    view: GraphView<'_>,
    config: &TraversalConfig,
) -> Result<TraversalResult, ToolgraphError> {
    for start in &config.start_nodes {
        if !view.contains(start) {
            return Err(ToolgraphError::ToolNotFound {
                id: start.clone(),
            });
        }
    }

    let roots: Vec<&str> = if config.start_nodes.is_empty() {
        view.node_ids().collect()
    } else {
        let unique: BTreeSet<&str> = config.start_nodes.iter().map(String::as_str).collect();
        unique.into_iter().collect()
    };

    let walk = Walk {
        view,
        config,
    };
    let result = match config.algorithm {
        TraversalAlgorithm::DepthFirst => walk.depth_first(&roots),
        TraversalAlgorithm::BreadthFirst => walk.breadth_first(&roots),
        TraversalAlgorithm::Topological => walk.topological(&roots)?,
        TraversalAlgorithm::DependencyFirst => {
            walk.sorted(&roots, |view, id| view.dependencies(id).count())
        }
        TraversalAlgorithm::CategoryFirst => walk.sorted(&roots, |view, id| {
            view.node(id).map_or(usize::MAX, |n| n.manifest.category.precedence())
        }),
    };
    Ok(result)
}

struct Walk<'a, 'c> {
    view: GraphView<'a>,
    config: &'c TraversalConfig,
}

impl<'a> Walk<'a, '_> {
    /// Neighbours in the configured direction over followed edges, sorted by id.
    fn neighbours(&self, id: &str) -> Vec<&'a str> {
        match self.config.direction {
            TraversalDirection::Dependencies => self
                .view
                .dependency_edges(id)
                .filter(|e| self.config.follows(e.dependency_type()))
                .map(|e| e.to.as_str())
                .collect(),
            TraversalDirection::Dependents => self
                .view
                .dependent_edges(id)
                .filter(|e| self.config.follows(e.dependency_type()))
                .map(|e| e.from.as_str())
                .collect(),
        }
    }

    fn within_depth(&self, depth: usize) -> bool {
        self.config.max_depth.is_none_or(|max| depth <= max)
    }

    fn depth_first(&self, roots: &[&str]) -> TraversalResult {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::new();
        let mut edges_traversed = 0;
        let mut max_depth_reached = 0;

        for root in roots {
            let mut stack: Vec<(&str, usize)> = vec![(self.node_key(root), 0)];
            while let Some((current, depth)) = stack.pop() {
                if !visited.insert(current) {
                    continue;
                }
                order.push(current.to_string());
                max_depth_reached = max_depth_reached.max(depth);
                if !self.within_depth(depth + 1) {
                    continue;
                }
                // Reverse so the smallest id is explored first.
                for next in self.neighbours(current).into_iter().rev() {
                    edges_traversed += 1;
                    if !visited.contains(next) {
                        stack.push((next, depth + 1));
                    }
                }
            }
        }

        self.finish(TraversalAlgorithm::DepthFirst, order, edges_traversed, max_depth_reached)
    }

    fn breadth_first(&self, roots: &[&str]) -> TraversalResult {
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
        let mut order = Vec::new();
        let mut edges_traversed = 0;
        let mut max_depth_reached = 0;

        for root in roots {
            let root = self.node_key(root);
            if visited.insert(root) {
                queue.push_back((root, 0));
            }
        }

        while let Some((current, depth)) = queue.pop_front() {
            order.push(current.to_string());
            max_depth_reached = max_depth_reached.max(depth);
            if !self.within_depth(depth + 1) {
                continue;
            }
            for next in self.neighbours(current) {
                edges_traversed += 1;
                if visited.insert(next) {
                    queue.push_back((next, depth + 1));
                }
            }
        }

        self.finish(TraversalAlgorithm::BreadthFirst, order, edges_traversed, max_depth_reached)
    }

    /// Kahn's algorithm: a node becomes ready once every dependency in scope has
    /// been emitted.
    fn topological(&self, roots: &[&str]) -> Result<TraversalResult, ToolgraphError> {
        let scope = self.dependency_scope(roots);

        let mut remaining: HashMap<&str, usize> = HashMap::new();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut edges_traversed = 0;
        for &id in &scope {
            let deps: Vec<&str> = self
                .view
                .dependency_edges(id)
                .filter(|e| self.config.follows(e.dependency_type()) && scope.contains(e.to.as_str()))
                .map(|e| e.to.as_str())
                .collect();
            remaining.insert(id, deps.len());
            for dep in deps {
                dependents.entry(dep).or_default().push(id);
            }
        }

        let mut level: HashMap<&str, usize> = HashMap::new();
        let mut ready: VecDeque<&str> =
            scope.iter().copied().filter(|id| remaining.get(id) == Some(&0)).collect();
        let mut order = Vec::with_capacity(scope.len());
        let mut max_depth_reached = 0;

        while let Some(current) = ready.pop_front() {
            let current_level = level.get(current).copied().unwrap_or(0);
            max_depth_reached = max_depth_reached.max(current_level);
            order.push(current.to_string());

            let mut unlocked = Vec::new();
            for &dependent in dependents.get(current).map(Vec::as_slice).unwrap_or_default() {
                edges_traversed += 1;
                let entry = level.entry(dependent).or_insert(0);
                *entry = (*entry).max(current_level + 1);
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        unlocked.push(dependent);
                    }
                }
            }
            unlocked.sort_unstable();
            ready.extend(unlocked);
        }

        if order.len() < scope.len() {
            let emitted: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let residual: BTreeMap<String, BTreeSet<String>> = scope
                .iter()
                .filter(|id| !emitted.contains(*id))
                .map(|id| {
                    let deps = self
                        .view
                        .dependencies(id)
                        .filter(|d| scope.contains(d) && !emitted.contains(d))
                        .map(ToString::to_string)
                        .collect();
                    ((*id).to_string(), deps)
                })
                .collect();
            let chain = find_cycles(&residual)
                .first()
                .map(|cycle| format_cycle(cycle))
                .unwrap_or_else(|| residual.keys().cloned().collect::<Vec<_>>().join(", "));
            return Err(ToolgraphError::CircularDependency {
                chain,
            });
        }

        Ok(self.finish(TraversalAlgorithm::Topological, order, edges_traversed, max_depth_reached))
    }

    fn sorted(
        &self,
        roots: &[&str],
        key: impl Fn(GraphView<'a>, &str) -> usize,
    ) -> TraversalResult {
        let algorithm = self.config.algorithm;
        let mut order: Vec<&str> = self.dependency_scope(roots).into_iter().collect();
        order.sort_by(|a, b| key(self.view, a).cmp(&key(self.view, b)).then_with(|| a.cmp(b)));
        let order = order.into_iter().map(ToString::to_string).collect();
        self.finish(algorithm, order, 0, 0)
    }

    /// Roots plus everything they reach over followed dependency edges.
    fn dependency_scope(&self, roots: &[&str]) -> BTreeSet<&'a str> {
        let mut scope: BTreeSet<&'a str> = BTreeSet::new();
        let mut stack: Vec<&'a str> = roots.iter().map(|r| self.node_key(r)).collect();
        while let Some(current) = stack.pop() {
            if !scope.insert(current) {
                continue;
            }
            for edge in self.view.dependency_edges(current) {
                if self.config.follows(edge.dependency_type()) && !scope.contains(edge.to.as_str()) {
                    stack.push(edge.to.as_str());
                }
            }
        }
        scope
    }

    /// Re-borrow a root id with the view's lifetime.
    fn node_key(&self, id: &str) -> &'a str {
        self.view.node(id).map_or("", |node| node.id())
    }

    fn finish(
        &self,
        algorithm: TraversalAlgorithm,
        order: Vec<String>,
        edges_traversed: usize,
        max_depth_reached: usize,
    ) -> TraversalResult {
        TraversalResult {
            algorithm,
            visited: order.len(),
            order,
            edges_traversed,
            max_depth_reached,
        }
    }
}
