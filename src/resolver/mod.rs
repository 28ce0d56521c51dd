//! Installation ordering for toolgraph.
//!
//! The [`DependencyResolver`] turns a set of requested tools into an
//! [`InstallationOrder`]: a sequence in which every tool follows its dependencies,
//! partitioned into batches an installer may run concurrently.
//!
//! # Algorithms
//!
//! | Algorithm | Ordering | Scope |
//! |-----------|----------|-------|
//! | [`Topological`](ResolutionAlgorithm::Topological) | Kahn, one batch per ready set | options |
//! | [`Dfs`](ResolutionAlgorithm::Dfs) | post-order descent | options |
//! | [`Bfs`](ResolutionAlgorithm::Bfs) | Kahn with a FIFO queue | options |
//! | [`Eager`](ResolutionAlgorithm::Eager) | Kahn | required, optional and suggested |
//! | [`Lazy`](ResolutionAlgorithm::Lazy) | Kahn | required only |
//!
//! Cycles that contain an optional or suggested edge are broken by deferring that
//! edge; it is reported in
//! [`deferred_dependencies`](InstallationOrder::deferred_dependencies). A cycle of
//! required edges fails the run.
//!
//! # Failure
//!
//! Failures are data: `success` is false and `errors` says why. Missing tools,
//! unbreakable cycles and an exceeded `max_execution_time` are reported this way.
//! [`DependencyResolver::resolve_with_conflict_resolution`] additionally runs the
//! [`ConflictDetector`] and [`ConflictResolver`] on failure and retries on the
//! modified graph up to `max_retries` times.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use toolgraph::resolver::{DependencyResolver, ResolveOptions};
//!
//! let resolver = DependencyResolver::new(Arc::new(graph), TargetPlatform::default());
//! let order = resolver.resolve(&["react"], &ResolveOptions::default());
//! assert!(order.position("node") < order.position("react"));
//! ```

mod engine;
pub mod options;
pub mod order;


pub use options::{PartialResolveOptions, ResolutionAlgorithm, ResolveOptions};
pub use order::{DeferredDependency, InstallationOrder};

pub(crate) use engine::compute_order;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::conflict::{ConflictDetector, DetectionOptions};
use crate::core::TargetPlatform;
use crate::graph::DependencyGraph;
use crate::resolution::{ConflictResolver, ResolutionCallbacks, ResolutionExecutionResult, ResolutionPolicy};

/// Counters accumulated over every run of a resolver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverMetrics {
    pub nodes_visited: usize,
    pub edges_traversed: usize,
    /// Wall time spent computing orders
    pub execution_time_ms: u64,
    /// Estimated peak size of the working set of the largest run
    pub memory_usage_bytes: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Orders computed, memo hits excluded
    pub resolutions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemoKey {
    tools: Vec<String>,
    options: ResolveOptions,
}

/// Result of [`DependencyResolver::resolve_with_conflict_resolution`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictAwareResolution {
    /// The last computed order
    pub order: InstallationOrder,
    /// Conflict-resolution rounds run
    pub attempts: usize,
    /// Every round's resolution report
    pub resolutions: Vec<ResolutionExecutionResult>,
    /// Graph the final order was computed on
    #[serde(skip)]
    pub final_graph: Arc<DependencyGraph>,
}

impl ConflictAwareResolution {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.order.success
    }
}

/// Computes installation orders over a shared [`DependencyGraph`].
///
/// Orders are memoized per requested tool list and options. Request order
/// matters: it seeds discovery. The memo is purged whenever the graph revision
/// moves on.
#[derive(Debug)]
pub struct DependencyResolver {
    graph: Arc<DependencyGraph>,
    target: TargetPlatform,
    memo: DashMap<MemoKey, InstallationOrder>,
    memo_revision: AtomicU64,
    metrics: Mutex<ResolverMetrics>,
}

impl DependencyResolver {
    /// Resolver over `graph` for `target`.
    pub fn new(graph: Arc<DependencyGraph>, target: TargetPlatform) -> Self {
        let revision = graph.revision();
        Self {
            graph,
            target,
            memo: DashMap::new(),
            memo_revision: AtomicU64::new(revision),
            metrics: Mutex::new(ResolverMetrics::default()),
        }
    }

    /// The graph orders are computed on.
    #[must_use]
    pub const fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    #[must_use]
    pub const fn target(&self) -> TargetPlatform {
        self.target
    }

    /// Order `tool_ids` with `options.algorithm`.
    pub fn resolve<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        let requested: Vec<String> = tool_ids.iter().map(|id| id.as_ref().to_string()).collect();
        let key = MemoKey {
            tools: requested.clone(),
            options: *options,
        };

        if options.enable_caching {
            self.sync_memo_revision();
            if let Some(cached) = self.memo.get(&key) {
                self.metrics.lock().cache_hits += 1;
                trace!(tools = ?key.tools, algorithm = %options.algorithm, "Resolution cache hit");
                return cached.clone();
            }
            self.metrics.lock().cache_misses += 1;
        }

        let started = Instant::now();
        let (order, stats) = self.graph.read_view(|view| compute_order(view, &requested, options, self.target));
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        {
            let mut metrics = self.metrics.lock();
            metrics.nodes_visited += stats.nodes_visited;
            metrics.edges_traversed += stats.edges_traversed;
            metrics.execution_time_ms += elapsed;
            metrics.memory_usage_bytes = metrics.memory_usage_bytes.max(stats.memory_bytes);
            metrics.resolutions += 1;
        }

        if options.enable_caching && order.graph_revision == self.memo_revision.load(Ordering::Acquire) {
            self.memo.insert(key, order.clone());
        }
        order
    }

    /// Kahn's algorithm with batched ready sets.
    pub fn resolve_topological<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        self.resolve_with(tool_ids, options, ResolutionAlgorithm::Topological)
    }

    /// Post-order depth-first descent.
    pub fn resolve_dfs<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        self.resolve_with(tool_ids, options, ResolutionAlgorithm::Dfs)
    }

    /// Kahn's algorithm in breadth-first discovery order.
    pub fn resolve_bfs<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        self.resolve_with(tool_ids, options, ResolutionAlgorithm::Bfs)
    }

    /// Topological order including optional and suggested dependencies.
    pub fn resolve_eager<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        self.resolve_with(tool_ids, options, ResolutionAlgorithm::Eager)
    }

    /// Topological order of required dependencies only.
    pub fn resolve_lazy<S: AsRef<str>>(&self, tool_ids: &[S], options: &ResolveOptions) -> InstallationOrder {
        self.resolve_with(tool_ids, options, ResolutionAlgorithm::Lazy)
    }

    fn resolve_with<S: AsRef<str>>(
        &self,
        tool_ids: &[S],
        options: &ResolveOptions,
        algorithm: ResolutionAlgorithm,
    ) -> InstallationOrder {
        let options = ResolveOptions {
            algorithm,
            ..*options
        };
        self.resolve(tool_ids, &options)
    }

    /// Resolve `tool_ids`, falling back to conflict resolution on failure.
    ///
    /// Each round detects conflicts on the current graph (thorough, uncached),
    /// lets a [`ConflictResolver`] with `policy` fix what it can and recomputes
    /// the order on the modified graph. Rounds stop when the order succeeds, when a
    /// round applies no step, or after `options.max_retries` rounds. Missing tools
    /// are not retried. The shared graph is never modified.
    pub async fn resolve_with_conflict_resolution<S: AsRef<str> + Sync>(
        &self,
        tool_ids: &[S],
        options: &ResolveOptions,
        policy: &ResolutionPolicy,
        callbacks: &dyn ResolutionCallbacks,
    ) -> ConflictAwareResolution {
        let mut order = self.resolve(tool_ids, options);
        let mut graph = Arc::clone(&self.graph);
        let mut targets: Vec<String> = tool_ids.iter().map(|id| id.as_ref().to_string()).collect();
        let mut resolutions = Vec::new();
        let mut attempts = 0;

        while !order.success && attempts < options.max_retries {
            if order.errors.iter().any(|e| e.starts_with("Missing tools")) {
                debug!("Missing tools cannot be fixed by conflict resolution");
                break;
            }
            attempts += 1;
            info!(attempt = attempts, max = options.max_retries, errors = ?order.errors, "Retrying resolution with conflict resolution");

            let detector = ConflictDetector::new(Arc::clone(&graph), self.target);
            let report = detector.detect_conflicts(
                &targets,
                &DetectionOptions {
                    enable_caching: false,
                    thorough_analysis: true,
                },
            );
            let resolver = ConflictResolver::new(Arc::clone(&graph), self.target).with_policy(policy.clone());
            let outcome = resolver.resolve_conflicts(&report, &targets, callbacks).await;
            let progressed = outcome.successful_steps().next().is_some();
            if progressed {
                graph = Arc::clone(&outcome.modified_graph);
                targets.clone_from(&outcome.target_tools);
            }
            resolutions.push(outcome);
            if !progressed {
                debug!(attempt = attempts, "Conflict resolution applied no step");
                break;
            }

            order = graph.read_view(|view| compute_order(view, &targets, options, self.target).0);
        }

        if !order.success && attempts > 0 {
            order
                .errors
                .push(format!("Resolution failed after {attempts} conflict-resolution attempt(s)"));
            warn!(attempts, "Resolution failed");
        }

        ConflictAwareResolution {
            order,
            attempts,
            resolutions,
            final_graph: graph,
        }
    }

    /// Accumulated metrics.
    #[must_use]
    pub fn get_metrics(&self) -> ResolverMetrics {
        *self.metrics.lock()
    }

    /// Drop every memoized order.
    pub fn clear_cache(&self) {
        self.memo.clear();
        debug!("Resolution cache cleared");
    }

    /// Number of memoized orders.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.memo.len()
    }

    fn sync_memo_revision(&self) {
        let current = self.graph.revision();
        let previous = self.memo_revision.swap(current, Ordering::AcqRel);
        if previous != current && !self.memo.is_empty() {
            debug!(previous, current, "Graph changed, purging resolution cache");
            self.memo.clear();
        }
    }
}
