//! The conflict detector and its report.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, trace};

use super::circular::{self, CircularDependency};
use super::platform::{self, PlatformIncompatibility};
use super::rules::{ConflictRuleTable, ResourceConflict};
use super::version::{self, VersionConflict};
use super::{ConflictDetail, ConflictSeverity, ConflictType};
use crate::core::TargetPlatform;
use crate::graph::{DependencyGraph, GraphView, reachable};
use crate::graph::cycles::find_cycles;

/// Options of [`ConflictDetector::detect_conflicts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOptions {
    /// Memoize results per request and graph revision
    pub enable_caching: bool,
    /// Check platform support and the rule table for transitive dependencies too,
    /// not only for the requested tools
    pub thorough_analysis: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            enable_caching: true,
            thorough_analysis: false,
        }
    }
}

/// [`DetectionOptions`] with every field optional, as read from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialDetectionOptions {
    /// Overrides [`DetectionOptions::enable_caching`]
    pub enable_caching: Option<bool>,
    /// Overrides [`DetectionOptions::thorough_analysis`]
    pub thorough_analysis: Option<bool>,
}

impl DetectionOptions {
    /// Defaults overridden by every field set in `partial`.
    #[must_use]
    pub fn merged_with_defaults(partial: PartialDetectionOptions) -> Self {
        let defaults = Self::default();
        Self {
            enable_caching: partial.enable_caching.unwrap_or(defaults.enable_caching),
            thorough_analysis: partial.thorough_analysis.unwrap_or(defaults.thorough_analysis),
        }
    }
}

/// Counters describing one detection run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictStatistics {
    /// Requested tools plus their transitive dependencies
    pub tools_analyzed: usize,
    /// Number of conflicts
    pub total_conflicts: usize,
    /// Conflicts per type
    pub by_type: BTreeMap<ConflictType, usize>,
    /// Conflicts per severity
    pub by_severity: BTreeMap<ConflictSeverity, usize>,
    /// Number of blocking conflicts
    pub blocking_conflicts: usize,
    /// Wall time of the analysis
    pub analysis_time_ms: u64,
    /// Graph revision analysed
    pub graph_revision: u64,
}

/// Report produced by [`ConflictDetector::detect_conflicts`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetectionResult {
    /// Whether any conflict was found
    pub has_conflicts: bool,
    /// Every conflict, most severe first
    pub conflicts: Vec<ConflictDetail>,
    /// Version conflicts
    pub version_conflicts: Vec<VersionConflict>,
    /// Cycles
    pub circular_dependencies: Vec<CircularDependency>,
    /// Tools that do not run on the target
    pub platform_incompatibilities: Vec<PlatformIncompatibility>,
    /// Rule-table matches
    pub resource_conflicts: Vec<ResourceConflict>,
    /// Highest severity present
    pub overall_severity: ConflictSeverity,
    /// `false` if any conflict is blocking
    pub can_proceed: bool,
    /// Counters
    pub statistics: ConflictStatistics,
    /// Advice for the user
    pub recommendations: Vec<String>,
    /// When the analysis ran
    pub detected_at: DateTime<Utc>,
}

impl ConflictDetectionResult {
    /// Conflict by id.
    #[must_use]
    pub fn conflict(&self, id: &str) -> Option<&ConflictDetail> {
        self.conflicts.iter().find(|c| c.id == id)
    }

    /// Blocking conflicts.
    pub fn blocking(&self) -> impl Iterator<Item = &ConflictDetail> {
        self.conflicts.iter().filter(|c| c.blocking)
    }
}

/// Size and effectiveness of the detector's memo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Cached reports
    pub size: usize,
    /// Lookups answered from the memo
    pub hits: u64,
    /// Lookups that ran the analysis
    pub misses: u64,
    /// `hits / (hits + misses)` as a percentage
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    tools: Vec<String>,
    thorough: bool,
}

/// Finds conflicts among tools of a shared [`DependencyGraph`].
#[derive(Debug)]
pub struct ConflictDetector {
    graph: Arc<DependencyGraph>,
    target: TargetPlatform,
    rules: ConflictRuleTable,
    cache: DashMap<CacheKey, ConflictDetectionResult>,
    cache_revision: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ConflictDetector {
    /// Detector for `graph` and `target` using the built-in rule table.
    #[must_use]
    pub fn new(graph: Arc<DependencyGraph>, target: TargetPlatform) -> Self {
        Self {
            graph,
            target,
            rules: ConflictRuleTable::builtin(),
            cache: DashMap::new(),
            cache_revision: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Replace the rule table.
    #[must_use]
    pub fn with_rules(mut self, rules: ConflictRuleTable) -> Self {
        self.rules = rules;
        self
    }

    /// The analysed graph.
    #[must_use]
    pub fn graph(&self) -> &Arc<DependencyGraph> {
        &self.graph
    }

    /// The target platform.
    #[must_use]
    pub const fn target(&self) -> TargetPlatform {
        self.target
    }

    /// The rule table.
    #[must_use]
    pub const fn rules(&self) -> &ConflictRuleTable {
        &self.rules
    }

    /// Analyse `tool_ids` and everything they depend on.
    ///
    /// Ids missing from the graph are ignored. With caching enabled, an identical
    /// request against an unchanged graph returns the memoized report.
    pub fn detect_conflicts<S: AsRef<str>>(
        &self,
        tool_ids: &[S],
        options: &DetectionOptions,
    ) -> ConflictDetectionResult {
        let key = CacheKey {
            tools: normalize(tool_ids),
            thorough: options.thorough_analysis,
        };

        if options.enable_caching {
            self.sync_cache_revision();
            if let Some(cached) = self.cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(tools = ?key.tools, "Conflict detection cache hit");
                return cached.clone();
            }
            self.misses.fetch_add(1, Ordering::Relaxed);
        }

        let result = self.graph.read_view(|view| self.analyze(view, &key.tools, options));

        info!(
            conflicts = result.conflicts.len(),
            severity = %result.overall_severity,
            can_proceed = result.can_proceed,
            "Conflict detection finished"
        );

        if options.enable_caching && result.statistics.graph_revision == self.cache_revision.load(Ordering::Acquire) {
            self.cache.insert(key, result.clone());
        }
        result
    }

    /// Version conflicts among `tool_ids` and their dependencies.
    pub fn detect_version_conflicts<S: AsRef<str>>(&self, tool_ids: &[S]) -> Vec<VersionConflict> {
        let tools = normalize(tool_ids);
        self.graph.read_view(|view| {
            let scope = closure(view, &tools);
            version::analyze(view, &scope).into_iter().map(|(conflict, _)| conflict).collect()
        })
    }

    /// Requested tools that do not support the target.
    pub fn detect_platform_incompatibilities<S: AsRef<str>>(
        &self,
        tool_ids: &[S],
    ) -> Vec<PlatformIncompatibility> {
        let tools = normalize(tool_ids);
        self.graph.read_view(|view| {
            platform::analyze(view, &tools, self.target).into_iter().map(|(found, _)| found).collect()
        })
    }

    /// Drop every memoized report and reset the counters.
    pub fn clear_cache(&self) {
        self.cache.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        debug!("Conflict detection cache cleared");
    }

    /// Memo size and hit rate.
    #[must_use]
    pub fn get_cache_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        #[allow(clippy::cast_precision_loss)]
        let hit_rate = if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        };
        CacheStats {
            size: self.cache.len(),
            hits,
            misses,
            hit_rate,
        }
    }

    /// Purge the memo when the graph has moved on since it was filled.
    fn sync_cache_revision(&self) {
        let current = self.graph.revision();
        let previous = self.cache_revision.swap(current, Ordering::AcqRel);
        if previous != current && !self.cache.is_empty() {
            debug!(previous, current, "Graph changed, purging conflict cache");
            self.cache.clear();
        }
    }

    fn analyze(
        &self,
        view: GraphView<'_>,
        tools: &[String],
        options: &DetectionOptions,
    ) -> ConflictDetectionResult {
        let started = Instant::now();
        let scope = closure(view, tools);
        let surface: BTreeSet<String> = if options.thorough_analysis {
            scope.clone()
        } else {
            tools.iter().filter(|id| view.contains(id)).cloned().collect()
        };

        let version_found = version::analyze(view, &scope);
        let cycle_found: Vec<_> = find_cycles(&scoped_adjacency(view, &scope))
            .iter()
            .map(|cycle| circular::analyze_cycle(view, cycle))
            .collect();
        let platform_found = platform::analyze(view, &surface, self.target);
        let rule_found = self.rules.analyze(&surface);

        let mut conflicts: Vec<ConflictDetail> = Vec::new();
        let mut version_conflicts = Vec::new();
        let mut circular_dependencies = Vec::new();
        let mut platform_incompatibilities = Vec::new();
        let mut resource_conflicts = Vec::new();
        for (typed, detail) in version_found {
            version_conflicts.push(typed);
            conflicts.push(detail);
        }
        for (typed, detail) in cycle_found {
            circular_dependencies.push(typed);
            conflicts.push(detail);
        }
        for (typed, detail) in platform_found {
            platform_incompatibilities.push(typed);
            conflicts.push(detail);
        }
        for (typed, detail) in rule_found {
            resource_conflicts.push(typed);
            conflicts.push(detail);
        }
        conflicts.sort_by(|a, b| b.blocking.cmp(&a.blocking).then(b.severity.cmp(&a.severity)));

        let overall_severity = conflicts.iter().map(|c| c.severity).max().unwrap_or_default();
        let blocking_conflicts = conflicts.iter().filter(|c| c.blocking).count();

        let mut by_type = BTreeMap::new();
        let mut by_severity = BTreeMap::new();
        for conflict in &conflicts {
            *by_type.entry(conflict.conflict_type).or_insert(0) += 1;
            *by_severity.entry(conflict.severity).or_insert(0) += 1;
        }

        let statistics = ConflictStatistics {
            tools_analyzed: scope.len(),
            total_conflicts: conflicts.len(),
            by_type,
            by_severity,
            blocking_conflicts,
            analysis_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            graph_revision: view.revision(),
        };

        ConflictDetectionResult {
            has_conflicts: !conflicts.is_empty(),
            recommendations: recommendations(&conflicts, &version_conflicts),
            can_proceed: blocking_conflicts == 0,
            conflicts,
            version_conflicts,
            circular_dependencies,
            platform_incompatibilities,
            resource_conflicts,
            overall_severity,
            statistics,
            detected_at: Utc::now(),
        }
    }
}

fn normalize<S: AsRef<str>>(tool_ids: &[S]) -> Vec<String> {
    let unique: BTreeSet<&str> = tool_ids.iter().map(AsRef::as_ref).collect();
    unique.into_iter().map(ToString::to_string).collect()
}

/// Requested tools present in the graph plus everything they reach.
fn closure(view: GraphView<'_>, tools: &[String]) -> BTreeSet<String> {
    let mut scope = BTreeSet::new();
    for id in tools.iter().filter(|id| view.contains(id)) {
        scope.insert(id.clone());
        scope.extend(reachable(view.adjacency(), id));
    }
    scope
}

fn scoped_adjacency(view: GraphView<'_>, scope: &BTreeSet<String>) -> BTreeMap<String, BTreeSet<String>> {
    scope
        .iter()
        .map(|id| {
            let deps = view.dependencies(id).filter(|d| scope.contains(*d)).map(ToString::to_string).collect();
            (id.clone(), deps)
        })
        .collect()
}

fn recommendations(conflicts: &[ConflictDetail], versions: &[VersionConflict]) -> Vec<String> {
    let mut out = Vec::new();
    let blocking = conflicts.iter().filter(|c| c.blocking).count();
    if blocking > 0 {
        out.push(format!("Resolve {blocking} blocking conflict(s) before installing"));
    }
    for conflict in versions {
        match &conflict.compromise_version {
            Some(version) => out.push(format!(
                "Pin {} to {version}, which satisfies every required dependent",
                conflict.tool_id
            )),
            None => out.push(format!(
                "Relax the version requirements on {}; no version satisfies all of them",
                conflict.tool_id
            )),
        }
    }
    for conflict in conflicts {
        let best = conflict.suggested_resolutions.first();
        match (conflict.conflict_type, best) {
            (ConflictType::Version, _) => {}
            (_, Some(resolution)) => {
                if let Some(step) = resolution.steps.first() {
                    out.push(format!("{}: {}", conflict.description, step.description));
                }
            }
            (_, None) => out.push(format!("{}: no automatic fix available", conflict.description)),
        }
    }
    out
}
