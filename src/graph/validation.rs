//! Structural and platform validation of a dependency graph.
//!
//! Validation never fails; problems are collected into a [`ValidationResult`].
//!
//! | Check | Code | Severity |
//! |-------|------|----------|
//! | Edge endpoint missing | `DANGLING_EDGE` | error |
//! | Node without edges | `ORPHANED_NODE` | warning (skipped when lenient) |
//! | Endpoints share no platform | `PLATFORM_INCOMPATIBILITY` | warning |
//! | Cycle | `CIRCULAR_DEPENDENCY` | error when strict, otherwise warning |
//! | Custom rule | `CUSTOM_RULE` or the rule's own code | as reported |
//!
//! Results are cached per graph for [`CACHE_TTL`], keyed by the rule ids, the
//! strictness, the check flags and the graph revision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cycles::{find_cycles, format_cycle};
use super::view::GraphView;

/// How long a cached validation result stays valid.
pub const CACHE_TTL: Duration = Duration::from_secs(5);

/// How strictly findings are classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Skip advisory checks
    Lenient,
    /// Default classification
    #[default]
    Normal,
    /// Cycles are errors
    Strict,
}

/// Kind of finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// An edge refers to a node that does not exist
    DanglingEdge,
    /// A node has neither dependencies nor dependents
    OrphanedNode,
    /// The endpoints of an edge share no supported platform
    PlatformIncompatibility,
    /// The graph contains a cycle
    CircularDependency,
    /// Reported by a custom rule
    CustomRule,
}

/// Whether a finding invalidates the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Makes the result invalid
    Error,
    /// Reported only
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    /// Finding kind
    pub code: IssueCode,
    /// Error or warning
    pub severity: IssueSeverity,
    /// Human-readable message
    pub message: String,
    /// Tools involved
    pub nodes: Vec<String>,
    /// Id of the custom rule that produced the finding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
}

impl ValidationIssue {
    /// A finding with no rule id.
    pub fn new(
        code: IssueCode,
        severity: IssueSeverity,
        message: impl Into<String>,
        nodes: Vec<String>,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            nodes,
            rule_id: None,
        }
    }
}

/// A custom check run as part of validation.
///
/// Rules see the graph through a [`GraphView`] while the read lock is held.
pub trait ValidationRule: Send + Sync {
    /// Stable identifier, part of the cache key.
    fn id(&self) -> &str;

    /// Inspect the graph and report findings.
    fn check(&self, graph: GraphView<'_>) -> Vec<ValidationIssue>;
}

/// Parameters of [`DependencyGraph::validate`](super::DependencyGraph::validate).
#[derive(Clone)]
pub struct ValidationConfig {
    /// Classification strictness
    pub strictness: Strictness,
    /// Warn about edges whose endpoints share no platform
    pub check_platform_compatibility: bool,
    /// Report cycles
    pub check_cycles: bool,
    /// Custom rules, run in order
    pub rules: Vec<Arc<dyn ValidationRule>>,
    /// Reuse a cached result when available
    pub use_cache: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Normal,
            check_platform_compatibility: true,
            check_cycles: true,
            rules: Vec::new(),
            use_cache: true,
        }
    }
}

impl fmt::Debug for ValidationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationConfig")
            .field("strictness", &self.strictness)
            .field("check_platform_compatibility", &self.check_platform_compatibility)
            .field("check_cycles", &self.check_cycles)
            .field("rules", &self.rules.iter().map(|r| r.id()).collect::<Vec<_>>())
            .field("use_cache", &self.use_cache)
            .finish()
    }
}

impl ValidationConfig {
    /// Default checks at the given strictness.
    #[must_use]
    pub fn with_strictness(strictness: Strictness) -> Self {
        Self {
            strictness,
            ..Self::default()
        }
    }

    /// Append a custom rule.
    #[must_use]
    pub fn with_rule(mut self, rule: Arc<dyn ValidationRule>) -> Self {
        self.rules.push(rule);
        self
    }
}

/// Outcome of validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `true` when there are no errors
    pub valid: bool,
    /// Findings that invalidate the graph
    pub errors: Vec<ValidationIssue>,
    /// Advisory findings
    pub warnings: Vec<ValidationIssue>,
    /// Graph revision that was validated
    pub revision: u64,
    /// When validation ran
    pub validated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    rule_ids: Vec<String>,
    strictness: Strictness,
    check_platform_compatibility: bool,
    check_cycles: bool,
    revision: u64,
}

impl CacheKey {
    pub(crate) fn new(config: &ValidationConfig, revision: u64) -> Self {
        Self {
            rule_ids: config.rules.iter().map(|r| r.id().to_string()).collect(),
            strictness: config.strictness,
            check_platform_compatibility: config.check_platform_compatibility,
            check_cycles: config.check_cycles,
            revision,
        }
    }
}

pub(crate) fn run(view: GraphView<'_>, config: &ValidationConfig) -> ValidationResult {
    let mut issues = Vec::new();

    for edge in view.edges() {
        let missing: Vec<String> = [&edge.from, &edge.to]
            .into_iter()
            .filter(|id| !view.contains(id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            issues.push(ValidationIssue::new(
                IssueCode::DanglingEdge,
                IssueSeverity::Error,
                format!("Edge {} → {} references missing node(s): {}", edge.from, edge.to, missing.join(", ")),
                vec![edge.from.clone(), edge.to.clone()],
            ));
        }
    }

    if config.strictness != Strictness::Lenient && view.node_count() > 1 {
        for id in view.node_ids() {
            if view.dependencies(id).next().is_none() && view.dependents(id).next().is_none() {
                issues.push(ValidationIssue::new(
                    IssueCode::OrphanedNode,
                    IssueSeverity::Warning,
                    format!("Tool '{id}' has no dependencies and no dependents"),
                    vec![id.to_string()],
                ));
            }
        }
    }

    if config.check_platform_compatibility {
        for edge in view.edges() {
            let (Some(from), Some(to)) = (view.node(&edge.from), view.node(&edge.to)) else {
                continue;
            };
            let shared = from
                .platform
                .supported
                .iter()
                .filter(|p| to.platform.supported.contains(p) && edge.platforms.contains(p))
                .count();
            if shared == 0 {
                issues.push(ValidationIssue::new(
                    IssueCode::PlatformIncompatibility,
                    IssueSeverity::Warning,
                    format!(
                        "'{}' and its dependency '{}' share no supported platform",
                        edge.from, edge.to
                    ),
                    vec![edge.from.clone(), edge.to.clone()],
                ));
            }
        }
    }

    for rule in &config.rules {
        for mut issue in rule.check(view) {
            issue.rule_id.get_or_insert_with(|| rule.id().to_string());
            issues.push(issue);
        }
    }

    if config.check_cycles {
        let severity = if config.strictness == Strictness::Strict {
            IssueSeverity::Error
        } else {
            IssueSeverity::Warning
        };
        for cycle in find_cycles(view.adjacency()) {
            issues.push(ValidationIssue::new(
                IssueCode::CircularDependency,
                severity,
                format!("Circular dependency: {}", format_cycle(&cycle)),
                cycle,
            ));
        }
    }

    let (errors, warnings): (Vec<_>, Vec<_>) =
        issues.into_iter().partition(|issue| issue.severity == IssueSeverity::Error);
    debug!(
        revision = view.revision(),
        errors = errors.len(),
        warnings = warnings.len(),
        "Graph validated"
    );

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
        revision: view.revision(),
        validated_at: Utc::now(),
    }
}
