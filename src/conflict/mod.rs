//! Conflict detection over a dependency graph.
//!
//! The [`ConflictDetector`] examines the tools a caller wants to install together
//! with everything they transitively depend on, and reports:
//!
//! - **version conflicts**: the constraints placed on a tool by its dependents have
//!   no common version ([`version`])
//! - **circular dependencies**: cycles annotated with edge types and ranked break
//!   points ([`circular`])
//! - **platform incompatibilities**: tools that cannot run on the target, with
//!   alternatives and workarounds ([`platform`])
//! - **resource and cross-category conflicts**: pairs of tools listed in a
//!   [`ConflictRuleTable`] ([`rules`])
//!
//! Every finding becomes a [`ConflictDetail`] with a severity, a `blocking` flag
//! and ranked [`SuggestedResolution`]s that the
//! [`ConflictResolver`](crate::resolution::ConflictResolver) can apply.
//!
//! Conflict ids are derived from the finding (`version:lib`,
//! `circular:a>b`, `platform:valgrind`, `resource:mysql-mariadb-port`) so that the
//! same graph always yields the same report.

pub mod circular;
pub mod detector;
pub mod platform;
pub mod rules;
pub mod version;

#[cfg(test)]
mod tests;

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use circular::{BreakPoint, BreakStrategy, CircularDependency, CycleEdge, CycleImpact};
pub use detector::{
    CacheStats, ConflictDetectionResult, ConflictDetector, ConflictStatistics, DetectionOptions,
    PartialDetectionOptions,
};
pub use platform::{AlternativeTool, MissingSupport, PlatformIncompatibility, Workaround};
pub use rules::{ConflictRule, ConflictRuleTable, ResourceConflict, RuleResolution};
pub use version::{VersionConflict, VersionRequirement};

/// Category of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    /// Dependents disagree about a tool's version
    Version,
    /// Tools depend on each other in a cycle
    Circular,
    /// A tool cannot run on the target platform
    Platform,
    /// Two tools claim the same exclusive resource
    Resource,
    /// Two tools fill the same role
    CrossCategory,
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictType::Version => "version",
            ConflictType::Circular => "circular",
            ConflictType::Platform => "platform",
            ConflictType::Resource => "resource",
            ConflictType::CrossCategory => "cross-category",
        })
    }
}

/// How serious a conflict is; ordered from `None` to `Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    /// No conflict
    #[default]
    None,
    /// Installation can proceed with a degraded result
    Minor,
    /// Needs attention before installation
    Major,
    /// Installation cannot proceed
    Critical,
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictSeverity::None => "none",
            ConflictSeverity::Minor => "minor",
            ConflictSeverity::Major => "major",
            ConflictSeverity::Critical => "critical",
        })
    }
}

/// Risk of applying an action; ordered from `Low` to `High`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Easily undone, no effect on other tools
    #[default]
    Low,
    /// Changes what gets installed
    Medium,
    /// Drops tools or dependencies
    High,
}

/// A single kind of change a resolution step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionAction {
    /// Fix a tool to one version
    Pin,
    /// Move a tool to a newer version
    Upgrade,
    /// Move a tool to an older version
    Downgrade,
    /// Install the dependency after its dependent
    Defer,
    /// Turn a required dependency into an optional one
    MakeOptional,
    /// Use an alternative tool instead
    Substitute,
    /// Drop a dependency edge
    Remove,
    /// Apply a manual workaround; the graph is unchanged
    Workaround,
    /// Disable a conflicting service; the graph is unchanged
    Disable,
    /// Rename a conflicting binary or port; the graph is unchanged
    Rename,
    /// Replace one of two conflicting tools with the other
    Replace,
}

impl ResolutionAction {
    /// Risk of the action.
    #[must_use]
    pub const fn risk(&self) -> RiskLevel {
        match self {
            ResolutionAction::Pin | ResolutionAction::Defer | ResolutionAction::Workaround => {
                RiskLevel::Low
            }
            ResolutionAction::Upgrade
            | ResolutionAction::Downgrade
            | ResolutionAction::MakeOptional
            | ResolutionAction::Substitute
            | ResolutionAction::Disable
            | ResolutionAction::Rename => RiskLevel::Medium,
            ResolutionAction::Remove | ResolutionAction::Replace => RiskLevel::High,
        }
    }

    /// Whether the action can be rolled back by re-running resolution.
    #[must_use]
    pub const fn is_reversible(&self) -> bool {
        !matches!(self, ResolutionAction::Remove)
    }

    /// Kebab-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResolutionAction::Pin => "pin",
            ResolutionAction::Upgrade => "upgrade",
            ResolutionAction::Downgrade => "downgrade",
            ResolutionAction::Defer => "defer",
            ResolutionAction::MakeOptional => "make-optional",
            ResolutionAction::Substitute => "substitute",
            ResolutionAction::Remove => "remove",
            ResolutionAction::Workaround => "workaround",
            ResolutionAction::Disable => "disable",
            ResolutionAction::Rename => "rename",
            ResolutionAction::Replace => "replace",
        }
    }
}

impl fmt::Display for ResolutionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the edge `from → to`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRef {
    /// Dependent tool
    pub from: String,
    /// Dependency tool
    pub to: String,
}

impl EdgeRef {
    /// Reference the edge `from → to`.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl fmt::Display for EdgeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.from, self.to)
    }
}

/// One ordered step of a suggested resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStep {
    /// Position within the resolution, starting at 1
    pub order: usize,
    /// What the step does
    pub action: ResolutionAction,
    /// Human-readable description
    pub description: String,
    /// Tool the step acts on
    pub target_tool: String,
    /// Version for pin, upgrade and downgrade steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_version: Option<Version>,
    /// Edge for defer, make-optional and remove steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeRef>,
    /// Replacement tool for substitute and replace steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Whether the step asks the user before running
    pub requires_confirmation: bool,
    /// Consequences beyond resolving the conflict
    pub side_effects: Vec<String>,
    /// Whether the step can be undone
    pub reversible: bool,
}

impl ResolutionStep {
    /// A step acting on `target_tool`. Confirmation defaults to required for
    /// high-risk actions.
    pub fn new(action: ResolutionAction, target_tool: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            order: 1,
            action,
            description: description.into(),
            target_tool: target_tool.into(),
            target_version: None,
            edge: None,
            replacement: None,
            requires_confirmation: action.risk() == RiskLevel::High,
            side_effects: Vec::new(),
            reversible: action.is_reversible(),
        }
    }

    /// Set the version the step moves to.
    #[must_use]
    pub fn with_version(mut self, version: Version) -> Self {
        self.target_version = Some(version);
        self
    }

    /// Set the edge the step acts on.
    #[must_use]
    pub fn with_edge(mut self, edge: EdgeRef) -> Self {
        self.edge = Some(edge);
        self
    }

    /// Set the replacement tool.
    #[must_use]
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// Add a side effect.
    #[must_use]
    pub fn with_side_effect(mut self, effect: impl Into<String>) -> Self {
        self.side_effects.push(effect.into());
        self
    }

    /// Override whether the step needs confirmation.
    #[must_use]
    pub const fn requiring_confirmation(mut self, required: bool) -> Self {
        self.requires_confirmation = required;
        self
    }
}

/// One way to resolve a conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedResolution {
    /// Identifier unique within the conflict
    pub id: String,
    /// Short name of the approach
    pub strategy: String,
    /// Confidence in `0.0..=1.0` that this is the right fix
    pub confidence: f64,
    /// Steps in execution order
    pub steps: Vec<ResolutionStep>,
    /// Expected time to apply, in seconds
    pub estimated_time_secs: u64,
    /// Probability in `0.0..=1.0` that applying the steps succeeds
    pub success_probability: f64,
    /// Union of the steps' side effects
    pub side_effects: Vec<String>,
}

impl SuggestedResolution {
    /// Assemble a resolution, numbering the steps and collecting side effects.
    pub fn new(
        id: impl Into<String>,
        strategy: impl Into<String>,
        confidence: f64,
        steps: Vec<ResolutionStep>,
    ) -> Self {
        let steps: Vec<ResolutionStep> = steps
            .into_iter()
            .enumerate()
            .map(|(i, step)| ResolutionStep {
                order: i + 1,
                ..step
            })
            .collect();
        let mut side_effects: Vec<String> = Vec::new();
        for effect in steps.iter().flat_map(|s| &s.side_effects) {
            if !side_effects.contains(effect) {
                side_effects.push(effect.clone());
            }
        }
        let worst = steps.iter().map(|s| s.action.risk()).max().unwrap_or_default();
        let success_probability = match worst {
            RiskLevel::Low => 0.95,
            RiskLevel::Medium => 0.85,
            RiskLevel::High => 0.7,
        };
        Self {
            id: id.into(),
            strategy: strategy.into(),
            confidence: confidence.clamp(0.0, 1.0),
            estimated_time_secs: 5 * steps.len() as u64,
            steps,
            success_probability,
            side_effects,
        }
    }

    /// Actions used by the steps.
    pub fn actions(&self) -> impl Iterator<Item = ResolutionAction> + '_ {
        self.steps.iter().map(|s| s.action)
    }

    /// Highest risk among the steps.
    #[must_use]
    pub fn risk(&self) -> RiskLevel {
        self.actions().map(|a| a.risk()).max().unwrap_or_default()
    }
}

/// A detected conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictDetail {
    /// Stable identifier derived from the finding
    pub id: String,
    /// Conflict category
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// Severity
    pub severity: ConflictSeverity,
    /// Tools involved
    pub tools: Vec<String>,
    /// What is wrong
    pub description: String,
    /// Why it is wrong
    pub root_cause: String,
    /// Ways to fix it, best first
    pub suggested_resolutions: Vec<SuggestedResolution>,
    /// Whether installation cannot proceed while the conflict stands
    pub blocking: bool,
}

impl ConflictDetail {
    /// Sort suggested resolutions by descending confidence, keeping ties in order.
    pub(crate) fn rank_resolutions(mut self) -> Self {
        self.suggested_resolutions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        self
    }
}
