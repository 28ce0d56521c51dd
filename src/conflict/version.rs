//! Version conflicts between the dependents of a tool.
//!
//! Every dependency with version bounds places an
//! [`AppliedConstraint`](crate::graph::AppliedConstraint) on its target. For a tool
//! with at least two such constraints from `required` or `optional` dependents the
//! detector intersects the ranges:
//!
//! - all ranges overlap: no conflict
//! - only the `required` ranges overlap: a minor, non-blocking conflict whose
//!   compromise version satisfies every required dependent
//! - the `required` ranges do not overlap: a blocking conflict with an
//!   `unsatisfiable_reason`

use semver::Version;
use serde::Serialize;
use std::collections::BTreeSet;

use super::{
    ConflictDetail, ConflictSeverity, ConflictType, ResolutionAction, ResolutionStep,
    SuggestedResolution,
};
use crate::graph::GraphView;
use crate::manifest::DependencyType;
use crate::version::{VersionComparator, VersionRange};

/// One dependent's requirement on a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRequirement {
    /// Tool declaring the requirement
    pub required_by: String,
    /// The requirement rendered as a constraint
    pub constraint: String,
    /// The admitted interval
    pub range: VersionRange,
    /// Whether the requirement comes from a `required` dependency
    pub strict: bool,
    /// Type of the declaring dependency
    pub dependency_type: DependencyType,
}

/// Disagreeing version requirements on one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionConflict {
    /// Id of the matching [`ConflictDetail`]
    pub conflict_id: String,
    /// Tool whose version is contested
    pub tool_id: String,
    /// Every requirement on the tool
    pub requirements: Vec<VersionRequirement>,
    /// A version satisfying all strict requirements, if one can be named
    pub compromise_version: Option<Version>,
    /// Why no version can satisfy the strict requirements
    pub unsatisfiable_reason: Option<String>,
}

impl VersionConflict {
    /// Whether the strict requirements overlap.
    #[must_use]
    pub const fn is_satisfiable(&self) -> bool {
        self.unsatisfiable_reason.is_none()
    }
}

/// Requirements on `tool_id` from dependents inside `scope`.
pub(crate) fn requirements(
    view: GraphView<'_>,
    tool_id: &str,
    scope: &BTreeSet<String>,
) -> Vec<VersionRequirement> {
    let Some(node) = view.node(tool_id) else {
        return Vec::new();
    };
    node.versions
        .constraints
        .iter()
        .filter(|c| c.dependency_type != DependencyType::Suggested && scope.contains(&c.required_by))
        .map(|c| VersionRequirement {
            required_by: c.required_by.clone(),
            constraint: c.range.to_string(),
            range: c.range.clone(),
            strict: c.dependency_type.is_required(),
            dependency_type: c.dependency_type,
        })
        .collect()
}

/// Pick a version inside `range`: the best published match, then `fallback` when it
/// lies in the range, then the smallest named version of a bounded range.
pub(crate) fn choose_version(
    range: &VersionRange,
    available: &[Version],
    prefer_latest: bool,
    fallback: Option<&Version>,
) -> Option<Version> {
    if range.is_empty() {
        return None;
    }
    range
        .best_match(available, prefer_latest)
        .or_else(|| fallback.filter(|v| range.contains(v)))
        .cloned()
        .or_else(|| if range.is_any() { None } else { range.representative() })
}

/// Analyse every tool in `scope`, returning the typed conflicts and their details.
pub(crate) fn analyze(
    view: GraphView<'_>,
    scope: &BTreeSet<String>,
) -> Vec<(VersionConflict, ConflictDetail)> {
    let mut found = Vec::new();

    for tool_id in scope {
        let reqs = requirements(view, tool_id, scope);
        if reqs.len() < 2 {
            continue;
        }
        let all = VersionRange::intersect_all(reqs.iter().map(|r| &r.range));
        if !all.is_empty() {
            continue;
        }

        let strict = VersionRange::intersect_all(reqs.iter().filter(|r| r.strict).map(|r| &r.range));
        let node = view.node(tool_id);
        let available = node.map(|n| n.versions.available.clone()).unwrap_or_default();
        let baseline = node.and_then(|n| n.baseline_version());
        let compromise = choose_version(&strict, &available, true, baseline.as_ref());
        let conflict_id = format!("version:{tool_id}");

        let listing = reqs
            .iter()
            .map(|r| format!("{} requires {} {}", r.required_by, tool_id, r.constraint))
            .collect::<Vec<_>>()
            .join("; ");
        let unsatisfiable_reason = strict.is_empty().then(|| {
            format!("No version of {tool_id} satisfies every required constraint: {listing}")
        });

        let mut tools: Vec<String> = vec![tool_id.clone()];
        tools.extend(reqs.iter().map(|r| r.required_by.clone()));

        let (severity, blocking, resolutions) = match &compromise {
            Some(version) => {
                let action = match &baseline {
                    Some(current) if version > current => ResolutionAction::Upgrade,
                    Some(current) if version < current => ResolutionAction::Downgrade,
                    _ => ResolutionAction::Pin,
                };
                let mut step = ResolutionStep::new(
                    action,
                    tool_id.clone(),
                    format!("{action} {tool_id} to {version}"),
                )
                .with_version(version.clone());
                for optional in reqs.iter().filter(|r| !r.strict && !r.range.contains(version)) {
                    step = step.with_side_effect(format!(
                        "optional requirement of {} on {} ({}) is not met",
                        optional.required_by, tool_id, optional.constraint
                    ));
                }
                if let Some(current) = &baseline {
                    if VersionComparator::is_major_upgrade(current, version) {
                        step = step
                            .with_side_effect(format!("{tool_id} moves to a new major version"))
                            .requiring_confirmation(true);
                    }
                }
                let resolution = SuggestedResolution::new(
                    format!("{conflict_id}:pin"),
                    "pin-compromise",
                    0.8,
                    vec![step],
                );
                (ConflictSeverity::Minor, false, vec![resolution])
            }
            None if strict.is_empty() => (ConflictSeverity::Critical, true, Vec::new()),
            None => (ConflictSeverity::Minor, false, Vec::new()),
        };

        let conflict = VersionConflict {
            conflict_id: conflict_id.clone(),
            tool_id: tool_id.clone(),
            requirements: reqs,
            compromise_version: compromise,
            unsatisfiable_reason,
        };
        let detail = ConflictDetail {
            id: conflict_id,
            conflict_type: ConflictType::Version,
            severity,
            tools,
            description: format!("Conflicting version requirements on {tool_id}"),
            root_cause: listing,
            suggested_resolutions: resolutions,
            blocking,
        };
        found.push((conflict, detail.rank_resolutions()));
    }

    found
}
