//! Circular dependency analysis and break-point ranking.
//!
//! A cycle is `breakable` when at least one of its edges is `optional` or
//! `suggested`. Break points are scored by impact (lower is cheaper):
//!
//! | Strategy | Applies to | Impact |
//! |----------|------------|--------|
//! | defer | suggested edge | 0.1 |
//! | defer | optional edge | 0.3 |
//! | substitute | required edge whose target has an alternative | 0.5 |
//! | optional | required edge in a breakable cycle | 0.6 |
//! | remove | non-required edge | 0.9 |
//!
//! A cycle made only of required edges gets substitute break points when an
//! alternative outside the cycle exists; otherwise it has none and blocks
//! installation.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use super::{
    ConflictDetail, ConflictSeverity, ConflictType, EdgeRef, ResolutionAction, ResolutionStep,
    SuggestedResolution,
};
use crate::graph::{GraphView, format_cycle};
use crate::manifest::DependencyType;

/// An edge of a cycle with its dependency type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleEdge {
    /// Dependent tool
    pub from: String,
    /// Dependency tool
    pub to: String,
    /// Type of the dependency
    pub dependency_type: DependencyType,
}

/// How much a cycle hurts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleImpact {
    /// Every edge is required
    Critical,
    /// Mixed edge types
    Moderate,
    /// Mostly optional or suggested edges
    Low,
}

/// How a break point eliminates a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakStrategy {
    /// Install the dependency after its dependent
    Defer,
    /// Turn the dependency into an optional one and defer it
    Optional,
    /// Use an alternative to the dependency
    Substitute,
    /// Drop the dependency
    Remove,
}

impl fmt::Display for BreakStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakStrategy::Defer => "defer",
            BreakStrategy::Optional => "optional",
            BreakStrategy::Substitute => "substitute",
            BreakStrategy::Remove => "remove",
        })
    }
}

/// A proposed edge/strategy pair that eliminates a cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakPoint {
    /// The edge to act on
    pub edge: EdgeRef,
    /// Type of the edge
    pub dependency_type: DependencyType,
    /// What to do with it
    pub strategy: BreakStrategy,
    /// Cost in `0.0..=1.0`; lower is cheaper
    pub impact: f64,
    /// Alternative tool for the substitute strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Human-readable description
    pub description: String,
}

impl BreakPoint {
    fn step(&self) -> ResolutionStep {
        let edge = self.edge.clone();
        match self.strategy {
            BreakStrategy::Defer => ResolutionStep::new(ResolutionAction::Defer, &edge.from, &self.description)
                .with_side_effect(format!("{} is installed after {}", edge.to, edge.from))
                .with_edge(edge),
            BreakStrategy::Optional => {
                ResolutionStep::new(ResolutionAction::MakeOptional, &edge.from, &self.description)
                    .with_side_effect(format!("{} no longer requires {}", edge.from, edge.to))
                    .requiring_confirmation(true)
                    .with_edge(edge)
            }
            BreakStrategy::Substitute => {
                let replacement = self.replacement.clone().unwrap_or_default();
                ResolutionStep::new(ResolutionAction::Substitute, &edge.to, &self.description)
                    .with_side_effect(format!("{} is replaced by {replacement}", edge.to))
                    .with_replacement(replacement)
                    .with_edge(edge)
            }
            BreakStrategy::Remove => ResolutionStep::new(ResolutionAction::Remove, &edge.from, &self.description)
                .with_side_effect(format!("{} is installed without {}", edge.from, edge.to))
                .with_edge(edge),
        }
    }
}

/// A cycle in the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircularDependency {
    /// Id of the matching [`ConflictDetail`]
    pub conflict_id: String,
    /// Tools in cycle order
    pub cycle: Vec<String>,
    /// Edges of the cycle, including the closing edge
    pub edges: Vec<CycleEdge>,
    /// Whether some edge is optional or suggested
    pub breakable: bool,
    /// Impact class
    pub impact: CycleImpact,
    /// Ways to break the cycle, cheapest first
    pub break_points: Vec<BreakPoint>,
}

/// Annotate and rank one cycle found by the graph.
pub(crate) fn analyze_cycle(view: GraphView<'_>, cycle: &[String]) -> (CircularDependency, ConflictDetail) {
    let members: BTreeSet<&str> = cycle.iter().map(String::as_str).collect();
    let edges: Vec<CycleEdge> = cycle
        .iter()
        .enumerate()
        .map(|(i, from)| {
            let to = &cycle[(i + 1) % cycle.len()];
            let dependency_type =
                view.edge(from, to).map_or(DependencyType::Required, |e| e.dependency_type());
            CycleEdge {
                from: from.clone(),
                to: to.clone(),
                dependency_type,
            }
        })
        .collect();

    let soft = edges.iter().filter(|e| e.dependency_type.is_breakable()).count();
    let breakable = soft > 0;
    let impact = if soft == 0 {
        CycleImpact::Critical
    } else if soft * 2 > edges.len() {
        CycleImpact::Low
    } else {
        CycleImpact::Moderate
    };

    let mut break_points = Vec::new();
    for edge in &edges {
        let edge_ref = EdgeRef::new(&edge.from, &edge.to);
        match edge.dependency_type {
            DependencyType::Suggested | DependencyType::Optional => {
                let cost = if edge.dependency_type == DependencyType::Suggested { 0.1 } else { 0.3 };
                break_points.push(BreakPoint {
                    edge: edge_ref.clone(),
                    dependency_type: edge.dependency_type,
                    strategy: BreakStrategy::Defer,
                    impact: cost,
                    replacement: None,
                    description: format!(
                        "Defer {} dependency {} → {}",
                        edge.dependency_type, edge.from, edge.to
                    ),
                });
                break_points.push(BreakPoint {
                    edge: edge_ref,
                    dependency_type: edge.dependency_type,
                    strategy: BreakStrategy::Remove,
                    impact: 0.9,
                    replacement: None,
                    description: format!("Drop dependency {} → {}", edge.from, edge.to),
                });
            }
            DependencyType::Required => {
                if let Some(alternative) = alternative_outside(view, &edge.to, &members) {
                    break_points.push(BreakPoint {
                        edge: edge_ref.clone(),
                        dependency_type: edge.dependency_type,
                        strategy: BreakStrategy::Substitute,
                        impact: 0.5,
                        description: format!(
                            "Use {alternative} instead of {} for {}",
                            edge.to, edge.from
                        ),
                        replacement: Some(alternative),
                    });
                }
                if breakable {
                    break_points.push(BreakPoint {
                        edge: edge_ref,
                        dependency_type: edge.dependency_type,
                        strategy: BreakStrategy::Optional,
                        impact: 0.6,
                        replacement: None,
                        description: format!(
                            "Make {} → {} optional and defer it",
                            edge.from, edge.to
                        ),
                    });
                }
            }
        }
    }
    break_points.sort_by(|a, b| a.impact.total_cmp(&b.impact));

    let conflict_id = format!("circular:{}", cycle.join(">"));
    let chain = format_cycle(cycle);
    let blocking = break_points.is_empty();
    let severity = match impact {
        CycleImpact::Critical => ConflictSeverity::Critical,
        CycleImpact::Moderate => ConflictSeverity::Major,
        CycleImpact::Low => ConflictSeverity::Minor,
    };

    let resolutions = break_points
        .iter()
        .enumerate()
        .map(|(i, bp)| {
            SuggestedResolution::new(
                format!("{conflict_id}:{}", i + 1),
                format!("{}-{}", bp.strategy, bp.edge.to),
                1.0 - bp.impact,
                vec![bp.step()],
            )
        })
        .collect();

    let root_cause = edges
        .iter()
        .map(|e| format!("{} → {} ({})", e.from, e.to, e.dependency_type))
        .collect::<Vec<_>>()
        .join(", ");

    let circular = CircularDependency {
        conflict_id: conflict_id.clone(),
        cycle: cycle.to_vec(),
        edges,
        breakable,
        impact,
        break_points,
    };
    let detail = ConflictDetail {
        id: conflict_id,
        conflict_type: ConflictType::Circular,
        severity,
        tools: cycle.to_vec(),
        description: format!("Circular dependency: {chain}"),
        root_cause,
        suggested_resolutions: resolutions,
        blocking,
    };
    (circular, detail.rank_resolutions())
}

/// First declared alternative of `tool_id` that exists in the graph and is not part
/// of the cycle.
fn alternative_outside(view: GraphView<'_>, tool_id: &str, members: &BTreeSet<&str>) -> Option<String> {
    let node = view.node(tool_id)?;
    node.manifest
        .alternatives
        .iter()
        .find(|alt| view.contains(alt) && !members.contains(alt.as_str()))
        .cloned()
}
