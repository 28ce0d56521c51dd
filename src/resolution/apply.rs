//! Graph mutations performed by resolution steps.

use tracing::debug;

use super::PinningStrategy;
use crate::conflict::{EdgeRef, ResolutionAction, ResolutionStep};
use crate::graph::{DependencyGraph, EdgeConflictStatus};
use crate::manifest::{DependencyType, ToolDependency};

/// Apply `step` to `graph`, returning the tools it touched.
///
/// `targets` is the requested tool list; substitutions rewrite it so later
/// installation ordering asks for the replacement.
pub(crate) fn apply_step(
    graph: &DependencyGraph,
    step: &ResolutionStep,
    pinning: PinningStrategy,
    targets: &mut Vec<String>,
) -> Result<Vec<String>, String> {
    let tool = step.target_tool.as_str();
    match step.action {
        ResolutionAction::Pin | ResolutionAction::Upgrade | ResolutionAction::Downgrade => {
            let version = step
                .target_version
                .clone()
                .ok_or_else(|| format!("{} step for {tool} carries no version", step.action))?;
            let constraint = pinning.constraint(&version);
            if !graph.pin_version(tool, version, constraint) {
                return Err(format!("Tool '{tool}' is not in the graph"));
            }
            for dependent in graph.get_dependents(tool) {
                graph.mark_edge(&dependent, tool, EdgeConflictStatus::Resolved);
            }
            Ok(vec![tool.to_string()])
        }
        ResolutionAction::Defer => {
            let edge = edge_of(step)?;
            if !graph.mark_edge(&edge.from, &edge.to, EdgeConflictStatus::Deferred) {
                return Err(format!("Edge {edge} is not in the graph"));
            }
            Ok(vec![edge.from.clone(), edge.to.clone()])
        }
        ResolutionAction::MakeOptional => {
            let edge = edge_of(step)?;
            if !graph.set_edge_type(&edge.from, &edge.to, DependencyType::Optional) {
                return Err(format!("Edge {edge} is not in the graph"));
            }
            graph.mark_edge(&edge.from, &edge.to, EdgeConflictStatus::Deferred);
            Ok(vec![edge.from.clone(), edge.to.clone()])
        }
        ResolutionAction::Remove => {
            let edge = edge_of(step)?;
            if !graph.remove_edge(&edge.from, &edge.to) {
                return Err(format!("Edge {edge} is not in the graph"));
            }
            Ok(vec![edge.from.clone(), edge.to.clone()])
        }
        ResolutionAction::Substitute => {
            let replacement = replacement_of(step)?;
            match &step.edge {
                Some(edge) => rewire_edge(graph, edge, replacement),
                None => substitute_tool(graph, tool, replacement, targets),
            }
        }
        ResolutionAction::Replace => {
            let replacement = replacement_of(step)?;
            substitute_tool(graph, tool, replacement, targets)
        }
        ResolutionAction::Workaround | ResolutionAction::Disable | ResolutionAction::Rename => {
            Ok(vec![tool.to_string()])
        }
    }
}

fn edge_of(step: &ResolutionStep) -> Result<&EdgeRef, String> {
    step.edge
        .as_ref()
        .ok_or_else(|| format!("{} step for {} names no edge", step.action, step.target_tool))
}

fn replacement_of(step: &ResolutionStep) -> Result<&str, String> {
    step.replacement
        .as_deref()
        .ok_or_else(|| format!("{} step for {} names no replacement", step.action, step.target_tool))
}

/// Declaration for `replacement` keeping the strength and platform scope of
/// `original`. Version bounds belonged to the old tool and are dropped.
fn redirected(original: &ToolDependency, replacement: &str) -> ToolDependency {
    ToolDependency {
        tool_id: replacement.to_string(),
        min_version: None,
        max_version: None,
        constraint: None,
        ..original.clone()
    }
}

/// Point the single edge `edge` at `replacement`.
fn rewire_edge(graph: &DependencyGraph, edge: &EdgeRef, replacement: &str) -> Result<Vec<String>, String> {
    if !graph.contains(replacement) {
        return Err(format!("Replacement '{replacement}' is not in the graph"));
    }
    let existing = graph.edge(&edge.from, &edge.to).ok_or_else(|| format!("Edge {edge} is not in the graph"))?;
    graph.remove_edge(&edge.from, &edge.to);
    if edge.from != replacement {
        graph.add_edge(&edge.from, replacement, redirected(&existing.dependency, replacement));
    }
    debug!(from = %edge.from, old = %edge.to, new = replacement, "Edge redirected");
    Ok(vec![edge.from.clone(), edge.to.clone(), replacement.to_string()])
}

/// Replace `tool` with `replacement` everywhere: dependents are redirected, the
/// node is removed and the requested tool list is rewritten.
fn substitute_tool(
    graph: &DependencyGraph,
    tool: &str,
    replacement: &str,
    targets: &mut Vec<String>,
) -> Result<Vec<String>, String> {
    if tool == replacement {
        return Err(format!("Cannot substitute '{tool}' with itself"));
    }
    if !graph.contains(replacement) {
        return Err(format!("Replacement '{replacement}' is not in the graph"));
    }
    let incoming: Vec<_> = graph.edges().into_iter().filter(|e| e.to == tool).collect();
    if !graph.remove_node(tool) {
        return Err(format!("Tool '{tool}' is not in the graph"));
    }

    let mut affected = vec![tool.to_string(), replacement.to_string()];
    for edge in incoming {
        if edge.from != replacement {
            graph.add_edge(&edge.from, replacement, redirected(&edge.dependency, replacement));
        }
        affected.push(edge.from);
    }

    for id in targets.iter_mut() {
        if id == tool {
            *id = replacement.to_string();
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    targets.retain(|id| seen.insert(id.clone()));

    debug!(tool, replacement, "Tool substituted");
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ToolBuilder, graph_of};

    fn graph() -> DependencyGraph {
        graph_of(vec![
            ToolBuilder::utility("app").requires("homebrew").build(),
            ToolBuilder::utility("cli").dependency(ToolDependency::optional("homebrew").with_min_version("4.0.0")).build(),
            ToolBuilder::utility("homebrew").build(),
            ToolBuilder::utility("scoop").build(),
        ])
    }

    #[test]
    fn test_substitute_tool_redirects_dependents() {
        let graph = graph();
        let mut targets = vec!["homebrew".to_string(), "scoop".to_string(), "app".to_string()];
        let step = ResolutionStep::new(ResolutionAction::Substitute, "homebrew", "use scoop").with_replacement("scoop");

        let affected = apply_step(&graph, &step, PinningStrategy::Caret, &mut targets).unwrap();

        assert!(!graph.contains("homebrew"));
        assert!(graph.has_path("app", "scoop"));
        let cli_edge = graph.edge("cli", "scoop").unwrap();
        assert_eq!(cli_edge.dependency_type(), DependencyType::Optional);
        assert!(!cli_edge.dependency.has_version_bounds());
        assert_eq!(targets, vec!["scoop".to_string(), "app".to_string()]);
        assert!(affected.contains(&"cli".to_string()));
    }

    #[test]
    fn test_make_optional_defers_edge() {
        let graph = graph();
        let step = ResolutionStep::new(ResolutionAction::MakeOptional, "app", "soften")
            .with_edge(EdgeRef::new("app", "homebrew"));
        apply_step(&graph, &step, PinningStrategy::Caret, &mut Vec::new()).unwrap();

        let edge = graph.edge("app", "homebrew").unwrap();
        assert_eq!(edge.dependency_type(), DependencyType::Optional);
        assert_eq!(edge.resolution.status, EdgeConflictStatus::Deferred);
        assert_eq!(edge.resolution.attempts, 1);
    }

    #[test]
    fn test_pin_records_constraint() {
        let graph = graph();
        let step = ResolutionStep::new(ResolutionAction::Pin, "homebrew", "pin")
            .with_version(semver::Version::new(4, 1, 0));
        apply_step(&graph, &step, PinningStrategy::Tilde, &mut Vec::new()).unwrap();

        let pinned = graph.node("homebrew").unwrap().versions.pinned.unwrap();
        assert_eq!(pinned.constraint, "~4.1.0");
        assert_eq!(graph.edge("app", "homebrew").unwrap().resolution.status, EdgeConflictStatus::Resolved);
    }

    #[test]
    fn test_missing_edge_fails() {
        let graph = graph();
        let step = ResolutionStep::new(ResolutionAction::Remove, "app", "drop").with_edge(EdgeRef::new("app", "scoop"));
        assert!(apply_step(&graph, &step, PinningStrategy::Caret, &mut Vec::new()).is_err());
    }

    #[test]
    fn test_disable_leaves_graph_unchanged() {
        let graph = graph();
        let revision = graph.revision();
        let step = ResolutionStep::new(ResolutionAction::Disable, "homebrew", "stop service");
        assert_eq!(
            apply_step(&graph, &step, PinningStrategy::Caret, &mut Vec::new()).unwrap(),
            vec!["homebrew".to_string()]
        );
        assert_eq!(graph.revision(), revision);
    }
}
