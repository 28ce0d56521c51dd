//! Catalog to installation order, without conflicts.

use semver::Version;
use std::sync::Arc;
use toolgraph::conflict::{ConflictDetector, ConflictSeverity, DetectionOptions};
use toolgraph::core::TargetPlatform;
use toolgraph::graph::{DependencyGraph, GraphBuilder, InstallationStatus};
use toolgraph::resolver::{DependencyResolver, ResolutionAlgorithm, ResolveOptions};
use toolgraph::test_utils::{CatalogFixture, init_test_logging};

fn web_stack() -> Arc<DependencyGraph> {
    init_test_logging(None);
    let result = GraphBuilder::new(TargetPlatform::default()).build(CatalogFixture::web_stack().manifests());
    assert!(result.is_success(), "{:?}", result.errors);
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    Arc::new(result.graph)
}

#[test]
fn test_catalog_builds_expected_graph() {
    let graph = web_stack();

    assert_eq!(graph.node_count(), 5);
    // npm->node, typescript->{node, npm}, react->{node, npm, typescript, git}
    assert_eq!(graph.edge_count(), 7);
    assert!(graph.has_path("react", "node"));
    assert!(graph.has_path("typescript", "node"));
    assert!(!graph.has_path("node", "react"));
    assert_eq!(graph.get_dependents("node"), vec!["npm", "react", "typescript"]);

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("\"react\""));
}

#[test]
fn test_clean_catalog_has_no_conflicts() {
    let graph = web_stack();
    let detector = ConflictDetector::new(Arc::clone(&graph), TargetPlatform::default());

    let report = detector.detect_conflicts(&["react", "typescript"], &DetectionOptions::default());
    assert!(!report.has_conflicts);
    assert!(report.can_proceed);
    assert_eq!(report.overall_severity, ConflictSeverity::None);
}

#[test]
fn test_default_order_installs_runtime_first() {
    let graph = web_stack();
    let resolver = DependencyResolver::new(graph, TargetPlatform::default());

    // Optional npm is followed by default, suggested typescript and git are not
    let order = resolver.resolve(&["react"], &ResolveOptions::default());
    assert!(order.success, "{:?}", order.errors);
    assert_eq!(order.sequence, vec!["node", "npm", "react"]);
    assert_eq!(order.batches, vec![vec!["node"], vec!["npm"], vec!["react"]]);
    assert!(order.deferred_dependencies.is_empty());
    assert!(order.warnings.is_empty());
}

#[test]
fn test_eager_and_lazy_bound_the_scope() {
    let graph = web_stack();
    let resolver = DependencyResolver::new(graph, TargetPlatform::default());

    let eager = resolver.resolve_eager(&["react"], &ResolveOptions::default());
    assert!(eager.success);
    assert_eq!(eager.sequence.len(), 5);
    assert!(eager.position("npm") < eager.position("typescript"));
    assert!(eager.position("typescript") < eager.position("react"));
    assert!(eager.position("git") < eager.position("react"));

    let lazy = resolver.resolve_lazy(&["react"], &ResolveOptions::default());
    assert!(lazy.success);
    assert_eq!(lazy.sequence, vec!["node", "react"]);
}

#[test]
fn test_every_algorithm_agrees_on_constraints() {
    let graph = web_stack();
    let resolver = DependencyResolver::new(Arc::clone(&graph), TargetPlatform::default());

    for algorithm in ResolutionAlgorithm::ALL {
        let order = resolver.resolve(&["typescript", "react"], &ResolveOptions::with_algorithm(algorithm));
        assert!(order.success, "{algorithm}: {:?}", order.errors);
        for edge in graph.edges() {
            if !edge.dependency_type().is_required() {
                continue;
            }
            if let (Some(from), Some(to)) = (order.position(&edge.from), order.position(&edge.to)) {
                assert!(to < from, "{algorithm}: {} must precede {}", edge.to, edge.from);
            }
        }
    }
}

#[test]
fn test_installed_tools_are_skipped() {
    let graph = web_stack();
    assert!(graph.set_installation_status(
        "node",
        InstallationStatus::Installed,
        Some(Version::new(20, 11, 0))
    ));
    let resolver = DependencyResolver::new(Arc::clone(&graph), TargetPlatform::default());

    let options = ResolveOptions {
        skip_installed: true,
        ..ResolveOptions::default()
    };
    let order = resolver.resolve(&["react"], &options);
    assert!(order.success);
    assert_eq!(order.already_installed, vec!["node"]);
    assert_eq!(order.sequence, vec!["npm", "react"]);
}

#[test]
fn test_unknown_tool_gets_suggestion() {
    let resolver = DependencyResolver::new(web_stack(), TargetPlatform::default());

    let order = resolver.resolve(&["typescrpt"], &ResolveOptions::default());
    assert!(!order.success);
    assert!(order.sequence.is_empty());
    assert_eq!(order.errors, vec!["Missing tools: typescrpt".to_string()]);
    assert!(order.warnings.iter().any(|w| w.contains("did you mean: typescript")), "{:?}", order.warnings);
}
