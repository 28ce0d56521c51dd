use super::*;
use crate::core::{Platform, TargetPlatform};
use crate::manifest::ToolCategory;
use crate::test_utils::{ToolBuilder, graph_of};
use std::collections::BTreeSet;

fn web_graph() -> DependencyGraph {
    graph_of(vec![
        ToolBuilder::runtime("node").stable("20.11.0").build(),
        ToolBuilder::new("npm", ToolCategory::PackageManager).requires("node").build(),
        ToolBuilder::framework("react").requires("node").optional("npm").build(),
        ToolBuilder::utility("git").build(),
    ])
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(ToString::to_string).collect()
}

#[test]
fn test_add_node_rejects_duplicates() {
    let graph = DependencyGraph::new();
    assert!(graph.add_node(ToolBuilder::runtime("node").build()));
    assert!(!graph.add_node(ToolBuilder::runtime("node").build()));
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn test_remove_missing_node_is_noop() {
    let graph = web_graph();
    let revision = graph.revision();
    assert!(!graph.remove_node("python"));
    assert_eq!(graph.revision(), revision);
}

#[test]
fn test_add_edge_requires_both_endpoints() {
    let graph = web_graph();
    assert!(!graph.add_edge("react", "python", ToolDependency::required("python")));
    assert!(!graph.add_edge("python", "node", ToolDependency::required("node")));
    assert!(!graph.add_edge("react", "node", ToolDependency::required("node")));
    assert_eq!(graph.edge_count(), 3);
}

#[test]
fn test_remove_node_cascades_edges_and_counts() {
    let graph = web_graph();
    assert!(graph.remove_node("node"));
    assert_eq!(graph.edge_count(), 1);
    assert!(graph.get_dependents("node").is_empty());
    assert_eq!(graph.get_dependencies("react"), vec!["npm".to_string()]);

    let react = graph.node("react").unwrap();
    assert_eq!(react.metadata.dependency_count, 1);
    let npm = graph.node("npm").unwrap();
    assert_eq!(npm.metadata.dependency_count, 0);
    assert_eq!(npm.metadata.dependent_count, 1);
}

#[test]
fn test_direct_and_transitive_queries() {
    let graph = web_graph();
    assert_eq!(graph.get_dependencies("react"), vec!["node".to_string(), "npm".to_string()]);
    assert_eq!(graph.get_dependents("node"), vec!["npm".to_string(), "react".to_string()]);
    assert_eq!(graph.get_transitive_dependencies("react"), set(&["node", "npm"]));
    assert_eq!(graph.get_transitive_dependents("node"), set(&["npm", "react"]));
    assert!(graph.has_path("react", "node"));
    assert!(!graph.has_path("node", "react"));
    assert!(!graph.has_path("git", "node"));
}

#[test]
fn test_transitive_closure_is_cycle_safe() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("c").build(),
        ToolBuilder::utility("c").requires("a").build(),
    ]);
    assert_eq!(graph.get_transitive_dependencies("a"), set(&["a", "b", "c"]));
    assert_eq!(graph.get_transitive_dependents("b"), set(&["a", "b", "c"]));
}

#[test]
fn test_subgraph_keeps_exactly_internal_edges() {
    let graph = web_graph();
    let sub = graph.get_subgraph(&["react", "node", "unknown"]);
    assert_eq!(sub.node_ids(), vec!["node".to_string(), "react".to_string()]);

    let expected: Vec<(String, String)> = graph
        .edges()
        .into_iter()
        .filter(|e| sub.contains(&e.from) && sub.contains(&e.to))
        .map(|e| (e.from, e.to))
        .collect();
    let actual: Vec<(String, String)> = sub.edges().into_iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(actual, expected);
    assert_eq!(sub.node("react").unwrap().metadata.dependency_count, 1);
}

#[test]
fn test_version_bounds_become_constraints() {
    let graph = graph_of(vec![
        ToolBuilder::runtime("node").build(),
        ToolBuilder::framework("react")
            .dependency(ToolDependency::required("node").with_min_version("16.0.0"))
            .build(),
    ]);
    let node = graph.node("node").unwrap();
    assert_eq!(node.versions.constraints.len(), 1);
    assert_eq!(node.versions.constraints[0].required_by, "react");

    assert!(graph.remove_edge("react", "node"));
    assert!(graph.node("node").unwrap().versions.constraints.is_empty());
}

#[test]
fn test_mutations_bump_revision() {
    let graph = web_graph();
    let before = graph.revision();
    assert!(graph.set_installation_status("node", InstallationStatus::Installed, None));
    assert!(graph.set_edge_type("react", "npm", DependencyType::Suggested));
    assert!(graph.mark_edge("react", "npm", EdgeConflictStatus::Deferred));
    assert_eq!(graph.revision(), before + 3);

    let edge = graph.edge("react", "npm").unwrap();
    assert_eq!(edge.dependency_type(), DependencyType::Suggested);
    assert_eq!(edge.resolution.attempts, 1);
    assert!((edge.weight - 0.25).abs() < f64::EPSILON);
}

#[test]
fn test_clone_is_independent() {
    let graph = web_graph();
    let copy = graph.clone();
    assert!(copy.remove_node("react"));
    assert!(graph.contains("react"));
    assert_eq!(copy.node_count(), graph.node_count() - 1);
}

#[test]
fn test_detect_cycles_reports_all() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").build(),
        ToolBuilder::utility("c").requires("d").build(),
        ToolBuilder::utility("d").optional("c").build(),
        ToolBuilder::utility("e").build(),
    ]);
    let result = graph.detect_cycles();
    assert!(result.has_cycles);
    assert_eq!(result.cycle_count, 2);
    assert_eq!(result.affected_nodes, set(&["a", "b", "c", "d"]));
    assert!(!web_graph().detect_cycles().has_cycles);
}

#[test]
fn test_topological_traversal_orders_dependencies_first() {
    let graph = web_graph();
    let result = graph.traverse(&TraversalConfig::new(TraversalAlgorithm::Topological)).unwrap();
    assert_eq!(result.visited, 4);
    let pos = |id: &str| result.order.iter().position(|x| x == id).unwrap();
    for edge in graph.edges() {
        assert!(pos(&edge.to) < pos(&edge.from), "{} must precede {}", edge.to, edge.from);
    }
}

#[test]
fn test_topological_traversal_fails_on_cycle() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").build(),
    ]);
    let err = graph.traverse(&TraversalConfig::new(TraversalAlgorithm::Topological)).unwrap_err();
    assert!(matches!(err, ToolgraphError::CircularDependency { .. }));
}

#[test]
fn test_traversal_from_start_nodes() {
    let graph = web_graph();
    let config = TraversalConfig::new(TraversalAlgorithm::DepthFirst).starting_from(["react"]);
    let result = graph.traverse(&config).unwrap();
    assert_eq!(result.order, vec!["react", "node", "npm"]);

    let config = TraversalConfig::new(TraversalAlgorithm::BreadthFirst).starting_from(["npm"]);
    let config = TraversalConfig {
        direction: TraversalDirection::Dependents,
        ..config
    };
    let result = graph.traverse(&config).unwrap();
    assert_eq!(result.order, vec!["npm", "react"]);
}

#[test]
fn test_traversal_skips_optional_when_excluded() {
    let graph = web_graph();
    let config = TraversalConfig {
        include_optional: false,
        ..TraversalConfig::new(TraversalAlgorithm::BreadthFirst).starting_from(["react"])
    };
    let result = graph.traverse(&config).unwrap();
    assert_eq!(result.order, vec!["react", "node"]);
}

#[test]
fn test_dependency_and_category_first() {
    let graph = web_graph();
    let by_deps = graph.traverse(&TraversalConfig::new(TraversalAlgorithm::DependencyFirst)).unwrap();
    assert_eq!(by_deps.order, vec!["git", "node", "npm", "react"]);

    let by_category = graph.traverse(&TraversalConfig::new(TraversalAlgorithm::CategoryFirst)).unwrap();
    assert_eq!(by_category.order, vec!["node", "npm", "react", "git"]);
}

#[test]
fn test_unknown_start_node_is_error() {
    let graph = web_graph();
    let config = TraversalConfig::default().starting_from(["python"]);
    assert!(matches!(graph.traverse(&config), Err(ToolgraphError::ToolNotFound { .. })));
}

#[test]
#[should_panic(expected = "Unknown algorithm")]
fn test_traverse_named_panics_on_unknown_algorithm() {
    let _ = web_graph().traverse_named("alphabetical", &TraversalConfig::default());
}

#[test]
fn test_traverse_named_accepts_aliases() {
    let result = web_graph().traverse_named("bfs", &TraversalConfig::default()).unwrap();
    assert_eq!(result.algorithm, TraversalAlgorithm::BreadthFirst);
}

#[test]
fn test_validation_orphans_and_platforms() {
    let graph = graph_of(vec![
        ToolBuilder::utility("winonly").platforms(&[Platform::Windows]).requires("linuxonly").build(),
        ToolBuilder::utility("linuxonly").platforms(&[Platform::Linux]).build(),
        ToolBuilder::utility("lonely").build(),
    ]);
    let result = graph.validate(&ValidationConfig::default());
    assert!(result.valid);
    let codes: Vec<IssueCode> = result.warnings.iter().map(|w| w.code).collect();
    assert!(codes.contains(&IssueCode::OrphanedNode));
    assert!(codes.contains(&IssueCode::PlatformIncompatibility));

    let lenient = graph.validate(&ValidationConfig::with_strictness(Strictness::Lenient));
    assert!(lenient.warnings.iter().all(|w| w.code != IssueCode::OrphanedNode));
}

#[test]
fn test_cycles_are_errors_only_when_strict() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").build(),
    ]);
    assert!(graph.validate(&ValidationConfig::default()).valid);

    let strict = graph.validate(&ValidationConfig::with_strictness(Strictness::Strict));
    assert!(!strict.valid);
    assert_eq!(strict.errors[0].code, IssueCode::CircularDependency);
}

struct NoFrameworks;

impl ValidationRule for NoFrameworks {
    fn id(&self) -> &str {
        "no-frameworks"
    }

    fn check(&self, graph: GraphView<'_>) -> Vec<ValidationIssue> {
        graph
            .nodes()
            .filter(|n| n.manifest.category == ToolCategory::Framework)
            .map(|n| {
                ValidationIssue::new(
                    IssueCode::CustomRule,
                    IssueSeverity::Error,
                    format!("{} is a framework", n.id()),
                    vec![n.id().to_string()],
                )
            })
            .collect()
    }
}

#[test]
fn test_custom_rules_and_cache() {
    let graph = web_graph();
    let config = ValidationConfig::default().with_rule(Arc::new(NoFrameworks));

    let first = graph.validate(&config);
    assert!(!first.valid);
    assert_eq!(first.errors[0].rule_id.as_deref(), Some("no-frameworks"));

    let second = graph.validate(&config);
    assert!(Arc::ptr_eq(&first, &second));

    graph.remove_node("react");
    let third = graph.validate(&config);
    assert!(third.valid);
    assert!(third.revision > first.revision);
}

#[test]
fn test_statistics_counts_and_cache_identity() {
    let graph = web_graph();
    let stats = graph.calculate_statistics();
    assert_eq!(stats.node_count, 4);
    assert_eq!(stats.edge_count, 3);
    assert_eq!(stats.max_depth, 2);
    assert_eq!(stats.critical_path_length, 2);
    assert_eq!(stats.complexity.cyclomatic_complexity, 1);
    assert!(Arc::ptr_eq(&stats, &graph.calculate_statistics()));

    graph.add_node(ToolBuilder::utility("python").build());
    let after = graph.calculate_statistics();
    assert!(!Arc::ptr_eq(&stats, &after));
    assert_eq!(after.node_count, 5);
    assert_eq!(graph.node_depth("react"), Some(2));
}

#[test]
fn test_node_snapshot_carries_depth() {
    let graph = web_graph();
    assert_eq!(graph.node("react").unwrap().metadata.depth, Some(2));
    assert_eq!(graph.node("node").unwrap().metadata.depth, Some(0));

    graph.add_node(ToolBuilder::framework("next").requires("react").build());
    graph.add_edge("next", "react", ToolDependency::required("react"));
    assert_eq!(graph.node("next").unwrap().metadata.depth, Some(3));
    assert!(graph.node("missing").is_none());
}

#[test]
fn test_statistics_distributions() {
    let graph = web_graph();
    let stats = graph.calculate_statistics();
    assert_eq!(stats.category_distribution[&ToolCategory::Runtime], 1);
    assert_eq!(stats.platform_distribution[&Platform::Linux], 4);
    assert!((stats.average_degree - 1.5).abs() < 1e-9);
    assert!((stats.complexity.dependency_density - 0.25).abs() < 1e-9);
    // react, npm and node form a triangle.
    assert!(stats.complexity.clustering_coefficient > 0.0);
}

#[test]
fn test_petgraph_and_dot_export() {
    let graph = web_graph();
    let pg = graph.to_petgraph();
    assert_eq!(pg.node_count(), 4);
    assert_eq!(pg.edge_count(), 3);
    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("optional"));
}

#[test]
fn test_builder_reports_missing_and_unsupported() {
    let manifests = vec![
        ToolBuilder::framework("react").requires("node").optional("yarn").build(),
        ToolBuilder::utility("wsl")
            .platforms(&[Platform::Windows])
            .build(),
        ToolBuilder::utility("tool")
            .dependency(ToolDependency::required("wsl").on_platforms([Platform::Windows]))
            .build(),
    ];
    let result = GraphBuilder::new(TargetPlatform::default()).build(manifests.clone());
    assert!(!result.is_success());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("'node'"));
    assert_eq!(result.warnings.len(), 2);
    assert_eq!(result.graph.edge_count(), 0);

    let skipped = GraphBuilder::new(TargetPlatform::default())
        .skip_unsupported_tools(true)
        .include_optional(false)
        .build(manifests);
    assert!(!skipped.graph.contains("wsl"));
    assert_eq!(skipped.warnings.len(), 1);
}

#[test]
fn test_builder_rejects_duplicate_ids() {
    let result = GraphBuilder::new(TargetPlatform::default()).build(vec![
        ToolBuilder::runtime("node").build(),
        ToolBuilder::runtime("node").build(),
    ]);
    assert_eq!(result.errors, vec!["Duplicate tool id: node".to_string()]);
    assert_eq!(result.graph.node_count(), 1);
}

#[test]
fn test_concurrent_readers_and_writer() {
    let graph = Arc::new(web_graph());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let graph = Arc::clone(&graph);
            std::thread::spawn(move || {
                for j in 0..50 {
                    if i == 0 {
                        graph.add_node(ToolBuilder::utility(&format!("extra-{j}")).build());
                    } else {
                        let stats = graph.calculate_statistics();
                        assert_eq!(stats.node_count, stats.node_depths.len());
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(graph.node_count(), 54);
}
