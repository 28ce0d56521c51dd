//! Components wired from a TOML configuration.

use std::sync::Arc;
use toolgraph::config::ToolgraphConfig;
use toolgraph::conflict::{ConflictType, ResolutionAction};
use toolgraph::core::{Architecture, Platform};
use toolgraph::graph::GraphBuilder;
use toolgraph::manifest::ToolCategory;
use toolgraph::resolution::AutoApprove;
use toolgraph::resolver::ResolutionAlgorithm;
use toolgraph::test_utils::{CatalogFixture, ToolBuilder, graph_of, init_test_logging};

const WINDOWS_CONFIG: &str = r#"
[target]
platform = "win32"

[resolve]
algorithm = "lazy"

[detection]
thorough-analysis = true

[policy.platform]
use-alternatives = false

[[conflict-rules]]
id = "postgres-pgadmin-port"
tools = ["postgresql", "pgadmin"]
type = "resource"
resource = "port 5050"
severity = "major"
description = "Both bind port 5050"
resolutions = ["rename"]
"#;

fn config() -> ToolgraphConfig {
    init_test_logging(None);
    ToolgraphConfig::from_toml_str(WINDOWS_CONFIG).unwrap()
}

#[test]
fn test_target_drives_graph_building() {
    let config = config();
    assert_eq!(config.target.platform, Platform::Windows);
    assert_eq!(config.target.architecture, Architecture::X64);

    let result = GraphBuilder::new(config.target)
        .skip_unsupported_tools(true)
        .build(CatalogFixture::platform_mix().manifests());
    assert!(result.is_success());
    assert!(result.graph.contains("scoop"));
    assert!(!result.graph.contains("homebrew"));
    assert!(!result.graph.contains("valgrind"));
    assert_eq!(result.warnings.len(), 2);
}

#[tokio::test]
async fn test_platform_policy_from_config() {
    let config = config();
    let graph = Arc::new(graph_of(CatalogFixture::platform_mix().manifests()));

    let report = config.detector(Arc::clone(&graph)).detect_conflicts(&["homebrew"], &config.detection);
    assert!(report.conflict("platform:homebrew").is_some());

    // Substitution is switched off, so the workaround is the only way out
    let result = config
        .conflict_resolver(Arc::clone(&graph))
        .resolve_conflicts(&report, &["homebrew"], &AutoApprove)
        .await;
    assert_eq!(result.applied_steps[0].step.action, ResolutionAction::Workaround);
    assert_eq!(result.target_tools, vec!["homebrew"]);
    assert!(result.modified_graph.contains("homebrew"));
}

#[tokio::test]
async fn test_configured_rule_is_detected_and_resolved() {
    let config = config();
    let graph = Arc::new(graph_of(vec![
        ToolBuilder::new("postgresql", ToolCategory::Database).build(),
        ToolBuilder::utility("pgadmin").requires("postgresql").build(),
    ]));

    let report = config.detector(Arc::clone(&graph)).detect_conflicts(&["pgadmin"], &config.detection);
    let clash = report.conflict("resource:postgres-pgadmin-port").unwrap();
    assert_eq!(clash.conflict_type, ConflictType::Resource);
    assert_eq!(report.resource_conflicts[0].resource.as_deref(), Some("port 5050"));

    let result = config
        .conflict_resolver(Arc::clone(&graph))
        .resolve_conflicts(&report, &["pgadmin"], &AutoApprove)
        .await;
    assert!(result.success);
    let step = &result.applied_steps[0].step;
    assert_eq!(step.action, ResolutionAction::Rename);
    assert_eq!(step.target_tool, "pgadmin");
    assert!(step.description.contains("port 5050"));
}

#[test]
fn test_resolve_options_from_config() {
    let config = config();
    assert_eq!(config.resolve.algorithm, ResolutionAlgorithm::Lazy);
    let graph = Arc::new(graph_of(CatalogFixture::web_stack().manifests()));

    let order = config.resolver(graph).resolve(&["react"], &config.resolve);
    assert!(order.success);
    assert_eq!(order.algorithm, ResolutionAlgorithm::Lazy);
    assert_eq!(order.sequence, vec!["node", "react"]);
}
