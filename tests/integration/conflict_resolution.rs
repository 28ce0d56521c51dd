//! Detection followed by policy-driven resolution.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use toolgraph::conflict::{ConflictDetector, ConflictSeverity, DetectionOptions, ResolutionAction, RiskLevel};
use toolgraph::core::TargetPlatform;
use toolgraph::graph::DependencyGraph;
use toolgraph::manifest::{ToolCategory, ToolManifest};
use toolgraph::resolution::{
    AutoApprove, ConfirmationRequest, ConflictResolver, InputRequest, ResolutionCallbacks,
    ResolutionPolicy, StepResult,
};
use toolgraph::resolver::{DependencyResolver, ResolveOptions};
use toolgraph::test_utils::{CatalogFixture, ToolBuilder, graph_of, init_test_logging};

const PORT_CLASH: &str = "resource:mysql-mariadb-port";

fn databases() -> Arc<DependencyGraph> {
    init_test_logging(None);
    Arc::new(graph_of(vec![
        ToolBuilder::new("mysql", ToolCategory::Database).stable("8.0.36").build(),
        ToolBuilder::new("mariadb", ToolCategory::Database).stable("11.2.2").build(),
        ToolBuilder::framework("app").requires("mysql").build(),
    ]))
}

/// Answers confirmations with a fixed value and remembers what was asked.
struct Answer {
    approve: bool,
    asked: Mutex<Vec<String>>,
}

impl Answer {
    fn new(approve: bool) -> Self {
        Self {
            approve,
            asked: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ResolutionCallbacks for Answer {
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> bool {
        self.asked.lock().push(request.conflict_id.clone());
        self.approve
    }

    async fn request_input(&self, _request: &InputRequest) -> Option<String> {
        None
    }
}

#[tokio::test]
async fn test_port_clash_is_resolved_by_disabling_a_service() {
    let graph = databases();
    let tools = ["app", "mariadb"];

    // The clash is only visible once dependencies are analyzed as well
    let detector = ConflictDetector::new(Arc::clone(&graph), TargetPlatform::default());
    let shallow = detector.detect_conflicts(&tools, &DetectionOptions::default());
    assert!(shallow.conflict(PORT_CLASH).is_none());

    let options = DetectionOptions {
        thorough_analysis: true,
        ..DetectionOptions::default()
    };
    let report = detector.detect_conflicts(&tools, &options);
    let clash = report.conflict(PORT_CLASH).unwrap();
    assert_eq!(clash.severity, ConflictSeverity::Major);
    assert!(report.can_proceed);

    let callbacks = Answer::new(true);
    let result = ConflictResolver::new(Arc::clone(&graph), TargetPlatform::default())
        .resolve_conflicts(&report, &tools, &callbacks)
        .await;

    assert!(result.success);
    assert_eq!(result.resolved_conflicts, vec![PORT_CLASH.to_string()]);
    let step = &result.applied_steps[0];
    assert_eq!(step.result, StepResult::Success);
    assert_eq!(step.step.action, ResolutionAction::Disable);
    assert_eq!(step.step.target_tool, "mariadb");
    assert!(callbacks.asked.lock().is_empty());

    // Disabling a service leaves the graph as it was
    assert_eq!(result.modified_graph.revision(), graph.revision());
    assert_eq!(result.summary.impact, RiskLevel::Medium);
    assert!(result.summary.reversible);
    assert!(result.summary.side_effects.iter().any(|e| e.contains("mariadb must be started manually")));
}

#[tokio::test]
async fn test_high_risk_replacement_needs_confirmation() {
    let graph = databases();
    let tools = ["mysql", "mariadb"];
    let report = ConflictDetector::new(Arc::clone(&graph), TargetPlatform::default())
        .detect_conflicts(&tools, &DetectionOptions::default());

    let mut policy = ResolutionPolicy::default();
    policy.automatic.allowed_actions = [ResolutionAction::Replace].into_iter().collect();
    policy.automatic.risk_tolerance = RiskLevel::High;
    let resolver = ConflictResolver::new(Arc::clone(&graph), TargetPlatform::default()).with_policy(policy);

    let declined = Answer::new(false);
    let refused = resolver.resolve_conflicts(&report, &tools, &declined).await;
    assert_eq!(declined.asked.lock().as_slice(), [PORT_CLASH.to_string()]);
    assert!(refused.applied_steps.is_empty());
    assert_eq!(refused.skipped_steps[0].result, StepResult::Skipped);
    assert!(refused.is_remaining(PORT_CLASH));
    assert_eq!(refused.statistics.confirmations_declined, 1);

    let approved = Answer::new(true);
    let replaced = resolver.resolve_conflicts(&report, &tools, &approved).await;
    assert_eq!(replaced.applied_steps[0].step.action, ResolutionAction::Replace);
    assert_eq!(replaced.target_tools, vec!["mysql"]);
    assert!(!replaced.modified_graph.contains("mariadb"));
    assert_eq!(replaced.summary.impact, RiskLevel::High);

    let order = replaced.updated_installation_order.as_ref().unwrap();
    assert_eq!(order.sequence, vec!["mysql"]);
}

#[tokio::test]
async fn test_unsatisfiable_versions_are_reported() {
    init_test_logging(None);
    let graph = Arc::new(graph_of(CatalogFixture::version_clash().manifests()));
    let tools = ["a", "b"];
    let report = ConflictDetector::new(Arc::clone(&graph), TargetPlatform::default())
        .detect_conflicts(&tools, &DetectionOptions::default());
    assert!(!report.can_proceed);

    let result = ConflictResolver::new(graph, TargetPlatform::default())
        .resolve_conflicts(&report, &tools, &AutoApprove)
        .await;

    assert!(!result.success);
    assert!(result.is_remaining("version:lib"));
    assert_eq!(result.summary.message, "Resolved 0 of 1 conflict(s) with 0 step(s), 1 remaining");

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["remainingConflicts"][0]["id"], "version:lib");
    assert!(json["remainingConflicts"][0]["reason"].as_str().unwrap().starts_with("No version of lib satisfies"));
    assert_eq!(json["statistics"]["totalConflicts"], 1);
    assert!(json.get("modifiedGraph").is_none());
}

#[tokio::test]
async fn test_cycle_in_catalog_is_broken_by_an_alternative() {
    init_test_logging(None);
    let manifests = ToolManifest::catalog_from_json_str(
        r#"
[
  { "id": "bundler", "category": "build-tool", "dependencies": [ { "toolId": "loader", "type": "required" } ] },
  {
    "id": "loader",
    "category": "utility",
    "dependencies": [ { "toolId": "bundler", "type": "required" } ],
    "alternatives": ["loader-lite"]
  },
  { "id": "loader-lite", "category": "utility" }
]
"#,
    )
    .unwrap();
    let resolver = DependencyResolver::new(Arc::new(graph_of(manifests)), TargetPlatform::default());

    let plain = resolver.resolve(&["bundler"], &ResolveOptions::default());
    assert!(!plain.success);
    assert!(!plain.circular_dependencies.is_empty());

    let outcome = resolver
        .resolve_with_conflict_resolution(&["bundler"], &ResolveOptions::default(), &ResolutionPolicy::default(), &AutoApprove)
        .await;
    assert!(outcome.success(), "{:?}", outcome.order.errors);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.order.sequence, vec!["loader-lite", "bundler"]);
    assert!(resolver.graph().has_path("bundler", "loader"));
}
