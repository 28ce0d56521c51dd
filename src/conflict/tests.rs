use super::*;
use crate::core::{Architecture, Platform, TargetPlatform};
use crate::graph::DependencyGraph;
use crate::manifest::DependencyType;
use crate::test_utils::{CatalogFixture, ToolBuilder, graph_of};
use semver::Version;
use std::sync::Arc;

const WINDOWS: TargetPlatform = TargetPlatform::new(Platform::Windows, Architecture::X64);

fn detector(graph: DependencyGraph, target: TargetPlatform) -> ConflictDetector {
    ConflictDetector::new(Arc::new(graph), target)
}

fn catalog(fixture: CatalogFixture) -> DependencyGraph {
    graph_of(fixture.manifests())
}

#[test]
fn test_clean_stack_has_no_conflicts() {
    let detector = detector(catalog(CatalogFixture::web_stack()), TargetPlatform::default());
    let result = detector.detect_conflicts(&["react"], &DetectionOptions::default());

    assert!(!result.has_conflicts);
    assert!(result.can_proceed);
    assert_eq!(result.overall_severity, ConflictSeverity::None);
    assert_eq!(result.statistics.tools_analyzed, 5);
    assert!(result.recommendations.is_empty());
}

#[test]
fn test_disjoint_requirements_are_unsatisfiable() {
    let detector = detector(catalog(CatalogFixture::version_clash()), TargetPlatform::default());

    let conflicts = detector.detect_version_conflicts(&["a", "b"]);
    assert_eq!(conflicts.len(), 1);
    let conflict = &conflicts[0];
    assert_eq!(conflict.tool_id, "lib");
    assert!(conflict.compromise_version.is_none());
    assert!(!conflict.unsatisfiable_reason.as_deref().unwrap_or_default().is_empty());
    assert!(!conflict.is_satisfiable());

    let report = detector.detect_conflicts(&["a", "b"], &DetectionOptions::default());
    assert!(!report.can_proceed);
    assert_eq!(report.overall_severity, ConflictSeverity::Critical);
    let detail = report.conflict("version:lib").unwrap();
    assert!(detail.blocking);
    assert!(detail.suggested_resolutions.is_empty());
    assert!(report.recommendations.iter().any(|r| r.contains("Relax the version requirements on lib")));
}

#[test]
fn test_single_dependent_is_not_a_conflict() {
    let detector = detector(catalog(CatalogFixture::version_clash()), TargetPlatform::default());
    assert!(detector.detect_version_conflicts(&["a"]).is_empty());
}

#[test]
fn test_optional_requirement_yields_compromise() {
    let graph = graph_of(vec![
        ToolBuilder::framework("lib").stable("1.5.0").versions(&["1.2.0", "2.1.0"]).build(),
        ToolBuilder::utility("app").requires_version("lib", DependencyType::Required, ">=1.2.0").build(),
        ToolBuilder::utility("plugin").requires_version("lib", DependencyType::Optional, "<1.0.0").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());

    let report = detector.detect_conflicts(&["app", "plugin"], &DetectionOptions::default());
    assert_eq!(report.version_conflicts.len(), 1);
    let conflict = &report.version_conflicts[0];
    assert_eq!(conflict.compromise_version, Some(Version::new(2, 1, 0)));
    assert!(conflict.is_satisfiable());

    let detail = report.conflict("version:lib").unwrap();
    assert_eq!(detail.severity, ConflictSeverity::Minor);
    assert!(!detail.blocking);
    let step = &detail.suggested_resolutions[0].steps[0];
    assert_eq!(step.action, ResolutionAction::Upgrade);
    assert_eq!(step.target_version, Some(Version::new(2, 1, 0)));
    assert!(step.requires_confirmation);
    assert!(step.side_effects.iter().any(|e| e.contains("plugin")));
    assert!(report.can_proceed);
}

#[test]
fn test_suggested_constraints_are_ignored() {
    let graph = graph_of(vec![
        ToolBuilder::framework("lib").stable("1.5.0").build(),
        ToolBuilder::utility("app").requires_version("lib", DependencyType::Required, ">=1.0.0").build(),
        ToolBuilder::utility("doc").requires_version("lib", DependencyType::Suggested, ">=3.0.0").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());
    assert!(detector.detect_version_conflicts(&["app", "doc"]).is_empty());
}

#[test]
fn test_linux_only_tool_on_windows() {
    let detector = detector(catalog(CatalogFixture::platform_mix()), WINDOWS);

    let found = detector.detect_platform_incompatibilities(&["valgrind", "docker"]);
    assert_eq!(found.len(), 1);
    let valgrind = &found[0];
    assert_eq!(valgrind.tool_id, "valgrind");
    assert_eq!(valgrind.missing_support.platforms, vec![Platform::Windows]);
    assert!(valgrind.missing_support.architectures.is_empty());
    assert!(valgrind.alternatives.is_empty());
    let reliabilities: Vec<f64> = valgrind.workarounds.iter().map(|w| w.reliability).collect();
    assert_eq!(reliabilities, vec![0.7, 0.5]);
}

#[test]
fn test_platform_alternative_is_ranked_first() {
    let detector = detector(catalog(CatalogFixture::platform_mix()), WINDOWS);
    let report = detector.detect_conflicts(&["homebrew"], &DetectionOptions::default());

    let incompatibility = &report.platform_incompatibilities[0];
    assert_eq!(incompatibility.alternatives[0].tool_id, "scoop");
    assert!((incompatibility.alternatives[0].compatibility_score - 1.0).abs() < 1e-9);

    let detail = report.conflict("platform:homebrew").unwrap();
    assert_eq!(detail.severity, ConflictSeverity::Major);
    assert!(!detail.blocking);
    let best = &detail.suggested_resolutions[0];
    assert_eq!(best.steps[0].action, ResolutionAction::Substitute);
    assert_eq!(best.steps[0].replacement.as_deref(), Some("scoop"));
}

#[test]
fn test_tool_without_workaround_blocks() {
    let graph = graph_of(vec![ToolBuilder::new("xcode", crate::manifest::ToolCategory::Editor)
        .platforms(&[Platform::Macos])
        .build()]);
    let detector = detector(graph, WINDOWS);
    let report = detector.detect_conflicts(&["xcode"], &DetectionOptions::default());

    assert!(!report.can_proceed);
    let detail = report.conflict("platform:xcode").unwrap();
    assert!(detail.blocking);
    assert_eq!(detail.severity, ConflictSeverity::Critical);
}

#[test]
fn test_thorough_analysis_checks_dependencies() {
    let graph = graph_of(vec![
        ToolBuilder::utility("app").requires("valgrind").build(),
        ToolBuilder::utility("valgrind").platforms(&[Platform::Linux]).build(),
    ]);
    let detector = detector(graph, WINDOWS);

    let shallow = detector.detect_conflicts(&["app"], &DetectionOptions::default());
    assert!(shallow.platform_incompatibilities.is_empty());

    let thorough = detector.detect_conflicts(
        &["app"],
        &DetectionOptions {
            thorough_analysis: true,
            ..DetectionOptions::default()
        },
    );
    assert_eq!(thorough.platform_incompatibilities.len(), 1);
    assert_eq!(thorough.platform_incompatibilities[0].tool_id, "valgrind");
}

#[test]
fn test_breakable_cycle_break_points_cheapest_first() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").optional("a").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());
    let report = detector.detect_conflicts(&["a"], &DetectionOptions::default());

    assert_eq!(report.circular_dependencies.len(), 1);
    let cycle = &report.circular_dependencies[0];
    assert_eq!(cycle.cycle, vec!["a".to_string(), "b".to_string()]);
    assert!(cycle.breakable);
    assert_eq!(cycle.impact, CycleImpact::Moderate);

    let strategies: Vec<BreakStrategy> = cycle.break_points.iter().map(|bp| bp.strategy).collect();
    assert_eq!(
        strategies,
        vec![BreakStrategy::Defer, BreakStrategy::Optional, BreakStrategy::Remove]
    );
    assert_eq!(cycle.break_points[0].edge, EdgeRef::new("b", "a"));

    let detail = report.conflict("circular:a>b").unwrap();
    assert!(!detail.blocking);
    assert_eq!(detail.severity, ConflictSeverity::Major);
    assert_eq!(detail.suggested_resolutions[0].steps[0].action, ResolutionAction::Defer);
    assert!((detail.suggested_resolutions[0].confidence - 0.7).abs() < 1e-9);
}

#[test]
fn test_required_cycle_without_alternative_blocks() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());
    let report = detector.detect_conflicts(&["a"], &DetectionOptions::default());

    let cycle = &report.circular_dependencies[0];
    assert!(!cycle.breakable);
    assert_eq!(cycle.impact, CycleImpact::Critical);
    assert!(cycle.break_points.is_empty());
    assert!(!report.can_proceed);
}

#[test]
fn test_required_cycle_with_alternative_offers_substitute() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").alternatives(&["c"]).build(),
        ToolBuilder::utility("c").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());
    let report = detector.detect_conflicts(&["a"], &DetectionOptions::default());

    let cycle = &report.circular_dependencies[0];
    assert_eq!(cycle.break_points.len(), 1);
    assert_eq!(cycle.break_points[0].strategy, BreakStrategy::Substitute);
    assert_eq!(cycle.break_points[0].replacement.as_deref(), Some("c"));
    assert!(report.can_proceed);
}

#[test]
fn test_builtin_rule_matches_node_managers() {
    let graph = graph_of(vec![ToolBuilder::utility("nvm").build(), ToolBuilder::utility("fnm").build()]);
    let detector = detector(graph, TargetPlatform::default());
    let report = detector.detect_conflicts(&["nvm", "fnm"], &DetectionOptions::default());

    assert_eq!(report.resource_conflicts.len(), 1);
    assert_eq!(report.resource_conflicts[0].rule_id, "nvm-fnm-node-manager");
    let detail = report.conflict("resource:nvm-fnm-node-manager").unwrap();
    assert_eq!(detail.conflict_type, ConflictType::CrossCategory);
    assert_eq!(detail.severity, ConflictSeverity::Major);
    let step = &detail.suggested_resolutions[0].steps[0];
    assert_eq!(step.action, ResolutionAction::Replace);
    assert_eq!(step.target_tool, "fnm");
    assert_eq!(step.replacement.as_deref(), Some("nvm"));
}

#[test]
fn test_custom_rule_table() {
    let graph = graph_of(vec![ToolBuilder::utility("nvm").build(), ToolBuilder::utility("fnm").build()]);
    let rules = ConflictRuleTable::empty().with_rule(
        ConflictRule::new(
            "nvm-fnm",
            "nvm",
            "fnm",
            ConflictType::Resource,
            ConflictSeverity::Critical,
            "shims",
        )
        .on_resource("PATH")
        .resolved_by([RuleResolution::Disable, RuleResolution::Rename]),
    );
    let detector = detector(graph, TargetPlatform::default()).with_rules(rules);
    let report = detector.detect_conflicts(&["nvm", "fnm"], &DetectionOptions::default());

    let detail = report.conflict("resource:nvm-fnm").unwrap();
    assert!(detail.blocking);
    let strategies: Vec<&str> = detail.suggested_resolutions.iter().map(|r| r.strategy.as_str()).collect();
    assert_eq!(strategies, vec!["disable", "rename"]);
    assert!(detail.suggested_resolutions[0].steps[0].description.ends_with("(PATH)"));
}

#[test]
fn test_rule_needs_both_tools() {
    let table = ConflictRuleTable::builtin();
    let tools = ["mysql".to_string()].into_iter().collect();
    assert_eq!(table.matching(&tools).count(), 0);
    assert!(!table.is_empty());
}

#[test]
fn test_cached_results_are_equal_and_clear_resets() {
    let detector = detector(catalog(CatalogFixture::version_clash()), TargetPlatform::default());
    let options = DetectionOptions::default();

    let first = detector.detect_conflicts(&["a", "b"], &options);
    let second = detector.detect_conflicts(&["b", "a"], &options);
    assert_eq!(first, second);

    let stats = detector.get_cache_stats();
    assert_eq!(stats.size, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 50.0).abs() < f64::EPSILON);

    detector.clear_cache();
    let stats = detector.get_cache_stats();
    assert_eq!(stats.size, 0);
    assert_eq!(stats.hits, 0);
    assert!((stats.hit_rate - 0.0).abs() < f64::EPSILON);
}

#[test]
fn test_graph_mutation_purges_cache() {
    let detector = detector(catalog(CatalogFixture::version_clash()), TargetPlatform::default());
    let options = DetectionOptions::default();

    let before = detector.detect_conflicts(&["a", "b"], &options);
    detector.graph().remove_edge("b", "lib");
    let after = detector.detect_conflicts(&["a", "b"], &options);

    assert!(before.has_conflicts);
    assert!(!after.has_conflicts);
    assert_eq!(detector.get_cache_stats().hits, 0);
    assert_eq!(detector.get_cache_stats().size, 1);
}

#[test]
fn test_caching_disabled_skips_memo() {
    let detector = detector(catalog(CatalogFixture::web_stack()), TargetPlatform::default());
    let options = DetectionOptions {
        enable_caching: false,
        ..DetectionOptions::default()
    };
    detector.detect_conflicts(&["react"], &options);
    detector.detect_conflicts(&["react"], &options);
    assert_eq!(detector.get_cache_stats(), CacheStats::default());
}

#[test]
fn test_unknown_tools_are_ignored() {
    let detector = detector(catalog(CatalogFixture::web_stack()), TargetPlatform::default());
    let report = detector.detect_conflicts(&["python"], &DetectionOptions::default());
    assert!(!report.has_conflicts);
    assert_eq!(report.statistics.tools_analyzed, 0);
}

#[test]
fn test_statistics_count_by_type_and_severity() {
    let graph = graph_of(vec![
        ToolBuilder::utility("a").requires("b").build(),
        ToolBuilder::utility("b").requires("a").build(),
        ToolBuilder::utility("nvm").build(),
        ToolBuilder::utility("volta").build(),
    ]);
    let detector = detector(graph, TargetPlatform::default());
    let report = detector.detect_conflicts(&["a", "nvm", "volta"], &DetectionOptions::default());

    assert_eq!(report.statistics.total_conflicts, 2);
    assert_eq!(report.statistics.blocking_conflicts, 1);
    assert_eq!(report.statistics.by_type.get(&ConflictType::Circular), Some(&1));
    assert_eq!(report.statistics.by_severity.get(&ConflictSeverity::Major), Some(&1));
    assert!(report.conflicts[0].blocking);
}

#[test]
fn test_partial_options_merge_with_defaults() {
    let partial: PartialDetectionOptions = toml::from_str("thorough-analysis = true").unwrap();
    let options = DetectionOptions::merged_with_defaults(partial);
    assert!(options.enable_caching);
    assert!(options.thorough_analysis);
}

#[test]
fn test_resolution_step_defaults() {
    let remove = ResolutionStep::new(ResolutionAction::Remove, "a", "drop");
    assert!(remove.requires_confirmation);
    assert!(!remove.reversible);

    let resolution = SuggestedResolution::new(
        "r",
        "mixed",
        1.5,
        vec![
            ResolutionStep::new(ResolutionAction::Defer, "a", "defer").with_side_effect("late"),
            ResolutionStep::new(ResolutionAction::Substitute, "b", "swap").with_side_effect("late"),
        ],
    );
    assert_eq!(resolution.steps[1].order, 2);
    assert_eq!(resolution.side_effects, vec!["late".to_string()]);
    assert_eq!(resolution.risk(), RiskLevel::Medium);
    assert!((resolution.confidence - 1.0).abs() < f64::EPSILON);
    assert!((resolution.success_probability - 0.85).abs() < f64::EPSILON);
    assert_eq!(resolution.estimated_time_secs, 10);
}

#[test]
fn test_report_serializes_camel_case() {
    let detector = detector(catalog(CatalogFixture::version_clash()), TargetPlatform::default());
    let report = detector.detect_conflicts(&["a", "b"], &DetectionOptions::default());
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["canProceed"], false);
    assert_eq!(json["overallSeverity"], "critical");
    assert_eq!(json["conflicts"][0]["type"], "version");
    assert!(json["versionConflicts"][0]["unsatisfiableReason"].is_string());
}
