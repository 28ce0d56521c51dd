//! TOML configuration for toolgraph.
//!
//! Every section is optional and every key inside a section is optional; unset keys
//! keep their defaults. Unknown keys are rejected so a typo does not silently fall
//! back to a default.
//!
//! ```toml
//! [target]
//! platform = "macos"
//! architecture = "arm64"
//!
//! [resolve]
//! algorithm = "dfs"
//! include-optional = true
//! max-execution-time-ms = 5000
//!
//! [detection]
//! thorough-analysis = false
//!
//! [policy.automatic]
//! max-steps = 5
//! allowed-actions = ["pin", "upgrade", "defer"]
//!
//! [policy.interaction]
//! confirmation-timeout-ms = 10000
//!
//! [[conflict-rules]]
//! id = "pg-vs-mariadb"
//! tools = ["postgresql", "mariadb"]
//! type = "resource"
//! resource = "port 5432"
//! severity = "major"
//! description = "Both default to the same port"
//! resolutions = ["rename"]
//! ```
//!
//! Rules from `[[conflict-rules]]` are appended to the built-in table.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::conflict::{ConflictDetector, ConflictRule, ConflictRuleTable, DetectionOptions, PartialDetectionOptions};
use crate::core::{TargetPlatform, ToolgraphError};
use crate::graph::DependencyGraph;
use crate::resolution::{ConflictResolver, PartialResolutionPolicy, ResolutionPolicy};
use crate::resolver::{DependencyResolver, PartialResolveOptions, ResolveOptions};

/// Fully merged configuration.
#[derive(Debug, Clone, Default)]
pub struct ToolgraphConfig {
    /// Platform every resolution is computed for
    pub target: TargetPlatform,
    pub resolve: ResolveOptions,
    pub detection: DetectionOptions,
    pub policy: ResolutionPolicy,
    /// Built-in rules followed by the configured ones
    pub conflict_rules: ConflictRuleTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    target: Option<RawTarget>,
    #[serde(default)]
    resolve: Option<PartialResolveOptions>,
    #[serde(default)]
    detection: Option<PartialDetectionOptions>,
    #[serde(default)]
    policy: Option<PartialResolutionPolicy>,
    #[serde(default)]
    conflict_rules: Vec<ConflictRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawTarget {
    platform: Option<String>,
    architecture: Option<String>,
}

impl ToolgraphConfig {
    /// Parse a TOML document and merge it over the defaults.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys, unknown platform or architecture
    /// names, a compatibility score outside `0.0..=1.0` and rules naming the same
    /// tool twice.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(ToolgraphError::from)
            .context("Failed to parse toolgraph configuration")?;

        let target = match raw.target {
            Some(target) => {
                let defaults = TargetPlatform::default();
                let platform = target.platform.unwrap_or_else(|| defaults.platform.to_string());
                let architecture = target.architecture.unwrap_or_else(|| defaults.architecture.to_string());
                TargetPlatform::parse(&platform, &architecture).context("Invalid [target] section")?
            }
            None => TargetPlatform::default(),
        };

        let policy = ResolutionPolicy::merged_with_defaults(raw.policy.unwrap_or_default());
        let score = policy.platform.min_compatibility_score;
        if !(0.0..=1.0).contains(&score) {
            return Err(ToolgraphError::ConfigError {
                message: format!("policy.platform.min-compatibility-score must be within 0.0..=1.0, got {score}"),
            }
            .into());
        }

        for rule in &raw.conflict_rules {
            if rule.tools[0] == rule.tools[1] {
                return Err(ToolgraphError::ConfigError {
                    message: format!("Conflict rule '{}' names '{}' twice", rule.id, rule.tools[0]),
                })
                .context("Invalid [[conflict-rules]] entry");
            }
        }

        let added = raw.conflict_rules.len();
        let config = Self {
            target,
            resolve: ResolveOptions::merged_with_defaults(raw.resolve.unwrap_or_default()),
            detection: DetectionOptions::merged_with_defaults(raw.detection.unwrap_or_default()),
            policy,
            conflict_rules: ConflictRuleTable::builtin().with_rules(raw.conflict_rules),
        };
        debug!(target = %config.target, algorithm = %config.resolve.algorithm, rules = added, "Loaded configuration");
        Ok(config)
    }

    /// Detector over `graph` with the configured target and rules.
    #[must_use]
    pub fn detector(&self, graph: Arc<DependencyGraph>) -> ConflictDetector {
        ConflictDetector::new(graph, self.target).with_rules(self.conflict_rules.clone())
    }

    /// Conflict resolver over `graph` with the configured target and policy.
    #[must_use]
    pub fn conflict_resolver(&self, graph: Arc<DependencyGraph>) -> ConflictResolver {
        ConflictResolver::new(graph, self.target).with_policy(self.policy.clone())
    }

    /// Dependency resolver over `graph` for the configured target.
    #[must_use]
    pub fn resolver(&self, graph: Arc<DependencyGraph>) -> DependencyResolver {
        DependencyResolver::new(graph, self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictSeverity, ConflictType, ResolutionAction, RuleResolution};
    use crate::core::{Architecture, Platform};
    use crate::resolution::PinningStrategy;
    use crate::resolver::ResolutionAlgorithm;
    use std::time::Duration;

    #[test]
    fn test_empty_document_is_default() {
        let config = ToolgraphConfig::from_toml_str("").unwrap();
        assert_eq!(config.target, TargetPlatform::default());
        assert_eq!(config.resolve, ResolveOptions::default());
        assert_eq!(config.detection, DetectionOptions::default());
        assert_eq!(config.policy, ResolutionPolicy::default());
        assert_eq!(config.conflict_rules.len(), ConflictRuleTable::builtin().len());
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = ToolgraphConfig::from_toml_str(
            r#"
[target]
platform = "darwin"
architecture = "aarch64"

[resolve]
algorithm = "dfs"
include-optional = true
max-execution-time-ms = 5000
max-retries = 1

[detection]
enable-caching = false

[policy.automatic]
max-steps = 4
allowed-actions = ["pin", "defer"]

[policy.versioning]
prefer-latest = false
pinning-strategy = "exact"

[policy.platform]
min-compatibility-score = 0.8

[policy.interaction]
confirmation-timeout-ms = 250
allow-overrides = true
"#,
        )
        .unwrap();

        assert_eq!(config.target, TargetPlatform::new(Platform::Macos, Architecture::Arm64));
        assert_eq!(config.resolve.algorithm, ResolutionAlgorithm::Dfs);
        assert!(config.resolve.include_optional);
        assert_eq!(config.resolve.max_execution_time, Duration::from_secs(5));
        assert_eq!(config.resolve.max_retries, 1);
        assert_eq!(config.resolve.include_suggested, ResolveOptions::default().include_suggested);

        assert!(!config.detection.enable_caching);
        assert!(!config.detection.thorough_analysis);

        assert_eq!(config.policy.automatic.max_steps, 4);
        let allowed: Vec<ResolutionAction> = config.policy.automatic.allowed_actions.iter().copied().collect();
        assert_eq!(allowed, vec![ResolutionAction::Pin, ResolutionAction::Defer]);
        assert!(!config.policy.versioning.prefer_latest);
        assert_eq!(config.policy.versioning.pinning_strategy, PinningStrategy::Exact);
        assert!((config.policy.platform.min_compatibility_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.policy.interaction.confirmation_timeout, Duration::from_millis(250));
        assert!(config.policy.interaction.allow_overrides);
        assert!(config.policy.interaction.confirm_major_changes);
    }

    #[test]
    fn test_partial_target_keeps_default_architecture() {
        let config = ToolgraphConfig::from_toml_str("[target]\nplatform = \"windows\"\n").unwrap();
        assert_eq!(config.target, TargetPlatform::new(Platform::Windows, Architecture::X64));
    }

    #[test]
    fn test_conflict_rules_extend_builtin_table() {
        let config = ToolgraphConfig::from_toml_str(
            r#"
[[conflict-rules]]
id = "pg-vs-mariadb"
tools = ["postgresql", "mariadb"]
type = "resource"
resource = "port 5432"
severity = "major"
description = "Both default to the same port"
resolutions = ["rename"]
"#,
        )
        .unwrap();

        let builtin = ConflictRuleTable::builtin().len();
        assert_eq!(config.conflict_rules.len(), builtin + 1);
        let rule = config.conflict_rules.rules().last().unwrap();
        assert_eq!(rule.id, "pg-vs-mariadb");
        assert_eq!(rule.conflict_type, ConflictType::Resource);
        assert_eq!(rule.severity, ConflictSeverity::Major);
        assert_eq!(rule.resource.as_deref(), Some("port 5432"));
        assert_eq!(rule.resolutions, vec![RuleResolution::Rename]);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ToolgraphConfig::from_toml_str("[resolve]\nalgoritm = \"dfs\"\n").is_err());
        assert!(ToolgraphConfig::from_toml_str("[cache]\nsize = 3\n").is_err());
        assert!(ToolgraphConfig::from_toml_str("[policy.automatic]\nmax-step = 3\n").is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ToolgraphConfig::from_toml_str("[target]\nplatform = \"beos\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("beos"));

        let err = ToolgraphConfig::from_toml_str("[resolve]\nalgorithm = \"random\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse toolgraph configuration"));

        let err =
            ToolgraphConfig::from_toml_str("[policy.platform]\nmin-compatibility-score = 1.5\n").unwrap_err();
        assert!(err.to_string().contains("min-compatibility-score"));

        let err = ToolgraphConfig::from_toml_str(
            r#"
[[conflict-rules]]
id = "self"
tools = ["mysql", "mysql"]
type = "resource"
severity = "minor"
description = "x"
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("names 'mysql' twice"));
    }

    #[test]
    fn test_components_pick_up_configuration() {
        let config = ToolgraphConfig::from_toml_str("[target]\nplatform = \"windows\"\n").unwrap();
        let graph = Arc::new(DependencyGraph::new());
        assert_eq!(config.resolver(Arc::clone(&graph)).target().platform, Platform::Windows);
        assert_eq!(config.conflict_resolver(graph).policy(), &config.policy);
    }
}
