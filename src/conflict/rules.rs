//! Rule table of known antagonistic tool pairs.
//!
//! Rules are explicit: a pair of tool ids, the resource or role they compete for
//! and the fixes that make sense for that pair. The built-in table covers version
//! managers, port clashes and container runtimes; callers add their own rules with
//! [`ConflictRuleTable::with_rule`] or through the `[[conflict-rules]]` section of
//! the configuration file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{
    ConflictDetail, ConflictSeverity, ConflictType, ResolutionAction, ResolutionStep,
    SuggestedResolution,
};

/// Fix offered for a rule match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleResolution {
    /// Keep both, disable the second tool's service
    Disable,
    /// Keep both, rename the second tool's binary or port
    Rename,
    /// Install the first tool instead of the second
    Replace,
}

impl RuleResolution {
    const fn action(self) -> ResolutionAction {
        match self {
            RuleResolution::Disable => ResolutionAction::Disable,
            RuleResolution::Rename => ResolutionAction::Rename,
            RuleResolution::Replace => ResolutionAction::Replace,
        }
    }

    const fn confidence(self) -> f64 {
        match self {
            RuleResolution::Disable => 0.7,
            RuleResolution::Rename => 0.6,
            RuleResolution::Replace => 0.5,
        }
    }
}

/// One antagonistic pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConflictRule {
    /// Rule identifier
    pub id: String,
    /// The two tools; order decides which one the fixes act on (the second)
    pub tools: [String; 2],
    /// `resource` or `cross-category`
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// Contested resource or role, e.g. `port 3306`
    #[serde(default)]
    pub resource: Option<String>,
    /// Severity of a match
    pub severity: ConflictSeverity,
    /// What goes wrong
    pub description: String,
    /// Fixes to suggest, best first
    #[serde(default)]
    pub resolutions: Vec<RuleResolution>,
}

impl ConflictRule {
    /// A rule for `first` and `second`.
    pub fn new(
        id: impl Into<String>,
        first: impl Into<String>,
        second: impl Into<String>,
        conflict_type: ConflictType,
        severity: ConflictSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tools: [first.into(), second.into()],
            conflict_type,
            resource: None,
            severity,
            description: description.into(),
            resolutions: Vec::new(),
        }
    }

    /// Name the contested resource.
    #[must_use]
    pub fn on_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Offer these fixes.
    #[must_use]
    pub fn resolved_by(mut self, resolutions: impl IntoIterator<Item = RuleResolution>) -> Self {
        self.resolutions = resolutions.into_iter().collect();
        self
    }

    fn matches(&self, tools: &BTreeSet<String>) -> bool {
        self.tools[0] != self.tools[1] && self.tools.iter().all(|t| tools.contains(t))
    }
}

/// A rule that matched the analysed tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflict {
    /// Id of the matching [`ConflictDetail`]
    pub conflict_id: String,
    /// Rule that matched
    pub rule_id: String,
    /// `resource` or `cross-category`
    pub conflict_type: ConflictType,
    /// The conflicting pair
    pub tools: Vec<String>,
    /// Contested resource or role
    pub resource: Option<String>,
}

/// Ordered collection of [`ConflictRule`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRuleTable {
    rules: Vec<ConflictRule>,
}

impl Default for ConflictRuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ConflictRuleTable {
    /// A table without rules.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            rules: Vec::new(),
        }
    }

    /// The built-in rules.
    #[must_use]
    pub fn builtin() -> Self {
        use ConflictSeverity::{Major, Minor};
        use ConflictType::{CrossCategory, Resource};
        use RuleResolution::{Disable, Rename, Replace};

        let node_managers = [("nvm", "fnm"), ("nvm", "volta"), ("fnm", "volta")];
        let mut rules: Vec<ConflictRule> = node_managers
            .into_iter()
            .map(|(a, b)| {
                ConflictRule::new(
                    format!("{a}-{b}-node-manager"),
                    a,
                    b,
                    CrossCategory,
                    Major,
                    format!("{a} and {b} both manage Node.js versions and fight over PATH shims"),
                )
                .on_resource("node version manager")
                .resolved_by([Replace])
            })
            .collect();

        rules.extend([
            ConflictRule::new(
                "pyenv-conda-python-manager",
                "pyenv",
                "conda",
                CrossCategory,
                Minor,
                "pyenv and conda both take over the python executable on PATH",
            )
            .on_resource("python environment manager")
            .resolved_by([Disable, Replace]),
            ConflictRule::new(
                "rustup-rust-toolchain",
                "rustup",
                "rust",
                CrossCategory,
                Major,
                "A system Rust install shadows toolchains managed by rustup",
            )
            .on_resource("rust toolchain")
            .resolved_by([Replace]),
            ConflictRule::new(
                "mysql-mariadb-port",
                "mysql",
                "mariadb",
                Resource,
                Major,
                "mysql and mariadb both listen on port 3306 by default",
            )
            .on_resource("port 3306")
            .resolved_by([Disable, Rename, Replace]),
            ConflictRule::new(
                "apache-nginx-port",
                "apache",
                "nginx",
                Resource,
                Major,
                "apache and nginx both bind port 80 by default",
            )
            .on_resource("port 80")
            .resolved_by([Disable, Rename]),
            ConflictRule::new(
                "docker-podman-desktop",
                "docker-desktop",
                "podman-desktop",
                CrossCategory,
                Minor,
                "Docker Desktop and Podman Desktop both provide the default container socket",
            )
            .on_resource("container runtime")
            .resolved_by([Disable, Replace]),
        ]);

        Self {
            rules,
        }
    }

    /// Append a rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ConflictRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Append several rules.
    #[must_use]
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = ConflictRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// Rules in order.
    #[must_use]
    pub fn rules(&self) -> &[ConflictRule] {
        &self.rules
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose two tools are both in `tools`.
    pub fn matching<'a>(&'a self, tools: &'a BTreeSet<String>) -> impl Iterator<Item = &'a ConflictRule> + 'a {
        self.rules.iter().filter(move |rule| rule.matches(tools))
    }

    pub(crate) fn analyze(&self, tools: &BTreeSet<String>) -> Vec<(ResourceConflict, ConflictDetail)> {
        self.matching(tools)
            .map(|rule| {
                let conflict_id = format!("resource:{}", rule.id);
                let [first, second] = &rule.tools;
                let resolutions = rule
                    .resolutions
                    .iter()
                    .map(|resolution| {
                        let action = resolution.action();
                        let mut step = match resolution {
                            RuleResolution::Disable => ResolutionStep::new(
                                action,
                                second.clone(),
                                format!("Disable the {second} service so it does not clash with {first}"),
                            )
                            .with_side_effect(format!("{second} must be started manually")),
                            RuleResolution::Rename => ResolutionStep::new(
                                action,
                                second.clone(),
                                format!("Reconfigure {second} to use a different {}", rule.resource.as_deref().unwrap_or("resource")),
                            )
                            .with_side_effect(format!("{second} uses a non-default configuration")),
                            RuleResolution::Replace => ResolutionStep::new(
                                action,
                                second.clone(),
                                format!("Install {first} instead of {second}"),
                            )
                            .with_replacement(first.clone())
                            .with_side_effect(format!("{second} is not installed")),
                        };
                        if let Some(resource) = &rule.resource {
                            step.description.push_str(&format!(" ({resource})"));
                        }
                        SuggestedResolution::new(
                            format!("{conflict_id}:{}", action.as_str()),
                            action.as_str(),
                            resolution.confidence(),
                            vec![step],
                        )
                    })
                    .collect();

                let conflict = ResourceConflict {
                    conflict_id: conflict_id.clone(),
                    rule_id: rule.id.clone(),
                    conflict_type: rule.conflict_type,
                    tools: rule.tools.to_vec(),
                    resource: rule.resource.clone(),
                };
                let detail = ConflictDetail {
                    id: conflict_id,
                    conflict_type: rule.conflict_type,
                    severity: rule.severity,
                    tools: rule.tools.to_vec(),
                    description: rule.description.clone(),
                    root_cause: match &rule.resource {
                        Some(resource) => format!("{first} and {second} both claim {resource}"),
                        None => format!("{first} and {second} cannot be installed together"),
                    },
                    suggested_resolutions: resolutions,
                    blocking: rule.severity == ConflictSeverity::Critical,
                };
                (conflict, detail.rank_resolutions())
            })
            .collect()
    }
}
