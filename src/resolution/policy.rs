//! Resolution policy: how far the resolver may go on its own.
//!
//! Every axis has a typed struct with defaults and a `Partial*` twin read from
//! configuration. [`ResolutionPolicy::merged_with_defaults`] fills the gaps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::conflict::{ResolutionAction, RiskLevel};

/// Constraint recorded when a version is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PinningStrategy {
    /// `=1.2.3`
    Exact,
    /// `~1.2.3`
    Tilde,
    /// `^1.2.3`
    #[default]
    Caret,
}

impl PinningStrategy {
    /// Constraint string for `version`.
    #[must_use]
    pub fn constraint(&self, version: &semver::Version) -> String {
        match self {
            PinningStrategy::Exact => format!("={version}"),
            PinningStrategy::Tilde => format!("~{version}"),
            PinningStrategy::Caret => format!("^{version}"),
        }
    }
}

/// Limits on unattended changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticPolicy {
    /// Apply steps without asking; when `false` every step asks for confirmation
    pub enabled: bool,
    /// Maximum number of executed steps per run
    pub max_steps: usize,
    /// Actions the resolver may take
    pub allowed_actions: BTreeSet<ResolutionAction>,
    /// Highest risk of a resolution the resolver may pick
    pub risk_tolerance: RiskLevel,
}

impl Default for AutomaticPolicy {
    fn default() -> Self {
        use ResolutionAction::{
            Defer, Disable, Downgrade, MakeOptional, Pin, Rename, Replace, Substitute, Upgrade,
            Workaround,
        };
        Self {
            enabled: true,
            max_steps: 10,
            allowed_actions: [
                Pin,
                Upgrade,
                Downgrade,
                Defer,
                MakeOptional,
                Substitute,
                Workaround,
                Disable,
                Rename,
                Replace,
            ]
            .into_iter()
            .collect(),
            risk_tolerance: RiskLevel::Medium,
        }
    }
}

/// How versions are chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningPolicy {
    /// Pick the newest admissible version rather than the oldest
    pub prefer_latest: bool,
    /// Allow moving to a new major version
    pub allow_major_upgrades: bool,
    /// Allow moving below the current version
    pub allow_downgrades: bool,
    /// Constraint recorded for pinned versions
    pub pinning_strategy: PinningStrategy,
}

impl Default for VersioningPolicy {
    fn default() -> Self {
        Self {
            prefer_latest: true,
            allow_major_upgrades: false,
            allow_downgrades: true,
            pinning_strategy: PinningStrategy::Caret,
        }
    }
}

/// How platform incompatibilities are handled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformPolicy {
    /// Substitute alternative tools
    pub use_alternatives: bool,
    /// Accept manual workarounds
    pub allow_workarounds: bool,
    /// Try alternatives before workarounds
    pub prefer_native: bool,
    /// Lowest alternative score accepted
    pub min_compatibility_score: f64,
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self {
            use_alternatives: true,
            allow_workarounds: true,
            prefer_native: true,
            min_compatibility_score: 0.6,
        }
    }
}

/// How the resolver talks to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionPolicy {
    /// Ask before steps flagged `requires_confirmation`
    pub confirm_major_changes: bool,
    /// Put root causes into step messages
    pub verbose_explanations: bool,
    /// Let the user pick a resolution the policy rejected
    pub allow_overrides: bool,
    /// How long to wait for an answer; silence declines
    #[serde(with = "millis")]
    pub confirmation_timeout: Duration,
}

impl Default for InteractionPolicy {
    fn default() -> Self {
        Self {
            confirm_major_changes: true,
            verbose_explanations: false,
            allow_overrides: false,
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

/// Complete resolution policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionPolicy {
    /// Unattended limits
    pub automatic: AutomaticPolicy,
    /// Version selection
    pub versioning: VersioningPolicy,
    /// Platform handling
    pub platform: PlatformPolicy,
    /// User interaction
    pub interaction: InteractionPolicy,
}

impl ResolutionPolicy {
    /// Defaults overridden by every field set in `partial`.
    #[must_use]
    pub fn merged_with_defaults(partial: PartialResolutionPolicy) -> Self {
        let defaults = Self::default();
        let automatic = partial.automatic.unwrap_or_default();
        let versioning = partial.versioning.unwrap_or_default();
        let platform = partial.platform.unwrap_or_default();
        let interaction = partial.interaction.unwrap_or_default();

        Self {
            automatic: AutomaticPolicy {
                enabled: automatic.enabled.unwrap_or(defaults.automatic.enabled),
                max_steps: automatic.max_steps.unwrap_or(defaults.automatic.max_steps),
                allowed_actions: automatic
                    .allowed_actions
                    .map_or(defaults.automatic.allowed_actions, |actions| actions.into_iter().collect()),
                risk_tolerance: automatic.risk_tolerance.unwrap_or(defaults.automatic.risk_tolerance),
            },
            versioning: VersioningPolicy {
                prefer_latest: versioning.prefer_latest.unwrap_or(defaults.versioning.prefer_latest),
                allow_major_upgrades: versioning
                    .allow_major_upgrades
                    .unwrap_or(defaults.versioning.allow_major_upgrades),
                allow_downgrades: versioning.allow_downgrades.unwrap_or(defaults.versioning.allow_downgrades),
                pinning_strategy: versioning.pinning_strategy.unwrap_or(defaults.versioning.pinning_strategy),
            },
            platform: PlatformPolicy {
                use_alternatives: platform.use_alternatives.unwrap_or(defaults.platform.use_alternatives),
                allow_workarounds: platform.allow_workarounds.unwrap_or(defaults.platform.allow_workarounds),
                prefer_native: platform.prefer_native.unwrap_or(defaults.platform.prefer_native),
                min_compatibility_score: platform
                    .min_compatibility_score
                    .unwrap_or(defaults.platform.min_compatibility_score),
            },
            interaction: InteractionPolicy {
                confirm_major_changes: interaction
                    .confirm_major_changes
                    .unwrap_or(defaults.interaction.confirm_major_changes),
                verbose_explanations: interaction
                    .verbose_explanations
                    .unwrap_or(defaults.interaction.verbose_explanations),
                allow_overrides: interaction.allow_overrides.unwrap_or(defaults.interaction.allow_overrides),
                confirmation_timeout: interaction
                    .confirmation_timeout_ms
                    .map_or(defaults.interaction.confirmation_timeout, Duration::from_millis),
            },
        }
    }

    /// Whether the policy lets the resolver pick `action` unprompted.
    #[must_use]
    pub fn permits(&self, action: ResolutionAction) -> bool {
        self.automatic.allowed_actions.contains(&action) && action.risk() <= self.automatic.risk_tolerance
    }
}

/// `[policy.automatic]` overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialAutomaticPolicy {
    pub enabled: Option<bool>,
    pub max_steps: Option<usize>,
    pub allowed_actions: Option<Vec<ResolutionAction>>,
    pub risk_tolerance: Option<RiskLevel>,
}

/// `[policy.versioning]` overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialVersioningPolicy {
    pub prefer_latest: Option<bool>,
    pub allow_major_upgrades: Option<bool>,
    pub allow_downgrades: Option<bool>,
    pub pinning_strategy: Option<PinningStrategy>,
}

/// `[policy.platform]` overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialPlatformPolicy {
    pub use_alternatives: Option<bool>,
    pub allow_workarounds: Option<bool>,
    pub prefer_native: Option<bool>,
    pub min_compatibility_score: Option<f64>,
}

/// `[policy.interaction]` overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialInteractionPolicy {
    pub confirm_major_changes: Option<bool>,
    pub verbose_explanations: Option<bool>,
    pub allow_overrides: Option<bool>,
    pub confirmation_timeout_ms: Option<u64>,
}

/// `[policy]` overrides.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialResolutionPolicy {
    pub automatic: Option<PartialAutomaticPolicy>,
    pub versioning: Option<PartialVersioningPolicy>,
    pub platform: Option<PartialPlatformPolicy>,
    pub interaction: Option<PartialInteractionPolicy>,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}
