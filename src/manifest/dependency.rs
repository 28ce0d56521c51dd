//! Dependency declarations inside a tool manifest.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::{Platform, ToolgraphError};
use crate::version::VersionRange;

/// How strongly a tool needs one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyType {
    /// Must be installed first
    #[default]
    Required,
    /// Installed when available; may be deferred to break a cycle
    Optional,
    /// Weakest link, left out of lazy resolution
    Suggested,
}

impl DependencyType {
    /// Edge weight used by the graph; stronger dependencies weigh more.
    #[must_use]
    pub const fn weight(&self) -> f64 {
        match self {
            DependencyType::Required => 1.0,
            DependencyType::Optional => 0.5,
            DependencyType::Suggested => 0.25,
        }
    }

    /// `true` for [`DependencyType::Required`].
    #[must_use]
    pub const fn is_required(&self) -> bool {
        matches!(self, DependencyType::Required)
    }

    /// Whether this dependency may be deferred or dropped to break a cycle.
    #[must_use]
    pub const fn is_breakable(&self) -> bool {
        !self.is_required()
    }

    /// Lowercase name used in manifests.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Required => "required",
            DependencyType::Optional => "optional",
            DependencyType::Suggested => "suggested",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DependencyType {
    type Err = ToolgraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(DependencyType::Required),
            "optional" => Ok(DependencyType::Optional),
            "suggested" | "recommended" => Ok(DependencyType::Suggested),
            _ => Err(ToolgraphError::Other {
                message: format!("Unknown dependency type: {s}"),
            }),
        }
    }
}

/// One entry of a manifest's `dependencies` list.
///
/// ```json
/// { "toolId": "node", "type": "required", "minVersion": "18.0.0" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDependency {
    /// Id of the tool depended upon
    pub tool_id: String,

    /// Strength of the dependency
    #[serde(rename = "type", default)]
    pub dependency_type: DependencyType,

    /// Inclusive lower version bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,

    /// Inclusive upper version bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_version: Option<String>,

    /// Additional constraint expression, e.g. `^3.1` or `>=1.0, <2.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,

    /// Platforms on which the dependency applies; empty means all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,

    /// Free-form explanation shown to users
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ToolDependency {
    /// A dependency without version bounds.
    pub fn new(tool_id: impl Into<String>, dependency_type: DependencyType) -> Self {
        Self {
            tool_id: tool_id.into(),
            dependency_type,
            min_version: None,
            max_version: None,
            constraint: None,
            platforms: Vec::new(),
            reason: None,
        }
    }

    /// Shorthand for a required dependency.
    pub fn required(tool_id: impl Into<String>) -> Self {
        Self::new(tool_id, DependencyType::Required)
    }

    /// Shorthand for an optional dependency.
    pub fn optional(tool_id: impl Into<String>) -> Self {
        Self::new(tool_id, DependencyType::Optional)
    }

    /// Shorthand for a suggested dependency.
    pub fn suggested(tool_id: impl Into<String>) -> Self {
        Self::new(tool_id, DependencyType::Suggested)
    }

    /// Set the inclusive lower bound.
    #[must_use]
    pub fn with_min_version(mut self, version: impl Into<String>) -> Self {
        self.min_version = Some(version.into());
        self
    }

    /// Set the inclusive upper bound.
    #[must_use]
    pub fn with_max_version(mut self, version: impl Into<String>) -> Self {
        self.max_version = Some(version.into());
        self
    }

    /// Set an additional constraint expression.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// Restrict the dependency to the given platforms.
    #[must_use]
    pub fn on_platforms(mut self, platforms: impl IntoIterator<Item = Platform>) -> Self {
        self.platforms = platforms.into_iter().collect();
        self
    }

    /// Whether the declaration carries any version bound.
    #[must_use]
    pub const fn has_version_bounds(&self) -> bool {
        self.min_version.is_some() || self.max_version.is_some() || self.constraint.is_some()
    }

    /// The version interval admitted by this dependency.
    ///
    /// # Errors
    ///
    /// Returns an error if a bound or the constraint expression does not parse.
    pub fn version_range(&self) -> Result<VersionRange, ToolgraphError> {
        let bounds =
            VersionRange::from_bounds(self.min_version.as_deref(), self.max_version.as_deref())?;
        match &self.constraint {
            Some(expr) => Ok(bounds.intersect(&VersionRange::parse(expr)?)),
            None => Ok(bounds),
        }
    }

    /// Whether the dependency is in effect on `platform`.
    #[must_use]
    pub fn applies_to(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }
}
