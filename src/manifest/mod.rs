//! Tool manifests: the declarative input of every resolution.
//!
//! A [`ToolManifest`] describes one installable developer tool: its identity and
//! category, the versions it ships, the platforms and architectures it supports,
//! and the tools it depends on. Manifests are loaded by an external collaborator and
//! handed to this crate as in-memory values (or JSON/TOML strings); they are shared
//! through [`Arc`](std::sync::Arc) and never mutated once loaded.
//!
//! # Format
//!
//! ```json
//! {
//!   "id": "react",
//!   "name": "React",
//!   "category": "framework",
//!   "version": { "stable": "18.2.0", "available": ["17.0.2", "18.2.0"] },
//!   "systemRequirements": { "platforms": ["windows", "macos", "linux"] },
//!   "dependencies": [
//!     { "toolId": "node", "type": "required", "minVersion": "16.0.0" },
//!     { "toolId": "yarn", "type": "suggested" }
//!   ],
//!   "alternatives": ["preact"]
//! }
//! ```
//!
//! An empty platform or architecture list means the tool places no restriction.

pub mod dependency;

use anyhow::{Context, Result};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::core::{Architecture, Platform, TargetPlatform, ToolgraphError};
use crate::version::VersionComparator;

pub use dependency::{DependencyType, ToolDependency};

/// Broad grouping of tools, listed in category-first installation precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCategory {
    /// Language runtimes and compilers (node, python, rustup)
    #[serde(alias = "language")]
    Runtime,
    /// Package managers (npm, pip, cargo)
    PackageManager,
    /// Version control systems
    VersionControl,
    /// Build tools and task runners
    BuildTool,
    /// Container runtimes and orchestration
    Container,
    /// Databases and data stores
    Database,
    /// Cloud provider CLIs
    Cloud,
    /// Libraries and application frameworks
    Framework,
    /// Test runners and linters
    Testing,
    /// Editors and IDEs
    Editor,
    /// General command-line utilities
    Utility,
    /// Anything else
    #[default]
    Other,
}

impl ToolCategory {
    /// Categories in installation precedence order.
    pub const PRECEDENCE: [ToolCategory; 12] = [
        ToolCategory::Runtime,
        ToolCategory::PackageManager,
        ToolCategory::VersionControl,
        ToolCategory::BuildTool,
        ToolCategory::Container,
        ToolCategory::Database,
        ToolCategory::Cloud,
        ToolCategory::Framework,
        ToolCategory::Testing,
        ToolCategory::Editor,
        ToolCategory::Utility,
        ToolCategory::Other,
    ];

    /// Kebab-case name used in manifests.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ToolCategory::Runtime => "runtime",
            ToolCategory::PackageManager => "package-manager",
            ToolCategory::VersionControl => "version-control",
            ToolCategory::BuildTool => "build-tool",
            ToolCategory::Container => "container",
            ToolCategory::Database => "database",
            ToolCategory::Cloud => "cloud",
            ToolCategory::Framework => "framework",
            ToolCategory::Testing => "testing",
            ToolCategory::Editor => "editor",
            ToolCategory::Utility => "utility",
            ToolCategory::Other => "other",
        }
    }

    /// Position in [`PRECEDENCE`](Self::PRECEDENCE); lower installs earlier.
    #[must_use]
    pub fn precedence(&self) -> usize {
        Self::PRECEDENCE.iter().position(|c| c == self).unwrap_or(Self::PRECEDENCE.len())
    }

    /// Installation time assumed when a manifest gives none, in seconds.
    #[must_use]
    pub const fn default_install_secs(&self) -> u64 {
        match self {
            ToolCategory::Runtime | ToolCategory::Editor | ToolCategory::Container => 180,
            ToolCategory::Database => 240,
            ToolCategory::PackageManager | ToolCategory::BuildTool | ToolCategory::Cloud => 90,
            _ => 60,
        }
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release channels a tool publishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionBlock {
    /// Current stable release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stable: Option<String>,
    /// Current beta release
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<String>,
    /// Every other installable release
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

/// Platforms and architectures a tool supports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemRequirements {
    /// Supported operating systems; empty means all
    #[serde(default)]
    pub platforms: Vec<Platform>,
    /// Supported architectures; empty means all
    #[serde(default)]
    pub architectures: Vec<Architecture>,
}

/// One way of installing a tool on a platform, consumed by the installer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMethod {
    /// Package manager or mechanism (`winget`, `apt`, `brew`, `direct`, ...)
    pub manager: String,
    /// Package identifier understood by that manager
    pub package: String,
}

/// Declarative description of one installable tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolManifest {
    /// Unique tool id
    pub id: String,

    /// Human-readable name; falls back to the id when empty
    #[serde(default)]
    pub name: String,

    /// Tool category
    #[serde(default)]
    pub category: ToolCategory,

    /// Release information
    #[serde(default)]
    pub version: VersionBlock,

    /// Supported platforms and architectures
    #[serde(default)]
    pub system_requirements: SystemRequirements,

    /// Tools this tool depends on
    #[serde(default)]
    pub dependencies: Vec<ToolDependency>,

    /// Installation methods per platform
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub installation: BTreeMap<Platform, Vec<InstallMethod>>,

    /// Ids of tools that can stand in for this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,

    /// Expected installation time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_install_time: Option<u64>,
}

impl ToolManifest {
    /// A manifest with only an id and a category.
    pub fn new(id: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            category,
            version: VersionBlock::default(),
            system_requirements: SystemRequirements::default(),
            dependencies: Vec::new(),
            installation: BTreeMap::new(),
            alternatives: Vec::new(),
            estimated_install_time: None,
        }
    }

    /// Parse a single manifest from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the manifest fails validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(json)
            .map_err(ToolgraphError::from)
            .context("Failed to parse tool manifest JSON")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a single manifest from TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or the manifest fails validation.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(content)
            .map_err(ToolgraphError::from)
            .context("Failed to parse tool manifest TOML")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a JSON array of manifests, validating each one.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first manifest that fails to parse or validate,
    /// or a duplicate id.
    pub fn catalog_from_json_str(json: &str) -> Result<Vec<Self>> {
        let manifests: Vec<Self> = serde_json::from_str(json)
            .map_err(ToolgraphError::from)
            .context("Failed to parse manifest catalog JSON")?;

        let mut seen = BTreeSet::new();
        for manifest in &manifests {
            manifest.validate().with_context(|| format!("Invalid manifest '{}'", manifest.id))?;
            if !seen.insert(manifest.id.as_str()) {
                return Err(ToolgraphError::ManifestParseError {
                    id: manifest.id.clone(),
                    reason: "duplicate tool id in catalog".to_string(),
                }
                .into());
            }
        }
        Ok(manifests)
    }

    /// Check the manifest's internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ToolgraphError::ManifestParseError`] for an empty id, a
    /// self-dependency, a duplicated dependency or unparseable version bounds.
    pub fn validate(&self) -> Result<(), ToolgraphError> {
        let fail = |reason: String| ToolgraphError::ManifestParseError {
            id: if self.id.is_empty() {
                "<unknown>".to_string()
            } else {
                self.id.clone()
            },
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(fail("tool id must not be empty".to_string()));
        }

        let mut seen = BTreeSet::new();
        for dep in &self.dependencies {
            if dep.tool_id == self.id {
                return Err(fail("a tool cannot depend on itself".to_string()));
            }
            if !seen.insert(dep.tool_id.as_str()) {
                return Err(fail(format!("dependency '{}' is declared twice", dep.tool_id)));
            }
            dep.version_range().map_err(|e| fail(format!("dependency '{}': {e}", dep.tool_id)))?;
        }
        Ok(())
    }

    /// Name for display; the id when no name is set.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Whether the tool runs on `platform`.
    #[must_use]
    pub fn supports_platform(&self, platform: Platform) -> bool {
        let platforms = &self.system_requirements.platforms;
        platforms.is_empty() || platforms.contains(&platform)
    }

    /// Whether the tool runs on `architecture`.
    #[must_use]
    pub fn supports_architecture(&self, architecture: Architecture) -> bool {
        let architectures = &self.system_requirements.architectures;
        architectures.is_empty() || architectures.contains(&architecture)
    }

    /// Whether the tool runs on the target platform and architecture.
    #[must_use]
    pub fn supports(&self, target: TargetPlatform) -> bool {
        self.supports_platform(target.platform) && self.supports_architecture(target.architecture)
    }

    /// The supported platform set, expanded to every platform when unrestricted.
    #[must_use]
    pub fn platform_set(&self) -> BTreeSet<Platform> {
        if self.system_requirements.platforms.is_empty() {
            Platform::ALL.into_iter().collect()
        } else {
            self.system_requirements.platforms.iter().copied().collect()
        }
    }

    /// The supported architecture set, expanded to every architecture when unrestricted.
    #[must_use]
    pub fn architecture_set(&self) -> BTreeSet<Architecture> {
        if self.system_requirements.architectures.is_empty() {
            Architecture::ALL.into_iter().collect()
        } else {
            self.system_requirements.architectures.iter().copied().collect()
        }
    }

    /// Parsed stable version, if present and valid.
    #[must_use]
    pub fn stable_version(&self) -> Option<Version> {
        self.version.stable.as_deref().and_then(|v| VersionComparator::parse_version(v).ok())
    }

    /// Every parseable version the tool publishes, sorted ascending and deduplicated.
    #[must_use]
    pub fn available_versions(&self) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .version
            .available
            .iter()
            .chain(self.version.stable.iter())
            .chain(self.version.beta.iter())
            .filter_map(|raw| VersionComparator::parse_version(raw).ok())
            .collect();
        versions.sort();
        versions.dedup();
        versions
    }

    /// Expected installation time, falling back to the category default.
    #[must_use]
    pub fn install_secs(&self) -> u64 {
        self.estimated_install_time.unwrap_or_else(|| self.category.default_install_secs())
    }
}
