//! Node and edge records stored in a [`DependencyGraph`](super::DependencyGraph).

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::core::{Architecture, Platform};
use crate::manifest::{DependencyType, InstallMethod, ToolDependency, ToolManifest};
use crate::version::VersionRange;

/// Whether a tool is already present on the machine, as reported by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InstallationStatus {
    /// Tool is installed
    Installed,
    /// Tool is known to be absent
    NotInstalled,
    /// Detection has not run
    #[default]
    Unknown,
}

/// A version constraint placed on a node by one of its dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedConstraint {
    /// Tool that declared the constraint
    pub required_by: String,
    /// Admitted versions
    pub range: VersionRange,
    /// Strength of the declaring dependency
    pub dependency_type: DependencyType,
}

/// A version chosen for a node by conflict resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinnedVersion {
    /// Selected version
    pub version: Version,
    /// Constraint recorded for the installer (`=1.2.3`, `~1.2.3`, `^1.2.3`)
    pub constraint: String,
}

/// Version-resolution metadata of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionMetadata {
    /// Versions the tool publishes, ascending
    pub available: Vec<Version>,
    /// Constraints from incoming edges
    pub constraints: Vec<AppliedConstraint>,
    /// Version pinned by conflict resolution
    pub pinned: Option<PinnedVersion>,
}

/// Platform metadata of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformMetadata {
    /// Supported platforms (all platforms when the manifest is unrestricted)
    pub supported: BTreeSet<Platform>,
    /// Supported architectures (all when unrestricted)
    pub architectures: BTreeSet<Architecture>,
    /// Installation methods per platform
    pub install_methods: BTreeMap<Platform, Vec<InstallMethod>>,
}

/// Cached structural metadata, maintained by graph mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMetadata {
    /// Number of direct dependencies
    pub dependency_count: usize,
    /// Number of direct dependents
    pub dependent_count: usize,
    /// When the node was added
    pub added_at: DateTime<Utc>,
    /// Longest dependency chain below the node, filled from cached statistics
    /// on snapshots and `None` on the stored record
    pub depth: Option<usize>,
}

/// A tool in the graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Shared, immutable manifest
    pub manifest: Arc<ToolManifest>,
    /// Installation status supplied by the caller
    pub status: InstallationStatus,
    /// Installed version supplied by the caller
    pub installed_version: Option<Version>,
    /// Version metadata
    pub versions: VersionMetadata,
    /// Platform metadata
    pub platform: PlatformMetadata,
    /// Structural metadata
    pub metadata: NodeMetadata,
}

impl GraphNode {
    pub(crate) fn new(manifest: Arc<ToolManifest>) -> Self {
        let versions = VersionMetadata {
            available: manifest.available_versions(),
            constraints: Vec::new(),
            pinned: None,
        };
        let platform = PlatformMetadata {
            supported: manifest.platform_set(),
            architectures: manifest.architecture_set(),
            install_methods: manifest.installation.clone(),
        };
        Self {
            manifest,
            status: InstallationStatus::Unknown,
            installed_version: None,
            versions,
            platform,
            metadata: NodeMetadata {
                dependency_count: 0,
                dependent_count: 0,
                added_at: Utc::now(),
                depth: None,
            },
        }
    }

    /// The tool id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// The version resolution should reason from: pinned, then installed, then stable.
    #[must_use]
    pub fn baseline_version(&self) -> Option<Version> {
        self.versions
            .pinned
            .as_ref()
            .map(|p| p.version.clone())
            .or_else(|| self.installed_version.clone())
            .or_else(|| self.manifest.stable_version())
    }
}

/// Conflict state of an edge, updated by conflict resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeConflictStatus {
    /// No known conflict
    #[default]
    Clear,
    /// Part of a detected conflict
    Conflicting,
    /// Conflict was resolved
    Resolved,
    /// Deferred to break a cycle
    Deferred,
}

/// Resolution bookkeeping for an edge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeResolution {
    /// Current conflict status
    pub status: EdgeConflictStatus,
    /// How many times resolution touched this edge
    pub attempts: u32,
}

/// Directed edge `from → to`: `from` depends on `to`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Dependent tool
    pub from: String,
    /// Dependency tool
    pub to: String,
    /// The originating declaration
    pub dependency: ToolDependency,
    /// Edge weight derived from the dependency type
    pub weight: f64,
    /// Platforms under which the edge applies
    pub platforms: BTreeSet<Platform>,
    /// Resolution metadata
    pub resolution: EdgeResolution,
}

impl GraphEdge {
    pub(crate) fn new(from: String, to: String, dependency: ToolDependency) -> Self {
        let platforms = if dependency.platforms.is_empty() {
            Platform::ALL.into_iter().collect()
        } else {
            dependency.platforms.iter().copied().collect()
        };
        Self {
            weight: dependency.dependency_type.weight(),
            from,
            to,
            dependency,
            platforms,
            resolution: EdgeResolution::default(),
        }
    }

    /// Strength of the edge.
    #[must_use]
    pub const fn dependency_type(&self) -> DependencyType {
        self.dependency.dependency_type
    }
}
