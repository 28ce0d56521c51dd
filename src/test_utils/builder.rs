//! Fluent construction of tool manifests for tests.

use crate::core::{Architecture, Platform};
use crate::graph::DependencyGraph;
use crate::manifest::{DependencyType, ToolCategory, ToolDependency, ToolManifest};

/// Builder for [`ToolManifest`] values.
#[derive(Clone, Debug)]
pub struct ToolBuilder {
    manifest: ToolManifest,
}

impl ToolBuilder {
    /// Start a manifest with the given id and category.
    pub fn new(id: &str, category: ToolCategory) -> Self {
        Self {
            manifest: ToolManifest::new(id, category),
        }
    }

    /// A runtime tool.
    pub fn runtime(id: &str) -> Self {
        Self::new(id, ToolCategory::Runtime)
    }

    /// A framework tool.
    pub fn framework(id: &str) -> Self {
        Self::new(id, ToolCategory::Framework)
    }

    /// A utility tool.
    pub fn utility(id: &str) -> Self {
        Self::new(id, ToolCategory::Utility)
    }

    /// Set the stable version and add it to the available list.
    pub fn stable(mut self, version: &str) -> Self {
        self.manifest.version.stable = Some(version.to_string());
        self
    }

    /// Add published versions.
    pub fn versions(mut self, versions: &[&str]) -> Self {
        self.manifest.version.available.extend(versions.iter().map(ToString::to_string));
        self
    }

    /// Restrict supported platforms.
    pub fn platforms(mut self, platforms: &[Platform]) -> Self {
        self.manifest.system_requirements.platforms = platforms.to_vec();
        self
    }

    /// Restrict supported architectures.
    pub fn architectures(mut self, architectures: &[Architecture]) -> Self {
        self.manifest.system_requirements.architectures = architectures.to_vec();
        self
    }

    /// Add a fully specified dependency.
    pub fn dependency(mut self, dependency: ToolDependency) -> Self {
        self.manifest.dependencies.push(dependency);
        self
    }

    /// Add a required dependency.
    pub fn requires(self, tool_id: &str) -> Self {
        self.dependency(ToolDependency::required(tool_id))
    }

    /// Add an optional dependency.
    pub fn optional(self, tool_id: &str) -> Self {
        self.dependency(ToolDependency::optional(tool_id))
    }

    /// Add a suggested dependency.
    pub fn suggests(self, tool_id: &str) -> Self {
        self.dependency(ToolDependency::suggested(tool_id))
    }

    /// Add a dependency of the given type with a constraint expression.
    pub fn requires_version(self, tool_id: &str, dependency_type: DependencyType, constraint: &str) -> Self {
        self.dependency(ToolDependency::new(tool_id, dependency_type).with_constraint(constraint))
    }

    /// Add substitutable tool ids.
    pub fn alternatives(mut self, ids: &[&str]) -> Self {
        self.manifest.alternatives.extend(ids.iter().map(ToString::to_string));
        self
    }

    /// Set the expected installation time.
    pub fn install_secs(mut self, secs: u64) -> Self {
        self.manifest.estimated_install_time = Some(secs);
        self
    }

    /// Finish the manifest.
    pub fn build(self) -> ToolManifest {
        self.manifest
    }
}

/// Graph with a node per manifest and an edge per dependency whose target exists.
pub fn graph_of(manifests: Vec<ToolManifest>) -> DependencyGraph {
    let graph = DependencyGraph::new();
    for manifest in &manifests {
        graph.add_node(manifest.clone());
    }
    for manifest in &manifests {
        for dependency in &manifest.dependencies {
            graph.add_dependency(&manifest.id, dependency.clone());
        }
    }
    graph
}
