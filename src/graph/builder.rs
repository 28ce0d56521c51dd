//! Build a [`DependencyGraph`] from a manifest collection.
//!
//! The builder adds one node per manifest, then one edge per dependency that
//! applies on the target platform. Problems are collected rather than returned
//! early so that callers can show every issue in a catalog at once:
//!
//! - duplicate tool ids and missing `required` dependency targets are errors
//! - missing `optional`/`suggested` targets, tools that do not support the target
//!   and unparseable version bounds are warnings
//!
//! ```rust
//! use toolgraph::core::TargetPlatform;
//! use toolgraph::graph::GraphBuilder;
//! use toolgraph::manifest::{ToolCategory, ToolDependency, ToolManifest};
//!
//! let mut react = ToolManifest::new("react", ToolCategory::Framework);
//! react.dependencies.push(ToolDependency::required("node"));
//!
//! let result = GraphBuilder::new(TargetPlatform::default())
//!     .build(vec![ToolManifest::new("node", ToolCategory::Runtime), react]);
//! assert!(result.is_success());
//! assert_eq!(result.graph.edge_count(), 1);
//! ```

use std::sync::Arc;
use tracing::{debug, info};

use super::DependencyGraph;
use crate::core::TargetPlatform;
use crate::manifest::{DependencyType, ToolManifest};

/// Graph plus the problems found while building it.
#[derive(Debug)]
pub struct GraphBuildResult {
    /// The constructed graph
    pub graph: DependencyGraph,
    /// Non-fatal problems
    pub warnings: Vec<String>,
    /// Problems that make the graph incomplete
    pub errors: Vec<String>,
}

impl GraphBuildResult {
    /// Whether the build produced no errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Converts manifests into a [`DependencyGraph`] for one target platform.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    target: TargetPlatform,
    include_optional: bool,
    include_suggested: bool,
    skip_unsupported: bool,
}

impl GraphBuilder {
    /// Builder with every dependency type included and unsupported tools kept.
    #[must_use]
    pub const fn new(target: TargetPlatform) -> Self {
        Self {
            target,
            include_optional: true,
            include_suggested: true,
            skip_unsupported: false,
        }
    }

    /// Whether to create edges for optional dependencies.
    #[must_use]
    pub const fn include_optional(mut self, include: bool) -> Self {
        self.include_optional = include;
        self
    }

    /// Whether to create edges for suggested dependencies.
    #[must_use]
    pub const fn include_suggested(mut self, include: bool) -> Self {
        self.include_suggested = include;
        self
    }

    /// Leave out tools that do not support the target platform.
    #[must_use]
    pub const fn skip_unsupported_tools(mut self, skip: bool) -> Self {
        self.skip_unsupported = skip;
        self
    }

    /// The platform edges are filtered for.
    #[must_use]
    pub const fn target(&self) -> TargetPlatform {
        self.target
    }

    const fn includes(&self, dependency_type: DependencyType) -> bool {
        match dependency_type {
            DependencyType::Required => true,
            DependencyType::Optional => self.include_optional,
            DependencyType::Suggested => self.include_suggested,
        }
    }

    /// Build the graph.
    pub fn build<M>(&self, manifests: impl IntoIterator<Item = M>) -> GraphBuildResult
    where
        M: Into<Arc<ToolManifest>>,
    {
        let graph = DependencyGraph::new();
        let mut warnings = Vec::new();
        let mut errors = Vec::new();
        let mut added: Vec<Arc<ToolManifest>> = Vec::new();

        for manifest in manifests {
            let manifest: Arc<ToolManifest> = manifest.into();
            if !manifest.supports(self.target) {
                if self.skip_unsupported {
                    debug!(tool = %manifest.id, target = %self.target, "Skipping unsupported tool");
                    warnings.push(format!(
                        "Tool '{}' does not support {} and was skipped",
                        manifest.id, self.target
                    ));
                    continue;
                }
                warnings.push(format!("Tool '{}' does not support {}", manifest.id, self.target));
            }
            if graph.add_node(Arc::clone(&manifest)) {
                added.push(manifest);
            } else {
                errors.push(format!("Duplicate tool id: {}", manifest.id));
            }
        }

        for manifest in &added {
            for dependency in &manifest.dependencies {
                if !dependency.applies_to(self.target.platform) || !self.includes(dependency.dependency_type) {
                    continue;
                }
                if !graph.contains(&dependency.tool_id) {
                    let message = format!(
                        "Tool '{}' has {} dependency '{}' that is not in the catalog",
                        manifest.id, dependency.dependency_type, dependency.tool_id
                    );
                    if dependency.dependency_type.is_required() {
                        errors.push(message);
                    } else {
                        warnings.push(message);
                    }
                    continue;
                }
                if let Err(e) = dependency.version_range() {
                    warnings.push(format!(
                        "Tool '{}' declares invalid version bounds for '{}': {e}",
                        manifest.id, dependency.tool_id
                    ));
                }
                if !graph.add_edge(&manifest.id, &dependency.tool_id, dependency.clone()) {
                    warnings.push(format!(
                        "Tool '{}' declares '{}' more than once",
                        manifest.id, dependency.tool_id
                    ));
                }
            }
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = warnings.len(),
            errors = errors.len(),
            "Built dependency graph"
        );

        GraphBuildResult {
            graph,
            warnings,
            errors,
        }
    }
}
