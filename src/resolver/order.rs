//! The installation order handed to the installer.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ResolutionAlgorithm;
use crate::manifest::DependencyType;

/// An edge whose ordering constraint was dropped to break a cycle; the dependency
/// is still installed, possibly after its dependent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferredDependency {
    /// Dependent tool
    pub from: String,
    /// Deferred dependency
    pub to: String,
    pub dependency_type: DependencyType,
    pub reason: String,
}

/// Result of a resolution run.
///
/// `sequence` lists every tool exactly once, dependencies first. `batches`
/// partitions the sequence into groups whose members do not depend on each other;
/// an installer may run a batch concurrently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationOrder {
    pub success: bool,
    pub algorithm: ResolutionAlgorithm,
    /// Requested tools, after any substitutions
    pub requested: Vec<String>,
    pub sequence: Vec<String>,
    pub batches: Vec<Vec<String>>,
    pub deferred_dependencies: Vec<DeferredDependency>,
    /// Cycles that could not be broken
    pub circular_dependencies: Vec<Vec<String>>,
    /// Tools left out because they are already installed
    pub already_installed: Vec<String>,
    /// Sum over batches of the slowest member's install time
    pub estimated_time_secs: u64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub graph_revision: u64,
    pub resolved_at: DateTime<Utc>,
}

impl InstallationOrder {
    pub(crate) fn new(algorithm: ResolutionAlgorithm, requested: Vec<String>, graph_revision: u64) -> Self {
        Self {
            success: false,
            algorithm,
            requested,
            sequence: Vec::new(),
            batches: Vec::new(),
            deferred_dependencies: Vec::new(),
            circular_dependencies: Vec::new(),
            already_installed: Vec::new(),
            estimated_time_secs: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
            graph_revision,
            resolved_at: Utc::now(),
        }
    }

    /// Position of `id` in the sequence.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.sequence.iter().position(|t| t == id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    /// Whether the edge `from → to` was deferred.
    #[must_use]
    pub fn is_deferred(&self, from: &str, to: &str) -> bool {
        self.deferred_dependencies.iter().any(|d| d.from == from && d.to == to)
    }

    /// Number of tools to install.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
