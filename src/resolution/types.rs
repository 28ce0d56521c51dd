//! Result types of a conflict-resolution run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::conflict::{ConflictDetail, ResolutionStep, RiskLevel};
use crate::graph::DependencyGraph;
use crate::resolver::InstallationOrder;

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepResult {
    /// The step ran
    Success,
    /// The step ran and could not be applied
    Failed,
    /// The step was declined or filtered out
    Skipped,
    /// The policy could not choose and the user gave no answer
    RequiresUserInput,
}

/// Record of a step the resolver considered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutedStep {
    /// Conflict the step belongs to
    pub conflict_id: String,
    pub step: ResolutionStep,
    pub result: StepResult,
    pub execution_time_ms: u64,
    /// Tools whose nodes or edges the step touched
    pub affected_tools: Vec<String>,
    /// Failure or skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutedStep {
    pub(crate) fn new(conflict_id: &str, step: &ResolutionStep, result: StepResult) -> Self {
        Self {
            conflict_id: conflict_id.to_string(),
            step: step.clone(),
            result,
            execution_time_ms: 0,
            affected_tools: Vec::new(),
            message: None,
        }
    }

    #[must_use]
    pub(crate) fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A conflict left standing, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedConflict {
    #[serde(flatten)]
    pub conflict: ConflictDetail,
    pub reason: String,
}

/// Counters of a resolution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionStatistics {
    pub total_conflicts: usize,
    pub resolved_conflicts: usize,
    pub remaining_conflicts: usize,
    /// Steps that ran, successful or not
    pub steps_executed: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub confirmations_requested: usize,
    pub confirmations_declined: usize,
    pub execution_time_ms: u64,
}

/// Overall effect of the applied steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionSummary {
    /// Highest risk among applied steps; `high` whenever something was removed
    pub impact: RiskLevel,
    /// `false` once any applied step cannot be undone
    pub reversible: bool,
    /// Union of the applied steps' side effects
    pub side_effects: Vec<String>,
    pub message: String,
}

/// Result of [`ConflictResolver::resolve_conflicts`](super::ConflictResolver::resolve_conflicts).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionExecutionResult {
    pub session_id: Uuid,
    /// No blocking conflict remains and no step failed
    pub success: bool,
    /// Copy of the input graph with the successful steps applied
    #[serde(skip)]
    pub modified_graph: Arc<DependencyGraph>,
    /// Order of `target_tools` on the modified graph
    pub updated_installation_order: Option<InstallationOrder>,
    /// Steps that ran, in execution order
    pub applied_steps: Vec<ExecutedStep>,
    /// Steps declined, filtered out or waiting for input
    pub skipped_steps: Vec<ExecutedStep>,
    pub remaining_conflicts: Vec<UnresolvedConflict>,
    /// Ids of conflicts fixed by this run
    pub resolved_conflicts: Vec<String>,
    /// Requested tools after substitutions
    pub target_tools: Vec<String>,
    pub statistics: ResolutionStatistics,
    pub summary: ResolutionSummary,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ResolutionExecutionResult {
    /// Steps that ran successfully.
    pub fn successful_steps(&self) -> impl Iterator<Item = &ExecutedStep> {
        self.applied_steps.iter().filter(|s| s.result == StepResult::Success)
    }

    /// Whether the conflict with `id` is still standing.
    #[must_use]
    pub fn is_remaining(&self, id: &str) -> bool {
        self.remaining_conflicts.iter().any(|c| c.conflict.id == id)
    }
}
