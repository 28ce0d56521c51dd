//! Policy-driven conflict resolution.
//!
//! The [`ConflictResolver`] takes a [`ConflictDetectionResult`] and works through
//! its conflicts on a private copy of the graph:
//!
//! 1. Conflicts are handled blocking first, then by descending severity.
//! 2. For each conflict the resolver builds its candidate resolutions. Version
//!    conflicts are re-planned against the [`VersioningPolicy`]; platform
//!    conflicts are filtered and ordered by the [`PlatformPolicy`]; everything
//!    else uses the detector's suggestions as ranked.
//! 3. The first candidate whose actions the [`AutomaticPolicy`] permits is
//!    executed step by step. Steps that need confirmation go through the caller's
//!    [`ResolutionCallbacks`]; a declined or timed-out confirmation skips the step
//!    and leaves the conflict standing.
//! 4. Execution stops once `automatic.max_steps` steps have run.
//!
//! The caller's graph is never touched. The result carries the modified copy and
//! the installation order recomputed on it.

mod apply;
pub mod callbacks;
pub mod policy;
pub mod types;


pub use callbacks::{
    AutoApprove, AutoDecline, ConfirmationRequest, InputRequest, ProgressUpdate, ResolutionCallbacks,
};
pub use policy::{
    AutomaticPolicy, InteractionPolicy, PartialAutomaticPolicy, PartialInteractionPolicy,
    PartialPlatformPolicy, PartialResolutionPolicy, PartialVersioningPolicy, PinningStrategy,
    PlatformPolicy, ResolutionPolicy, VersioningPolicy,
};
pub use types::{
    ExecutedStep, ResolutionExecutionResult, ResolutionStatistics, ResolutionSummary, StepResult,
    UnresolvedConflict,
};

use chrono::Utc;
use semver::Version;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::conflict::{
    ConflictDetail, ConflictDetectionResult, ConflictType, ResolutionAction, ResolutionStep,
    RiskLevel, SuggestedResolution, VersionConflict,
};
use crate::core::TargetPlatform;
use crate::graph::DependencyGraph;
use crate::resolver::{ResolveOptions, compute_order};
use crate::version::{VersionComparator, VersionRange};

/// Applies suggested resolutions to a copy of a [`DependencyGraph`].
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    graph: Arc<DependencyGraph>,
    target: TargetPlatform,
    policy: ResolutionPolicy,
}

enum Outcome {
    Resolved,
    Unresolved(String),
}

/// Mutable state of one [`ConflictResolver::resolve_conflicts`] call.
struct Session<'a> {
    graph: &'a DependencyGraph,
    callbacks: &'a dyn ResolutionCallbacks,
    targets: Vec<String>,
    applied: Vec<ExecutedStep>,
    skipped: Vec<ExecutedStep>,
    statistics: ResolutionStatistics,
}

impl Session<'_> {
    fn steps_left(&self, max_steps: usize) -> bool {
        self.applied.len() < max_steps
    }
}

impl ConflictResolver {
    /// Resolver over `graph` with the default policy.
    pub fn new(graph: Arc<DependencyGraph>, target: TargetPlatform) -> Self {
        Self {
            graph,
            target,
            policy: ResolutionPolicy::default(),
        }
    }

    /// Replace the policy.
    #[must_use]
    pub fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active policy.
    #[must_use]
    pub const fn policy(&self) -> &ResolutionPolicy {
        &self.policy
    }

    /// Resolve the conflicts of `report` for the installation of `tool_ids`.
    ///
    /// Domain failures are part of the result: unresolved conflicts land in
    /// `remaining_conflicts` with a reason and `success` turns false when a blocking
    /// one remains or a step failed.
    pub async fn resolve_conflicts<S: AsRef<str> + Sync>(
        &self,
        report: &ConflictDetectionResult,
        tool_ids: &[S],
        callbacks: &dyn ResolutionCallbacks,
    ) -> ResolutionExecutionResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        let session_id = Uuid::new_v4();
        let working = Arc::new((*self.graph).clone());

        let mut conflicts: Vec<&ConflictDetail> = report.conflicts.iter().collect();
        conflicts.sort_by(|a, b| b.blocking.cmp(&a.blocking).then(b.severity.cmp(&a.severity)));
        let total = conflicts.len();
        info!(%session_id, conflicts = total, "Resolving conflicts");

        let mut session = Session {
            graph: &working,
            callbacks,
            targets: tool_ids.iter().map(|id| id.as_ref().to_string()).collect(),
            applied: Vec::new(),
            skipped: Vec::new(),
            statistics: ResolutionStatistics {
                total_conflicts: total,
                ..ResolutionStatistics::default()
            },
        };
        let mut resolved_conflicts = Vec::new();
        let mut remaining_conflicts = Vec::new();

        for (index, conflict) in conflicts.into_iter().enumerate() {
            callbacks
                .notify_progress(&ProgressUpdate {
                    completed: index,
                    total,
                    message: format!("Resolving {}", conflict.id),
                })
                .await;

            let outcome = if session.steps_left(self.policy.automatic.max_steps) {
                self.resolve_one(&mut session, report, conflict).await
            } else {
                Outcome::Unresolved(format!(
                    "Step limit of {} reached",
                    self.policy.automatic.max_steps
                ))
            };
            match outcome {
                Outcome::Resolved => {
                    debug!(conflict = %conflict.id, "Conflict resolved");
                    resolved_conflicts.push(conflict.id.clone());
                }
                Outcome::Unresolved(reason) => {
                    debug!(conflict = %conflict.id, %reason, "Conflict left unresolved");
                    remaining_conflicts.push(UnresolvedConflict {
                        conflict: conflict.clone(),
                        reason,
                    });
                }
            }
        }
        callbacks
            .notify_progress(&ProgressUpdate {
                completed: total,
                total,
                message: "Conflict resolution finished".to_string(),
            })
            .await;

        let (order, _) =
            working.read_view(|view| compute_order(view, &session.targets, &ResolveOptions::default(), self.target));

        let failed = session.applied.iter().any(|s| s.result == StepResult::Failed);
        let success = !failed && !remaining_conflicts.iter().any(|c| c.conflict.blocking);
        let mut statistics = session.statistics;
        statistics.resolved_conflicts = resolved_conflicts.len();
        statistics.remaining_conflicts = remaining_conflicts.len();
        statistics.steps_executed = session.applied.len();
        statistics.steps_failed = session.applied.iter().filter(|s| s.result == StepResult::Failed).count();
        statistics.steps_skipped = session.skipped.len();
        statistics.execution_time_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        let summary = self.summarize(&session.applied, &statistics);
        if success {
            info!(%session_id, resolved = statistics.resolved_conflicts, steps = statistics.steps_executed, "Conflict resolution succeeded");
        } else {
            warn!(%session_id, remaining = statistics.remaining_conflicts, failed = statistics.steps_failed, "Conflict resolution incomplete");
        }

        ResolutionExecutionResult {
            session_id,
            success,
            updated_installation_order: Some(order),
            applied_steps: session.applied,
            skipped_steps: session.skipped,
            remaining_conflicts,
            resolved_conflicts,
            target_tools: session.targets,
            statistics,
            summary,
            started_at,
            completed_at: Utc::now(),
            modified_graph: working,
        }
    }

    async fn resolve_one(
        &self,
        session: &mut Session<'_>,
        report: &ConflictDetectionResult,
        conflict: &ConflictDetail,
    ) -> Outcome {
        let candidates = match conflict.conflict_type {
            ConflictType::Version => {
                match report.version_conflicts.iter().find(|v| v.conflict_id == conflict.id) {
                    Some(version_conflict) => match self.plan_version(session.graph, version_conflict) {
                        Ok(resolution) => vec![resolution],
                        Err(reason) => return Outcome::Unresolved(reason),
                    },
                    None => conflict.suggested_resolutions.clone(),
                }
            }
            ConflictType::Platform => self.platform_candidates(conflict),
            ConflictType::Circular | ConflictType::Resource | ConflictType::CrossCategory => {
                conflict.suggested_resolutions.clone()
            }
        };
        if candidates.is_empty() {
            let reason = match conflict.conflict_type {
                ConflictType::Platform if !conflict.suggested_resolutions.is_empty() => {
                    "No alternative or workaround allowed by the platform policy"
                }
                ConflictType::Circular => "Cycle of required dependencies without alternatives",
                _ => "No automatic fix available",
            };
            return Outcome::Unresolved(reason.to_string());
        }

        let (permitted, rejected): (Vec<_>, Vec<_>) = candidates
            .into_iter()
            .partition(|r| r.actions().all(|action| self.policy.permits(action)));

        if let Some(resolution) = permitted.into_iter().next() {
            return self.execute(session, conflict, &resolution, false).await;
        }

        let options: Vec<String> = rejected.iter().map(|r| r.id.clone()).collect();
        if !self.policy.interaction.allow_overrides {
            return Outcome::Unresolved(format!(
                "No resolution permitted by the policy (rejected: {})",
                options.join(", ")
            ));
        }

        let request = InputRequest {
            conflict_id: conflict.id.clone(),
            prompt: format!("{}. Choose a resolution the policy does not allow on its own", conflict.description),
            options,
        };
        let answer = tokio::time::timeout(
            self.policy.interaction.confirmation_timeout,
            session.callbacks.request_input(&request),
        )
        .await
        .ok()
        .flatten();

        match answer.and_then(|id| rejected.iter().find(|r| r.id == id)) {
            Some(resolution) => {
                debug!(conflict = %conflict.id, resolution = %resolution.id, "User override");
                self.execute(session, conflict, resolution, true).await
            }
            None => {
                if let Some(step) = rejected.first().and_then(|r| r.steps.first()) {
                    session.skipped.push(
                        ExecutedStep::new(&conflict.id, step, StepResult::RequiresUserInput)
                            .with_message("No resolution chosen"),
                    );
                }
                Outcome::Unresolved("Awaiting user input".to_string())
            }
        }
    }

    /// Run the steps of `resolution` in order.
    async fn execute(
        &self,
        session: &mut Session<'_>,
        conflict: &ConflictDetail,
        resolution: &SuggestedResolution,
        overridden: bool,
    ) -> Outcome {
        for step in &resolution.steps {
            if !session.steps_left(self.policy.automatic.max_steps) {
                return Outcome::Unresolved(format!(
                    "Step limit of {} reached",
                    self.policy.automatic.max_steps
                ));
            }

            let needs_confirmation = !overridden
                && (!self.policy.automatic.enabled
                    || (step.requires_confirmation && self.policy.interaction.confirm_major_changes));
            if needs_confirmation && !self.confirm(session, conflict, step).await {
                session.skipped.push(
                    ExecutedStep::new(&conflict.id, step, StepResult::Skipped).with_message("Declined"),
                );
                return Outcome::Unresolved(format!("{} step was declined", step.action));
            }

            let started = Instant::now();
            let applied = apply::apply_step(
                session.graph,
                step,
                self.policy.versioning.pinning_strategy,
                &mut session.targets,
            );
            let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            match applied {
                Ok(affected_tools) => {
                    debug!(conflict = %conflict.id, action = %step.action, tool = %step.target_tool, "Step applied");
                    session.applied.push(ExecutedStep {
                        execution_time_ms: elapsed,
                        affected_tools,
                        ..ExecutedStep::new(&conflict.id, step, StepResult::Success)
                    });
                }
                Err(message) => {
                    warn!(conflict = %conflict.id, action = %step.action, %message, "Step failed");
                    session.applied.push(ExecutedStep {
                        execution_time_ms: elapsed,
                        affected_tools: vec![step.target_tool.clone()],
                        ..ExecutedStep::new(&conflict.id, step, StepResult::Failed).with_message(message.clone())
                    });
                    return Outcome::Unresolved(message);
                }
            }
        }
        Outcome::Resolved
    }

    async fn confirm(&self, session: &mut Session<'_>, conflict: &ConflictDetail, step: &ResolutionStep) -> bool {
        session.statistics.confirmations_requested += 1;
        let request = ConfirmationRequest {
            conflict_id: conflict.id.clone(),
            conflict_type: conflict.conflict_type,
            action: step.action,
            description: step.description.clone(),
            side_effects: step.side_effects.clone(),
            reversible: step.reversible,
        };
        let approved = match tokio::time::timeout(
            self.policy.interaction.confirmation_timeout,
            session.callbacks.request_confirmation(&request),
        )
        .await
        {
            Ok(approved) => approved,
            Err(_) => {
                warn!(conflict = %conflict.id, "Confirmation timed out");
                false
            }
        };
        if !approved {
            session.statistics.confirmations_declined += 1;
        }
        approved
    }

    /// A pin inside the strict requirements that the versioning policy accepts.
    fn plan_version(&self, graph: &DependencyGraph, conflict: &VersionConflict) -> Result<SuggestedResolution, String> {
        if let Some(reason) = &conflict.unsatisfiable_reason {
            return Err(reason.clone());
        }
        let tool = conflict.tool_id.as_str();
        let node = graph.node(tool).ok_or_else(|| format!("Tool '{tool}' is not in the graph"))?;
        let baseline = node.baseline_version();
        let strict = VersionRange::intersect_all(conflict.requirements.iter().filter(|r| r.strict).map(|r| &r.range));
        let versioning = &self.policy.versioning;
        let allowed = |version: &Version| {
            baseline.as_ref().is_none_or(|current| {
                (versioning.allow_major_upgrades || !VersionComparator::is_major_upgrade(current, version))
                    && (versioning.allow_downgrades || !VersionComparator::is_downgrade(current, version))
            })
        };

        let candidates: Vec<&Version> =
            node.versions.available.iter().filter(|&v| strict.contains(v) && allowed(v)).collect();
        let picked = if versioning.prefer_latest {
            candidates.into_iter().max()
        } else {
            candidates.into_iter().min()
        };
        let version = picked
            .cloned()
            .or_else(|| baseline.clone().filter(|v| strict.contains(v)))
            .or_else(|| {
                if strict.is_any() {
                    None
                } else {
                    strict.representative().filter(|v| allowed(v))
                }
            })
            .ok_or_else(|| format!("No version of {tool} within {strict} is allowed by the versioning policy"))?;

        let action = match &baseline {
            Some(current) if version > *current => ResolutionAction::Upgrade,
            Some(current) if version < *current => ResolutionAction::Downgrade,
            _ => ResolutionAction::Pin,
        };
        let mut step = ResolutionStep::new(action, tool, format!("{action} {tool} to {version}"));
        for optional in conflict.requirements.iter().filter(|r| !r.strict && !r.range.contains(&version)) {
            step = step.with_side_effect(format!(
                "optional requirement of {} on {tool} ({}) is not met",
                optional.required_by, optional.constraint
            ));
        }
        if baseline.as_ref().is_some_and(|current| VersionComparator::is_major_upgrade(current, &version)) {
            step = step
                .with_side_effect(format!("{tool} moves to a new major version"))
                .requiring_confirmation(true);
        }
        Ok(SuggestedResolution::new(
            format!("{}:pin", conflict.conflict_id),
            "pin-policy",
            0.9,
            vec![step.with_version(version)],
        ))
    }

    /// Substitutions and workarounds the platform policy accepts, preferred kind first.
    fn platform_candidates(&self, conflict: &ConflictDetail) -> Vec<SuggestedResolution> {
        let platform = &self.policy.platform;
        let (mut substitutes, mut workarounds): (Vec<_>, Vec<_>) = conflict
            .suggested_resolutions
            .iter()
            .cloned()
            .partition(|r| r.actions().any(|a| a == ResolutionAction::Substitute));
        substitutes.retain(|r| platform.use_alternatives && r.confidence >= platform.min_compatibility_score);
        workarounds.retain(|_| platform.allow_workarounds);

        if platform.prefer_native {
            substitutes.extend(workarounds);
            substitutes
        } else {
            workarounds.extend(substitutes);
            workarounds
        }
    }

    fn summarize(&self, applied: &[ExecutedStep], statistics: &ResolutionStatistics) -> ResolutionSummary {
        let succeeded: Vec<&ExecutedStep> = applied.iter().filter(|s| s.result == StepResult::Success).collect();
        let removed = succeeded.iter().any(|s| s.step.action == ResolutionAction::Remove);
        let impact = if removed {
            RiskLevel::High
        } else {
            succeeded.iter().map(|s| s.step.action.risk()).max().unwrap_or_default()
        };
        let reversible = !removed && succeeded.iter().all(|s| s.step.reversible);

        let mut side_effects: Vec<String> = Vec::new();
        for effect in succeeded.iter().flat_map(|s| &s.step.side_effects) {
            if !side_effects.contains(effect) {
                side_effects.push(effect.clone());
            }
        }

        let mut message = format!(
            "Resolved {} of {} conflict(s) with {} step(s)",
            statistics.resolved_conflicts,
            statistics.total_conflicts,
            succeeded.len()
        );
        if statistics.remaining_conflicts > 0 {
            message.push_str(&format!(", {} remaining", statistics.remaining_conflicts));
        }
        if self.policy.interaction.verbose_explanations && !succeeded.is_empty() {
            let details: Vec<&str> = succeeded.iter().map(|s| s.step.description.as_str()).collect();
            message.push_str(&format!(": {}", details.join("; ")));
        }

        ResolutionSummary {
            impact,
            reversible,
            side_effects,
            message,
        }
    }
}
