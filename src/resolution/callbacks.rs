//! User interaction seam of the conflict resolver.
//!
//! The resolver never prompts on its own. It awaits a [`ResolutionCallbacks`]
//! implementation supplied by the caller, bounded by
//! [`InteractionPolicy::confirmation_timeout`](super::InteractionPolicy::confirmation_timeout).
//! A timed-out confirmation counts as declined and a timed-out input as no answer.

use async_trait::async_trait;
use serde::Serialize;

use crate::conflict::{ConflictType, ResolutionAction};

/// A step waiting for the user's approval.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    pub conflict_id: String,
    pub conflict_type: ConflictType,
    pub action: ResolutionAction,
    pub description: String,
    pub side_effects: Vec<String>,
    pub reversible: bool,
}

/// A choice the policy could not make.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputRequest {
    pub conflict_id: String,
    pub prompt: String,
    /// Ids of the resolutions the user may pick
    pub options: Vec<String>,
}

/// Progress of a resolution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Conflicts handled so far
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

/// Caller-supplied interaction with the user.
#[async_trait]
pub trait ResolutionCallbacks: Send + Sync {
    /// Approve or decline a step.
    async fn request_confirmation(&self, request: &ConfirmationRequest) -> bool;

    /// Pick one of `request.options`, or `None` to leave the conflict alone.
    async fn request_input(&self, request: &InputRequest) -> Option<String>;

    /// Observe progress. The default ignores it.
    async fn notify_progress(&self, _update: &ProgressUpdate) {}
}

/// Approves every step and picks the first option.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

#[async_trait]
impl ResolutionCallbacks for AutoApprove {
    async fn request_confirmation(&self, _request: &ConfirmationRequest) -> bool {
        true
    }

    async fn request_input(&self, request: &InputRequest) -> Option<String> {
        request.options.first().cloned()
    }
}

/// Declines every step and never answers input requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecline;

#[async_trait]
impl ResolutionCallbacks for AutoDecline {
    async fn request_confirmation(&self, _request: &ConfirmationRequest) -> bool {
        false
    }

    async fn request_input(&self, _request: &InputRequest) -> Option<String> {
        None
    }
}
