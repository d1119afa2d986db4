//! Task completion events emitted by a scheduler run

use crate::types::{Artifact, FailureReason, TaskId, TaskKind};
use serde::{Deserialize, Serialize};

/// Terminal outcome of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CompletionOutcome {
    #[serde(rename_all = "camelCase")]
    Done { artifact: Artifact, from_cache: bool },
    #[serde(rename_all = "camelCase")]
    Failed {
        reason: FailureReason,
        /// Last provider error text, kept for diagnostics and never shown to end users
        last_error: Option<String>,
    },
    Cancelled,
}

/// A task reached a terminal state
///
/// Completions arrive in whatever order tasks finish; consumers must key
/// results by `task_id`, never by arrival position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskCompletion {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub page: Option<u32>,
    pub attempts: u32,
    pub outcome: CompletionOutcome,
}

impl TaskCompletion {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, CompletionOutcome::Done { .. })
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        match &self.outcome {
            CompletionOutcome::Done { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}
