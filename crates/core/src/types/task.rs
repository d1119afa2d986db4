//! Task model: one unit of provider work within a job

use super::artifact::Artifact;
use super::ids::{Fingerprint, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a task produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    Outline,
    PageText,
    PageImage,
    CoverImage,
}

impl TaskKind {
    /// The provider family that serves this kind of task
    pub fn provider_kind(self) -> ProviderKind {
        match self {
            TaskKind::Outline | TaskKind::PageText => ProviderKind::Text,
            TaskKind::PageImage | TaskKind::CoverImage => ProviderKind::Image,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::Outline => "outline",
            TaskKind::PageText => "pageText",
            TaskKind::PageImage => "pageImage",
            TaskKind::CoverImage => "coverImage",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider family; each has its own concurrency cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    Text,
    Image,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Text, ProviderKind::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Text => "text",
            ProviderKind::Image => "image",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a task inside a scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Done | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A planned unit of work
///
/// Created by the planner with status `pending`. The graph keeps that planned
/// form; the scheduler works on its own copy and updates `status`, `attempts`
/// and `result` as the run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub kind: TaskKind,
    /// 1-based page number for page tasks
    pub page: Option<u32>,
    pub fingerprint: Fingerprint,
    pub depends_on: BTreeSet<TaskId>,
    /// Minimal structured input handed to the provider
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub attempts: u32,
    pub result: Option<Artifact>,
}

impl Task {
    pub fn new(
        id: TaskId,
        kind: TaskKind,
        page: Option<u32>,
        fingerprint: Fingerprint,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id,
            kind,
            page,
            fingerprint,
            depends_on: BTreeSet::new(),
            input,
            status: TaskStatus::Pending,
            attempts: 0,
            result: None,
        }
    }

    pub fn depends_on(mut self, dependency: TaskId) -> Self {
        self.depends_on.insert(dependency);
        self
    }

    /// Admission priority: lower runs first. Outline and cover sort as page 0.
    pub fn priority(&self) -> u32 {
        self.page.unwrap_or(0)
    }
}

/// How a single provider attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallOutcome {
    Success,
    TransientError,
    FatalError,
    Timeout,
}

/// One attempt to invoke an external provider for a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCall {
    pub task_id: TaskId,
    pub attempt_number: u32,
    pub started_at: DateTime<Utc>,
    pub outcome: CallOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_routing() {
        assert_eq!(TaskKind::Outline.provider_kind(), ProviderKind::Text);
        assert_eq!(TaskKind::PageText.provider_kind(), ProviderKind::Text);
        assert_eq!(TaskKind::PageImage.provider_kind(), ProviderKind::Image);
        assert_eq!(TaskKind::CoverImage.provider_kind(), ProviderKind::Image);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Done.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }
}
