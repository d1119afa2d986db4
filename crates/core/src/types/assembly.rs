//! Page-ordered story output

use super::artifact::Artifact;
use super::failure::FailureReason;
use super::ids::{JobId, TaskId};
use super::task::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Overall state of a job as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum JobState {
    Running,
    Completed,
    Failed { reason: FailureReason },
    Cancelled,
}

impl JobState {
    pub fn is_final(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

/// The text and illustration for one page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    pub text: Option<Artifact>,
    pub image: Option<Artifact>,
}

impl PageContent {
    pub fn is_complete(&self) -> bool {
        self.text.is_some() && self.image.is_some()
    }
}

/// A task that ended failed, with the reason shown to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskFailure {
    pub task_id: TaskId,
    pub page: Option<u32>,
    pub reason: FailureReason,
}

/// Snapshot of a job's results, keyed by page number
///
/// Partial snapshots are fine for progressive rendering; only a snapshot
/// whose `state` is final should be treated as the finished book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryAssembly {
    pub job_id: JobId,
    pub state: JobState,
    pub outline: Option<Artifact>,
    pub cover: Option<Artifact>,
    pub pages: BTreeMap<u32, PageContent>,
    pub tasks: BTreeMap<TaskId, TaskStatus>,
    pub failures: Vec<TaskFailure>,
}

impl StoryAssembly {
    pub fn is_final(&self) -> bool {
        self.state.is_final()
    }

    /// Pages with at least one failed task, for "retry these pages"
    pub fn failed_pages(&self) -> Vec<u32> {
        self.failures
            .iter()
            .filter_map(|f| f.page)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|s| **s == status).count()
    }

    pub fn done_count(&self) -> usize {
        self.count_with_status(TaskStatus::Done)
    }
}
