//! Result assembler: folds completion events into a page-ordered story
//!
//! Completions arrive in whatever order the scheduler finishes them. Every
//! result is slotted by the task registry taken from the plan, so page 3's
//! image lands on page 3 no matter when it shows up.

use crate::graph::TaskGraph;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use taleweave_core::{
    CompletionOutcome, FailureReason, JobId, JobState, PageContent, StoryAssembly, TaskCompletion,
    TaskFailure, TaskId, TaskKind, TaskStatus,
};

#[derive(Debug, Clone, Copy)]
struct Lineage {
    kind: TaskKind,
    page: Option<u32>,
}

#[derive(Debug)]
pub struct ResultAssembler {
    registry: HashMap<TaskId, Lineage>,
    state: RwLock<StoryAssembly>,
}

impl ResultAssembler {
    pub fn new(job_id: JobId, graph: &TaskGraph) -> Self {
        let registry: HashMap<TaskId, Lineage> = graph
            .tasks()
            .map(|task| {
                let lineage = Lineage {
                    kind: task.kind,
                    page: task.page,
                };
                (task.id.clone(), lineage)
            })
            .collect();

        let pages: BTreeMap<u32, PageContent> = registry
            .values()
            .filter_map(|lineage| lineage.page)
            .map(|page| (page, PageContent::default()))
            .collect();
        let tasks = registry
            .keys()
            .map(|id| (id.clone(), TaskStatus::Pending))
            .collect();

        Self {
            registry,
            state: RwLock::new(StoryAssembly {
                job_id,
                state: JobState::Running,
                outline: None,
                cover: None,
                pages,
                tasks,
                failures: Vec::new(),
            }),
        }
    }

    /// Record one completion
    ///
    /// Unknown task ids and repeat completions for a task that is already
    /// terminal are ignored. Returns true when this event finished the job.
    pub fn apply(&self, completion: &TaskCompletion) -> bool {
        let Some(lineage) = self.registry.get(&completion.task_id) else {
            tracing::warn!(task_id = %completion.task_id, "completion for unknown task ignored");
            return false;
        };

        let mut state = self.state.write();
        if state.state.is_final() {
            return false;
        }
        let Some(status) = state.tasks.get_mut(&completion.task_id) else {
            return false;
        };
        if status.is_terminal() {
            tracing::debug!(task_id = %completion.task_id, "duplicate completion ignored");
            return false;
        }

        match &completion.outcome {
            CompletionOutcome::Done { artifact, .. } => {
                *status = TaskStatus::Done;
                let artifact = Some(artifact.clone());
                match (lineage.kind, lineage.page) {
                    (TaskKind::Outline, _) => state.outline = artifact,
                    (TaskKind::CoverImage, _) => state.cover = artifact,
                    (TaskKind::PageText, Some(page)) => {
                        state.pages.entry(page).or_default().text = artifact;
                    }
                    (TaskKind::PageImage, Some(page)) => {
                        state.pages.entry(page).or_default().image = artifact;
                    }
                    (kind, None) => {
                        tracing::warn!(task_id = %completion.task_id, kind = kind.as_str(), "page task without a page");
                    }
                }
            }
            CompletionOutcome::Failed { reason, .. } => {
                *status = TaskStatus::Failed;
                state.failures.push(TaskFailure {
                    task_id: completion.task_id.clone(),
                    page: lineage.page,
                    reason: reason.clone(),
                });
            }
            CompletionOutcome::Cancelled => *status = TaskStatus::Cancelled,
        }

        if state.tasks.values().all(|status| status.is_terminal()) {
            let settled = final_state(&state);
            state.state = settled;
            tracing::info!(job_id = %state.job_id, state = ?state.state, "story assembled");
            return true;
        }
        false
    }

    /// Current view of the job; never waits on the scheduler
    pub fn snapshot(&self) -> StoryAssembly {
        self.state.read().clone()
    }

    pub fn is_final(&self) -> bool {
        self.state.read().is_final()
    }

    /// Force the job into a failed state, settling any task still open
    ///
    /// Used when a run ends without reporting every task, for example after
    /// its driver panicked.
    pub fn fail_job(&self, reason: FailureReason) {
        let mut state = self.state.write();
        if state.state.is_final() {
            return;
        }
        let open: Vec<TaskId> = state
            .tasks
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        for task_id in open {
            state.tasks.insert(task_id.clone(), TaskStatus::Failed);
            let page = self.registry.get(&task_id).and_then(|lineage| lineage.page);
            state.failures.push(TaskFailure {
                task_id,
                page,
                reason: reason.clone(),
            });
        }
        state.state = JobState::Failed { reason };
    }
}

/// Job state once every task is terminal
///
/// A single cancelled task means the job was cancelled. Otherwise the job
/// failed if anything failed, reporting the first failure that is not just
/// a consequence of another one.
fn final_state(assembly: &StoryAssembly) -> JobState {
    if assembly.count_with_status(TaskStatus::Cancelled) > 0 {
        return JobState::Cancelled;
    }
    let root_cause = assembly
        .failures
        .iter()
        .find(|f| !matches!(f.reason, FailureReason::DependencyFailed { .. }))
        .or_else(|| assembly.failures.first());
    match root_cause {
        Some(failure) => JobState::Failed {
            reason: failure.reason.clone(),
        },
        None => JobState::Completed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::RequestPlanner;
    use taleweave_core::{Artifact, StorySpec};

    fn setup(pages: i64) -> (ResultAssembler, TaskGraph) {
        let graph = RequestPlanner::default()
            .plan(&StorySpec::new("Moon Party", pages))
            .unwrap();
        (ResultAssembler::new(JobId::new(), &graph), graph)
    }

    fn done(graph: &TaskGraph, id: TaskId, artifact: Artifact) -> TaskCompletion {
        let task = graph.task(&id).unwrap();
        TaskCompletion {
            task_id: id,
            kind: task.kind,
            page: task.page,
            attempts: 1,
            outcome: CompletionOutcome::Done {
                artifact,
                from_cache: false,
            },
        }
    }

    fn failed(graph: &TaskGraph, id: TaskId, reason: FailureReason) -> TaskCompletion {
        let task = graph.task(&id).unwrap();
        TaskCompletion {
            task_id: id,
            kind: task.kind,
            page: task.page,
            attempts: 3,
            outcome: CompletionOutcome::Failed {
                reason,
                last_error: None,
            },
        }
    }

    #[test]
    fn test_out_of_order_completions_land_on_their_pages() {
        let (assembler, graph) = setup(3);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("outline")));
        for page in [3, 1, 2] {
            assembler.apply(&done(
                &graph,
                TaskId::page_image(page),
                Artifact::url(format!("img-{page}")),
            ));
            assembler.apply(&done(
                &graph,
                TaskId::page_text(page),
                Artifact::text(format!("text-{page}")),
            ));
        }
        assert!(!assembler.is_final());

        let finished = assembler.apply(&done(&graph, TaskId::cover(), Artifact::url("cover")));
        assert!(finished);

        let story = assembler.snapshot();
        assert_eq!(story.state, JobState::Completed);
        assert_eq!(story.pages.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        for (page, content) in &story.pages {
            assert_eq!(content.text, Some(Artifact::text(format!("text-{page}"))));
            assert_eq!(content.image, Some(Artifact::url(format!("img-{page}"))));
        }
        assert_eq!(story.cover, Some(Artifact::url("cover")));
    }

    #[test]
    fn test_partial_snapshot_while_running() {
        let (assembler, graph) = setup(2);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("o")));
        assembler.apply(&done(&graph, TaskId::page_text(2), Artifact::text("t2")));

        let story = assembler.snapshot();
        assert_eq!(story.state, JobState::Running);
        assert!(story.pages[&2].text.is_some());
        assert!(story.pages[&1].text.is_none());
        assert_eq!(story.done_count(), 2);
    }

    #[test]
    fn test_failed_page_reports_root_cause() {
        let (assembler, graph) = setup(2);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("o")));
        assembler.apply(&done(&graph, TaskId::cover(), Artifact::url("c")));
        assembler.apply(&done(&graph, TaskId::page_text(1), Artifact::text("t1")));
        assembler.apply(&done(&graph, TaskId::page_image(1), Artifact::url("i1")));
        assembler.apply(&failed(&graph, TaskId::page_text(2), FailureReason::RateLimited));
        assembler.apply(&failed(
            &graph,
            TaskId::page_image(2),
            FailureReason::DependencyFailed {
                upstream: TaskId::page_text(2),
            },
        ));

        let story = assembler.snapshot();
        assert_eq!(
            story.state,
            JobState::Failed {
                reason: FailureReason::RateLimited
            }
        );
        assert_eq!(story.failed_pages(), vec![2]);
        assert!(story.pages[&1].is_complete());
        assert!(story.cover.is_some());
    }

    #[test]
    fn test_cancelled_task_makes_job_cancelled() {
        let (assembler, graph) = setup(1);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("o")));
        for id in [TaskId::page_text(1), TaskId::page_image(1), TaskId::cover()] {
            let task = graph.task(&id).unwrap();
            assembler.apply(&TaskCompletion {
                task_id: id.clone(),
                kind: task.kind,
                page: task.page,
                attempts: 0,
                outcome: CompletionOutcome::Cancelled,
            });
        }
        assert_eq!(assembler.snapshot().state, JobState::Cancelled);
    }

    #[test]
    fn test_duplicates_and_unknown_ids_are_ignored() {
        let (assembler, graph) = setup(1);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("first")));
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("second")));
        assert_eq!(assembler.snapshot().outline, Some(Artifact::text("first")));

        let stray = TaskCompletion {
            task_id: TaskId::page_text(9),
            kind: TaskKind::PageText,
            page: Some(9),
            attempts: 1,
            outcome: CompletionOutcome::Cancelled,
        };
        assert!(!assembler.apply(&stray));
        assert!(!assembler.snapshot().pages.contains_key(&9));
    }

    #[test]
    fn test_fail_job_settles_open_tasks() {
        let (assembler, graph) = setup(1);
        assembler.apply(&done(&graph, TaskId::outline(), Artifact::text("o")));
        assembler.fail_job(FailureReason::BudgetExhausted);

        let story = assembler.snapshot();
        assert_eq!(
            story.state,
            JobState::Failed {
                reason: FailureReason::BudgetExhausted
            }
        );
        assert_eq!(story.count_with_status(TaskStatus::Failed), 3);
        assert_eq!(story.done_count(), 1);
    }
}
