//! The scheduler's event loop
//!
//! One driver owns the mutable state of a run. Workers only ever report back
//! through the join set, so task status changes happen in one place and in
//! a well-defined order.

use super::limits::DispatchPermit;
use super::worker::{run_attempt, AttemptOutcome, AttemptSpec, WorkerEvent};
use super::{RunEnd, RunSummary};
use crate::orchestrator::OrchestrationContext;
use crate::graph::TaskGraph;
use crate::provider::UpstreamArtifact;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use taleweave_core::{
    Artifact, CompletionOutcome, FailureReason, ProviderError, ProviderKind, Task,
    TaskCompletion, TaskId, TaskStatus,
};
use taleweave_utils::{logging, RetryDecision, RetryState};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// The scheduler's own copy of a task: the only record that changes
struct TaskRun {
    task: Task,
    retry: RetryState,
    /// Dependencies not yet done
    waiting_on: usize,
}

/// Ready tasks per provider kind, ordered by (page, id)
#[derive(Default)]
struct ReadyQueue {
    text: BTreeSet<(u32, TaskId)>,
    image: BTreeSet<(u32, TaskId)>,
}

impl ReadyQueue {
    fn lane(&self, kind: ProviderKind) -> &BTreeSet<(u32, TaskId)> {
        match kind {
            ProviderKind::Text => &self.text,
            ProviderKind::Image => &self.image,
        }
    }

    fn lane_mut(&mut self, kind: ProviderKind) -> &mut BTreeSet<(u32, TaskId)> {
        match kind {
            ProviderKind::Text => &mut self.text,
            ProviderKind::Image => &mut self.image,
        }
    }

    fn push(&mut self, kind: ProviderKind, priority: u32, id: TaskId) {
        self.lane_mut(kind).insert((priority, id));
    }

    fn pop(&mut self, kind: ProviderKind) -> Option<TaskId> {
        self.lane_mut(kind).pop_first().map(|(_, id)| id)
    }

    fn has_work(&self, kind: ProviderKind) -> bool {
        !self.lane(kind).is_empty()
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_empty()
    }

    /// Kinds with waiting work, the one holding the lowest page first
    fn kinds_by_priority(&self) -> Vec<ProviderKind> {
        let mut heads: Vec<(&(u32, TaskId), ProviderKind)> = ProviderKind::ALL
            .iter()
            .filter_map(|kind| self.lane(*kind).first().map(|head| (head, *kind)))
            .collect();
        heads.sort();
        heads.into_iter().map(|(_, kind)| kind).collect()
    }

    fn clear(&mut self) {
        self.text.clear();
        self.image.clear();
    }
}

pub(super) struct RunDriver {
    ctx: Arc<OrchestrationContext>,
    graph: Arc<TaskGraph>,
    events: UnboundedSender<TaskCompletion>,
    cancel: CancellationToken,
    runs: HashMap<TaskId, TaskRun>,
    ready: ReadyQueue,
    join_set: JoinSet<WorkerEvent>,
    summary: RunSummary,
}

impl RunDriver {
    pub(super) fn new(
        ctx: Arc<OrchestrationContext>,
        graph: Arc<TaskGraph>,
        events: UnboundedSender<TaskCompletion>,
        cancel: CancellationToken,
    ) -> Self {
        let runs = graph
            .tasks()
            .map(|task| {
                let run = TaskRun {
                    task: task.clone(),
                    retry: ctx.retry().begin(),
                    waiting_on: task.depends_on.len(),
                };
                (task.id.clone(), run)
            })
            .collect();
        let summary = RunSummary {
            end: RunEnd::Drained,
            total: graph.len(),
            done: 0,
            from_cache: 0,
            failed: 0,
            cancelled: 0,
            retries: 0,
            calls: Vec::new(),
            tasks: Vec::new(),
        };

        Self {
            ctx,
            graph,
            events,
            cancel,
            runs,
            ready: ReadyQueue::default(),
            join_set: JoinSet::new(),
            summary,
        }
    }

    pub(super) async fn run(self) -> RunSummary {
        let span = tracing::info_span!("scheduler", tasks = self.graph.len());
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> RunSummary {
        tracing::info!(total_tasks = self.graph.len(), "run_started");

        let deadline = self
            .ctx
            .config()
            .job_timeout()
            .map(|budget| self.ctx.clock().now() + budget);

        let graph = Arc::clone(&self.graph);
        for id in graph.roots() {
            self.make_ready(id);
        }

        let end = loop {
            self.admit();

            if self.all_terminal() {
                break RunEnd::Drained;
            }
            if self.join_set.is_empty() && self.ready.is_empty() {
                tracing::warn!("no runnable work left but tasks remain unfinished");
                self.abort(RunEnd::Stalled).await;
                break RunEnd::Stalled;
            }

            let limits = Arc::clone(self.ctx.limits());
            let cancel = self.cancel.clone();
            let want_text = self.ready.has_work(ProviderKind::Text);
            let want_image = self.ready.has_work(ProviderKind::Image);
            let clock = Arc::clone(self.ctx.clock());
            let budget_left = deadline
                .map(|end| end.saturating_duration_since(clock.now()))
                .unwrap_or_default();

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("run cancelled");
                    self.abort(RunEnd::Cancelled).await;
                    break RunEnd::Cancelled;
                }
                _ = clock.sleep(budget_left), if deadline.is_some() => {
                    tracing::warn!("job time budget exhausted");
                    self.abort(RunEnd::BudgetExhausted).await;
                    break RunEnd::BudgetExhausted;
                }
                Some(joined) = self.join_set.join_next() => self.on_joined(joined),
                Some(permit) = limits.acquire(ProviderKind::Text), if want_text => {
                    self.dispatch_next(ProviderKind::Text, permit);
                }
                Some(permit) = limits.acquire(ProviderKind::Image), if want_image => {
                    self.dispatch_next(ProviderKind::Image, permit);
                }
            }
        };

        self.summary.end = end;
        self.summary.tasks = graph
            .topological_order()
            .into_iter()
            .filter_map(|task| self.runs.remove(&task.id).map(|run| run.task))
            .collect();
        tracing::info!(
            end = ?end,
            done = self.summary.done,
            from_cache = self.summary.from_cache,
            failed = self.summary.failed,
            cancelled = self.summary.cancelled,
            retries = self.summary.retries,
            "run_finished"
        );
        self.summary
    }

    /// Dispatch ready tasks while slots are free
    fn admit(&mut self) {
        let limits = Arc::clone(self.ctx.limits());
        loop {
            let mut admitted = false;
            for kind in self.ready.kinds_by_priority() {
                if let Some(permit) = limits.try_acquire(kind) {
                    self.dispatch_next(kind, permit);
                    admitted = true;
                    break;
                }
            }
            if !admitted {
                break;
            }
        }
    }

    fn dispatch_next(&mut self, kind: ProviderKind, permit: DispatchPermit) {
        if let Some(task_id) = self.ready.pop(kind) {
            self.dispatch(task_id, permit);
        }
    }

    fn dispatch(&mut self, task_id: TaskId, permit: DispatchPermit) {
        let upstream = self
            .graph
            .dependencies(&task_id)
            .into_iter()
            .filter_map(|dep| {
                let artifact = self.runs.get(dep)?.task.result.clone()?;
                Some(UpstreamArtifact {
                    task_id: dep.clone(),
                    artifact,
                })
            })
            .collect();

        let Some(run) = self.runs.get_mut(&task_id) else {
            return;
        };
        let attempt = self.ctx.retry().record_attempt(&mut run.retry);
        let task = &mut run.task;
        task.status = TaskStatus::Running;
        task.attempts = attempt;

        let spec = AttemptSpec {
            task_id,
            kind: task.kind,
            page: task.page,
            fingerprint: task.fingerprint.clone(),
            input: task.input.clone(),
            upstream,
            attempt,
        };
        self.join_set
            .spawn(run_attempt(Arc::clone(&self.ctx), spec, permit));
    }

    fn on_joined(&mut self, joined: Result<WorkerEvent, JoinError>) {
        match joined {
            Ok(WorkerEvent::RetryDue { task_id }) => {
                let pending = self
                    .runs
                    .get(&task_id)
                    .is_some_and(|run| run.task.status == TaskStatus::Pending);
                if pending {
                    self.make_ready(&task_id);
                }
            }
            Ok(WorkerEvent::Attempt {
                task_id,
                call,
                outcome,
            }) => {
                if let Some(call) = call {
                    self.summary.calls.push(call);
                }
                match outcome {
                    AttemptOutcome::Resolved {
                        artifact,
                        from_cache,
                    } => self.complete(&task_id, artifact, from_cache),
                    AttemptOutcome::Failed(error) => self.on_failure(task_id, error),
                    AttemptOutcome::Inconsistent(message) => {
                        self.fail(&task_id, FailureReason::CacheConsistency, Some(message));
                    }
                }
            }
            Err(err) => {
                // Workers catch their own panics, so this is an abort or a runtime shutdown
                tracing::error!(error = %err, "worker task ended abnormally");
            }
        }
    }

    fn on_failure(&mut self, task_id: TaskId, error: ProviderError) {
        let Some(run) = self.runs.get_mut(&task_id) else {
            return;
        };

        match self.ctx.retry().on_failure(&mut run.retry, error) {
            RetryDecision::Retry {
                next_attempt,
                delay,
                class,
            } => {
                run.task.status = TaskStatus::Pending;
                self.summary.retries += 1;
                tracing::info!(
                    task_id = %task_id,
                    next_attempt,
                    delay_ms = delay.as_millis() as u64,
                    class = ?class,
                    "retry_scheduled"
                );
                let clock = Arc::clone(self.ctx.clock());
                self.join_set.spawn(async move {
                    clock.sleep(delay).await;
                    WorkerEvent::RetryDue { task_id }
                });
            }
            RetryDecision::Terminal { class, error, .. } => {
                self.fail(&task_id, FailureReason::from(class), Some(error.to_string()));
            }
        }
    }

    /// A task's dependencies are all done: resolve it from the cache or queue it
    fn make_ready(&mut self, task_id: &TaskId) {
        let graph = Arc::clone(&self.graph);
        let Some(task) = graph.task(task_id) else {
            return;
        };

        if let Some(artifact) = self.ctx.cache().get(&task.fingerprint) {
            logging::cache_event(task_id.as_str(), true);
            self.complete(task_id, artifact, true);
            return;
        }
        logging::cache_event(task_id.as_str(), false);
        self.ready
            .push(task.kind.provider_kind(), task.priority(), task_id.clone());
    }

    fn complete(&mut self, task_id: &TaskId, artifact: Artifact, from_cache: bool) {
        let Some(run) = self.runs.get_mut(task_id) else {
            return;
        };
        if run.task.status.is_terminal() {
            return;
        }
        run.task.status = TaskStatus::Done;
        run.task.result = Some(artifact.clone());
        let attempts = run.retry.attempts();

        self.summary.done += 1;
        if from_cache {
            self.summary.from_cache += 1;
        }
        logging::task_completed(task_id.as_str(), attempts, from_cache);
        self.emit(
            task_id,
            attempts,
            CompletionOutcome::Done {
                artifact,
                from_cache,
            },
        );

        let graph = Arc::clone(&self.graph);
        for dependent in graph.dependents(task_id) {
            let Some(run) = self.runs.get_mut(dependent) else {
                continue;
            };
            run.waiting_on = run.waiting_on.saturating_sub(1);
            if run.waiting_on == 0 && run.task.status == TaskStatus::Pending {
                self.make_ready(dependent);
            }
        }
    }

    /// Fail a task and, without dispatching them, everything downstream of it
    fn fail(&mut self, task_id: &TaskId, reason: FailureReason, last_error: Option<String>) {
        self.mark_failed(task_id, reason, last_error);

        let graph = Arc::clone(&self.graph);
        for descendant in graph.descendants(task_id) {
            self.mark_failed(
                &descendant,
                FailureReason::DependencyFailed {
                    upstream: task_id.clone(),
                },
                None,
            );
        }
    }

    fn mark_failed(&mut self, task_id: &TaskId, reason: FailureReason, last_error: Option<String>) {
        let Some(run) = self.runs.get_mut(task_id) else {
            return;
        };
        if run.task.status.is_terminal() {
            return;
        }
        run.task.status = TaskStatus::Failed;
        let attempts = run.retry.attempts();

        self.summary.failed += 1;
        logging::task_failed(task_id.as_str(), attempts, reason.category());
        self.emit(
            task_id,
            attempts,
            CompletionOutcome::Failed { reason, last_error },
        );
    }

    fn mark_cancelled(&mut self, task_id: &TaskId) {
        let Some(run) = self.runs.get_mut(task_id) else {
            return;
        };
        if run.task.status.is_terminal() {
            return;
        }
        run.task.status = TaskStatus::Cancelled;
        let attempts = run.retry.attempts();

        self.summary.cancelled += 1;
        self.emit(task_id, attempts, CompletionOutcome::Cancelled);
    }

    /// Stop all in-flight work and settle every unfinished task
    ///
    /// Attempts that already finished before the abort took effect still
    /// count; their artifacts are in the cache either way.
    async fn abort(&mut self, end: RunEnd) {
        self.join_set.abort_all();
        while let Some(joined) = self.join_set.join_next().await {
            if let Ok(WorkerEvent::Attempt {
                task_id,
                call,
                outcome: AttemptOutcome::Resolved {
                    artifact,
                    from_cache,
                },
            }) = joined
            {
                if let Some(call) = call {
                    self.summary.calls.push(call);
                }
                self.complete(&task_id, artifact, from_cache);
            }
        }
        self.ready.clear();

        let graph = Arc::clone(&self.graph);
        let unfinished: Vec<TaskId> = graph
            .topological_order()
            .into_iter()
            .filter(|task| {
                self.runs
                    .get(&task.id)
                    .is_some_and(|run| !run.task.status.is_terminal())
            })
            .map(|task| task.id.clone())
            .collect();

        for task_id in unfinished {
            match end {
                RunEnd::Cancelled => self.mark_cancelled(&task_id),
                RunEnd::BudgetExhausted => {
                    self.mark_failed(&task_id, FailureReason::BudgetExhausted, None)
                }
                RunEnd::Stalled => self.mark_failed(&task_id, FailureReason::Stalled, None),
                RunEnd::Drained => {}
            }
        }
    }

    fn all_terminal(&self) -> bool {
        self.runs.values().all(|run| run.task.status.is_terminal())
    }

    fn emit(&self, task_id: &TaskId, attempts: u32, outcome: CompletionOutcome) {
        let Some(task) = self.graph.task(task_id) else {
            return;
        };
        let completion = TaskCompletion {
            task_id: task_id.clone(),
            kind: task.kind,
            page: task.page,
            attempts,
            outcome,
        };
        if self.events.send(completion).is_err() {
            tracing::trace!(task_id = %task_id, "completion receiver dropped");
        }
    }
}
