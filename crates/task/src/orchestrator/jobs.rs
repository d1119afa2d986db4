//! Job control: submit, poll, cancel, wait, retry and remove

use super::context::OrchestrationContext;
use crate::assembler::ResultAssembler;
use crate::scheduler::{RunEnd, Scheduler, SchedulerRun};
use dashmap::DashMap;
use std::sync::Arc;
use taleweave_core::{Error, FailureReason, JobId, JobState, Result, StorySpec, StoryAssembly};
use taleweave_utils::logging;
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

struct JobEntry {
    spec: StorySpec,
    assembler: Arc<ResultAssembler>,
    cancel: CancellationToken,
    /// Flips to true once the run has ended and the assembly is final
    settled: watch::Receiver<bool>,
}

/// Tracks the jobs started against one [`OrchestrationContext`]
pub struct JobManager {
    ctx: Arc<OrchestrationContext>,
    scheduler: Scheduler,
    jobs: DashMap<JobId, JobEntry>,
}

impl JobManager {
    pub fn new(ctx: Arc<OrchestrationContext>) -> Self {
        let scheduler = Scheduler::new(Arc::clone(&ctx));
        Self {
            ctx,
            scheduler,
            jobs: DashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<OrchestrationContext> {
        &self.ctx
    }

    /// Plan `spec` and start running it
    ///
    /// Returns once the job is scheduled; progress is visible through
    /// [`poll`](Self::poll). Must be called from within a Tokio runtime.
    pub fn submit(&self, spec: StorySpec) -> Result<JobId> {
        let graph = Arc::new(self.ctx.planner().plan(&spec)?);
        let job_id = JobId::new();
        let assembler = Arc::new(ResultAssembler::new(job_id, &graph));
        let cancel = CancellationToken::new();
        let (settled_tx, settled_rx) = watch::channel(false);

        let span = logging::job_span(&job_id.to_string(), graph.len());
        let SchedulerRun { mut events, handle } =
            span.in_scope(|| self.scheduler.run(Arc::clone(&graph), cancel.clone()));

        let sink = Arc::clone(&assembler);
        tokio::spawn(
            async move {
                while let Some(completion) = events.next().await {
                    sink.apply(&completion);
                }
                match handle.await {
                    Ok(summary) => {
                        if summary.end == RunEnd::Stalled {
                            sink.fail_job(FailureReason::Stalled);
                        }
                        tracing::info!(
                            end = ?summary.end,
                            provider_calls = summary.calls.len(),
                            "job settled"
                        );
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "scheduler run ended abnormally");
                        sink.fail_job(FailureReason::Stalled);
                    }
                }
                if !sink.is_final() {
                    sink.fail_job(FailureReason::Stalled);
                }
                settled_tx.send_replace(true);
            }
            .instrument(span),
        );

        tracing::info!(job_id = %job_id, title = %spec.title, tasks = graph.len(), "job submitted");
        self.jobs.insert(
            job_id,
            JobEntry {
                spec,
                assembler,
                cancel,
                settled: settled_rx,
            },
        );
        Ok(job_id)
    }

    /// Current, possibly partial, assembly of a job
    pub fn poll(&self, job_id: JobId) -> Result<StoryAssembly> {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.assembler.snapshot())
            .ok_or_else(|| Error::job_not_found(job_id.to_string()))
    }

    /// Cancel a job and wait until it has settled
    ///
    /// A job that already finished keeps its final state.
    pub async fn cancel(&self, job_id: JobId) -> Result<StoryAssembly> {
        let (cancel, settled, assembler) = self.handles(job_id)?;
        tracing::info!(job_id = %job_id, "cancelling job");
        cancel.cancel();
        Self::settle(settled).await;
        Ok(assembler.snapshot())
    }

    /// Wait for a job's final assembly
    pub async fn wait(&self, job_id: JobId) -> Result<StoryAssembly> {
        let (_, settled, assembler) = self.handles(job_id)?;
        Self::settle(settled).await;
        Ok(assembler.snapshot())
    }

    /// Run a job's request again as a new job
    ///
    /// Tasks that finished the first time resolve from the cache, so only
    /// the failed or cancelled work reaches the providers.
    pub fn retry(&self, job_id: JobId) -> Result<JobId> {
        let spec = self
            .jobs
            .get(&job_id)
            .map(|entry| entry.spec.clone())
            .ok_or_else(|| Error::job_not_found(job_id.to_string()))?;
        let retried = self.submit(spec)?;
        tracing::info!(job_id = %job_id, retried_as = %retried, "job resubmitted");
        Ok(retried)
    }

    /// Forget a job, cancelling it first if it is still running
    ///
    /// Returns the job's last assembly. Cached artifacts are untouched.
    pub async fn remove(&self, job_id: JobId) -> Result<StoryAssembly> {
        let (cancel, settled, assembler) = self.handles(job_id)?;
        if !assembler.is_final() {
            cancel.cancel();
            Self::settle(settled).await;
        }
        self.jobs.remove(&job_id);
        tracing::debug!(job_id = %job_id, "job removed");
        Ok(assembler.snapshot())
    }

    /// Known jobs and their states
    pub fn list(&self) -> Vec<(JobId, JobState)> {
        let mut jobs: Vec<(JobId, JobState)> = self
            .jobs
            .iter()
            .map(|entry| (*entry.key(), entry.assembler.snapshot().state))
            .collect();
        jobs.sort_by_key(|(id, _)| *id);
        jobs
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Clone what an async operation needs so no map guard is held across an await
    fn handles(
        &self,
        job_id: JobId,
    ) -> Result<(CancellationToken, watch::Receiver<bool>, Arc<ResultAssembler>)> {
        let entry = self
            .jobs
            .get(&job_id)
            .ok_or_else(|| Error::job_not_found(job_id.to_string()))?;
        Ok((
            entry.cancel.clone(),
            entry.settled.clone(),
            Arc::clone(&entry.assembler),
        ))
    }

    async fn settle(mut settled: watch::Receiver<bool>) {
        // The sender only goes away after publishing `true`
        let _ = settled.wait_for(|done| *done).await;
    }
}

impl std::fmt::Debug for JobManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobManager")
            .field("jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderRegistry, SimulatedProvider};
    use std::time::Duration;

    fn manager() -> JobManager {
        let providers = ProviderRegistry::single(Arc::new(SimulatedProvider::new("sim")));
        let ctx = OrchestrationContext::builder(providers).build().unwrap();
        JobManager::new(Arc::new(ctx))
    }

    #[tokio::test]
    async fn test_submit_and_wait() {
        let jobs = manager();
        let id = jobs.submit(StorySpec::new("Owl at Night", 2)).unwrap();

        let story = jobs.wait(id).await.unwrap();
        assert_eq!(story.state, JobState::Completed);
        assert_eq!(story.pages.len(), 2);
        assert!(story.pages.values().all(|page| page.is_complete()));
        assert_eq!(jobs.poll(id).unwrap(), story);
    }

    #[tokio::test]
    async fn test_invalid_spec_is_rejected_at_submit() {
        let jobs = manager();
        let err = jobs.submit(StorySpec::new("Nothing", 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { .. }));
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let jobs = manager();
        let missing = JobId::new();
        assert!(matches!(
            jobs.poll(missing),
            Err(Error::JobNotFound { .. })
        ));
        assert!(jobs.cancel(missing).await.is_err());
        assert!(jobs.retry(missing).is_err());
    }

    #[tokio::test]
    async fn test_retry_is_served_from_cache() {
        let jobs = manager();
        let first = jobs.submit(StorySpec::new("Owl at Night", 1)).unwrap();
        jobs.wait(first).await.unwrap();

        let second = jobs.retry(first).unwrap();
        assert_ne!(first, second);
        let story = jobs.wait(second).await.unwrap();
        assert_eq!(story.state, JobState::Completed);
        assert_eq!(jobs.context().cache().stats().hits, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_cancels_running_job() {
        let providers = ProviderRegistry::single(Arc::new(
            SimulatedProvider::new("slow").with_latency(Duration::from_secs(60)),
        ));
        let ctx = OrchestrationContext::builder(providers).build().unwrap();
        let jobs = JobManager::new(Arc::new(ctx));

        let id = jobs.submit(StorySpec::new("Owl at Night", 1)).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        let story = jobs.remove(id).await.unwrap();
        assert_eq!(story.state, JobState::Cancelled);
        assert!(jobs.poll(id).is_err());
        assert!(jobs.list().is_empty());
    }
}
