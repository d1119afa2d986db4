//! Cancelling jobs and running out of time

mod common;

use common::MockProvider;
use std::sync::Arc;
use std::time::Duration;
use taleweave_core::{FailureReason, JobId, JobState, ProviderKind, TaskKind, TaskStatus};
use taleweave_task::{JobManager, OrchestrationContext, ProviderRegistry};
use taleweave_utils::FixedJitter;

async fn wait_for_done(jobs: &JobManager, id: JobId, done: usize) {
    for _ in 0..1000 {
        if jobs.poll(id).unwrap().done_count() >= done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job never reached {done} finished tasks");
}

/// Text calls answer at once, image calls hang until cancelled
fn stuck_on_images() -> Arc<MockProvider> {
    Arc::new(
        MockProvider::new()
            .blocking(TaskKind::PageImage)
            .blocking(TaskKind::CoverImage),
    )
}

#[tokio::test(start_paused = true)]
async fn test_cancel_keeps_finished_work_and_cancels_the_rest() {
    let mock = stuck_on_images();
    let ctx = common::context(Arc::clone(&mock), common::config(4, 2, 2));
    let jobs = JobManager::new(Arc::clone(&ctx));

    let id = jobs.submit(common::three_page_story()).unwrap();
    wait_for_done(&jobs, id, 4).await;

    let story = jobs.cancel(id).await.unwrap();

    assert_eq!(story.state, JobState::Cancelled);
    assert_eq!(story.done_count(), 4);
    assert_eq!(story.count_with_status(TaskStatus::Cancelled), 4);
    assert!(story.outline.is_some());
    for page in 1..=3 {
        assert_eq!(story.pages[&page].text, Some(common::page_text(page)));
        assert!(story.pages[&page].image.is_none());
    }

    // In-flight calls were dropped and their slots returned
    assert_eq!(mock.in_flight(ProviderKind::Image), 0);
    assert_eq!(ctx.limits().in_flight(ProviderKind::Image), 0);
    assert_eq!(ctx.cache().len(), 4);

    // Cancelling again is harmless
    assert_eq!(jobs.cancel(id).await.unwrap().state, JobState::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_two_of_eight_tasks() {
    // Outline and cover finish; every page-text call hangs
    let mock = Arc::new(MockProvider::new().blocking(TaskKind::PageText));
    let ctx = common::context(Arc::clone(&mock), common::config(4, 2, 2));
    let jobs = JobManager::new(ctx);

    let id = jobs.submit(common::three_page_story()).unwrap();
    wait_for_done(&jobs, id, 2).await;

    let story = jobs.cancel(id).await.unwrap();
    assert_eq!(story.state, JobState::Cancelled);
    assert_eq!(story.done_count(), 2);
    assert_eq!(story.count_with_status(TaskStatus::Cancelled), 6);
    assert_eq!(story.count_with_status(TaskStatus::Failed), 0);
    assert!(story.outline.is_some());
    assert!(story.cover.is_some());
    assert!(story.pages.values().all(|page| page.text.is_none() && page.image.is_none()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_any_result() {
    let mock = Arc::new(MockProvider::new().with_latency(Duration::from_secs(30)));
    let ctx = common::context(Arc::clone(&mock), common::config(4, 2, 2));
    let jobs = JobManager::new(ctx);

    let id = jobs.submit(common::three_page_story()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;

    let story = jobs.cancel(id).await.unwrap();
    assert_eq!(story.state, JobState::Cancelled);
    assert_eq!(story.count_with_status(TaskStatus::Cancelled), 8);
    assert_eq!(mock.call_count(), 1, "only the outline was ever started");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_is_a_no_op() {
    let mock = Arc::new(MockProvider::new());
    let ctx = common::context(mock, common::config(4, 2, 2));
    let jobs = JobManager::new(ctx);

    let id = jobs.submit(common::three_page_story()).unwrap();
    jobs.wait(id).await.unwrap();

    let story = jobs.cancel(id).await.unwrap();
    assert_eq!(story.state, JobState::Completed);
    assert_eq!(story.done_count(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_resubmitting_after_cancel_reuses_cached_text() {
    let stuck = stuck_on_images();
    let first_ctx = common::context(Arc::clone(&stuck), common::config(4, 2, 2));
    let first_jobs = JobManager::new(Arc::clone(&first_ctx));

    let id = first_jobs.submit(common::three_page_story()).unwrap();
    wait_for_done(&first_jobs, id, 4).await;
    first_jobs.cancel(id).await.unwrap();

    // Same cache, working providers
    let healthy = Arc::new(MockProvider::new());
    let ctx = OrchestrationContext::builder(ProviderRegistry::single(healthy.clone()))
        .config(common::config(4, 2, 2))
        .cache(Arc::clone(first_ctx.cache()))
        .jitter(Arc::new(FixedJitter(0.5)))
        .build()
        .unwrap();
    let jobs = JobManager::new(Arc::new(ctx));

    let retried = jobs.submit(common::three_page_story()).unwrap();
    let story = jobs.wait(retried).await.unwrap();

    assert_eq!(story.state, JobState::Completed);
    assert_eq!(healthy.call_count(), 4, "only the images and the cover are redone");
    assert!(healthy
        .calls()
        .iter()
        .all(|id| id.ends_with("-image") || id.as_str() == "cover"));
}

#[tokio::test(start_paused = true)]
async fn test_job_time_budget_fails_the_job() {
    let mock = Arc::new(MockProvider::new().with_latency(Duration::from_secs(10)));
    let mut config = common::config(4, 2, 2);
    config.job_timeout_ms = Some(15_000);
    let ctx = common::context(Arc::clone(&mock), config);
    let jobs = JobManager::new(ctx);

    let id = jobs.submit(common::three_page_story()).unwrap();
    let story = jobs.wait(id).await.unwrap();

    assert_eq!(
        story.state,
        JobState::Failed {
            reason: FailureReason::BudgetExhausted
        }
    );
    // The outline made it in before the budget ran out
    assert_eq!(story.done_count(), 1);
    assert!(story
        .failures
        .iter()
        .all(|f| f.reason == FailureReason::BudgetExhausted));
    assert_eq!(story.failed_pages(), vec![1, 2, 3]);
}
