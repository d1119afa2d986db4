//! One provider attempt for one task

use super::limits::DispatchPermit;
use crate::orchestrator::OrchestrationContext;
use crate::provider::{ProviderRequest, UpstreamArtifact};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use taleweave_core::{
    Artifact, CallOutcome, ErrorClass, Fingerprint, ProviderCall, ProviderError, TaskId, TaskKind,
};
use taleweave_utils::{classify, logging};
use tracing::Instrument;

/// What the driver needs to know about a task to run it
#[derive(Debug, Clone)]
pub(crate) struct AttemptSpec {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub page: Option<u32>,
    pub fingerprint: Fingerprint,
    pub input: serde_json::Value,
    pub upstream: Vec<UpstreamArtifact>,
    pub attempt: u32,
}

/// Result of a finished attempt
#[derive(Debug)]
pub(crate) enum AttemptOutcome {
    Resolved { artifact: Artifact, from_cache: bool },
    Failed(ProviderError),
    /// The provider answered but the cache holds different content
    Inconsistent(String),
}

/// Messages the driver receives from its join set
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Attempt {
        task_id: TaskId,
        call: Option<ProviderCall>,
        outcome: AttemptOutcome,
    },
    /// A retry backoff elapsed
    RetryDue { task_id: TaskId },
}

/// Run one attempt while holding `permit`
///
/// Panics inside the provider are reported as a server error so the driver
/// can still attribute the failure to this task.
pub(crate) async fn run_attempt(
    ctx: Arc<OrchestrationContext>,
    spec: AttemptSpec,
    permit: DispatchPermit,
) -> WorkerEvent {
    let task_id = spec.task_id.clone();
    let span = logging::task_span(task_id.as_str(), spec.kind.as_str(), spec.attempt);

    let result = AssertUnwindSafe(attempt(ctx, spec, permit).instrument(span))
        .catch_unwind()
        .await;

    match result {
        Ok((call, outcome)) => WorkerEvent::Attempt {
            task_id,
            call,
            outcome,
        },
        Err(_) => {
            tracing::error!(task_id = %task_id, "provider call panicked");
            WorkerEvent::Attempt {
                task_id,
                call: None,
                outcome: AttemptOutcome::Failed(ProviderError::server(500, "provider panicked")),
            }
        }
    }
}

async fn attempt(
    ctx: Arc<OrchestrationContext>,
    spec: AttemptSpec,
    _permit: DispatchPermit,
) -> (Option<ProviderCall>, AttemptOutcome) {
    let cache = ctx.cache();
    let _pin = cache.pin(&spec.fingerprint);

    // Another job may have produced this artifact while the task waited
    if let Some(artifact) = cache.get(&spec.fingerprint) {
        logging::cache_event(spec.task_id.as_str(), true);
        return (
            None,
            AttemptOutcome::Resolved {
                artifact,
                from_cache: true,
            },
        );
    }

    let provider_kind = spec.kind.provider_kind();
    if let Some(limiter) = ctx.rate_limiter(provider_kind) {
        limiter.acquire().await;
    }

    let provider = ctx.providers().for_kind(provider_kind);
    let timeout = ctx.config().provider_timeout();
    let started_at = Utc::now();
    let request = ProviderRequest {
        task_id: spec.task_id.clone(),
        kind: spec.kind,
        page: spec.page,
        attempt: spec.attempt,
        input: spec.input,
        upstream: spec.upstream,
    };

    tracing::debug!(provider = %provider.name(), "provider_call_started");
    let clock = ctx.clock();
    let result = tokio::select! {
        biased;

        result = provider.invoke(request) => result,
        _ = clock.sleep(timeout) => Err(ProviderError::timeout(timeout)),
    };

    let call = |outcome| ProviderCall {
        task_id: spec.task_id.clone(),
        attempt_number: spec.attempt,
        started_at,
        outcome,
    };

    match result {
        Ok(artifact) => match cache.put(&spec.fingerprint, artifact.clone()) {
            Ok(_) => (
                Some(call(CallOutcome::Success)),
                AttemptOutcome::Resolved {
                    artifact,
                    from_cache: false,
                },
            ),
            Err(err) => (
                Some(call(CallOutcome::FatalError)),
                AttemptOutcome::Inconsistent(err.to_string()),
            ),
        },
        Err(error) => {
            let outcome = match classify(&error) {
                ErrorClass::Timeout => CallOutcome::Timeout,
                class if class.is_retryable() => CallOutcome::TransientError,
                _ => CallOutcome::FatalError,
            };
            tracing::debug!(status = error.status, outcome = ?outcome, "provider_call_failed");
            (Some(call(outcome)), AttemptOutcome::Failed(error))
        }
    }
}
