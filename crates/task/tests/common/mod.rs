//! Shared fixtures for the scheduler integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use taleweave_config::OrchestratorConfig;
use taleweave_core::{Artifact, CharacterRef, ProviderError, ProviderKind, StorySpec, TaskId, TaskKind};
use taleweave_task::{OrchestrationContext, Provider, ProviderRegistry, ProviderRequest};
use taleweave_utils::FixedJitter;

/// Scriptable provider that records every call it receives
///
/// Text results are the task id as text and image results are
/// `mock://<task id>`, so a test can tell exactly which task produced what.
#[derive(Debug, Default)]
pub struct MockProvider {
    default_latency: Duration,
    latencies: HashMap<TaskId, Duration>,
    blocked: HashSet<TaskKind>,
    always_fail: HashMap<TaskId, ProviderError>,
    scripted: Mutex<HashMap<TaskId, VecDeque<ProviderError>>>,
    calls: Mutex<Vec<TaskId>>,
    upstream: Mutex<HashMap<TaskId, Vec<(TaskId, Artifact)>>>,
    in_flight: Mutex<HashMap<ProviderKind, usize>>,
    peak: Mutex<HashMap<ProviderKind, usize>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    pub fn with_task_latency(mut self, task_id: TaskId, latency: Duration) -> Self {
        self.latencies.insert(task_id, latency);
        self
    }

    /// Calls for tasks of `kind` never return
    pub fn blocking(mut self, kind: TaskKind) -> Self {
        self.blocked.insert(kind);
        self
    }

    /// Every call for `task_id` fails with `error`
    pub fn failing(mut self, task_id: TaskId, error: ProviderError) -> Self {
        self.always_fail.insert(task_id, error);
        self
    }

    /// The next calls for `task_id` fail with `errors`, in order, then succeed
    pub fn failing_first(self, task_id: TaskId, errors: Vec<ProviderError>) -> Self {
        self.scripted.lock().insert(task_id, errors.into());
        self
    }

    pub fn calls(&self) -> Vec<TaskId> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, task_id: &TaskId) -> usize {
        self.calls.lock().iter().filter(|id| *id == task_id).count()
    }

    /// Upstream artifacts the last call for `task_id` was given
    pub fn upstream_of(&self, task_id: &TaskId) -> Vec<(TaskId, Artifact)> {
        self.upstream.lock().get(task_id).cloned().unwrap_or_default()
    }

    pub fn peak(&self, kind: ProviderKind) -> usize {
        self.peak.lock().get(&kind).copied().unwrap_or_default()
    }

    pub fn in_flight(&self, kind: ProviderKind) -> usize {
        self.in_flight.lock().get(&kind).copied().unwrap_or_default()
    }
}

struct InFlight<'a> {
    provider: &'a MockProvider,
    kind: ProviderKind,
}

impl<'a> InFlight<'a> {
    fn enter(provider: &'a MockProvider, kind: ProviderKind) -> Self {
        let now = {
            let mut in_flight = provider.in_flight.lock();
            let count = in_flight.entry(kind).or_default();
            *count += 1;
            *count
        };
        let mut peak = provider.peak.lock();
        let high = peak.entry(kind).or_default();
        *high = (*high).max(now);
        Self { provider, kind }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(count) = self.provider.in_flight.lock().get_mut(&self.kind) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<Artifact, ProviderError> {
        self.calls.lock().push(request.task_id.clone());
        self.upstream.lock().insert(
            request.task_id.clone(),
            request
                .upstream
                .iter()
                .map(|up| (up.task_id.clone(), up.artifact.clone()))
                .collect(),
        );
        let _guard = InFlight::enter(self, request.kind.provider_kind());

        if self.blocked.contains(&request.kind) {
            std::future::pending::<()>().await;
        }

        let latency = self
            .latencies
            .get(&request.task_id)
            .copied()
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(error) = self.always_fail.get(&request.task_id) {
            return Err(error.clone());
        }
        let scripted = self
            .scripted
            .lock()
            .get_mut(&request.task_id)
            .and_then(VecDeque::pop_front);
        if let Some(error) = scripted {
            return Err(error);
        }

        Ok(match request.kind.provider_kind() {
            ProviderKind::Text => Artifact::text(request.task_id.as_str()),
            ProviderKind::Image => Artifact::url(format!("mock://{}", request.task_id)),
        })
    }
}

/// Config with the given caps and a deterministic retry schedule
pub fn config(global: usize, text: usize, image: usize) -> OrchestratorConfig {
    let mut config = OrchestratorConfig::default();
    config.concurrency.global = global;
    config.concurrency.text = text;
    config.concurrency.image = image;
    config
}

pub fn context(provider: Arc<MockProvider>, config: OrchestratorConfig) -> Arc<OrchestrationContext> {
    let ctx = OrchestrationContext::builder(ProviderRegistry::single(provider))
        .config(config)
        .jitter(Arc::new(FixedJitter(0.5)))
        .build()
        .expect("valid test context");
    Arc::new(ctx)
}

/// Three pages, one character: eight tasks
pub fn three_page_story() -> StorySpec {
    StorySpec::new("The Lighthouse Cat", 3)
        .with_character(CharacterRef::new("Mittens").with_photo("photo-a"))
        .with_art_style("watercolor")
        .with_premise("A cat keeps the lighthouse lamp burning")
}

/// Expected artifacts for a page, given how `MockProvider` renders results
pub fn page_text(page: u32) -> Artifact {
    Artifact::text(TaskId::page_text(page).as_str())
}

pub fn page_image(page: u32) -> Artifact {
    Artifact::url(format!("mock://{}", TaskId::page_image(page)))
}
