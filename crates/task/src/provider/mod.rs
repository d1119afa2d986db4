//! Provider invocation interface
//!
//! Every AI backend sits behind `Provider`. The scheduler only sees
//! artifacts and `ProviderError`s; status codes are the shared vocabulary
//! that the retry controller classifies.

mod http;
mod simulated;

pub use http::HttpProvider;
pub use simulated::SimulatedProvider;

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use taleweave_core::{Artifact, ProviderError, ProviderKind, TaskId, TaskKind};

/// Everything a provider needs to run one task attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRequest {
    pub task_id: TaskId,
    pub kind: TaskKind,
    pub page: Option<u32>,
    /// 1-based attempt number
    pub attempt: u32,
    pub input: serde_json::Value,
    /// Artifacts of the tasks this one depends on
    pub upstream: Vec<UpstreamArtifact>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamArtifact {
    pub task_id: TaskId,
    pub artifact: Artifact,
}

impl ProviderRequest {
    /// Upstream artifact produced by `task_id`, if any
    pub fn upstream(&self, task_id: &TaskId) -> Option<&Artifact> {
        self.upstream
            .iter()
            .find(|u| &u.task_id == task_id)
            .map(|u| &u.artifact)
    }
}

/// An external text or image generation service
#[async_trait]
pub trait Provider: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    async fn invoke(&self, request: ProviderRequest) -> Result<Artifact, ProviderError>;
}

/// Routes each provider kind to its backend
#[derive(Clone)]
pub struct ProviderRegistry {
    text: Arc<dyn Provider>,
    image: Arc<dyn Provider>,
}

impl ProviderRegistry {
    pub fn new(text: Arc<dyn Provider>, image: Arc<dyn Provider>) -> Self {
        Self { text, image }
    }

    /// Use one backend for both kinds
    pub fn single(provider: Arc<dyn Provider>) -> Self {
        Self {
            text: Arc::clone(&provider),
            image: provider,
        }
    }

    pub fn for_kind(&self, kind: ProviderKind) -> &Arc<dyn Provider> {
        match kind {
            ProviderKind::Text => &self.text,
            ProviderKind::Image => &self.image,
        }
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("text", &self.text.name())
            .field("image", &self.image.name())
            .finish()
    }
}
