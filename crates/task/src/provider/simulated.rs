//! Offline provider for dry runs and demos
//!
//! Output is a pure function of the request input,
//! so re-running a job hits the cache instead of tripping the consistency
//! check.

use super::{Provider, ProviderRequest};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use taleweave_core::{Artifact, ProviderError, TaskKind};

#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    name: String,
    latency: Duration,
    /// Probability in [0, 1] that an attempt fails with a transient error
    failure_rate: f64,
}

impl SimulatedProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            latency: Duration::ZERO,
            failure_rate: 0.0,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn render(request: &ProviderRequest) -> Artifact {
        let input = &request.input;

        match request.kind {
            TaskKind::Outline => Artifact::text(format!(
                "Outline for \"{}\" in {} pages",
                field(input, "title"),
                input.get("pages").and_then(|v| v.as_u64()).unwrap_or_default()
            )),
            TaskKind::PageText => {
                let page = request.page.unwrap_or_default();
                let brief = match field(input, "brief") {
                    "" => "the story continues".to_string(),
                    brief => brief.to_string(),
                };
                Artifact::text(format!("Page {page}: {brief}."))
            }
            TaskKind::PageImage => Artifact::url(format!(
                "sim://image/page-{}/{}.png",
                request.page.unwrap_or_default(),
                slug(field(input, "artStyle"))
            )),
            TaskKind::CoverImage => Artifact::url(format!(
                "sim://image/cover/{}-{}.png",
                slug(field(input, "title")),
                slug(field(input, "artStyle"))
            )),
        }
    }
}

fn field<'a>(input: &'a serde_json::Value, key: &str) -> &'a str {
    input.get(key).and_then(|v| v.as_str()).unwrap_or_default()
}

fn slug(s: &str) -> String {
    s.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl Provider for SimulatedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: ProviderRequest) -> Result<Artifact, ProviderError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            return Err(ProviderError::server(503, "simulated outage"));
        }
        Ok(Self::render(&request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taleweave_core::TaskId;

    fn request(kind: TaskKind, page: Option<u32>, input: serde_json::Value) -> ProviderRequest {
        ProviderRequest {
            task_id: TaskId::outline(),
            kind,
            page,
            attempt: 1,
            input,
            upstream: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let provider = SimulatedProvider::new("sim");
        let req = request(TaskKind::PageText, Some(2), json!({ "brief": "The fox naps" }));
        let a = provider.invoke(req.clone()).await.unwrap();
        let b = provider.invoke(req).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_text(), Some("Page 2: The fox naps."));
    }

    #[tokio::test]
    async fn test_image_kinds_return_urls() {
        let provider = SimulatedProvider::new("sim");
        let art = provider
            .invoke(request(
                TaskKind::CoverImage,
                None,
                json!({ "title": "The Fox", "artStyle": "soft watercolor" }),
            ))
            .await
            .unwrap();
        assert_eq!(art, Artifact::url("sim://image/cover/the-fox-soft-watercolor.png"));
    }

    #[tokio::test]
    async fn test_full_failure_rate_always_fails() {
        let provider = SimulatedProvider::new("sim").with_failure_rate(1.0);
        let err = provider
            .invoke(request(TaskKind::Outline, None, json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.status, 503);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_uses_tokio_time() {
        let provider = SimulatedProvider::new("sim").with_latency(Duration::from_secs(3));
        let start = tokio::time::Instant::now();
        provider
            .invoke(request(TaskKind::Outline, None, json!({ "title": "x", "pages": 1 })))
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(3));
    }
}
