//! JSON-over-HTTP provider adapter
//!
//! The request body is the serialized `ProviderRequest`; a 2xx response body
//! must be an `Artifact`. Anything else becomes a `ProviderError` carrying the
//! HTTP status, so classification stays in one place.

use super::{Provider, ProviderRequest};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use taleweave_core::{Artifact, Error, ProviderError, Result};

/// Marker some providers put in the body of a refused request
const CONTENT_POLICY_MARKER: &str = "content_policy";

pub struct HttpProvider {
    name: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        reqwest::Url::parse(&endpoint)
            .map_err(|e| Error::configuration(format!("invalid provider endpoint '{endpoint}': {e}")))?;
        let client = Client::builder()
            .build()
            .map_err(|e| Error::network(&endpoint, e.to_string()))?;
        Ok(Self {
            name: name.into(),
            client,
            endpoint,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        headers
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    fn create_error(status: StatusCode, body: &str, retry_after: Option<Duration>) -> ProviderError {
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.to_string()
        };

        let mut error = if body.contains(CONTENT_POLICY_MARKER) {
            ProviderError::content_policy(message)
        } else {
            ProviderError::new(status.as_u16(), message)
        };
        error.retry_after = retry_after;
        error
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, request: ProviderRequest) -> std::result::Result<Artifact, ProviderError> {
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                return Err(ProviderError::new(408, format!("request timeout: {e}")));
            }
            Err(e) => return Err(ProviderError::transport(format!("request failed: {e}"))),
        };

        let status = response.status();
        let retry_after = Self::parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            tracing::debug!(
                provider = %self.name,
                task_id = %request.task_id,
                status = status.as_u16(),
                "provider_error_response"
            );
            return Err(Self::create_error(status, &body, retry_after));
        }

        serde_json::from_str::<Artifact>(&body).map_err(|e| {
            // A 2xx with an unusable body is the provider's fault, not ours
            ProviderError::server(502, format!("failed to parse provider response: {e}"))
        })
    }
}
