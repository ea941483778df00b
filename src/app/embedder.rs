//! Concrete embedding clients, one module per backend type.

use crate::core::embedder::EmbeddingError;
use crate::core::model::provider::ProviderKind;
use std::time::Duration;

pub mod cohere;
pub mod google;
pub mod ollama;
pub mod openai;

/// Default per-request timeout for provider calls. Expiry surfaces as
/// a connection error.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection parameters shared by all embedding clients.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_model: Option<String>,
    pub timeout: Duration,
}

impl EmbedderConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            api_key: None,
            default_model: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_default_model(mut self, default_model: Option<String>) -> Self {
        self.default_model = default_model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn trim_base_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

pub(super) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("error while building http client")
}

/// Classify a non-success response into the embedding error taxonomy,
/// draining the body for the message.
pub(super) async fn ensure_success(
    kind: ProviderKind,
    model: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, EmbeddingError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let body = response.text().await.unwrap_or_default();

    Err(EmbeddingError::from_status(
        kind,
        model,
        status,
        retry_after,
        body,
    ))
}
