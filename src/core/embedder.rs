use crate::core::model::provider::ProviderKind;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Errors an embedding backend can produce. This is the full vocabulary;
/// services map these onto user facing responses without knowing which
/// backend was in play.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("{provider}: authentication failed: {message}")]
    Authentication {
        provider: ProviderKind,
        model: String,
        message: String,
    },

    #[error("{provider}: rate limited: {message}")]
    RateLimit {
        provider: ProviderKind,
        model: String,
        message: String,
        /// Seconds to wait, when the backend said so.
        retry_after: Option<u64>,
    },

    #[error("{provider}: model '{model}': {message}")]
    Model {
        provider: ProviderKind,
        model: String,
        message: String,
    },

    #[error("{provider}: connection: {message}")]
    Connection {
        provider: ProviderKind,
        model: String,
        message: String,
    },
}

impl EmbeddingError {
    /// Classify a reqwest transport failure. Timeouts and malformed
    /// responses are connection errors like any other transport fault.
    pub fn from_transport(provider: ProviderKind, model: &str, err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timed out".to_string()
        } else {
            err.to_string()
        };
        EmbeddingError::Connection {
            provider,
            model: model.to_string(),
            message,
        }
    }

    /// Classify a non-success HTTP status returned by a backend.
    pub fn from_status(
        provider: ProviderKind,
        model: &str,
        status: reqwest::StatusCode,
        retry_after: Option<u64>,
        body: String,
    ) -> Self {
        let model = model.to_string();
        match status.as_u16() {
            401 | 403 => EmbeddingError::Authentication {
                provider,
                model,
                message: body,
            },
            429 => EmbeddingError::RateLimit {
                provider,
                model,
                message: body,
                retry_after,
            },
            404 => EmbeddingError::Model {
                provider,
                model,
                message: body,
            },
            _ => EmbeddingError::Connection {
                provider,
                model,
                message: format!("{status}: {body}"),
            },
        }
    }
}

/// Static catalogue entry for a model an embedder serves.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: &'static str,
    pub dimensions: usize,
    pub max_input_tokens: usize,
    /// USD per input token. Zero for local runtimes.
    pub price_per_token: f64,
}

/// Token accounting for backends that report it.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

/// A successfully generated embedding.
#[derive(Debug, Clone)]
pub struct EmbeddingOutput {
    pub embedding: Vec<f32>,
    /// The model that actually ran, after resolution. This is the
    /// canonical `model_name` for persistence.
    pub model: String,
    pub provider: ProviderKind,
    pub dimensions: usize,
    pub usage: Option<TokenUsage>,
}

/// Operations related to embeddings and their models.
#[async_trait::async_trait]
pub trait Embedder {
    /// Return the embedder's type tag.
    fn kind(&self) -> ProviderKind;

    /// The endpoint this embedder talks to. Identifies the logical
    /// backend together with [kind][Self::kind].
    fn base_url(&self) -> String;

    /// The model used when the request does not name one. Configured
    /// per provider, falling back to a hard-coded per-kind constant.
    fn default_model(&self) -> String;

    /// List the models this embedder serves. The catalogue is static
    /// per provider type.
    fn list_models(&self) -> Vec<ModelInfo>;

    fn model_info(&self, model: &str) -> Option<ModelInfo> {
        self.list_models().into_iter().find(|m| m.name == model)
    }

    fn is_model_available(&self, model: &str) -> bool {
        self.model_info(model).is_some()
    }

    /// Resolve the effective model for a request: the requested name
    /// wins, otherwise the configured default. Unknown names are a
    /// model error.
    fn resolve_model(&self, requested: Option<&str>) -> Result<String, EmbeddingError> {
        let model = match requested {
            Some(m) => m.to_string(),
            None => self.default_model(),
        };
        if !self.is_model_available(&model) {
            return Err(EmbeddingError::Model {
                provider: self.kind(),
                model,
                message: "not served by this provider".to_string(),
            });
        }
        Ok(model)
    }

    /// Get the vector for `text`. The resolved model name is echoed
    /// in the output.
    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<EmbeddingOutput, EmbeddingError>;
}
