use super::{ensure_success, http_client, EmbedderConfig};
use crate::core::embedder::{Embedder, EmbeddingError, EmbeddingOutput, ModelInfo};
use crate::core::model::provider::ProviderKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_GOOGLE_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

const TEXT_EMBEDDING_004: &str = "text-embedding-004";
const EMBEDDING_001: &str = "embedding-001";
const GEMINI_EMBEDDING_001: &str = "gemini-embedding-001";

pub struct GoogleEmbeddings {
    config: EmbedderConfig,
    client: reqwest::Client,
}

impl GoogleEmbeddings {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for GoogleEmbeddings {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .unwrap_or_else(|| TEXT_EMBEDDING_004.to_string())
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: TEXT_EMBEDDING_004,
                dimensions: 768,
                max_input_tokens: 2048,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: EMBEDDING_001,
                dimensions: 768,
                max_input_tokens: 2048,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: GEMINI_EMBEDDING_001,
                dimensions: 3072,
                max_input_tokens: 2048,
                price_per_token: 0.000_000_15,
            },
        ]
    }

    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<EmbeddingOutput, EmbeddingError> {
        let model = self.resolve_model(model)?;

        let request = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let url = format!(
            "{}/v1beta/models/{model}:embedContent?key={}",
            self.config.base_url,
            self.config.api_key.as_deref().unwrap_or_default()
        );

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let response = ensure_success(self.kind(), &model, response).await?;

        let body: EmbedContentResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        Ok(EmbeddingOutput {
            dimensions: body.embedding.values.len(),
            embedding: body.embedding.values,
            model,
            provider: self.kind(),
            usage: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedContentRequest {
    model: String,
    content: Content,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Debug, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}
