//! Embedder implementation for a local Ollama runtime. Keyless and
//! free; the catalogue prices are zero.

use super::{ensure_success, http_client, EmbedderConfig};
use crate::core::embedder::{Embedder, EmbeddingError, EmbeddingOutput, ModelInfo};
use crate::core::model::provider::ProviderKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_ENDPOINT: &str = "http://localhost:11434";

const NOMIC_EMBED_TEXT: &str = "nomic-embed-text";
const MXBAI_EMBED_LARGE: &str = "mxbai-embed-large";
const ALL_MINILM: &str = "all-minilm";
const SNOWFLAKE_ARCTIC_EMBED: &str = "snowflake-arctic-embed";

pub struct OllamaEmbeddings {
    config: EmbedderConfig,
    client: reqwest::Client,
}

impl OllamaEmbeddings {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for OllamaEmbeddings {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .unwrap_or_else(|| NOMIC_EMBED_TEXT.to_string())
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: NOMIC_EMBED_TEXT,
                dimensions: 768,
                max_input_tokens: 8192,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: MXBAI_EMBED_LARGE,
                dimensions: 1024,
                max_input_tokens: 512,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: ALL_MINILM,
                dimensions: 384,
                max_input_tokens: 512,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: SNOWFLAKE_ARCTIC_EMBED,
                dimensions: 1024,
                max_input_tokens: 512,
                price_per_token: 0.0,
            },
        ]
    }

    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<EmbeddingOutput, EmbeddingError> {
        let model = self.resolve_model(model)?;

        let request = EmbedRequest {
            model: model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/api/embeddings", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let response = ensure_success(self.kind(), &model, response).await?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        Ok(EmbeddingOutput {
            dimensions: body.embedding.len(),
            embedding: body.embedding,
            model,
            provider: self.kind(),
            usage: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}
