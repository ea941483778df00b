use super::{ensure_success, http_client, EmbedderConfig};
use crate::core::embedder::{
    Embedder, EmbeddingError, EmbeddingOutput, ModelInfo, TokenUsage,
};
use crate::core::model::provider::ProviderKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com";

const TEXT_EMBEDDING_3_SMALL: &str = "text-embedding-3-small";
const TEXT_EMBEDDING_3_LARGE: &str = "text-embedding-3-large";
const TEXT_EMBEDDING_ADA_002: &str = "text-embedding-ada-002";

pub struct OpenAiEmbeddings {
    config: EmbedderConfig,
    client: reqwest::Client,
}

impl OpenAiEmbeddings {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for OpenAiEmbeddings {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .unwrap_or_else(|| TEXT_EMBEDDING_3_SMALL.to_string())
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: TEXT_EMBEDDING_3_SMALL,
                dimensions: 1536,
                max_input_tokens: 8191,
                price_per_token: 0.000_000_02,
            },
            ModelInfo {
                name: TEXT_EMBEDDING_3_LARGE,
                dimensions: 3072,
                max_input_tokens: 8191,
                price_per_token: 0.000_000_13,
            },
            ModelInfo {
                name: TEXT_EMBEDDING_ADA_002,
                dimensions: 1536,
                max_input_tokens: 8191,
                price_per_token: 0.000_000_1,
            },
        ]
    }

    async fn embed(
        &self,
        text: &str,
        model: Option<&str>,
    ) -> Result<EmbeddingOutput, EmbeddingError> {
        let model = self.resolve_model(model)?;

        let request = EmbeddingRequest {
            model: model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.config.base_url))
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let response = ensure_success(self.kind(), &model, response).await?;

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let Some(object) = body.data.into_iter().next() else {
            return Err(EmbeddingError::Connection {
                provider: self.kind(),
                model,
                message: "response contained no embedding".to_string(),
            });
        };

        debug!(
            "Embedded with '{model}', used tokens {}-{} (prompt-total)",
            body.usage.prompt_tokens, body.usage.total_tokens
        );

        Ok(EmbeddingOutput {
            dimensions: object.embedding.len(),
            embedding: object.embedding,
            model,
            provider: self.kind(),
            usage: Some(TokenUsage {
                prompt_tokens: body.usage.prompt_tokens,
                total_tokens: body.usage.total_tokens,
            }),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingObject>,
    model: String,
    usage: Usage,
}

#[allow(dead_code)]
#[derive(Debug, Deserialize)]
struct EmbeddingObject {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: usize,
    total_tokens: usize,
}
