use super::{ensure_success, http_client, EmbedderConfig};
use crate::core::embedder::{
    Embedder, EmbeddingError, EmbeddingOutput, ModelInfo, TokenUsage,
};
use crate::core::model::provider::ProviderKind;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COHERE_ENDPOINT: &str = "https://api.cohere.ai";

const EMBED_ENGLISH_V3: &str = "embed-english-v3.0";
const EMBED_MULTILINGUAL_V3: &str = "embed-multilingual-v3.0";
const EMBED_ENGLISH_LIGHT_V3: &str = "embed-english-light-v3.0";

/// Cohere requires an input type per request; documents are the
/// sensible default for an ingestion service.
const INPUT_TYPE: &str = "search_document";

pub struct CohereEmbeddings {
    config: EmbedderConfig,
    client: reqwest::Client,
}

impl CohereEmbeddings {
    pub fn new(config: EmbedderConfig) -> Self {
        Self {
            client: http_client(config.timeout),
            config,
        }
    }
}

#[async_trait::async_trait]
impl Embedder for CohereEmbeddings {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Cohere
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone()
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .unwrap_or_else(|| EMBED_ENGLISH_V3.to_string())
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: EMBED_ENGLISH_V3,
                dimensions: 1024,
                max_input_tokens: 512,
                price_per_token: 0.000_000_1,
            },
            ModelInfo {
                name: EMBED_MULTILINGUAL_V3,
                dimensions: 1024,
                max_input_tokens: 512,
                price_per_token: 0.000_000_1,
            },
            ModelInfo {
                name: EMBED_ENGLISH_LIGHT_V3,
                dimensions: 384,
                max_input_tokens: 512,
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

        let request = EmbedRequest {
            model: model.clone(),
            texts: vec![text.to_string()],
            input_type: INPUT_TYPE,
        };

        let response = self
            .client
            .post(format!("{}/v1/embed", self.config.base_url))
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let response = ensure_success(self.kind(), &model, response).await?;

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::from_transport(self.kind(), &model, e))?;

        let Some(embedding) = body.embeddings.into_iter().next() else {
            return Err(EmbeddingError::Connection {
                provider: self.kind(),
                model,
                message: "response contained no embedding".to_string(),
            });
        };

        let usage = body
            .meta
            .and_then(|m| m.billed_units)
            .map(|b| TokenUsage {
                prompt_tokens: b.input_tokens,
                total_tokens: b.input_tokens,
            });

        Ok(EmbeddingOutput {
            dimensions: embedding.len(),
            embedding,
            model,
            provider: self.kind(),
            usage,
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    texts: Vec<String>,
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize)]
struct BilledUnits {
    input_tokens: usize,
}
