//! Test suites and utilities.

mod embedding;
mod sync;

use super::repo::sqlite::SqliteRepo;
use super::state::{AppProviderState, AppState, EmbeddingProvider, ServiceState};
use crate::core::embedder::{Embedder, EmbeddingError, EmbeddingOutput, ModelInfo};
use crate::core::model::provider::ProviderKind;
use crate::core::provider::ProviderState;
use crate::core::service::{
    embedding::EmbeddingService, model::ModelService, sync::SyncService,
};
use std::sync::Arc;

/// Width of the vectors the mock embedder produces, and of the test
/// database's vector column.
pub const MOCK_DIMENSIONS: usize = 4;

pub const MOCK_MODEL: &str = "test-embedder";
pub const MOCK_MODEL_ALT: &str = "test-embedder-alt";
pub const MOCK_MODEL_WIDE: &str = "test-embedder-wide";

pub struct TestState {
    pub app: AppState,
}

impl TestState {
    pub async fn init() -> Self {
        let mut provider = EmbeddingProvider::new(ProviderKind::Ollama);
        provider.register(Arc::new(MockEmbedder));
        let embedding = Arc::new(provider);

        let database = crate::app::repo::sqlite::init(":memory:", MOCK_DIMENSIONS)
            .await
            .expect("in-memory database init");

        let providers = AppProviderState {
            database: database.clone(),
            embedding,
        };

        let provider_state: ProviderState = providers.clone().into();

        let embedding_service = EmbeddingService::new(database.clone(), provider_state.clone());
        let model = ModelService::new(database.clone(), provider_state.clone());
        let sync = SyncService::new(database, embedding_service.clone());

        model
            .ensure_default_registry()
            .await
            .expect("registry seeding");

        let services = ServiceState {
            embedding: embedding_service,
            model,
            sync,
        };

        TestState {
            app: AppState::new_test(services, providers),
        }
    }

    pub fn repo(&self) -> &SqliteRepo {
        &self.app.providers.database
    }
}

/// Deterministic in-process embedder. Identical text always produces
/// the identical unit vector, so cosine similarity of a verbatim match
/// is 1.
pub struct MockEmbedder;

#[async_trait::async_trait]
impl Embedder for MockEmbedder {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn base_url(&self) -> String {
        "http://mock.localhost".to_string()
    }

    fn default_model(&self) -> String {
        MOCK_MODEL.to_string()
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![
            ModelInfo {
                name: MOCK_MODEL,
                dimensions: MOCK_DIMENSIONS,
                max_input_tokens: 8192,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: MOCK_MODEL_ALT,
                dimensions: MOCK_DIMENSIONS,
                max_input_tokens: 8192,
                price_per_token: 0.0,
            },
            ModelInfo {
                name: MOCK_MODEL_WIDE,
                dimensions: MOCK_DIMENSIONS * 2,
                max_input_tokens: 8192,
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

        Ok(EmbeddingOutput {
            embedding: vector_for(text, MOCK_DIMENSIONS),
            model,
            provider: self.kind(),
            dimensions: MOCK_DIMENSIONS,
            usage: None,
        })
    }
}

/// Stable pseudo-random unit vector derived from the text.
pub fn vector_for(text: &str, dimensions: usize) -> Vec<f32> {
    let mut state = 0xcbf2_9ce4_8422_2325u64;
    for byte in text.bytes() {
        state ^= u64::from(byte);
        state = state.wrapping_mul(0x0000_0100_0000_01b3);
    }

    let mut vector = Vec::with_capacity(dimensions);
    for i in 0..dimensions {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407 + i as u64);
        let unit = (state >> 33) as f32 / (u32::MAX >> 1) as f32;
        vector.push(unit - 1.0);
    }

    let norm = vector
        .iter()
        .map(|x| x * x)
        .sum::<f32>()
        .sqrt()
        .max(f32::EPSILON);
    vector.iter_mut().for_each(|x| *x /= norm);

    vector
}

mod mock_tests {
    use super::*;

    #[test]
    fn identical_text_yields_identical_unit_vector() {
        let a = vector_for("hello world", MOCK_DIMENSIONS);
        let b = vector_for("hello world", MOCK_DIMENSIONS);
        assert_eq!(a, b);

        let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn different_text_yields_different_vectors() {
        assert_ne!(
            vector_for("hello", MOCK_DIMENSIONS),
            vector_for("goodbye", MOCK_DIMENSIONS)
        );
    }
}
