use super::embedder::{
    cohere::{CohereEmbeddings, DEFAULT_COHERE_ENDPOINT},
    google::{GoogleEmbeddings, DEFAULT_GOOGLE_ENDPOINT},
    ollama::{OllamaEmbeddings, DEFAULT_OLLAMA_ENDPOINT},
    openai::{OpenAiEmbeddings, DEFAULT_OPENAI_ENDPOINT},
    EmbedderConfig,
};
use super::repo::sqlite::SqliteRepo;
use crate::core::embedder::ModelInfo;
use crate::core::model::provider::ProviderKind;
use crate::core::provider::{DynEmbedder, ProviderFactory, ProviderState};
use crate::core::repo::directory::DirectoryRepo;
use crate::core::service::{
    embedding::EmbeddingService, model::ModelService, sync::SyncService,
};
use crate::err;
use crate::error::EesError;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    /// ees services.
    pub services: ServiceState,

    /// Downstream service providers for ees services.
    /// Used for displaying some metadata and in tests.
    pub providers: AppProviderState,
}

impl AppState {
    /// Load the application state using the provided configuration.
    pub async fn new(args: &crate::config::StartArgs) -> Self {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from(args.log()))
            .init();

        let embedding = Arc::new(Self::init_embedding_providers(args));

        let default_model = embedding.default_provider().default_model();
        let dimensions = embedding
            .default_provider()
            .model_info(&default_model)
            .map(|m| m.dimensions)
            .expect("default model missing from the provider catalogue");

        let database = crate::app::repo::sqlite::init(&args.db_url(), dimensions)
            .await
            .expect("error while initializing database");

        let providers = AppProviderState {
            database: database.clone(),
            embedding,
        };

        let provider_state: ProviderState = providers.clone().into();

        let embedding_service = EmbeddingService::new(database.clone(), provider_state.clone());
        let model = ModelService::new(database.clone(), provider_state.clone());
        let sync = SyncService::new(database.clone(), embedding_service.clone());

        model
            .ensure_default_registry()
            .await
            .expect("error while seeding the model registry");

        Self::recover_stale_jobs(&database).await;

        Self {
            services: ServiceState {
                embedding: embedding_service,
                model,
                sync,
            },
            providers,
        }
    }

    fn init_embedding_providers(args: &crate::config::StartArgs) -> EmbeddingProvider {
        let mut provider = EmbeddingProvider::new(args.default_provider());
        let timeout = args.provider_timeout();

        let config = |kind: ProviderKind, default_endpoint: &str| {
            EmbedderConfig::new(
                args.base_url(kind)
                    .unwrap_or_else(|| default_endpoint.to_string()),
            )
            .with_api_key(args.api_key(kind))
            .with_default_model(args.default_model(kind))
            .with_timeout(timeout)
        };

        provider.register(Arc::new(OllamaEmbeddings::new(config(
            ProviderKind::Ollama,
            DEFAULT_OLLAMA_ENDPOINT,
        ))));
        provider.register(Arc::new(OpenAiEmbeddings::new(config(
            ProviderKind::OpenAi,
            DEFAULT_OPENAI_ENDPOINT,
        ))));
        provider.register(Arc::new(CohereEmbeddings::new(config(
            ProviderKind::Cohere,
            DEFAULT_COHERE_ENDPOINT,
        ))));
        provider.register(Arc::new(GoogleEmbeddings::new(config(
            ProviderKind::Google,
            DEFAULT_GOOGLE_ENDPOINT,
        ))));

        provider
    }

    /// Jobs left `running` by a previous process cannot make progress;
    /// cancel them so new syncs are accepted.
    async fn recover_stale_jobs(database: &SqliteRepo) {
        let directories = match database.list_directories().await {
            Ok(directories) => directories,
            Err(e) => {
                warn!("Failed to list directories during job recovery: {e}");
                return;
            }
        };

        for directory in directories {
            match database.cancel_incomplete_jobs(directory.id).await {
                Ok(0) => {}
                Ok(n) => info!(
                    "Cancelled {n} stale sync job(s) for directory '{}'",
                    directory.name
                ),
                Err(e) => warn!(
                    "Failed to cancel stale sync jobs for directory '{}': {e}",
                    directory.name
                ),
            }
        }
    }

    /// Used for metadata display.
    pub fn get_configuration(&self) -> AppConfig {
        let mut embedding_providers = HashMap::new();

        for kind in self.providers.embedding.list_provider_kinds() {
            if let Ok(embedder) = self.providers.embedding.get_provider(kind) {
                embedding_providers.insert(kind.to_string(), embedder.list_models());
            }
        }

        AppConfig {
            default_provider: self.providers.embedding.default_kind(),
            embedding_providers,
        }
    }

    #[cfg(test)]
    pub fn new_test(services: ServiceState, providers: AppProviderState) -> Self {
        Self {
            services,
            providers,
        }
    }
}

/// Concrete version of [ProviderState].
#[derive(Clone)]
pub struct AppProviderState {
    pub database: SqliteRepo,
    pub embedding: Arc<EmbeddingProvider>,
}

impl From<AppProviderState> for ProviderState {
    fn from(value: AppProviderState) -> ProviderState {
        ProviderState {
            embedding: value.embedding,
        }
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub embedding: EmbeddingService<SqliteRepo>,
    pub model: ModelService<SqliteRepo>,
    pub sync: SyncService<SqliteRepo>,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// The backend requests are routed to.
    pub default_provider: ProviderKind,

    /// A map of available embedding backends and their catalogues.
    pub embedding_providers: HashMap<String, Vec<ModelInfo>>,
}

/// Registry of embedding clients, one per backend type.
#[derive(Clone)]
pub struct EmbeddingProvider {
    providers: HashMap<ProviderKind, DynEmbedder>,
    default: ProviderKind,
}

impl EmbeddingProvider {
    pub fn new(default: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            default,
        }
    }

    pub fn register(&mut self, embedder: DynEmbedder) {
        self.providers.insert(embedder.kind(), embedder);
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default
    }
}

impl ProviderFactory for EmbeddingProvider {
    fn get_provider(&self, kind: ProviderKind) -> Result<DynEmbedder, EesError> {
        match self.providers.get(&kind).cloned() {
            Some(embedder) => Ok(embedder),
            None => err!(InvalidProvider, "{kind}"),
        }
    }

    fn default_provider(&self) -> DynEmbedder {
        self.providers
            .get(&self.default)
            .cloned()
            .expect("default provider is always registered")
    }

    fn list_provider_kinds(&self) -> Vec<ProviderKind> {
        self.providers.keys().copied().collect()
    }
}
