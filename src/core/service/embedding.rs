use crate::core::model::embedding::{
    Embedding, EmbeddingInsert, EmbeddingListParams, SaveOutcome, SimilaritySearch,
};
use crate::core::model::provider::task_types_for;
use crate::core::model::Paginated;
use crate::core::provider::ProviderState;
use crate::core::repo::{embedding::EmbeddingRepo, model::ModelRepo, Atomic};
use crate::error::EesError;
use crate::{err, map_err};
use dto::*;
use std::time::Instant;
use tracing::{info, warn};
use validify::{Validate, Validify};

const DEFAULT_SEARCH_LIMIT: u32 = 10;
const DEFAULT_MIGRATION_BATCH: u32 = 100;

/// High level operations composing the embedding provider with the
/// repository: creation, batching, search, model migration and
/// compatibility checks.
#[derive(Clone)]
pub struct EmbeddingService<Repo> {
    repo: Repo,
    providers: ProviderState,
}

impl<R> EmbeddingService<R> {
    pub fn new(repo: R, providers: ProviderState) -> Self {
        Self { repo, providers }
    }
}

impl<Repo> EmbeddingService<Repo>
where
    Repo: EmbeddingRepo + ModelRepo + Atomic + Send + Sync,
    Repo::Tx: Send + Sync,
{
    /// Embed `text` and persist it under `uri`, recording the model the
    /// provider actually ran so fallbacks are recorded truthfully.
    pub async fn create_embedding(
        &self,
        mut payload: CreateEmbeddingPayload,
    ) -> Result<CreateEmbeddingResponse, EesError> {
        map_err!(payload.validify());

        let task_type = payload
            .task_types
            .as_ref()
            .and_then(|t| t.first())
            .map(String::as_str);

        let (outcome, model_name) = self
            .embed_and_save(
                &payload.uri,
                &payload.text,
                payload.model_name.as_deref(),
                task_type,
            )
            .await?;

        Ok(CreateEmbeddingResponse {
            id: outcome.id,
            uri: payload.uri,
            model_name,
            message: "Embedding created successfully".to_string(),
        })
    }

    /// The atomic unit shared by single creation, batching and sync:
    /// one provider call followed by one upsert.
    pub async fn embed_and_save(
        &self,
        uri: &str,
        text: &str,
        model_name: Option<&str>,
        task_type: Option<&str>,
    ) -> Result<(SaveOutcome, String), EesError> {
        let embedder = self.providers.embedding.default_provider();
        let output = map_err!(embedder.embed(text, model_name).await);

        let insert = EmbeddingInsert::new(uri, text, &output.model, &output.embedding)
            .with_task_type(task_type);

        let outcome = self.repo.save(insert).await?;

        Ok((outcome, output.model))
    }

    /// Embed a batch of items. Each item is an isolated failure scope;
    /// results come back in input order.
    pub async fn create_batch_embeddings(
        &self,
        payload: BatchEmbeddingPayload,
    ) -> Result<BatchEmbeddingResponse, EesError> {
        map_err!(payload.validate());

        let model_name = payload.model_name.as_deref();
        let mut results = Vec::with_capacity(payload.texts.len());

        for item in &payload.texts {
            let result = self.embed_batch_item(item, model_name).await;
            results.push(match result {
                Ok((outcome, model)) => BatchItemResult {
                    uri: item.uri.clone(),
                    status: BatchItemStatus::Success,
                    id: Some(outcome.id),
                    model_name: Some(model),
                    error: None,
                },
                Err(e) => {
                    warn!("Batch item '{}' failed: {e}", item.uri);
                    BatchItemResult {
                        uri: item.uri.clone(),
                        status: BatchItemStatus::Error,
                        id: None,
                        model_name: None,
                        error: Some(e),
                    }
                }
            });
        }

        let total = results.len();
        let successful = results
            .iter()
            .filter(|r| matches!(r.status, BatchItemStatus::Success))
            .count();

        debug_assert_eq!(total, payload.texts.len());

        Ok(BatchEmbeddingResponse {
            failed: total - successful,
            total,
            successful,
            results,
        })
    }

    // Item shape problems and provider/repository failures alike are
    // reported per item, never as a request level failure.
    async fn embed_batch_item(
        &self,
        item: &BatchItem,
        model_name: Option<&str>,
    ) -> Result<(SaveOutcome, String), String> {
        if item.uri.trim().is_empty() {
            return Err("uri must not be empty".to_string());
        }
        if item.text.is_empty() {
            return Err("text must not be empty".to_string());
        }

        self.embed_and_save(&item.uri, &item.text, model_name, None)
            .await
            .map_err(|e| e.to_string())
    }

    /// Query the corpus (semantic search). The query is embedded with
    /// the same resolved model as the corpus rows it is matched against.
    pub async fn search_embeddings(
        &self,
        mut payload: SearchPayload,
    ) -> Result<SearchResponse, EesError> {
        map_err!(payload.validify());

        let embedder = self.providers.embedding.default_provider();
        let output = map_err!(
            embedder
                .embed(&payload.query, payload.model_name.as_deref())
                .await
        );

        let metric = payload.metric.unwrap_or_default();
        let limit = payload
            .limit
            .unwrap_or(DEFAULT_SEARCH_LIMIT)
            .clamp(1, crate::core::model::MAX_PAGE_LIMIT);

        let results = self
            .repo
            .search_similar(SimilaritySearch {
                query_vector: &output.embedding,
                model_name: &output.model,
                limit,
                threshold: payload.threshold,
                metric,
            })
            .await?;

        Ok(SearchResponse {
            query: payload.query,
            model_name: output.model,
            metric,
            count: results.len(),
            threshold: payload.threshold,
            results,
        })
    }

    pub async fn get_embedding(
        &self,
        uri: &str,
        model_name: Option<&str>,
    ) -> Result<Embedding, EesError> {
        let model = match model_name {
            Some(m) => m.to_string(),
            None => {
                let embedder = self.providers.embedding.default_provider();
                map_err!(embedder.resolve_model(None))
            }
        };

        match self.repo.find_by_uri(uri, &model).await? {
            Some(embedding) => Ok(embedding),
            None => err!(DoesNotExist, "Embedding '{uri}' for model '{model}'"),
        }
    }

    pub async fn list_embeddings(
        &self,
        params: EmbeddingListParams<'_>,
    ) -> Result<Paginated<Embedding>, EesError> {
        self.repo.list(params).await
    }

    pub async fn delete_embedding(&self, id: i64) -> Result<(), EesError> {
        if !self.repo.delete_by_id(id).await? {
            return err!(DoesNotExist, "Embedding with ID '{id}'");
        }
        Ok(())
    }

    /// Re-embed every row tagged `from_model` with `to_model`.
    ///
    /// With `preserve_original` the new vectors land under a derived
    /// URI (`{uri}::{to_model}`); otherwise rows are rewritten in
    /// place. A failure aborts the run unless `continue_on_error` is
    /// set, in which case the row is reported and the run goes on.
    pub async fn migrate_embeddings(
        &self,
        payload: MigrationPayload,
    ) -> Result<MigrationSummary, EesError> {
        map_err!(payload.validate());

        let options = payload.options.unwrap_or_default();
        let preserve_original = options.preserve_original.unwrap_or(false);
        let batch_size = options.batch_size.unwrap_or(DEFAULT_MIGRATION_BATCH);
        let continue_on_error = options.continue_on_error.unwrap_or(false);

        let embedder = self.providers.embedding.default_provider();
        let to_model = map_err!(embedder.resolve_model(Some(&payload.to_model)));

        let started = Instant::now();

        // Snapshot the candidate rows up front; in-place rewrites
        // remove rows from the source model's result set as they go.
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let batch = self
                .repo
                .list_by_model(&payload.from_model, batch_size, offset)
                .await?;
            let fetched = batch.len() as u32;
            rows.extend(
                batch
                    .into_iter()
                    .map(|e| (e.id, e.uri, e.text)),
            );
            if fetched < batch_size {
                break;
            }
            offset += fetched;
        }

        info!(
            "Migrating {} embedding(s) from '{}' to '{to_model}'",
            rows.len(),
            payload.from_model
        );

        let mut details = Vec::with_capacity(rows.len());
        let mut successful = 0usize;
        let mut failed = 0usize;
        let mut aborted = false;

        for (id, uri, text) in &rows {
            if aborted {
                details.push(MigrationDetail {
                    id: *id,
                    uri: uri.clone(),
                    status: MigrationItemStatus::NotAttempted,
                    error: None,
                });
                continue;
            }

            match self
                .migrate_row(*id, uri, text, &to_model, preserve_original)
                .await
            {
                Ok(()) => {
                    successful += 1;
                    details.push(MigrationDetail {
                        id: *id,
                        uri: uri.clone(),
                        status: MigrationItemStatus::Success,
                        error: None,
                    });
                }
                Err(e) => {
                    failed += 1;
                    warn!("Migration of '{uri}' failed: {e}");
                    details.push(MigrationDetail {
                        id: *id,
                        uri: uri.clone(),
                        status: MigrationItemStatus::Failed,
                        error: Some(e.to_string()),
                    });
                    if !continue_on_error {
                        aborted = true;
                    }
                }
            }
        }

        Ok(MigrationSummary {
            total_processed: successful + failed,
            successful,
            failed,
            duration_ms: started.elapsed().as_millis() as u64,
            details,
        })
    }

    async fn migrate_row(
        &self,
        id: i64,
        uri: &str,
        text: &str,
        to_model: &str,
        preserve_original: bool,
    ) -> Result<(), EesError> {
        let embedder = self.providers.embedding.default_provider();
        let output = map_err!(embedder.embed(text, Some(to_model)).await);

        if preserve_original {
            let derived_uri = format!("{uri}::{}", output.model);
            let insert = EmbeddingInsert::new(&derived_uri, text, &output.model, &output.embedding);
            self.repo.save(insert).await?;
        } else if !self
            .repo
            .replace_vector(id, &output.model, &output.embedding)
            .await?
        {
            return err!(DoesNotExist, "Embedding with ID '{id}'");
        }

        Ok(())
    }

    /// Whether vectors produced by `target_model` can stand in for
    /// `source_model`'s. Dimensions and registration are read from the
    /// model registry, never from the provider catalogue.
    pub async fn check_compatibility(
        &self,
        payload: CompatibilityPayload,
    ) -> Result<CompatibilityResponse, EesError> {
        map_err!(payload.validate());

        if payload.source_model == payload.target_model {
            return Ok(CompatibilityResponse {
                compatible: true,
                reason: None,
                similarity_score: Some(1.0),
            });
        }

        let Some(source) = self.repo.find_model_by_name(&payload.source_model).await? else {
            return err!(DoesNotExist, "Model '{}'", payload.source_model);
        };
        let Some(target) = self.repo.find_model_by_name(&payload.target_model).await? else {
            return err!(DoesNotExist, "Model '{}'", payload.target_model);
        };

        let response = match (source.dimensions(), target.dimensions()) {
            (Some(s), Some(t)) if s == t => CompatibilityResponse {
                compatible: true,
                reason: None,
                similarity_score: None,
            },
            (Some(s), Some(t)) => CompatibilityResponse {
                compatible: false,
                reason: Some(format!("dimension mismatch: {s} vs {t}")),
                similarity_score: None,
            },
            _ => CompatibilityResponse {
                compatible: false,
                reason: Some("dimensions not recorded in the model registry".to_string()),
                similarity_score: None,
            },
        };

        Ok(response)
    }

    /// The task type catalogue for the model's family. Models without
    /// task typing get an empty list.
    pub fn get_task_types(&self, model_name: &str) -> TaskTypesResponse {
        let task_types = task_types_for(model_name);
        TaskTypesResponse {
            model_name: model_name.to_string(),
            count: task_types.len(),
            task_types,
        }
    }
}

/// Embedding service DTOs.
pub mod dto {
    use crate::core::model::embedding::{SearchMatch, SimilarityMetric};
    use crate::core::model::provider::TaskType;
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;
    use validify::{schema_err, schema_validation, Validate, ValidationErrors, Validify};

    #[derive(Debug, Deserialize, Validify, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct CreateEmbeddingPayload {
        /// External identity of the document.
        #[validate(length(min = 1))]
        #[modify(trim)]
        pub uri: String,

        /// The content to embed.
        #[validate(length(min = 1))]
        pub text: String,

        /// Embedding model. The provider's default when absent.
        pub model_name: Option<String>,

        /// Provider task types; the first one is recorded on the row.
        pub task_types: Option<Vec<String>>,

        /// Display title. Accepted, not persisted.
        pub title: Option<String>,
    }

    #[derive(Debug, Deserialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct BatchItem {
        pub uri: String,
        pub text: String,
        pub title: Option<String>,
    }

    #[derive(Debug, Deserialize, Validate, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct BatchEmbeddingPayload {
        /// The items to embed. Item failures are isolated; an empty
        /// batch is a request error.
        #[validate(length(min = 1))]
        pub texts: Vec<BatchItem>,

        /// Model for the whole batch.
        pub model_name: Option<String>,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub enum BatchItemStatus {
        Success,
        Error,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct BatchItemResult {
        pub uri: String,
        pub status: BatchItemStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub id: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub model_name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct BatchEmbeddingResponse {
        pub results: Vec<BatchItemResult>,
        pub total: usize,
        pub successful: usize,
        pub failed: usize,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct CreateEmbeddingResponse {
        pub id: i64,
        pub uri: String,
        pub model_name: String,
        pub message: String,
    }

    /// Params for semantic search.
    #[derive(Debug, Deserialize, Validify, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct SearchPayload {
        /// The text to search by.
        #[validate(length(min = 1))]
        #[modify(trim)]
        pub query: String,

        /// Model to embed the query with. Must match the corpus rows
        /// being searched.
        pub model_name: Option<String>,

        /// Amount of results to return.
        pub limit: Option<u32>,

        /// Minimum similarity for a hit.
        pub threshold: Option<f64>,

        /// Distance metric. Cosine when absent.
        pub metric: Option<SimilarityMetric>,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct SearchResponse {
        pub query: String,
        pub model_name: String,
        pub metric: SimilarityMetric,
        pub count: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub threshold: Option<f64>,
        pub results: Vec<SearchMatch>,
    }

    #[derive(Debug, Default, Deserialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct MigrationOptions {
        /// Keep the source rows and write the new vectors under a
        /// derived URI.
        pub preserve_original: Option<bool>,

        /// Rows fetched per read batch, in [1, 1000].
        pub batch_size: Option<u32>,

        /// Keep going after a per-row failure.
        pub continue_on_error: Option<bool>,
    }

    #[derive(Debug, Deserialize, Validate, ToSchema)]
    #[serde(rename_all = "snake_case")]
    #[validate(Self::validate_schema)]
    pub struct MigrationPayload {
        #[validate(length(min = 1))]
        pub from_model: String,

        #[validate(length(min = 1))]
        pub to_model: String,

        pub options: Option<MigrationOptions>,
    }

    impl MigrationPayload {
        #[schema_validation]
        fn validate_schema(&self) -> Result<(), ValidationErrors> {
            if let Some(size) = self.options.as_ref().and_then(|o| o.batch_size) {
                if !(1..=1000).contains(&size) {
                    schema_err!("batch_size", "batch_size must be within [1, 1000]");
                }
            }
        }
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub enum MigrationItemStatus {
        Success,
        Failed,
        NotAttempted,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct MigrationDetail {
        pub id: i64,
        pub uri: String,
        pub status: MigrationItemStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct MigrationSummary {
        pub total_processed: usize,
        pub successful: usize,
        pub failed: usize,
        pub duration_ms: u64,
        pub details: Vec<MigrationDetail>,
    }

    #[derive(Debug, Deserialize, Validate, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct CompatibilityPayload {
        #[validate(length(min = 1))]
        pub source_model: String,

        #[validate(length(min = 1))]
        pub target_model: String,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct CompatibilityResponse {
        pub compatible: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub reason: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub similarity_score: Option<f64>,
    }

    #[derive(Debug, Serialize, ToSchema)]
    #[serde(rename_all = "snake_case")]
    pub struct TaskTypesResponse {
        pub model_name: String,
        pub task_types: Vec<TaskType>,
        pub count: usize,
    }
}
