use crate::core::model::{
    embedding::{
        Embedding, EmbeddingInsert, EmbeddingListParams, SaveOutcome, SearchMatch,
        SimilaritySearch,
    },
    Paginated,
};
use crate::error::EesError;

/// Persistence operations for the `embeddings` table.
#[async_trait::async_trait]
pub trait EmbeddingRepo {
    /// Upsert on `uri`. An existing row has its text, model, vector and
    /// conversion columns replaced and `updated_at` advanced; `created_at`
    /// is left alone.
    async fn save(&self, insert: EmbeddingInsert<'_>) -> Result<SaveOutcome, EesError>;

    /// Exact match on both columns.
    async fn find_by_uri(
        &self,
        uri: &str,
        model_name: &str,
    ) -> Result<Option<Embedding>, EesError>;

    /// Substring filter on `uri`, exact on `model_name`, ordered by
    /// `created_at` ascending. Rows whose stored vector cannot be
    /// decoded are skipped.
    async fn list(&self, params: EmbeddingListParams<'_>) -> Result<Paginated<Embedding>, EesError>;

    /// Returns true when a row was removed.
    async fn delete_by_id(&self, id: i64) -> Result<bool, EesError>;

    /// Rewrites text and vector, advancing `updated_at`.
    async fn update_by_id(&self, id: i64, text: &str, vector: &[f32]) -> Result<bool, EesError>;

    /// Top-K similarity search. See the sqlite implementation for the
    /// two SQL shapes.
    async fn search_similar(
        &self,
        search: SimilaritySearch<'_>,
    ) -> Result<Vec<SearchMatch>, EesError>;

    /// Rows tagged with the given model.
    async fn count_by_model(&self, model_name: &str) -> Result<usize, EesError>;

    /// A batch of rows tagged with the given model, ordered by id.
    async fn list_by_model(
        &self,
        model_name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Embedding>, EesError>;

    /// In-place model migration step: rewrite the row's vector and
    /// model tag, advancing `updated_at`.
    async fn replace_vector(
        &self,
        id: i64,
        model_name: &str,
        vector: &[f32],
    ) -> Result<bool, EesError>;
}
