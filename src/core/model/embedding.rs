use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Main model for the `embeddings` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Embedding {
    /// Primary key.
    pub id: i64,

    /// External identity. Unique.
    pub uri: String,

    /// The content the vector was produced from, post conversion
    /// if a format conversion took place.
    pub text: String,

    /// The model that produced the vector.
    pub model_name: String,

    /// Provider task type the vector was produced with, when the
    /// provider distinguishes tasks.
    pub task_type: Option<String>,

    /// The vector. Width is fixed per model.
    pub embedding: Vec<f32>,

    /// Pre-conversion content, when a conversion preceded embedding.
    pub original_content: Option<String>,

    /// The format the content was converted to, e.g. `markdown`.
    pub converted_format: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert/upsert payload for `embeddings`.
#[derive(Debug, Clone)]
pub struct EmbeddingInsert<'a> {
    pub uri: &'a str,
    pub text: &'a str,
    pub model_name: &'a str,
    pub task_type: Option<&'a str>,
    pub vector: &'a [f32],
    pub original_content: Option<&'a str>,
    pub converted_format: Option<&'a str>,
}

impl<'a> EmbeddingInsert<'a> {
    pub fn new(uri: &'a str, text: &'a str, model_name: &'a str, vector: &'a [f32]) -> Self {
        Self {
            uri,
            text,
            model_name,
            task_type: None,
            vector,
            original_content: None,
            converted_format: None,
        }
    }

    pub fn with_task_type(mut self, task_type: Option<&'a str>) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_conversion(
        mut self,
        original_content: Option<&'a str>,
        converted_format: Option<&'a str>,
    ) -> Self {
        self.original_content = original_content;
        self.converted_format = converted_format;
        self
    }
}

/// What `save` did with the row.
#[derive(Debug, Clone, Copy)]
pub struct SaveOutcome {
    pub id: i64,
    /// True when a new row was inserted, false when an existing
    /// row was replaced.
    pub created: bool,
}

/// Distance metric for similarity search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SimilarityMetric::Cosine => "cosine",
            SimilarityMetric::Euclidean => "euclidean",
            SimilarityMetric::DotProduct => "dot_product",
        };
        write!(f, "{s}")
    }
}

/// Repository level similarity search parameters.
#[derive(Debug)]
pub struct SimilaritySearch<'a> {
    pub query_vector: &'a [f32],
    pub model_name: &'a str,
    pub limit: u32,
    pub threshold: Option<f64>,
    pub metric: SimilarityMetric,
}

/// A single similarity search hit.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub id: i64,
    pub uri: String,
    pub text: String,
    pub model_name: String,
    pub similarity: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for listing embeddings.
#[derive(Debug, Default, Clone)]
pub struct EmbeddingListParams<'a> {
    /// Substring filter on the URI.
    pub uri: Option<&'a str>,

    /// Exact model name filter.
    pub model_name: Option<&'a str>,

    pub pagination: crate::core::model::Pagination,
}
