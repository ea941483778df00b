//! Http specific DTOs.

use crate::core::model::Pagination;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "snake_case")]
pub(super) struct ListEmbeddingsPayload {
    /// Page number, starting from 1.
    pub page: Option<u32>,

    /// Page size, clamped to [1, 100].
    pub limit: Option<u32>,

    /// Substring filter on the URI.
    pub uri: Option<String>,

    /// Exact model name filter.
    pub model_name: Option<String>,
}

impl ListEmbeddingsPayload {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[serde(rename_all = "snake_case")]
pub(super) struct GetEmbeddingParams {
    /// Model the row was embedded with. The default provider's
    /// resolved model when absent.
    pub model_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub(super) struct TaskTypesParams {
    /// Model name to look up task types for.
    pub model: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(super) struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(super) struct CancelledResponse {
    /// Number of jobs flipped to `cancelled`.
    pub cancelled: u64,
}
