use crate::app::server::dto::{
    GetEmbeddingParams, ListEmbeddingsPayload, MessageResponse, TaskTypesParams,
};
use crate::app::state::ServiceState;
use crate::core::model::embedding::{Embedding, EmbeddingListParams};
use crate::core::model::Paginated;
use crate::core::service::embedding::dto::{
    BatchEmbeddingPayload, BatchEmbeddingResponse, CompatibilityPayload, CompatibilityResponse,
    CreateEmbeddingPayload, CreateEmbeddingResponse, MigrationPayload, MigrationSummary,
    SearchPayload, SearchResponse, TaskTypesResponse,
};
use crate::error::EesError;
use crate::map_err;
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};

#[utoipa::path(
    post,
    path = "/embeddings",
    responses(
        (status = 200, description = "Embedding created", body = CreateEmbeddingResponse),
        (status = 400, description = "Invalid payload"),
        (status = 500, description = "Provider or database error")
    ),
    request_body = CreateEmbeddingPayload
)]
pub(super) async fn create_embedding(
    services: State<ServiceState>,
    Json(payload): Json<CreateEmbeddingPayload>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.embedding.create_embedding(payload).await?))
}

#[utoipa::path(
    post,
    path = "/embeddings/batch",
    responses(
        (status = 200, description = "Batch processed", body = BatchEmbeddingResponse),
        (status = 400, description = "Empty batch or malformed payload")
    ),
    request_body = BatchEmbeddingPayload
)]
pub(super) async fn batch_embed(
    services: State<ServiceState>,
    Json(payload): Json<BatchEmbeddingPayload>,
) -> Result<Json<BatchEmbeddingResponse>, EesError> {
    Ok(Json(
        services.embedding.create_batch_embeddings(payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/embeddings",
    responses(
        (status = 200, description = "Paginated embeddings", body = inline(Paginated<Embedding>)),
        (status = 500, description = "Internal server error")
    ),
    params(ListEmbeddingsPayload)
)]
pub(super) async fn list_embeddings(
    services: State<ServiceState>,
    Query(payload): Query<ListEmbeddingsPayload>,
) -> Result<impl IntoResponse, EesError> {
    let params = EmbeddingListParams {
        uri: payload.uri.as_deref(),
        model_name: payload.model_name.as_deref(),
        pagination: payload.pagination(),
    };

    Ok(Json(services.embedding.list_embeddings(params).await?))
}

#[utoipa::path(
    get,
    path = "/embeddings/{uri}",
    responses(
        (status = 200, description = "The embedding row", body = Embedding),
        (status = 404, description = "No row for the URI")
    ),
    params(
        ("uri" = String, Path, description = "Embedding URI"),
        GetEmbeddingParams
    )
)]
pub(super) async fn get_embedding(
    services: State<ServiceState>,
    Path(uri): Path<String>,
    Query(params): Query<GetEmbeddingParams>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(
        services
            .embedding
            .get_embedding(&uri, params.model_name.as_deref())
            .await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/embeddings/{id}",
    responses(
        (status = 200, description = "Embedding deleted", body = MessageResponse),
        (status = 400, description = "Non-integer id"),
        (status = 404, description = "No row with the id")
    ),
    params(("id" = String, Path, description = "Embedding id"))
)]
pub(super) async fn delete_embedding(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());

    services.embedding.delete_embedding(id).await?;

    Ok(Json(MessageResponse::new("Embedding deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/search",
    responses(
        (status = 200, description = "Ranked results", body = SearchResponse),
        (status = 400, description = "Invalid payload")
    ),
    request_body = SearchPayload
)]
pub(super) async fn search(
    services: State<ServiceState>,
    Json(payload): Json<SearchPayload>,
) -> Result<Json<SearchResponse>, EesError> {
    Ok(Json(services.embedding.search_embeddings(payload).await?))
}

#[utoipa::path(
    post,
    path = "/models/compatibility",
    responses(
        (status = 200, description = "Compatibility verdict", body = CompatibilityResponse),
        (status = 404, description = "A model is not registered")
    ),
    request_body = CompatibilityPayload
)]
pub(super) async fn check_compatibility(
    services: State<ServiceState>,
    Json(payload): Json<CompatibilityPayload>,
) -> Result<Json<CompatibilityResponse>, EesError> {
    Ok(Json(services.embedding.check_compatibility(payload).await?))
}

#[utoipa::path(
    post,
    path = "/models/migrate",
    responses(
        (status = 200, description = "Migration summary", body = MigrationSummary),
        (status = 400, description = "Missing fields or batch size out of [1, 1000]")
    ),
    request_body = MigrationPayload
)]
pub(super) async fn migrate_embeddings(
    services: State<ServiceState>,
    Json(payload): Json<MigrationPayload>,
) -> Result<Json<MigrationSummary>, EesError> {
    Ok(Json(services.embedding.migrate_embeddings(payload).await?))
}

#[utoipa::path(
    get,
    path = "/models/task-types",
    responses(
        (status = 200, description = "Task types for the model family", body = TaskTypesResponse),
        (status = 400, description = "Missing `model` query parameter")
    ),
    params(TaskTypesParams)
)]
pub(super) async fn task_types(
    services: State<ServiceState>,
    Query(params): Query<TaskTypesParams>,
) -> Result<Json<TaskTypesResponse>, EesError> {
    Ok(Json(services.embedding.get_task_types(&params.model)))
}
