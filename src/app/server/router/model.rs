use crate::app::server::dto::MessageResponse;
use crate::app::state::ServiceState;
use crate::core::model::provider::{Model, Provider};
use crate::core::service::model::dto::{
    CreateModelPayload, CreateProviderPayload, UpdateProviderPayload,
};
use crate::error::EesError;
use crate::map_err;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

#[utoipa::path(
    post,
    path = "/providers",
    responses(
        (status = 200, description = "Provider registered", body = Provider),
        (status = 409, description = "Endpoint already registered"),
        (status = 422, description = "Unknown provider kind")
    ),
    request_body = CreateProviderPayload
)]
pub(super) async fn create_provider(
    services: State<ServiceState>,
    Json(payload): Json<CreateProviderPayload>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.model.create_provider(payload).await?))
}

#[utoipa::path(
    get,
    path = "/providers",
    responses((status = 200, description = "Registered providers", body = [Provider]))
)]
pub(super) async fn list_providers(
    services: State<ServiceState>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.model.list_providers().await?))
}

#[utoipa::path(
    get,
    path = "/providers/{id}",
    responses(
        (status = 200, description = "The provider", body = Provider),
        (status = 404, description = "No provider with the id")
    ),
    params(("id" = i64, Path, description = "Provider id"))
)]
pub(super) async fn get_provider(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.model.get_provider(id).await?))
}

#[utoipa::path(
    put,
    path = "/providers/{id}",
    responses(
        (status = 200, description = "Updated provider", body = Provider),
        (status = 404, description = "No provider with the id")
    ),
    params(("id" = i64, Path, description = "Provider id")),
    request_body = UpdateProviderPayload
)]
pub(super) async fn update_provider(
    services: State<ServiceState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateProviderPayload>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.model.update_provider(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/providers/{id}",
    responses(
        (status = 200, description = "Provider deleted", body = MessageResponse),
        (status = 404, description = "No provider with the id")
    ),
    params(("id" = i64, Path, description = "Provider id"))
)]
pub(super) async fn delete_provider(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    services.model.delete_provider(id).await?;
    Ok(Json(MessageResponse::new("Provider deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/models",
    responses(
        (status = 200, description = "Model registered", body = Model),
        (status = 404, description = "Owning provider does not exist"),
        (status = 409, description = "Model name already registered")
    ),
    request_body = CreateModelPayload
)]
pub(super) async fn create_model(
    services: State<ServiceState>,
    Json(payload): Json<CreateModelPayload>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.model.create_model(payload).await?))
}

#[utoipa::path(
    get,
    path = "/models",
    responses((status = 200, description = "Registered models", body = [Model]))
)]
pub(super) async fn list_models(
    services: State<ServiceState>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.model.list_models().await?))
}

#[utoipa::path(
    get,
    path = "/models/active",
    responses(
        (status = 200, description = "The active model", body = Model),
        (status = 404, description = "No model is active")
    )
)]
pub(super) async fn active_model(
    services: State<ServiceState>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.model.active_model().await?))
}

#[utoipa::path(
    get,
    path = "/models/{id}",
    responses(
        (status = 200, description = "The model", body = Model),
        (status = 404, description = "No model with the id")
    ),
    params(("id" = i64, Path, description = "Model id"))
)]
pub(super) async fn get_model(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.model.get_model(id).await?))
}

#[utoipa::path(
    put,
    path = "/models/{id}/activate",
    responses(
        (status = 200, description = "The activated model", body = Model),
        (status = 404, description = "No model with the id")
    ),
    params(("id" = i64, Path, description = "Model id"))
)]
pub(super) async fn activate_model(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.model.activate_model(id).await?))
}

#[utoipa::path(
    delete,
    path = "/models/{id}",
    responses(
        (status = 200, description = "Model deleted", body = MessageResponse),
        (status = 404, description = "No model with the id")
    ),
    params(("id" = i64, Path, description = "Model id"))
)]
pub(super) async fn delete_model(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    services.model.delete_model(id).await?;
    Ok(Json(MessageResponse::new("Model deleted successfully")))
}
