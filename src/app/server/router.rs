use super::api::ApiDoc;
use crate::{
    app::state::{AppConfig, AppState},
    error::EesError,
};
use axum::{
    extract::State,
    http::{HeaderValue, Method},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use std::time::Duration;
use tower_http::{
    classify::ServerErrorsFailureClass,
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(super) mod directory;
pub(super) mod embedding;
pub(super) mod model;

pub(super) use directory::*;
pub(super) use embedding::*;
pub(super) use model::*;

pub fn router(state: AppState, origins: Option<Vec<String>>) -> Router {
    let allow_origin = match origins {
        Some(origins) => AllowOrigin::list(
            origins
                .into_iter()
                .map(|origin| {
                    tracing::info!("Adding {origin} to allowed origins");
                    HeaderValue::from_str(&origin)
                })
                .map(Result::unwrap),
        ),
        None => AllowOrigin::any(),
    };

    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PUT,
            Method::PATCH,
        ]);

    let info = Router::new()
        .route("/info", get(app_config))
        .with_state(state.clone());

    let router = Router::new()
        .route("/embeddings", post(create_embedding))
        .route("/embeddings", get(list_embeddings))
        .route("/embeddings/batch", post(batch_embed))
        .route(
            "/embeddings/:uri",
            get(get_embedding).delete(delete_embedding),
        )
        .route("/search", post(search))
        .route("/models", post(create_model))
        .route("/models", get(list_models))
        .route("/models/active", get(active_model))
        .route("/models/compatibility", post(check_compatibility))
        .route("/models/migrate", post(migrate_embeddings))
        .route("/models/task-types", get(task_types))
        .route("/models/:id", get(get_model))
        .route("/models/:id", delete(delete_model))
        .route("/models/:id/activate", put(activate_model))
        .route("/providers", post(create_provider))
        .route("/providers", get(list_providers))
        .route("/providers/:id", get(get_provider))
        .route("/providers/:id", put(update_provider))
        .route("/providers/:id", delete(delete_provider))
        .route("/upload-directories", post(create_directory))
        .route("/upload-directories", get(list_directories))
        .route("/upload-directories/:id", get(get_directory))
        .route("/upload-directories/:id", put(update_directory))
        .route("/upload-directories/:id", delete(delete_directory))
        .route("/upload-directories/:id/sync/stream", get(sync_stream))
        .route("/upload-directories/:id/sync/cancel", post(cancel_sync))
        .route("/upload-directories/:id/sync/jobs", get(list_jobs))
        .route("/upload-directories/:id/sync/jobs/:job_id", get(get_job))
        .with_state(state.services.clone())
        .merge(info);

    router
        .layer(
            TraceLayer::new_for_http()
                .on_request(|req: &axum::http::Request<_>, _span: &Span| {
                    tracing::info!("Processing request | {} {}", req.method(), req.uri());
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, _span: &Span| {
                        tracing::info!(
                            "Sending response | {} | {}ms",
                            res.status(),
                            latency.as_millis()
                        );
                    },
                )
                .on_failure(
                    |error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                        tracing::error!("Error in request: {error}")
                    },
                ),
        )
        .layer(cors)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Has to go last to exclude all the tracing/cors layers
        .route("/_health", get(health_check))
}

async fn health_check() -> impl IntoResponse {
    "OK"
}

#[utoipa::path(
    get,
    path = "/info",
    responses(
        (status = 200, description = "Get app configuration and available providers", body = AppConfig),
    )
)]
pub(super) async fn app_config(state: State<AppState>) -> Result<impl IntoResponse, EesError> {
    Ok(Json(state.get_configuration()))
}
