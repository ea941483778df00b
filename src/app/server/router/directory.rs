use crate::app::server::dto::{CancelledResponse, MessageResponse};
use crate::app::state::ServiceState;
use crate::core::model::directory::{SyncJob, UploadDirectory};
use crate::core::service::sync::dto::{CreateDirectoryPayload, UpdateDirectoryPayload};
use crate::error::{EesErr, EesError};
use crate::map_err;
use axum::{
    extract::{Path, State},
    response::{sse::Event, IntoResponse, Sse},
    Json,
};
use futures_util::Stream;
use std::time::Duration;
use tokio_stream::{wrappers::errors::BroadcastStreamRecvError, StreamExt};
use tracing::{info, warn};

#[utoipa::path(
    post,
    path = "/upload-directories",
    responses(
        (status = 200, description = "Directory registered", body = UploadDirectory),
        (status = 400, description = "Invalid payload")
    ),
    request_body = CreateDirectoryPayload
)]
pub(super) async fn create_directory(
    services: State<ServiceState>,
    Json(payload): Json<CreateDirectoryPayload>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.sync.create_directory(payload).await?))
}

#[utoipa::path(
    get,
    path = "/upload-directories",
    responses((status = 200, description = "Registered directories", body = [UploadDirectory]))
)]
pub(super) async fn list_directories(
    services: State<ServiceState>,
) -> Result<impl IntoResponse, EesError> {
    Ok(Json(services.sync.list_directories().await?))
}

#[utoipa::path(
    get,
    path = "/upload-directories/{id}",
    responses(
        (status = 200, description = "The directory", body = UploadDirectory),
        (status = 404, description = "No directory with the id")
    ),
    params(("id" = i64, Path, description = "Directory id"))
)]
pub(super) async fn get_directory(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.sync.get_directory(id).await?))
}

#[utoipa::path(
    put,
    path = "/upload-directories/{id}",
    responses(
        (status = 200, description = "Updated directory", body = UploadDirectory),
        (status = 404, description = "No directory with the id")
    ),
    params(("id" = i64, Path, description = "Directory id")),
    request_body = UpdateDirectoryPayload
)]
pub(super) async fn update_directory(
    services: State<ServiceState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDirectoryPayload>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    Ok(Json(services.sync.update_directory(id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/upload-directories/{id}",
    responses(
        (status = 200, description = "Directory and its jobs deleted", body = MessageResponse),
        (status = 404, description = "No directory with the id")
    ),
    params(("id" = i64, Path, description = "Directory id"))
)]
pub(super) async fn delete_directory(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    services.sync.delete_directory(id).await?;
    Ok(Json(MessageResponse::new(
        "Upload directory deleted successfully",
    )))
}

#[utoipa::path(
    get,
    path = "/upload-directories/{id}/sync/stream",
    responses(
        (status = 200, description = "Progress events over SSE"),
        (status = 404, description = "No directory with the id"),
        (status = 409, description = "A stale job blocks the directory")
    ),
    params(("id" = i64, Path, description = "Directory id"))
)]
pub(super) async fn sync_stream(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, EesError>>>, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());

    let (job, rx) = services.sync.start_sync(id).await?;

    info!("Streaming sync job '{}'", job.id);

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(|event| {
        let event = match event {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Sync event subscriber lagged, skipped {skipped} event(s)");
                return None;
            }
        };

        let sse = Event::default()
            .event(event.name())
            .json_data(&event)
            .map_err(|e| EesError::new(file!(), line!(), column!(), EesErr::Axum(e)));

        Some(sse)
    });

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(1))
            .text("keep-alive"),
    ))
}

#[utoipa::path(
    post,
    path = "/upload-directories/{id}/sync/cancel",
    responses(
        (status = 200, description = "Incomplete jobs cancelled", body = CancelledResponse),
        (status = 404, description = "No directory with the id")
    ),
    params(("id" = i64, Path, description = "Directory id"))
)]
pub(super) async fn cancel_sync(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    let cancelled = services.sync.cancel_incomplete_jobs(id).await?;
    Ok(Json(CancelledResponse { cancelled }))
}

#[utoipa::path(
    get,
    path = "/upload-directories/{id}/sync/jobs",
    responses((status = 200, description = "Jobs for the directory", body = [SyncJob])),
    params(("id" = i64, Path, description = "Directory id"))
)]
pub(super) async fn list_jobs(
    services: State<ServiceState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, EesError> {
    let id: i64 = map_err!(id.parse::<i64>());
    services.sync.get_directory(id).await?;
    Ok(Json(services.sync.list_jobs(id).await?))
}

#[utoipa::path(
    get,
    path = "/upload-directories/{id}/sync/jobs/{job_id}",
    responses(
        (status = 200, description = "The job", body = SyncJob),
        (status = 404, description = "No job with the id")
    ),
    params(
        ("id" = i64, Path, description = "Directory id"),
        ("job_id" = i64, Path, description = "Job id")
    )
)]
pub(super) async fn get_job(
    services: State<ServiceState>,
    Path((_dir_id, job_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, EesError> {
    let job_id: i64 = map_err!(job_id.parse::<i64>());
    Ok(Json(services.sync.get_job(job_id).await?))
}
