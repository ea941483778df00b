#[rustfmt::skip]
use super::router::{
    // App config
    __path_app_config,

    // Embeddings
    __path_create_embedding,
    __path_batch_embed,
    __path_list_embeddings,
    __path_get_embedding,
    __path_delete_embedding,
    __path_search,
    __path_check_compatibility,
    __path_migrate_embeddings,
    __path_task_types,

    // Model registry
    __path_create_provider,
    __path_list_providers,
    __path_get_provider,
    __path_update_provider,
    __path_delete_provider,
    __path_create_model,
    __path_list_models,
    __path_get_model,
    __path_delete_model,
    __path_activate_model,
    __path_active_model,

    // Directory sync
    __path_create_directory,
    __path_list_directories,
    __path_get_directory,
    __path_update_directory,
    __path_delete_directory,
    __path_sync_stream,
    __path_cancel_sync,
    __path_list_jobs,
    __path_get_job,
};
use super::dto::{
    CancelledResponse, GetEmbeddingParams, ListEmbeddingsPayload, MessageResponse, TaskTypesParams,
};
use crate::{
    app::state::AppConfig,
    core::{
        embedder::{ModelInfo, TokenUsage},
        model::{
            directory::{SyncJob, SyncJobStatus, UploadDirectory},
            embedding::{Embedding, SearchMatch, SimilarityMetric},
            provider::{Model, Provider, ProviderKind, TaskType},
            Pagination,
        },
        service::{
            embedding::dto::{
                BatchEmbeddingPayload, BatchEmbeddingResponse, BatchItem, BatchItemResult,
                BatchItemStatus, CompatibilityPayload, CompatibilityResponse,
                CreateEmbeddingPayload, CreateEmbeddingResponse, MigrationDetail,
                MigrationItemStatus, MigrationOptions, MigrationPayload, MigrationSummary,
                SearchPayload, SearchResponse, TaskTypesResponse,
            },
            model::dto::{CreateModelPayload, CreateProviderPayload, UpdateProviderPayload},
            sync::dto::{CreateDirectoryPayload, UpdateDirectoryPayload},
        },
    },
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        // App config
        app_config,
        // Embeddings
        create_embedding,
        batch_embed,
        list_embeddings,
        get_embedding,
        delete_embedding,
        search,
        check_compatibility,
        migrate_embeddings,
        task_types,
        // Model registry
        create_provider,
        list_providers,
        get_provider,
        update_provider,
        delete_provider,
        create_model,
        list_models,
        get_model,
        delete_model,
        activate_model,
        active_model,
        // Directory sync
        create_directory,
        list_directories,
        get_directory,
        update_directory,
        delete_directory,
        sync_stream,
        cancel_sync,
        list_jobs,
        get_job,
    ),
    components(schemas(
        AppConfig,
        ModelInfo,
        TokenUsage,
        Pagination,
        Embedding,
        SearchMatch,
        SimilarityMetric,
        Provider,
        ProviderKind,
        Model,
        TaskType,
        SyncJob,
        SyncJobStatus,
        UploadDirectory,
        CreateEmbeddingPayload,
        CreateEmbeddingResponse,
        BatchEmbeddingPayload,
        BatchEmbeddingResponse,
        BatchItem,
        BatchItemResult,
        BatchItemStatus,
        SearchPayload,
        SearchResponse,
        CompatibilityPayload,
        CompatibilityResponse,
        MigrationPayload,
        MigrationOptions,
        MigrationSummary,
        MigrationDetail,
        MigrationItemStatus,
        TaskTypesResponse,
        CreateProviderPayload,
        UpdateProviderPayload,
        CreateModelPayload,
        CreateDirectoryPayload,
        UpdateDirectoryPayload,
        ListEmbeddingsPayload,
        GetEmbeddingParams,
        TaskTypesParams,
        MessageResponse,
        CancelledResponse,
    ))
)]
pub struct ApiDoc;
