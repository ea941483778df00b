use crate::app::test::{TestState, MOCK_DIMENSIONS, MOCK_MODEL, MOCK_MODEL_ALT, MOCK_MODEL_WIDE};
use crate::core::model::embedding::{EmbeddingListParams, SimilarityMetric};
use crate::core::model::Pagination;
use crate::core::repo::embedding::EmbeddingRepo;
use crate::core::repo::model::ModelRepo;
use crate::core::service::embedding::dto::{
    BatchEmbeddingPayload, BatchItem, BatchItemStatus, CompatibilityPayload,
    CreateEmbeddingPayload, MigrationItemStatus, MigrationOptions, MigrationPayload,
    SearchPayload,
};
use crate::core::service::model::dto::CreateProviderPayload;
use crate::error::EesErr;

fn create_payload(uri: &str, text: &str) -> CreateEmbeddingPayload {
    CreateEmbeddingPayload {
        uri: uri.to_string(),
        text: text.to_string(),
        model_name: None,
        task_types: None,
        title: None,
    }
}

#[tokio::test]
async fn create_then_find_round_trip() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let response = service
        .create_embedding(create_payload("doc1", "Hello"))
        .await
        .unwrap();

    assert!(response.id > 0);
    assert_eq!("doc1", response.uri);
    assert_eq!(MOCK_MODEL, response.model_name);
    assert_eq!("Embedding created successfully", response.message);

    let row = service.get_embedding("doc1", None).await.unwrap();
    assert_eq!("Hello", row.text);
    assert_eq!(MOCK_MODEL, row.model_name);
    assert_eq!(MOCK_DIMENSIONS, row.embedding.len());
}

#[tokio::test]
async fn task_type_is_recorded() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let mut payload = create_payload("typed", "content");
    payload.task_types = Some(vec!["retrieval_document".to_string()]);
    service.create_embedding(payload).await.unwrap();

    let row = service.get_embedding("typed", None).await.unwrap();
    assert_eq!(Some("retrieval_document".to_string()), row.task_type);
}

#[tokio::test]
async fn upsert_leaves_one_row_with_new_text() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    service
        .create_embedding(create_payload("dup", "first version"))
        .await
        .unwrap();
    let original = service.get_embedding("dup", None).await.unwrap();
    assert_eq!(original.created_at, original.updated_at);

    service
        .create_embedding(create_payload("dup", "second version"))
        .await
        .unwrap();
    let replaced = service.get_embedding("dup", None).await.unwrap();

    assert_eq!(original.id, replaced.id);
    assert_eq!("second version", replaced.text);
    assert_eq!(original.created_at, replaced.created_at);
    assert!(replaced.updated_at > original.updated_at);

    let listed = service
        .list_embeddings(EmbeddingListParams {
            uri: Some("dup"),
            model_name: None,
            pagination: Pagination::default(),
        })
        .await
        .unwrap();
    assert_eq!(1, listed.total);
}

#[tokio::test]
async fn batch_isolates_failures_and_preserves_order() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let response = service
        .create_batch_embeddings(BatchEmbeddingPayload {
            texts: vec![
                BatchItem {
                    uri: "a".to_string(),
                    text: "x".to_string(),
                    title: None,
                },
                BatchItem {
                    uri: String::new(),
                    text: "y".to_string(),
                    title: None,
                },
                BatchItem {
                    uri: "c".to_string(),
                    text: String::new(),
                    title: None,
                },
            ],
            model_name: None,
        })
        .await
        .unwrap();

    assert_eq!(3, response.total);
    assert_eq!(1, response.successful);
    assert_eq!(2, response.failed);
    assert_eq!(3, response.results.len());

    assert!(matches!(
        response.results[0].status,
        BatchItemStatus::Success
    ));
    assert!(matches!(response.results[1].status, BatchItemStatus::Error));
    assert!(matches!(response.results[2].status, BatchItemStatus::Error));

    // Input order survives regardless of per-item outcome.
    assert_eq!("a", response.results[0].uri);
    assert_eq!("", response.results[1].uri);
    assert_eq!("c", response.results[2].uri);
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let state = TestState::init().await;

    let result = state
        .app
        .services
        .embedding
        .create_batch_embeddings(BatchEmbeddingPayload {
            texts: vec![],
            model_name: None,
        })
        .await;

    assert!(matches!(result.unwrap_err().error, EesErr::Validation(_)));
}

#[tokio::test]
async fn cosine_search_ranks_verbatim_match_first() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    for (uri, text) in [
        ("hit", "hello world"),
        ("miss1", "an entirely different sentence"),
        ("miss2", "grocery lists and receipts"),
    ] {
        service.create_embedding(create_payload(uri, text)).await.unwrap();
    }

    let response = service
        .search_embeddings(SearchPayload {
            query: "hello world".to_string(),
            model_name: None,
            limit: Some(5),
            threshold: Some(0.7),
            metric: Some(SimilarityMetric::Cosine),
        })
        .await
        .unwrap();

    assert_eq!(MOCK_MODEL, response.model_name);
    assert_eq!(response.results.len(), response.count);
    assert!(!response.results.is_empty());

    assert_eq!("hit", response.results[0].uri);
    assert!(response.results[0].similarity >= 0.99);

    for result in &response.results {
        assert!(result.similarity >= 0.7);
    }

    for pair in response.results.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn fallback_metrics_rank_identical_text_first() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    for (uri, text) in [
        ("hit", "needle in a haystack"),
        ("miss1", "completely unrelated"),
        ("miss2", "another decoy document"),
    ] {
        service.create_embedding(create_payload(uri, text)).await.unwrap();
    }

    for metric in [SimilarityMetric::Euclidean, SimilarityMetric::DotProduct] {
        let response = service
            .search_embeddings(SearchPayload {
                query: "needle in a haystack".to_string(),
                model_name: None,
                limit: Some(5),
                threshold: None,
                metric: Some(metric),
            })
            .await
            .unwrap();

        assert_eq!("hit", response.results[0].uri, "metric {metric}");
        assert!(
            (response.results[0].similarity - 1.0).abs() < 1e-4,
            "metric {metric}: identical unit vectors score 1"
        );

        for pair in response.results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }
}

#[tokio::test]
async fn list_clamps_limit_and_filters() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    for i in 0..3 {
        service
            .create_embedding(create_payload(&format!("doc/{i}"), "text"))
            .await
            .unwrap();
    }
    service
        .create_embedding(create_payload("other", "text"))
        .await
        .unwrap();

    let page = service
        .list_embeddings(EmbeddingListParams {
            uri: None,
            model_name: None,
            pagination: Pagination::new(1, 400),
        })
        .await
        .unwrap();
    assert_eq!(100, page.limit);
    assert_eq!(4, page.total);
    assert!(!page.has_next);
    assert!(!page.has_prev);

    let filtered = service
        .list_embeddings(EmbeddingListParams {
            uri: Some("doc/"),
            model_name: None,
            pagination: Pagination::default(),
        })
        .await
        .unwrap();
    assert_eq!(3, filtered.total);

    let by_model = service
        .list_embeddings(EmbeddingListParams {
            uri: None,
            model_name: Some("no-such-model"),
            pagination: Pagination::default(),
        })
        .await
        .unwrap();
    assert_eq!(0, by_model.total);

    // Ordered by creation, ascending.
    let all = service
        .list_embeddings(EmbeddingListParams {
            uri: None,
            model_name: Some(MOCK_MODEL),
            pagination: Pagination::default(),
        })
        .await
        .unwrap();
    for pair in all.items.windows(2) {
        assert!(pair[0].created_at <= pair[1].created_at);
    }
}

#[tokio::test]
async fn delete_embedding_twice_is_an_error() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let response = service
        .create_embedding(create_payload("victim", "text"))
        .await
        .unwrap();

    service.delete_embedding(response.id).await.unwrap();

    let err = service.delete_embedding(response.id).await.unwrap_err();
    assert!(matches!(err.error, EesErr::DoesNotExist(_)));

    let err = service.get_embedding("victim", None).await.unwrap_err();
    assert!(matches!(err.error, EesErr::DoesNotExist(_)));
}

#[tokio::test]
async fn migrate_in_place_rewrites_model_and_vector() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    service.create_embedding(create_payload("m1", "first")).await.unwrap();
    service.create_embedding(create_payload("m2", "second")).await.unwrap();

    let summary = service
        .migrate_embeddings(MigrationPayload {
            from_model: MOCK_MODEL.to_string(),
            to_model: MOCK_MODEL_ALT.to_string(),
            options: None,
        })
        .await
        .unwrap();

    assert_eq!(2, summary.total_processed);
    assert_eq!(2, summary.successful);
    assert_eq!(0, summary.failed);
    assert_eq!(2, summary.details.len());
    assert!(summary
        .details
        .iter()
        .all(|d| matches!(d.status, MigrationItemStatus::Success)));

    let repo = state.repo();
    assert_eq!(0, repo.count_by_model(MOCK_MODEL).await.unwrap());
    assert_eq!(2, repo.count_by_model(MOCK_MODEL_ALT).await.unwrap());

    let row = repo.find_by_uri("m1", MOCK_MODEL_ALT).await.unwrap().unwrap();
    assert_eq!(MOCK_DIMENSIONS, row.embedding.len());
}

#[tokio::test]
async fn migrate_preserving_originals_derives_uris() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    service.create_embedding(create_payload("keep", "content")).await.unwrap();

    let summary = service
        .migrate_embeddings(MigrationPayload {
            from_model: MOCK_MODEL.to_string(),
            to_model: MOCK_MODEL_ALT.to_string(),
            options: Some(MigrationOptions {
                preserve_original: Some(true),
                batch_size: None,
                continue_on_error: None,
            }),
        })
        .await
        .unwrap();

    assert_eq!(1, summary.successful);

    let repo = state.repo();

    // The original is untouched.
    assert!(repo.find_by_uri("keep", MOCK_MODEL).await.unwrap().is_some());

    // The migrated copy lands under the derived URI.
    let derived = format!("keep::{MOCK_MODEL_ALT}");
    let row = repo.find_by_uri(&derived, MOCK_MODEL_ALT).await.unwrap();
    assert!(row.is_some());
}

#[tokio::test]
async fn migrate_rejects_batch_size_out_of_range() {
    let state = TestState::init().await;

    for batch_size in [0, 1001] {
        let err = state
            .app
            .services
            .embedding
            .migrate_embeddings(MigrationPayload {
                from_model: MOCK_MODEL.to_string(),
                to_model: MOCK_MODEL_ALT.to_string(),
                options: Some(MigrationOptions {
                    preserve_original: None,
                    batch_size: Some(batch_size),
                    continue_on_error: None,
                }),
            })
            .await
            .unwrap_err();

        assert!(matches!(err.error, EesErr::Validation(_)));
    }
}

#[tokio::test]
async fn compatibility_follows_registry_dimensions() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let same = service
        .check_compatibility(CompatibilityPayload {
            source_model: MOCK_MODEL.to_string(),
            target_model: MOCK_MODEL.to_string(),
        })
        .await
        .unwrap();
    assert!(same.compatible);
    assert_eq!(Some(1.0), same.similarity_score);

    let matching = service
        .check_compatibility(CompatibilityPayload {
            source_model: MOCK_MODEL.to_string(),
            target_model: MOCK_MODEL_ALT.to_string(),
        })
        .await
        .unwrap();
    assert!(matching.compatible);

    let mismatched = service
        .check_compatibility(CompatibilityPayload {
            source_model: MOCK_MODEL.to_string(),
            target_model: MOCK_MODEL_WIDE.to_string(),
        })
        .await
        .unwrap();
    assert!(!mismatched.compatible);
    assert!(mismatched.reason.unwrap().contains("mismatch"));

    let err = service
        .check_compatibility(CompatibilityPayload {
            source_model: MOCK_MODEL.to_string(),
            target_model: "unregistered".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err.error, EesErr::DoesNotExist(_)));
}

#[tokio::test]
async fn task_types_depend_on_model_family() {
    let state = TestState::init().await;
    let service = &state.app.services.embedding;

    let typed = service.get_task_types("text-embedding-004");
    assert_eq!(typed.count, typed.task_types.len());
    assert!(typed.task_types.iter().any(|t| t.value == "retrieval_query"));
    assert!(typed
        .task_types
        .iter()
        .any(|t| t.value == "retrieval_document"));

    let untyped = service.get_task_types(MOCK_MODEL);
    assert_eq!(0, untyped.count);
    assert!(untyped.task_types.is_empty());
}

#[tokio::test]
async fn registry_keeps_a_single_active_model() {
    let state = TestState::init().await;
    let service = &state.app.services.model;
    let repo = state.repo();

    // Seeding activates the default model.
    let active = service.active_model().await.unwrap();
    assert_eq!(MOCK_MODEL, active.name);

    let alt = repo
        .find_model_by_name(MOCK_MODEL_ALT)
        .await
        .unwrap()
        .unwrap();

    service.activate_model(alt.id).await.unwrap();

    let active = service.active_model().await.unwrap();
    assert_eq!(MOCK_MODEL_ALT, active.name);

    let models = service.list_models().await.unwrap();
    assert_eq!(1, models.iter().filter(|m| m.is_active).count());
}

#[tokio::test]
async fn duplicate_provider_endpoint_conflicts() {
    let state = TestState::init().await;
    let service = &state.app.services.model;

    // The seeded default provider occupies this endpoint.
    let err = service
        .create_provider(CreateProviderPayload {
            name: "duplicate".to_string(),
            kind: "ollama".to_string(),
            base_url: "http://mock.localhost".to_string(),
            api_key: None,
            metadata: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err.error, EesErr::AlreadyExists(_)));

    let err = service
        .create_provider(CreateProviderPayload {
            name: "bogus".to_string(),
            kind: "qdrant".to_string(),
            base_url: "http://somewhere".to_string(),
            api_key: None,
            metadata: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err.error, EesErr::InvalidProvider(_)));
}
