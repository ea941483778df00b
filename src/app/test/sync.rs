use crate::app::test::{TestState, MOCK_MODEL};
use crate::core::model::directory::{SyncEvent, SyncJobStatus};
use crate::core::repo::directory::DirectoryRepo;
use crate::core::repo::embedding::EmbeddingRepo;
use crate::core::service::sync::dto::{CreateDirectoryPayload, UpdateDirectoryPayload};
use crate::error::EesErr;
use std::path::Path;
use tokio::sync::broadcast;

fn directory_payload(name: &str, path: &Path) -> CreateDirectoryPayload {
    CreateDirectoryPayload {
        name: name.to_string(),
        path: path.to_string_lossy().into_owned(),
        model_name: MOCK_MODEL.to_string(),
        task_types: None,
        description: None,
    }
}

async fn drain(mut rx: broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    loop {
        match rx.recv().await {
            Ok(event) => events.push(event),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    events
}

#[tokio::test]
async fn sync_walks_embeds_and_streams_progress() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("a.md"), "alpha content").unwrap();
    std::fs::write(root.path().join("b.txt"), "beta content").unwrap();
    std::fs::create_dir(root.path().join("sub")).unwrap();
    std::fs::write(root.path().join("sub/c.md"), "gamma content").unwrap();
    // Not valid UTF-8; reading it fails and counts as a failed file.
    std::fs::write(root.path().join("broken.dat"), [0xff, 0xfe, 0xfd]).unwrap();
    // Excluded by the ignore file.
    std::fs::write(root.path().join("noise.log"), "log line").unwrap();
    std::fs::create_dir(root.path().join("skip")).unwrap();
    std::fs::write(root.path().join("skip/d.md"), "skipped").unwrap();
    std::fs::write(root.path().join(".eesignore"), "*.log\nskip/\n").unwrap();

    let directory = service
        .create_directory(directory_payload("docs", root.path()))
        .await
        .unwrap();
    assert!(directory.last_synced_at.is_none());

    let (job, rx) = service.start_sync(directory.id).await.unwrap();
    assert_eq!(SyncJobStatus::Pending, job.status);

    let events = drain(rx).await;

    // a.md, b.txt, sub/c.md and broken.dat are eligible.
    let Some(SyncEvent::Collected { total_files }) = events.first() else {
        panic!("first event must be collected, got {events:?}");
    };
    assert_eq!(4, *total_files);

    let Some(SyncEvent::Completed {
        directory_id,
        files_processed,
        files_created,
        files_updated,
        files_failed,
        ..
    }) = events.last()
    else {
        panic!("last event must be completed, got {events:?}");
    };
    assert_eq!(directory.id, *directory_id);
    assert_eq!(4, *files_processed);
    assert_eq!(3, *files_created);
    assert_eq!(0, *files_updated);
    assert_eq!(1, *files_failed);

    // Progress is monotonic in `current`.
    let mut last = 0;
    for event in &events {
        if let SyncEvent::Processing { current, .. } = event {
            assert!(*current > last);
            last = *current;
        }
    }

    let jobs = service.list_jobs(directory.id).await.unwrap();
    assert_eq!(1, jobs.len());

    let job = service.get_job(jobs[0].id).await.unwrap();
    assert_eq!(SyncJobStatus::Completed, job.status);
    assert_eq!(4, job.total_files);
    assert_eq!(
        job.processed_files,
        job.created_files + job.updated_files + job.failed_files
    );
    assert!(job.completed_at.is_some());
    assert_eq!(vec!["broken.dat".to_string()], job.failed_file_paths);

    // Eligible files landed in the embeddings table under their path.
    let repo = state.repo();
    let uri = root.path().join("a.md");
    let row = repo
        .find_by_uri(&uri.to_string_lossy(), MOCK_MODEL)
        .await
        .unwrap();
    assert!(row.is_some());

    // The ignored ones did not.
    let uri = root.path().join("noise.log");
    assert!(repo
        .find_by_uri(&uri.to_string_lossy(), MOCK_MODEL)
        .await
        .unwrap()
        .is_none());

    let directory = service.get_directory(directory.id).await.unwrap();
    assert!(directory.last_synced_at.is_some());
}

#[tokio::test]
async fn second_sync_updates_instead_of_creating() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("a.md"), "stable content").unwrap();

    let directory = service
        .create_directory(directory_payload("docs", root.path()))
        .await
        .unwrap();

    let (_, rx) = service.start_sync(directory.id).await.unwrap();
    drain(rx).await;

    let (_, rx) = service.start_sync(directory.id).await.unwrap();
    let events = drain(rx).await;

    let Some(SyncEvent::Completed {
        files_created,
        files_updated,
        ..
    }) = events.last()
    else {
        panic!("last event must be completed");
    };
    assert_eq!(0, *files_created);
    assert_eq!(1, *files_updated);
}

#[tokio::test]
async fn default_ignores_apply_without_an_ignore_file() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("keep.md"), "kept").unwrap();
    std::fs::create_dir(root.path().join("node_modules")).unwrap();
    std::fs::write(root.path().join("node_modules/x.js"), "dep").unwrap();
    std::fs::write(root.path().join(".env"), "SECRET=1").unwrap();

    let directory = service
        .create_directory(directory_payload("docs", root.path()))
        .await
        .unwrap();

    let (_, rx) = service.start_sync(directory.id).await.unwrap();
    let events = drain(rx).await;

    let Some(SyncEvent::Collected { total_files }) = events.first() else {
        panic!("first event must be collected");
    };
    assert_eq!(1, *total_files);
}

#[tokio::test]
async fn empty_directory_completes_immediately() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    let directory = service
        .create_directory(directory_payload("empty", root.path()))
        .await
        .unwrap();

    let (job, rx) = service.start_sync(directory.id).await.unwrap();
    let events = drain(rx).await;

    let Some(SyncEvent::Completed {
        files_processed, ..
    }) = events.last()
    else {
        panic!("last event must be completed");
    };
    assert_eq!(0, *files_processed);

    let job = service.get_job(job.id).await.unwrap();
    assert_eq!(SyncJobStatus::Completed, job.status);
}

#[tokio::test]
async fn missing_directory_fails_the_job() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    let directory = service
        .create_directory(directory_payload("vanishing", root.path()))
        .await
        .unwrap();

    // The path disappears between registration and sync.
    drop(root);

    let (job, rx) = service.start_sync(directory.id).await.unwrap();
    let events = drain(rx).await;

    let Some(SyncEvent::Completed { message, .. }) = events.last() else {
        panic!("last event must be completed");
    };
    assert!(message.contains("failed"));

    let job = service.get_job(job.id).await.unwrap();
    assert_eq!(SyncJobStatus::Failed, job.status);
    assert!(job.error_message.is_some());
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn stale_job_blocks_new_sync_until_cancelled() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;
    let repo = state.repo();

    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("a.md"), "content").unwrap();

    let directory = service
        .create_directory(directory_payload("docs", root.path()))
        .await
        .unwrap();

    // A job left over from a previous process: in the table, not in
    // the in-process tracker.
    let stale = repo.insert_job(directory.id).await.unwrap();

    let err = service.start_sync(directory.id).await.unwrap_err();
    assert!(matches!(err.error, EesErr::AlreadyExists(_)));

    let cancelled = service.cancel_incomplete_jobs(directory.id).await.unwrap();
    assert_eq!(1, cancelled);

    let stale = service.get_job(stale.id).await.unwrap();
    assert_eq!(SyncJobStatus::Cancelled, stale.status);
    assert!(stale.completed_at.is_some());

    // With the stale job cancelled the directory accepts a new sync.
    let (_, rx) = service.start_sync(directory.id).await.unwrap();
    let events = drain(rx).await;
    assert!(matches!(events.last(), Some(SyncEvent::Completed { .. })));
}

#[tokio::test]
async fn directory_crud_round_trip() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;

    let root = tempfile::tempdir().unwrap();
    let directory = service
        .create_directory(directory_payload("original", root.path()))
        .await
        .unwrap();

    let updated = service
        .update_directory(
            directory.id,
            UpdateDirectoryPayload {
                name: Some("renamed".to_string()),
                path: None,
                model_name: None,
                task_types: Some(vec!["retrieval_document".to_string()]),
                description: Some("docs corpus".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!("renamed", updated.name);
    assert_eq!(directory.path, updated.path);
    assert_eq!(
        Some(vec!["retrieval_document".to_string()]),
        updated.task_types
    );

    let listed = service.list_directories().await.unwrap();
    assert_eq!(1, listed.len());

    service.delete_directory(directory.id).await.unwrap();

    let err = service.get_directory(directory.id).await.unwrap_err();
    assert!(matches!(err.error, EesErr::DoesNotExist(_)));
}

#[tokio::test]
async fn relative_paths_are_rejected() {
    let state = TestState::init().await;

    let err = state
        .app
        .services
        .sync
        .create_directory(CreateDirectoryPayload {
            name: "bad".to_string(),
            path: "relative/path".to_string(),
            model_name: MOCK_MODEL.to_string(),
            task_types: None,
            description: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err.error, EesErr::Validation(_)));
}

#[tokio::test]
async fn deleting_a_directory_cascades_to_jobs() {
    let state = TestState::init().await;
    let service = &state.app.services.sync;
    let repo = state.repo();

    let root = tempfile::tempdir().unwrap();
    let directory = service
        .create_directory(directory_payload("docs", root.path()))
        .await
        .unwrap();

    let job = repo.insert_job(directory.id).await.unwrap();

    service.delete_directory(directory.id).await.unwrap();

    assert!(repo.get_job(job.id).await.unwrap().is_none());
}
