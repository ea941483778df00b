use crate::core::model::directory::{
    DirectoryInsert, DirectoryUpdate, SyncEvent, SyncJob, SyncJobStatus, SyncProgress,
    UploadDirectory,
};
use crate::core::repo::{
    directory::DirectoryRepo, embedding::EmbeddingRepo, model::ModelRepo, Atomic,
};
use crate::core::service::embedding::EmbeddingService;
use crate::core::sync::{collect_files, load_matcher, relative};
use crate::error::EesError;
use crate::{err, map_err};
use chrono::Utc;
use dto::*;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use validify::Validify;

/// Capacity of a job's progress channel. Slow subscribers lag and drop
/// events rather than stall the job.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// In-process bookkeeping for running sync jobs: the running set plus
/// the progress channel per job. This is the concurrent-start guard.
#[derive(Clone, Default)]
pub struct SyncJobTracker {
    inner: Arc<Mutex<TrackerInner>>,
}

#[derive(Default)]
struct TrackerInner {
    running: HashSet<i64>,
    channels: HashMap<i64, broadcast::Sender<SyncEvent>>,
}

impl SyncJobTracker {
    /// Claim the job. Returns the job's event sender, or `None` when
    /// the job is already claimed.
    fn begin(&self, job_id: i64) -> Option<broadcast::Sender<SyncEvent>> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.running.insert(job_id) {
            return None;
        }
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        inner.channels.insert(job_id, tx.clone());
        Some(tx)
    }

    /// Attach to a running job's event stream.
    fn subscribe(&self, job_id: i64) -> Option<broadcast::Receiver<SyncEvent>> {
        let inner = self.inner.lock().unwrap();
        inner.channels.get(&job_id).map(|tx| tx.subscribe())
    }

    fn finish(&self, job_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        inner.running.remove(&job_id);
        inner.channels.remove(&job_id);
    }

    pub fn is_running(&self, job_id: i64) -> bool {
        self.inner.lock().unwrap().running.contains(&job_id)
    }
}

/// Directory registration and background file ingestion. A sync job
/// walks a registered directory, honors ignore patterns and embeds
/// every eligible file, streaming progress to subscribers.
#[derive(Clone)]
pub struct SyncService<Repo> {
    repo: Repo,
    embeddings: EmbeddingService<Repo>,
    tracker: SyncJobTracker,
}

impl<R> SyncService<R> {
    pub fn new(repo: R, embeddings: EmbeddingService<R>) -> Self {
        Self {
            repo,
            embeddings,
            tracker: SyncJobTracker::default(),
        }
    }
}

impl<Repo> SyncService<Repo>
where
    Repo: DirectoryRepo
        + EmbeddingRepo
        + ModelRepo
        + Atomic
        + Clone
        + Send
        + Sync
        + 'static,
    Repo::Tx: Send + Sync,
{
    pub async fn create_directory(
        &self,
        mut payload: CreateDirectoryPayload,
    ) -> Result<UploadDirectory, EesError> {
        map_err!(payload.validify());

        self.repo
            .insert_directory(DirectoryInsert {
                name: &payload.name,
                path: &payload.path,
                model_name: &payload.model_name,
                task_types: payload.task_types.as_deref(),
                description: payload.description.as_deref(),
            })
            .await
    }

    pub async fn get_directory(&self, id: i64) -> Result<UploadDirectory, EesError> {
        match self.repo.get_directory(id).await? {
            Some(directory) => Ok(directory),
            None => err!(DoesNotExist, "Upload directory with ID '{id}'"),
        }
    }

    pub async fn list_directories(&self) -> Result<Vec<UploadDirectory>, EesError> {
        self.repo.list_directories().await
    }

    pub async fn update_directory(
        &self,
        id: i64,
        payload: UpdateDirectoryPayload,
    ) -> Result<UploadDirectory, EesError> {
        let update = DirectoryUpdate {
            name: payload.name.as_deref(),
            path: payload.path.as_deref(),
            model_name: payload.model_name.as_deref(),
            task_types: payload.task_types.as_deref(),
            description: payload.description.as_deref(),
        };

        if !self.repo.update_directory(id, update).await? {
            return err!(DoesNotExist, "Upload directory with ID '{id}'");
        }

        self.get_directory(id).await
    }

    /// Deleting a directory cancels whatever is incomplete and
    /// cascades to its sync jobs.
    pub async fn delete_directory(&self, id: i64) -> Result<(), EesError> {
        self.repo.cancel_incomplete_jobs(id).await?;
        if !self.repo.delete_directory(id).await? {
            return err!(DoesNotExist, "Upload directory with ID '{id}'");
        }
        Ok(())
    }

    /// Start a sync job for the directory, or attach to the one
    /// already running. A duplicate start is a no-op returning the
    /// existing job.
    pub async fn start_sync(
        &self,
        directory_id: i64,
    ) -> Result<(SyncJob, broadcast::Receiver<SyncEvent>), EesError> {
        let directory = self.get_directory(directory_id).await?;

        if let Some(job) = self.repo.incomplete_job_for_directory(directory_id).await? {
            if let Some(rx) = self.tracker.subscribe(job.id) {
                info!("Attaching to running sync job '{}'", job.id);
                return Ok((job, rx));
            }

            // A leftover from a previous process. The operator has to
            // cancel it before a new job is accepted.
            return err!(
                AlreadyExists,
                "Sync job '{}' for directory '{directory_id}' was never finished; cancel incomplete jobs first",
                job.id
            );
        }

        let job = self.repo.insert_job(directory_id).await?;

        let Some(tx) = self.tracker.begin(job.id) else {
            match self.tracker.subscribe(job.id) {
                Some(rx) => return Ok((job, rx)),
                None => return err!(AlreadyExists, "Sync job '{}' already finished", job.id),
            }
        };

        let rx = tx.subscribe();

        let service = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            service.run_job(directory, job_id, tx).await;
        });

        Ok((job, rx))
    }

    pub async fn get_job(&self, id: i64) -> Result<SyncJob, EesError> {
        match self.repo.get_job(id).await? {
            Some(job) => Ok(job),
            None => err!(DoesNotExist, "Sync job with ID '{id}'"),
        }
    }

    pub async fn list_jobs(&self, directory_id: i64) -> Result<Vec<SyncJob>, EesError> {
        self.repo.list_jobs(directory_id).await
    }

    /// Flip every incomplete job for the directory to `cancelled`. The
    /// running worker observes the flag between files.
    pub async fn cancel_incomplete_jobs(&self, directory_id: i64) -> Result<u64, EesError> {
        self.get_directory(directory_id).await?;
        self.repo.cancel_incomplete_jobs(directory_id).await
    }

    async fn run_job(self, directory: UploadDirectory, job_id: i64, tx: broadcast::Sender<SyncEvent>) {
        let directory_id = directory.id;

        match self.execute_job(&directory, job_id, &tx).await {
            Ok(JobEnd::Completed(progress)) => {
                let message = format!(
                    "Synced directory '{}': {} processed, {} created, {} updated, {} failed",
                    directory.name,
                    progress.processed_files,
                    progress.created_files,
                    progress.updated_files,
                    progress.failed_files
                );
                info!("{message}");
                send(&tx, completed_event(directory_id, &progress, message));
            }
            Ok(JobEnd::Cancelled(progress)) => {
                info!("Sync job '{job_id}' cancelled");
                send(
                    &tx,
                    completed_event(directory_id, &progress, "Sync cancelled".to_string()),
                );
            }
            Err(e) => {
                error!("Sync job '{job_id}' failed: {e}");
                e.print();

                if let Err(e) = self
                    .repo
                    .finish_job(job_id, SyncJobStatus::Failed, Some(&e.to_string()), Utc::now())
                    .await
                {
                    error!("Failed to record sync job failure: {e}");
                }

                send(
                    &tx,
                    completed_event(
                        directory_id,
                        &SyncProgress::default(),
                        format!("Sync failed: {e}"),
                    ),
                );
            }
        }

        self.tracker.finish(job_id);
    }

    async fn execute_job(
        &self,
        directory: &UploadDirectory,
        job_id: i64,
        tx: &broadcast::Sender<SyncEvent>,
    ) -> Result<JobEnd, EesError> {
        let root = PathBuf::from(&directory.path);

        let matcher = load_matcher(&root).await?;
        let files = collect_files(&root, &matcher).await?;
        let total = files.len() as u32;

        self.repo
            .mark_job_running(job_id, total, Utc::now())
            .await?;

        send(tx, SyncEvent::Collected { total_files: total });

        let task_type = directory
            .task_types
            .as_ref()
            .and_then(|t| t.first())
            .cloned();

        let mut progress = SyncProgress::default();

        for (index, file) in files.iter().enumerate() {
            if self.job_cancelled(job_id).await? {
                return Ok(JobEnd::Cancelled(progress));
            }

            let current = index as u32 + 1;
            let rel = relative(&root, file);

            send(
                tx,
                SyncEvent::Processing {
                    current,
                    total,
                    file: rel.clone(),
                },
            );

            progress.current_file = Some(rel.clone());

            let result = self
                .sync_file(file, &directory.model_name, task_type.as_deref())
                .await;

            let event = match result {
                Ok(created) => {
                    if created {
                        progress.created_files += 1;
                    } else {
                        progress.updated_files += 1;
                    }
                    progress.processed_files += 1;
                    SyncEvent::FileCompleted {
                        current,
                        total,
                        file: rel,
                        created: progress.created_files,
                        updated: progress.updated_files,
                        failed: progress.failed_files,
                    }
                }
                Err(e) => {
                    warn!("Sync of '{rel}' failed: {e}");
                    progress.failed_files += 1;
                    progress.processed_files += 1;
                    progress.failed_file_paths.push(rel.clone());
                    SyncEvent::FileFailed {
                        current,
                        total,
                        file: rel,
                        created: progress.created_files,
                        updated: progress.updated_files,
                        failed: progress.failed_files,
                    }
                }
            };

            self.repo.update_job_progress(job_id, &progress).await?;
            send(tx, event);
        }

        let now = Utc::now();
        self.repo
            .finish_job(job_id, SyncJobStatus::Completed, None, now)
            .await?;
        self.repo.touch_last_synced(directory.id, now).await?;

        Ok(JobEnd::Completed(progress))
    }

    async fn job_cancelled(&self, job_id: i64) -> Result<bool, EesError> {
        let job = self.repo.get_job(job_id).await?;
        Ok(matches!(
            job.map(|j| j.status),
            Some(SyncJobStatus::Cancelled) | None
        ))
    }

    /// Returns true when the file produced a new row, false when it
    /// replaced an existing one.
    async fn sync_file(
        &self,
        file: &std::path::Path,
        model_name: &str,
        task_type: Option<&str>,
    ) -> Result<bool, EesError> {
        let content = map_err!(tokio::fs::read_to_string(file).await);
        let uri = file.to_string_lossy();

        let (outcome, _) = self
            .embeddings
            .embed_and_save(&uri, &content, Some(model_name), task_type)
            .await?;

        Ok(outcome.created)
    }
}

enum JobEnd {
    Completed(SyncProgress),
    Cancelled(SyncProgress),
}

fn completed_event(directory_id: i64, progress: &SyncProgress, message: String) -> SyncEvent {
    SyncEvent::Completed {
        directory_id,
        files_processed: progress.processed_files,
        files_created: progress.created_files,
        files_updated: progress.updated_files,
        files_failed: progress.failed_files,
        message,
    }
}

fn send(tx: &broadcast::Sender<SyncEvent>, event: SyncEvent) {
    // Nobody listening is fine; the job runs to completion regardless.
    let _ = tx.send(event);
}

/// Sync service DTOs.
pub mod dto {
    use serde::Deserialize;
    use utoipa::ToSchema;
    use validify::{field_err, ValidationError, Validify};

    fn absolute_path(s: &str) -> Result<(), ValidationError> {
        if !std::path::Path::new(s).is_absolute() {
            return Err(field_err!("path", "path must be absolute"));
        }
        Ok(())
    }

    #[derive(Debug, Deserialize, Validify, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateDirectoryPayload {
        #[validate(length(min = 1))]
        #[modify(trim)]
        pub name: String,

        /// Absolute path of the directory to sync.
        #[validate(length(min = 1))]
        #[validate(custom(absolute_path))]
        #[modify(trim)]
        pub path: String,

        /// Model used when embedding synced files.
        #[validate(length(min = 1))]
        pub model_name: String,

        /// Task types recorded on synced embeddings.
        pub task_types: Option<Vec<String>>,

        pub description: Option<String>,
    }

    #[derive(Debug, Deserialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateDirectoryPayload {
        pub name: Option<String>,
        pub path: Option<String>,
        pub model_name: Option<String>,
        pub task_types: Option<Vec<String>>,
        pub description: Option<String>,
    }
}
