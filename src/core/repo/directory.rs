use crate::core::model::directory::{
    DirectoryInsert, DirectoryUpdate, SyncJob, SyncJobStatus, SyncProgress, UploadDirectory,
};
use crate::error::EesError;
use chrono::{DateTime, Utc};

/// Persistence for registered directories and their sync jobs.
#[async_trait::async_trait]
pub trait DirectoryRepo {
    async fn insert_directory(
        &self,
        directory: DirectoryInsert<'_>,
    ) -> Result<UploadDirectory, EesError>;

    async fn get_directory(&self, id: i64) -> Result<Option<UploadDirectory>, EesError>;

    async fn list_directories(&self) -> Result<Vec<UploadDirectory>, EesError>;

    async fn update_directory(
        &self,
        id: i64,
        update: DirectoryUpdate<'_>,
    ) -> Result<bool, EesError>;

    /// Cascades to the directory's sync jobs.
    async fn delete_directory(&self, id: i64) -> Result<bool, EesError>;

    async fn touch_last_synced(&self, id: i64, at: DateTime<Utc>) -> Result<(), EesError>;

    /// Creates a job in `pending` state.
    async fn insert_job(&self, directory_id: i64) -> Result<SyncJob, EesError>;

    async fn get_job(&self, id: i64) -> Result<Option<SyncJob>, EesError>;

    async fn list_jobs(&self, directory_id: i64) -> Result<Vec<SyncJob>, EesError>;

    /// A non-terminal job for the directory, when one exists.
    async fn incomplete_job_for_directory(
        &self,
        directory_id: i64,
    ) -> Result<Option<SyncJob>, EesError>;

    /// Moves the job to `running`, recording the collected file count.
    async fn mark_job_running(
        &self,
        id: i64,
        total_files: u32,
        started_at: DateTime<Utc>,
    ) -> Result<(), EesError>;

    /// Persists the running counters after a processed file.
    async fn update_job_progress(&self, id: i64, progress: &SyncProgress) -> Result<(), EesError>;

    /// Moves the job to a terminal state.
    async fn finish_job(
        &self,
        id: i64,
        status: SyncJobStatus,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), EesError>;

    /// Flips every `pending`/`running` job for the directory to
    /// `cancelled`. Returns the number of jobs affected.
    async fn cancel_incomplete_jobs(&self, directory_id: i64) -> Result<u64, EesError>;
}
