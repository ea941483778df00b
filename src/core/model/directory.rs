use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// A directory registered for file ingestion. Main model for the
/// `upload_directories` table.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadDirectory {
    /// Primary key.
    pub id: i64,

    /// Human readable name.
    pub name: String,

    /// Absolute path to the directory.
    pub path: String,

    /// The model used when embedding synced files.
    pub model_name: String,

    /// Task types to record on synced embeddings.
    pub task_types: Option<Vec<String>>,

    pub description: Option<String>,

    pub last_synced_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct DirectoryInsert<'a> {
    pub name: &'a str,
    pub path: &'a str,
    pub model_name: &'a str,
    pub task_types: Option<&'a [String]>,
    pub description: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct DirectoryUpdate<'a> {
    pub name: Option<&'a str>,
    pub path: Option<&'a str>,
    pub model_name: Option<&'a str>,
    pub task_types: Option<&'a [String]>,
    pub description: Option<&'a str>,
}

/// Lifecycle state of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncJobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SyncJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncJobStatus::Pending => "pending",
            SyncJobStatus::Running => "running",
            SyncJobStatus::Completed => "completed",
            SyncJobStatus::Failed => "failed",
            SyncJobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncJobStatus::Completed | SyncJobStatus::Failed | SyncJobStatus::Cancelled
        )
    }
}

impl fmt::Display for SyncJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncJobStatus::Pending),
            "running" => Ok(SyncJobStatus::Running),
            "completed" => Ok(SyncJobStatus::Completed),
            "failed" => Ok(SyncJobStatus::Failed),
            "cancelled" => Ok(SyncJobStatus::Cancelled),
            s => Err(format!("unknown sync job status '{s}'")),
        }
    }
}

/// A single directory walk. Main model for the `sync_jobs` table.
///
/// `processed_files` is always `created_files + updated_files + failed_files`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncJob {
    /// Primary key.
    pub id: i64,

    /// Owning directory.
    pub directory_id: i64,

    pub status: SyncJobStatus,

    pub total_files: u32,
    pub processed_files: u32,
    pub created_files: u32,
    pub updated_files: u32,
    pub failed_files: u32,

    /// Relative paths of the files that failed.
    pub failed_file_paths: Vec<String>,

    /// The file currently being processed.
    pub current_file: Option<String>,

    /// Set when the job as a whole failed.
    pub error_message: Option<String>,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Running counters persisted after every processed file.
#[derive(Debug, Clone, Default)]
pub struct SyncProgress {
    pub processed_files: u32,
    pub created_files: u32,
    pub updated_files: u32,
    pub failed_files: u32,
    pub failed_file_paths: Vec<String>,
    pub current_file: Option<String>,
}

/// Progress events streamed to sync subscribers.
///
/// Serialized untagged; the event name travels as the SSE event type.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SyncEvent {
    Collected {
        #[serde(rename = "totalFiles")]
        total_files: u32,
    },
    Processing {
        current: u32,
        total: u32,
        file: String,
    },
    FileCompleted {
        current: u32,
        total: u32,
        file: String,
        created: u32,
        updated: u32,
        failed: u32,
    },
    FileFailed {
        current: u32,
        total: u32,
        file: String,
        created: u32,
        updated: u32,
        failed: u32,
    },
    Completed {
        #[serde(rename = "directoryId")]
        directory_id: i64,
        #[serde(rename = "filesProcessed")]
        files_processed: u32,
        #[serde(rename = "filesCreated")]
        files_created: u32,
        #[serde(rename = "filesUpdated")]
        files_updated: u32,
        #[serde(rename = "filesFailed")]
        files_failed: u32,
        message: String,
    },
}

impl SyncEvent {
    /// The SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::Collected { .. } => "collected",
            SyncEvent::Processing { .. } => "processing",
            SyncEvent::FileCompleted { .. } => "file_completed",
            SyncEvent::FileFailed { .. } => "file_failed",
            SyncEvent::Completed { .. } => "completed",
        }
    }
}
