use super::{
    fmt_time, get_i64, get_opt_text, get_opt_time, get_text, get_time, opt_text_value,
    SqliteRepo,
};
use crate::core::model::directory::{
    DirectoryInsert, DirectoryUpdate, SyncJob, SyncJobStatus, SyncProgress, UploadDirectory,
};
use crate::core::repo::directory::DirectoryRepo;
use crate::error::{EesErr, EesError};
use crate::map_err;
use chrono::{DateTime, Utc};
use libsql::{params_from_iter, Value};

const DIRECTORY_COLUMNS: &str =
    "id, name, path, model_name, task_types, description, last_synced_at, created_at, updated_at";

const JOB_COLUMNS: &str =
    "id, directory_id, status, total_files, processed_files, created_files, updated_files,
     failed_files, failed_file_paths, current_file, error_message, started_at, completed_at,
     created_at, updated_at";

#[async_trait::async_trait]
impl DirectoryRepo for SqliteRepo {
    async fn insert_directory(
        &self,
        directory: DirectoryInsert<'_>,
    ) -> Result<UploadDirectory, EesError> {
        let now = fmt_time(Utc::now());
        let task_types = task_types_value(directory.task_types)?;

        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "INSERT INTO upload_directories
                            (name, path, model_name, task_types, description,
                             created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                         RETURNING {DIRECTORY_COLUMNS}"
                    ),
                    libsql::params![
                        directory.name,
                        directory.path,
                        directory.model_name,
                        task_types,
                        opt_text_value(directory.description),
                        now,
                    ],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => read_directory(&row),
            None => unreachable!("INSERT RETURNING yields a row"),
        }
    }

    async fn get_directory(&self, id: i64) -> Result<Option<UploadDirectory>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {DIRECTORY_COLUMNS} FROM upload_directories WHERE id = ?1"),
                    libsql::params![id],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_directory(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_directories(&self) -> Result<Vec<UploadDirectory>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {DIRECTORY_COLUMNS} FROM upload_directories ORDER BY id ASC"
                    ),
                    (),
                )
                .await
        );

        let mut directories = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            directories.push(read_directory(&row)?);
        }
        Ok(directories)
    }

    async fn update_directory(
        &self,
        id: i64,
        update: DirectoryUpdate<'_>,
    ) -> Result<bool, EesError> {
        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(name) = update.name {
            sets.push("name = ?");
            values.push(Value::Text(name.to_string()));
        }
        if let Some(path) = update.path {
            sets.push("path = ?");
            values.push(Value::Text(path.to_string()));
        }
        if let Some(model_name) = update.model_name {
            sets.push("model_name = ?");
            values.push(Value::Text(model_name.to_string()));
        }
        if let Some(task_types) = update.task_types {
            sets.push("task_types = ?");
            values.push(task_types_value(Some(task_types))?);
        }
        if let Some(description) = update.description {
            sets.push("description = ?");
            values.push(Value::Text(description.to_string()));
        }

        sets.push("updated_at = ?");
        values.push(Value::Text(fmt_time(Utc::now())));
        values.push(Value::Integer(id));

        let affected = map_err!(
            self.conn()
                .execute(
                    &format!(
                        "UPDATE upload_directories SET {} WHERE id = ?",
                        sets.join(", ")
                    ),
                    params_from_iter(values),
                )
                .await
        );
        Ok(affected > 0)
    }

    async fn delete_directory(&self, id: i64) -> Result<bool, EesError> {
        let affected = map_err!(
            self.conn()
                .execute(
                    "DELETE FROM upload_directories WHERE id = ?1",
                    libsql::params![id],
                )
                .await
        );
        Ok(affected > 0)
    }

    async fn touch_last_synced(&self, id: i64, at: DateTime<Utc>) -> Result<(), EesError> {
        map_err!(
            self.conn()
                .execute(
                    "UPDATE upload_directories
                     SET last_synced_at = ?1, updated_at = ?1
                     WHERE id = ?2",
                    libsql::params![fmt_time(at), id],
                )
                .await
        );
        Ok(())
    }

    async fn insert_job(&self, directory_id: i64) -> Result<SyncJob, EesError> {
        let now = fmt_time(Utc::now());

        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "INSERT INTO sync_jobs (directory_id, status, created_at, updated_at)
                         VALUES (?1, 'pending', ?2, ?2)
                         RETURNING {JOB_COLUMNS}"
                    ),
                    libsql::params![directory_id, now],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => read_job(&row),
            None => unreachable!("INSERT RETURNING yields a row"),
        }
    }

    async fn get_job(&self, id: i64) -> Result<Option<SyncJob>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {JOB_COLUMNS} FROM sync_jobs WHERE id = ?1"),
                    libsql::params![id],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_jobs(&self, directory_id: i64) -> Result<Vec<SyncJob>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM sync_jobs
                         WHERE directory_id = ?1
                         ORDER BY id DESC"
                    ),
                    libsql::params![directory_id],
                )
                .await
        );

        let mut jobs = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            jobs.push(read_job(&row)?);
        }
        Ok(jobs)
    }

    async fn incomplete_job_for_directory(
        &self,
        directory_id: i64,
    ) -> Result<Option<SyncJob>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {JOB_COLUMNS} FROM sync_jobs
                         WHERE directory_id = ?1 AND status IN ('pending', 'running')
                         ORDER BY id DESC"
                    ),
                    libsql::params![directory_id],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_job(&row)?)),
            None => Ok(None),
        }
    }

    async fn mark_job_running(
        &self,
        id: i64,
        total_files: u32,
        started_at: DateTime<Utc>,
    ) -> Result<(), EesError> {
        map_err!(
            self.conn()
                .execute(
                    "UPDATE sync_jobs
                     SET status = 'running', total_files = ?1, started_at = ?2, updated_at = ?2
                     WHERE id = ?3",
                    libsql::params![total_files as i64, fmt_time(started_at), id],
                )
                .await
        );
        Ok(())
    }

    async fn update_job_progress(&self, id: i64, progress: &SyncProgress) -> Result<(), EesError> {
        let failed_paths = map_err!(serde_json::to_string(&progress.failed_file_paths));

        map_err!(
            self.conn()
                .execute(
                    "UPDATE sync_jobs
                     SET processed_files = ?1,
                         created_files = ?2,
                         updated_files = ?3,
                         failed_files = ?4,
                         failed_file_paths = ?5,
                         current_file = ?6,
                         updated_at = ?7
                     WHERE id = ?8",
                    libsql::params![
                        progress.processed_files as i64,
                        progress.created_files as i64,
                        progress.updated_files as i64,
                        progress.failed_files as i64,
                        failed_paths,
                        opt_text_value(progress.current_file.as_deref()),
                        fmt_time(Utc::now()),
                        id,
                    ],
                )
                .await
        );
        Ok(())
    }

    async fn finish_job(
        &self,
        id: i64,
        status: SyncJobStatus,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), EesError> {
        debug_assert!(status.is_terminal());

        map_err!(
            self.conn()
                .execute(
                    "UPDATE sync_jobs
                     SET status = ?1, error_message = ?2, current_file = NULL,
                         completed_at = ?3, updated_at = ?3
                     WHERE id = ?4",
                    libsql::params![
                        status.as_str(),
                        opt_text_value(error_message),
                        fmt_time(completed_at),
                        id,
                    ],
                )
                .await
        );
        Ok(())
    }

    async fn cancel_incomplete_jobs(&self, directory_id: i64) -> Result<u64, EesError> {
        let affected = map_err!(
            self.conn()
                .execute(
                    "UPDATE sync_jobs
                     SET status = 'cancelled', completed_at = ?1, updated_at = ?1
                     WHERE directory_id = ?2 AND status IN ('pending', 'running')",
                    libsql::params![fmt_time(Utc::now()), directory_id],
                )
                .await
        );
        Ok(affected)
    }
}

fn task_types_value(task_types: Option<&[String]>) -> Result<Value, EesError> {
    match task_types {
        Some(t) => Ok(Value::Text(map_err!(serde_json::to_string(t)))),
        None => Ok(Value::Null),
    }
}

fn read_directory(row: &libsql::Row) -> Result<UploadDirectory, EesError> {
    let task_types = match get_opt_text(row, 4)? {
        Some(s) => Some(map_err!(serde_json::from_str(&s))),
        None => None,
    };

    Ok(UploadDirectory {
        id: get_i64(row, 0)?,
        name: get_text(row, 1)?,
        path: get_text(row, 2)?,
        model_name: get_text(row, 3)?,
        task_types,
        description: get_opt_text(row, 5)?,
        last_synced_at: get_opt_time(row, 6)?,
        created_at: get_time(row, 7)?,
        updated_at: get_time(row, 8)?,
    })
}

fn read_job(row: &libsql::Row) -> Result<SyncJob, EesError> {
    let status = get_text(row, 2)?;
    let status = status.parse::<SyncJobStatus>().map_err(|e| {
        EesError::new(file!(), line!(), column!(), EesErr::MalformedRow(e))
    })?;

    let failed_file_paths = map_err!(serde_json::from_str(&get_text(row, 8)?));

    Ok(SyncJob {
        id: get_i64(row, 0)?,
        directory_id: get_i64(row, 1)?,
        status,
        total_files: get_i64(row, 3)? as u32,
        processed_files: get_i64(row, 4)? as u32,
        created_files: get_i64(row, 5)? as u32,
        updated_files: get_i64(row, 6)? as u32,
        failed_files: get_i64(row, 7)? as u32,
        failed_file_paths,
        current_file: get_opt_text(row, 9)?,
        error_message: get_opt_text(row, 10)?,
        started_at: get_opt_time(row, 11)?,
        completed_at: get_opt_time(row, 12)?,
        created_at: get_time(row, 13)?,
        updated_at: get_time(row, 14)?,
    })
}
