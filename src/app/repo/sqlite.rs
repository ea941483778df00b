//! libsql backed persistence. The local database ships the vector
//! primitives the repositories lean on: the `F32_BLOB` column type,
//! `vector32`, `vector_distance_cos` and the `vector_top_k` operator
//! over a `libsql_vector_idx` index.

use crate::core::repo::Atomic;
use crate::error::{EesErr, EesError};
use crate::map_err;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Value};
use std::sync::Arc;
use tracing::{info, warn};

pub mod directory;
pub mod embedding;
pub mod model;

/// Name of the vector index `vector_top_k` is pointed at.
pub const VECTOR_INDEX: &str = "idx_embeddings_embedding";

const VECTOR_TYPE_MARKER: &str = "F32_BLOB";

#[derive(Clone)]
pub struct SqliteRepo {
    conn: Connection,
    // Keeps the database handle alive for the connection's lifetime.
    _db: Arc<libsql::Database>,
}

/// Open (or create) the database at `url` and bring the schema up to
/// date. `dimensions` is the embedding width baked into the vector
/// column on creation.
pub async fn init(url: &str, dimensions: usize) -> Result<SqliteRepo, EesError> {
    let db = map_err!(Builder::new_local(url).build().await);
    let conn = map_err!(db.connect());

    let repo = SqliteRepo {
        conn,
        _db: Arc::new(db),
    };

    repo.ensure_schema(dimensions).await?;

    info!("Connected to database at '{url}'");
    Ok(repo)
}

impl SqliteRepo {
    pub(super) fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn ensure_schema(&self, dimensions: usize) -> Result<(), EesError> {
        map_err!(self.conn.execute("PRAGMA foreign_keys = ON", ()).await);

        map_err!(
            self.conn
                .execute_batch(
                    "CREATE TABLE IF NOT EXISTS providers (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        kind TEXT NOT NULL,
                        base_url TEXT NOT NULL,
                        api_key TEXT,
                        metadata TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL,
                        UNIQUE (kind, base_url)
                    );

                    CREATE TABLE IF NOT EXISTS models (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        provider_id INTEGER NOT NULL
                            REFERENCES providers(id) ON DELETE CASCADE,
                        name TEXT NOT NULL UNIQUE,
                        display_name TEXT,
                        is_active INTEGER NOT NULL DEFAULT 0,
                        metadata TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS upload_directories (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        name TEXT NOT NULL,
                        path TEXT NOT NULL,
                        model_name TEXT NOT NULL,
                        task_types TEXT,
                        description TEXT,
                        last_synced_at TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );

                    CREATE TABLE IF NOT EXISTS sync_jobs (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        directory_id INTEGER NOT NULL
                            REFERENCES upload_directories(id) ON DELETE CASCADE,
                        status TEXT NOT NULL DEFAULT 'pending',
                        total_files INTEGER NOT NULL DEFAULT 0,
                        processed_files INTEGER NOT NULL DEFAULT 0,
                        created_files INTEGER NOT NULL DEFAULT 0,
                        updated_files INTEGER NOT NULL DEFAULT 0,
                        failed_files INTEGER NOT NULL DEFAULT 0,
                        failed_file_paths TEXT NOT NULL DEFAULT '[]',
                        current_file TEXT,
                        error_message TEXT,
                        started_at TEXT,
                        completed_at TEXT,
                        created_at TEXT NOT NULL,
                        updated_at TEXT NOT NULL
                    );"
                )
                .await
        );

        self.migrate_embeddings_table(dimensions).await
    }

    /// Detect whether the `embeddings` table carries the fixed-width
    /// vector column, and rebuild it when it does not.
    ///
    /// Legacy vectors are discarded: a blob cannot be losslessly
    /// reinterpreted when the target dimension differs. The snapshot
    /// rows are re-inserted with a null vector so their text survives
    /// for re-embedding; the count is logged for the operator.
    async fn migrate_embeddings_table(&self, dimensions: usize) -> Result<(), EesError> {
        match self.embeddings_table_ddl().await? {
            None => {
                self.create_embeddings_table(dimensions).await?;
                info!("Created embeddings table with {dimensions} dimension vectors");
                Ok(())
            }
            Some(ddl) if ddl.contains(VECTOR_TYPE_MARKER) => Ok(()),
            Some(_) => self.rebuild_embeddings_table(dimensions).await,
        }
    }

    async fn rebuild_embeddings_table(&self, dimensions: usize) -> Result<(), EesError> {
        // Another caller may have finished the rebuild between our two
        // reads; migration is then already done.
        let Some(ddl) = self.embeddings_table_ddl().await? else {
            return self.create_embeddings_table(dimensions).await;
        };
        if ddl.contains(VECTOR_TYPE_MARKER) {
            return Ok(());
        }

        let snapshot = self.snapshot_legacy_rows().await?;

        warn!(
            "Rebuilding embeddings table for {dimensions} dimension vectors; \
             discarding {} stored vector(s). The affected rows must be re-embedded.",
            snapshot.len()
        );

        self.conn
            .execute("DROP TABLE embeddings", ())
            .await
            .map_err(|e| migration_err("dropping legacy embeddings table", e))?;

        self.create_embeddings_table(dimensions).await?;

        for row in &snapshot {
            self.conn
                .execute(
                    "INSERT INTO embeddings
                        (uri, text, model_name, task_type, embedding,
                         original_content, converted_format, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
                    libsql::params![
                        row.uri.as_str(),
                        row.text.as_str(),
                        row.model_name.as_str(),
                        opt_text_value(row.task_type.as_deref()),
                        opt_text_value(row.original_content.as_deref()),
                        opt_text_value(row.converted_format.as_deref()),
                        row.created_at.as_str(),
                        row.updated_at.as_str(),
                    ],
                )
                .await
                .map_err(|e| migration_err("restoring snapshot rows", e))?;
        }

        Ok(())
    }

    async fn snapshot_legacy_rows(&self) -> Result<Vec<LegacyEmbeddingRow>, EesError> {
        let mut rows = self
            .conn
            .query(
                "SELECT uri, text, model_name, task_type,
                        original_content, converted_format, created_at, updated_at
                 FROM embeddings",
                (),
            )
            .await
            .map_err(|e| migration_err("reading legacy embeddings table", e))?;

        let mut snapshot = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| migration_err("reading legacy embeddings table", e))?
        {
            snapshot.push(LegacyEmbeddingRow {
                uri: get_text(&row, 0)?,
                text: get_text(&row, 1)?,
                model_name: get_text(&row, 2)?,
                task_type: get_opt_text(&row, 3)?,
                original_content: get_opt_text(&row, 4)?,
                converted_format: get_opt_text(&row, 5)?,
                created_at: get_text(&row, 6)?,
                updated_at: get_text(&row, 7)?,
            });
        }

        Ok(snapshot)
    }

    async fn create_embeddings_table(&self, dimensions: usize) -> Result<(), EesError> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS embeddings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uri TEXT NOT NULL,
                text TEXT NOT NULL,
                model_name TEXT NOT NULL,
                task_type TEXT,
                embedding F32_BLOB({dimensions}),
                original_content TEXT,
                converted_format TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_embeddings_uri
                ON embeddings(uri);
            CREATE INDEX IF NOT EXISTS idx_embeddings_created_at
                ON embeddings(created_at);
            CREATE INDEX IF NOT EXISTS idx_embeddings_model_name
                ON embeddings(model_name);
            CREATE INDEX IF NOT EXISTS {VECTOR_INDEX}
                ON embeddings(libsql_vector_idx(embedding, 'metric=cosine'));"
        );

        self.conn
            .execute_batch(&ddl)
            .await
            .map_err(|e| migration_err("creating embeddings table", e))?;

        Ok(())
    }

    async fn embeddings_table_ddl(&self) -> Result<Option<String>, EesError> {
        let mut rows = map_err!(
            self.conn
                .query(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'embeddings'",
                    (),
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(get_text(&row, 0)?)),
            None => Ok(None),
        }
    }
}

impl Atomic for SqliteRepo {
    type Tx = libsql::Transaction;

    async fn start_tx(&self) -> Result<Self::Tx, EesError> {
        let tx = map_err!(self.conn.transaction().await);
        Ok(tx)
    }

    async fn commit_tx(&self, tx: Self::Tx) -> Result<(), EesError> {
        map_err!(tx.commit().await);
        Ok(())
    }

    async fn abort_tx(&self, tx: Self::Tx) -> Result<(), EesError> {
        map_err!(tx.rollback().await);
        Ok(())
    }
}

struct LegacyEmbeddingRow {
    uri: String,
    text: String,
    model_name: String,
    task_type: Option<String>,
    original_content: Option<String>,
    converted_format: Option<String>,
    created_at: String,
    updated_at: String,
}

fn migration_err(step: &str, e: libsql::Error) -> EesError {
    EesError::new(
        file!(),
        line!(),
        column!(),
        EesErr::Migration(format!("{step}; {e}")),
    )
}

/// Maps unique constraint violations to [EesErr::AlreadyExists] so
/// they surface as conflicts instead of opaque SQL errors.
pub(super) fn insert_err(e: libsql::Error, what: impl Into<String>) -> EesError {
    let error = if e.to_string().contains("UNIQUE constraint failed") {
        EesErr::AlreadyExists(what.into())
    } else {
        EesErr::Sql(e)
    };
    EesError::new(file!(), line!(), column!(), error)
}

pub(super) fn fmt_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(super) fn parse_time(s: &str) -> Result<DateTime<Utc>, EesError> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        Err(e) => Err(EesError::new(
            file!(),
            line!(),
            column!(),
            EesErr::MalformedRow(format!("invalid timestamp '{s}': {e}")),
        )),
    }
}

pub(super) fn opt_text_value(v: Option<&str>) -> Value {
    match v {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn column_err(idx: i32, expected: &str, got: &Value) -> EesError {
    EesError::new(
        file!(),
        line!(),
        column!(),
        EesErr::MalformedRow(format!("column {idx}: expected {expected}, got {got:?}")),
    )
}

fn value_at(row: &libsql::Row, idx: i32) -> Result<Value, EesError> {
    row.get_value(idx)
        .map_err(|e| EesError::new(file!(), line!(), column!(), e.into()))
}

pub(super) fn get_i64(row: &libsql::Row, idx: i32) -> Result<i64, EesError> {
    match value_at(row, idx)? {
        Value::Integer(i) => Ok(i),
        v => Err(column_err(idx, "integer", &v)),
    }
}

pub(super) fn get_f64(row: &libsql::Row, idx: i32) -> Result<f64, EesError> {
    match value_at(row, idx)? {
        Value::Real(f) => Ok(f),
        Value::Integer(i) => Ok(i as f64),
        v => Err(column_err(idx, "real", &v)),
    }
}

pub(super) fn get_text(row: &libsql::Row, idx: i32) -> Result<String, EesError> {
    match value_at(row, idx)? {
        Value::Text(s) => Ok(s),
        v => Err(column_err(idx, "text", &v)),
    }
}

pub(super) fn get_opt_text(row: &libsql::Row, idx: i32) -> Result<Option<String>, EesError> {
    match value_at(row, idx)? {
        Value::Text(s) => Ok(Some(s)),
        Value::Null => Ok(None),
        v => Err(column_err(idx, "text or null", &v)),
    }
}

pub(super) fn get_opt_blob(row: &libsql::Row, idx: i32) -> Result<Option<Vec<u8>>, EesError> {
    match value_at(row, idx)? {
        Value::Blob(b) => Ok(Some(b)),
        Value::Null => Ok(None),
        v => Err(column_err(idx, "blob or null", &v)),
    }
}

pub(super) fn get_bool(row: &libsql::Row, idx: i32) -> Result<bool, EesError> {
    Ok(get_i64(row, idx)? != 0)
}

pub(super) fn get_time(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>, EesError> {
    parse_time(&get_text(row, idx)?)
}

pub(super) fn get_opt_time(
    row: &libsql::Row,
    idx: i32,
) -> Result<Option<DateTime<Utc>>, EesError> {
    match get_opt_text(row, idx)? {
        Some(s) => Ok(Some(parse_time(&s)?)),
        None => Ok(None),
    }
}
