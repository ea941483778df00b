use super::{
    fmt_time, get_f64, get_i64, get_opt_blob, get_opt_text, get_text, get_time, opt_text_value,
    SqliteRepo, VECTOR_INDEX,
};
use crate::core::model::embedding::{
    Embedding, EmbeddingInsert, EmbeddingListParams, SaveOutcome, SearchMatch, SimilarityMetric,
    SimilaritySearch,
};
use crate::core::model::Paginated;
use crate::core::repo::embedding::EmbeddingRepo;
use crate::error::{EesErr, EesError};
use crate::{err, map_err};
use chrono::Utc;
use libsql::{params_from_iter, Value};
use tracing::warn;

const EMBEDDING_COLUMNS: &str =
    "id, uri, text, model_name, task_type, embedding, original_content, converted_format,
     created_at, updated_at";

#[async_trait::async_trait]
impl EmbeddingRepo for SqliteRepo {
    async fn save(&self, insert: EmbeddingInsert<'_>) -> Result<SaveOutcome, EesError> {
        let now = fmt_time(Utc::now());
        let vector = map_err!(serde_json::to_string(insert.vector));

        let mut rows = map_err!(
            self.conn()
                .query(
                    "INSERT INTO embeddings
                        (uri, text, model_name, task_type, embedding,
                         original_content, converted_format, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, vector32(?5), ?6, ?7, ?8, ?8)
                     ON CONFLICT(uri) DO UPDATE SET
                        text = excluded.text,
                        model_name = excluded.model_name,
                        task_type = excluded.task_type,
                        embedding = excluded.embedding,
                        original_content = excluded.original_content,
                        converted_format = excluded.converted_format,
                        updated_at = excluded.updated_at
                     RETURNING id, (created_at = updated_at) AS created",
                    libsql::params![
                        insert.uri,
                        insert.text,
                        insert.model_name,
                        opt_text_value(insert.task_type),
                        vector,
                        opt_text_value(insert.original_content),
                        opt_text_value(insert.converted_format),
                        now,
                    ],
                )
                .await
        );

        let Some(row) = map_err!(rows.next().await) else {
            return err!(MalformedRow, "upsert returned no row");
        };

        Ok(SaveOutcome {
            id: get_i64(&row, 0)?,
            created: get_i64(&row, 1)? != 0,
        })
    }

    async fn find_by_uri(
        &self,
        uri: &str,
        model_name: &str,
    ) -> Result<Option<Embedding>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {EMBEDDING_COLUMNS}
                         FROM embeddings
                         WHERE uri = ?1 AND model_name = ?2"
                    ),
                    libsql::params![uri, model_name],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_embedding(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(
        &self,
        params: EmbeddingListParams<'_>,
    ) -> Result<Paginated<Embedding>, EesError> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(uri) = params.uri {
            clauses.push("uri LIKE ?");
            values.push(Value::Text(format!("%{uri}%")));
        }
        if let Some(model_name) = params.model_name {
            clauses.push("model_name = ?");
            values.push(Value::Text(model_name.to_string()));
        }

        let filter = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT COUNT(id) FROM embeddings{filter}"),
                    params_from_iter(values.clone()),
                )
                .await
        );
        let total = match map_err!(rows.next().await) {
            Some(row) => get_i64(&row, 0)? as usize,
            None => 0,
        };

        let (limit, offset) = params.pagination.to_limit_offset();
        values.push(Value::Integer(limit as i64));
        values.push(Value::Integer(offset as i64));

        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {EMBEDDING_COLUMNS}
                         FROM embeddings{filter}
                         ORDER BY created_at ASC
                         LIMIT ? OFFSET ?"
                    ),
                    params_from_iter(values),
                )
                .await
        );

        let mut items = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            match read_embedding(&row) {
                Ok(embedding) => items.push(embedding),
                // A row that cannot be decoded does not fail the listing.
                Err(e) => warn!("Skipping embedding row: {e}"),
            }
        }

        Ok(Paginated::new(items, total, params.pagination))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, EesError> {
        let affected = map_err!(
            self.conn()
                .execute("DELETE FROM embeddings WHERE id = ?1", libsql::params![id])
                .await
        );
        Ok(affected > 0)
    }

    async fn update_by_id(&self, id: i64, text: &str, vector: &[f32]) -> Result<bool, EesError> {
        let now = fmt_time(Utc::now());
        let vector = map_err!(serde_json::to_string(vector));

        let affected = map_err!(
            self.conn()
                .execute(
                    "UPDATE embeddings
                     SET text = ?1, embedding = vector32(?2), updated_at = ?3
                     WHERE id = ?4",
                    libsql::params![text, vector, now, id],
                )
                .await
        );
        Ok(affected > 0)
    }

    async fn search_similar(
        &self,
        search: SimilaritySearch<'_>,
    ) -> Result<Vec<SearchMatch>, EesError> {
        match search.metric {
            SimilarityMetric::Cosine => self.search_cosine(search).await,
            SimilarityMetric::Euclidean | SimilarityMetric::DotProduct => {
                self.search_rescored(search).await
            }
        }
    }

    async fn count_by_model(&self, model_name: &str) -> Result<usize, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    "SELECT COUNT(id) FROM embeddings WHERE model_name = ?1",
                    libsql::params![model_name],
                )
                .await
        );
        match map_err!(rows.next().await) {
            Some(row) => Ok(get_i64(&row, 0)? as usize),
            None => Ok(0),
        }
    }

    async fn list_by_model(
        &self,
        model_name: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Embedding>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {EMBEDDING_COLUMNS}
                         FROM embeddings
                         WHERE model_name = ?1
                         ORDER BY id ASC
                         LIMIT ?2 OFFSET ?3"
                    ),
                    libsql::params![model_name, limit as i64, offset as i64],
                )
                .await
        );

        let mut items = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            // Migration re-embeds from text; an undecodable or null
            // vector must not keep the row out of the candidate set.
            items.push(read_embedding_lossy(&row)?);
        }
        Ok(items)
    }

    async fn replace_vector(
        &self,
        id: i64,
        model_name: &str,
        vector: &[f32],
    ) -> Result<bool, EesError> {
        let now = fmt_time(Utc::now());
        let vector = map_err!(serde_json::to_string(vector));

        let affected = map_err!(
            self.conn()
                .execute(
                    "UPDATE embeddings
                     SET model_name = ?1, embedding = vector32(?2), updated_at = ?3
                     WHERE id = ?4",
                    libsql::params![model_name, vector, now, id],
                )
                .await
        );
        Ok(affected > 0)
    }
}

impl SqliteRepo {
    /// ANN path: sublinear candidate selection through the vector
    /// index, similarity projected as reverse cosine distance so the
    /// score lands in [0, 1].
    async fn search_cosine(
        &self,
        search: SimilaritySearch<'_>,
    ) -> Result<Vec<SearchMatch>, EesError> {
        let query = map_err!(serde_json::to_string(search.query_vector));

        let mut values: Vec<Value> = vec![
            Value::Text(query),
            Value::Integer(search.limit as i64),
            Value::Text(search.model_name.to_string()),
        ];

        let threshold_filter = match search.threshold {
            Some(threshold) => {
                values.push(Value::Real(threshold));
                " AND (1.0 - vector_distance_cos(e.embedding, vector32(?1))) >= ?4"
            }
            None => "",
        };

        let sql = format!(
            "SELECT e.id, e.uri, e.text, e.model_name,
                    (1.0 - vector_distance_cos(e.embedding, vector32(?1))) AS similarity,
                    e.created_at, e.updated_at
             FROM vector_top_k('{VECTOR_INDEX}', vector32(?1), ?2) AS t
             JOIN embeddings e ON e.rowid = t.id
             WHERE e.model_name = ?3{threshold_filter}
             ORDER BY similarity DESC"
        );

        let mut rows = map_err!(self.conn().query(&sql, params_from_iter(values)).await);

        let mut matches = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            matches.push(SearchMatch {
                id: get_i64(&row, 0)?,
                uri: get_text(&row, 1)?,
                text: get_text(&row, 2)?,
                model_name: get_text(&row, 3)?,
                similarity: get_f64(&row, 4)?,
                created_at: get_time(&row, 5)?,
                updated_at: get_time(&row, 6)?,
            });
        }

        Ok(matches)
    }

    /// Non-cosine path. The index only serves the metric it was built
    /// for, so candidates are fetched by ascending cosine distance and
    /// the requested metric is computed here, over the decoded vectors.
    async fn search_rescored(
        &self,
        search: SimilaritySearch<'_>,
    ) -> Result<Vec<SearchMatch>, EesError> {
        let query = map_err!(serde_json::to_string(search.query_vector));

        let mut rows = map_err!(
            self.conn()
                .query(
                    "SELECT id, uri, text, model_name, embedding, created_at, updated_at
                     FROM embeddings
                     WHERE model_name = ?1 AND embedding IS NOT NULL
                     ORDER BY vector_distance_cos(embedding, vector32(?2)) ASC
                     LIMIT ?3",
                    libsql::params![search.model_name, query, search.limit as i64],
                )
                .await
        );

        let mut matches = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            let vector = match get_opt_blob(&row, 4)? {
                Some(blob) => match decode_vector(&blob) {
                    Ok(vector) => vector,
                    Err(e) => {
                        warn!("Skipping search candidate: {e}");
                        continue;
                    }
                },
                None => continue,
            };

            let similarity = match search.metric {
                SimilarityMetric::Euclidean => {
                    euclidean_similarity(search.query_vector, &vector)
                }
                SimilarityMetric::DotProduct => dot_product(search.query_vector, &vector),
                SimilarityMetric::Cosine => unreachable!("cosine goes through the index"),
            };

            if let Some(threshold) = search.threshold {
                if similarity < threshold {
                    continue;
                }
            }

            matches.push(SearchMatch {
                id: get_i64(&row, 0)?,
                uri: get_text(&row, 1)?,
                text: get_text(&row, 2)?,
                model_name: get_text(&row, 3)?,
                similarity,
                created_at: get_time(&row, 5)?,
                updated_at: get_time(&row, 6)?,
            });
        }

        matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

        Ok(matches)
    }
}

fn read_embedding(row: &libsql::Row) -> Result<Embedding, EesError> {
    let vector = match get_opt_blob(row, 5)? {
        Some(blob) => decode_vector(&blob)?,
        None => return err!(VectorDecode, "row has no stored vector"),
    };
    read_embedding_with(row, vector)
}

/// Like [read_embedding], with a missing or corrupt vector decoded to
/// an empty one instead of an error.
fn read_embedding_lossy(row: &libsql::Row) -> Result<Embedding, EesError> {
    let vector = get_opt_blob(row, 5)?
        .and_then(|blob| decode_vector(&blob).ok())
        .unwrap_or_default();
    read_embedding_with(row, vector)
}

fn read_embedding_with(row: &libsql::Row, vector: Vec<f32>) -> Result<Embedding, EesError> {
    Ok(Embedding {
        id: get_i64(row, 0)?,
        uri: get_text(row, 1)?,
        text: get_text(row, 2)?,
        model_name: get_text(row, 3)?,
        task_type: get_opt_text(row, 4)?,
        embedding: vector,
        original_content: get_opt_text(row, 6)?,
        converted_format: get_opt_text(row, 7)?,
        created_at: get_time(row, 8)?,
        updated_at: get_time(row, 9)?,
    })
}

fn decode_vector(blob: &[u8]) -> Result<Vec<f32>, EesError> {
    if blob.len() % 4 != 0 {
        return Err(EesError::new(
            file!(),
            line!(),
            column!(),
            EesErr::VectorDecode(format!("blob length {} is not a multiple of 4", blob.len())),
        ));
    }

    Ok(blob
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn euclidean_similarity(a: &[f32], b: &[f32]) -> f64 {
    let distance = a
        .iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (x - y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt();

    1.0 / (1.0 + distance)
}

fn dot_product(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x * y) as f64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_blob_round_trip() {
        let vector = [1.0f32, -0.5, 0.25];
        let blob = vector
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect::<Vec<_>>();

        assert_eq!(vector.to_vec(), decode_vector(&blob).unwrap());
    }

    #[test]
    fn truncated_blob_is_rejected() {
        assert!(decode_vector(&[0, 0, 0]).is_err());
    }

    #[test]
    fn euclidean_similarity_is_one_for_identical_vectors() {
        let v = [0.3f32, 0.4, 0.5];
        assert!((euclidean_similarity(&v, &v) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn euclidean_similarity_decreases_with_distance() {
        let origin = [0.0f32, 0.0];
        let near = [0.1f32, 0.0];
        let far = [5.0f32, 0.0];
        assert!(
            euclidean_similarity(&origin, &near) > euclidean_similarity(&origin, &far)
        );
    }

    #[test]
    fn dot_product_matches_hand_computation() {
        let a = [1.0f32, 2.0, 3.0];
        let b = [4.0f32, 5.0, 6.0];
        assert!((dot_product(&a, &b) - 32.0).abs() < 1e-9);
    }
}
