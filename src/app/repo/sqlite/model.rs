use super::{
    fmt_time, get_bool, get_i64, get_opt_text, get_text, get_time, insert_err, opt_text_value,
    SqliteRepo,
};
use crate::core::model::provider::{
    Model, ModelInsert, Provider, ProviderInsert, ProviderKind, ProviderUpdate,
};
use crate::core::repo::model::ModelRepo;
use crate::error::{EesErr, EesError};
use crate::map_err;
use chrono::Utc;
use libsql::{params_from_iter, Value};

const PROVIDER_COLUMNS: &str =
    "id, name, kind, base_url, api_key, metadata, created_at, updated_at";

const MODEL_COLUMNS: &str =
    "id, provider_id, name, display_name, is_active, metadata, created_at, updated_at";

#[async_trait::async_trait]
impl ModelRepo for SqliteRepo {
    async fn insert_provider(&self, provider: ProviderInsert<'_>) -> Result<Provider, EesError> {
        let now = fmt_time(Utc::now());
        let metadata = json_value(provider.metadata)?;

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO providers (name, kind, base_url, api_key, metadata,
                                            created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     RETURNING {PROVIDER_COLUMNS}"
                ),
                libsql::params![
                    provider.name,
                    provider.kind.as_str(),
                    provider.base_url,
                    opt_text_value(provider.api_key),
                    metadata,
                    now,
                ],
            )
            .await
            .map_err(|e| {
                insert_err(
                    e,
                    format!("Provider '{}' at '{}'", provider.kind, provider.base_url),
                )
            })?;

        match map_err!(rows.next().await) {
            Some(row) => read_provider(&row),
            None => unreachable!("INSERT RETURNING yields a row"),
        }
    }

    async fn get_provider(&self, id: i64) -> Result<Option<Provider>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
                    libsql::params![id],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_provider(&row)?)),
            None => Ok(None),
        }
    }

    async fn get_provider_by_endpoint(
        &self,
        kind: ProviderKind,
        base_url: &str,
    ) -> Result<Option<Provider>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!(
                        "SELECT {PROVIDER_COLUMNS} FROM providers
                         WHERE kind = ?1 AND base_url = ?2"
                    ),
                    libsql::params![kind.as_str(), base_url],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_provider(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_providers(&self) -> Result<Vec<Provider>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {PROVIDER_COLUMNS} FROM providers ORDER BY id ASC"),
                    (),
                )
                .await
        );

        let mut providers = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            providers.push(read_provider(&row)?);
        }
        Ok(providers)
    }

    async fn update_provider(
        &self,
        id: i64,
        update: ProviderUpdate<'_>,
    ) -> Result<bool, EesError> {
        let mut sets = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(name) = update.name {
            sets.push("name = ?");
            values.push(Value::Text(name.to_string()));
        }
        if let Some(base_url) = update.base_url {
            sets.push("base_url = ?");
            values.push(Value::Text(base_url.to_string()));
        }
        if let Some(api_key) = update.api_key {
            sets.push("api_key = ?");
            values.push(Value::Text(api_key.to_string()));
        }
        if let Some(metadata) = update.metadata {
            sets.push("metadata = ?");
            values.push(Value::Text(map_err!(serde_json::to_string(metadata))));
        }

        sets.push("updated_at = ?");
        values.push(Value::Text(fmt_time(Utc::now())));
        values.push(Value::Integer(id));

        let affected = map_err!(
            self.conn()
                .execute(
                    &format!("UPDATE providers SET {} WHERE id = ?", sets.join(", ")),
                    params_from_iter(values),
                )
                .await
        );
        Ok(affected > 0)
    }

    async fn delete_provider(&self, id: i64) -> Result<bool, EesError> {
        let affected = map_err!(
            self.conn()
                .execute("DELETE FROM providers WHERE id = ?1", libsql::params![id])
                .await
        );
        Ok(affected > 0)
    }

    async fn insert_model(&self, model: ModelInsert<'_>) -> Result<Model, EesError> {
        let now = fmt_time(Utc::now());
        let metadata = json_value(model.metadata)?;

        let mut rows = self
            .conn()
            .query(
                &format!(
                    "INSERT INTO models (provider_id, name, display_name, is_active,
                                         metadata, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     RETURNING {MODEL_COLUMNS}"
                ),
                libsql::params![
                    model.provider_id,
                    model.name,
                    opt_text_value(model.display_name),
                    model.is_active as i64,
                    metadata,
                    now,
                ],
            )
            .await
            .map_err(|e| insert_err(e, format!("Model '{}'", model.name)))?;

        match map_err!(rows.next().await) {
            Some(row) => read_model(&row),
            None => unreachable!("INSERT RETURNING yields a row"),
        }
    }

    async fn get_model(&self, id: i64) -> Result<Option<Model>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {MODEL_COLUMNS} FROM models WHERE id = ?1"),
                    libsql::params![id],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_model(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_model_by_name(&self, name: &str) -> Result<Option<Model>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {MODEL_COLUMNS} FROM models WHERE name = ?1"),
                    libsql::params![name],
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_model(&row)?)),
            None => Ok(None),
        }
    }

    async fn list_models(&self) -> Result<Vec<Model>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {MODEL_COLUMNS} FROM models ORDER BY id ASC"),
                    (),
                )
                .await
        );

        let mut models = Vec::new();
        while let Some(row) = map_err!(rows.next().await) {
            models.push(read_model(&row)?);
        }
        Ok(models)
    }

    async fn delete_model(&self, id: i64) -> Result<bool, EesError> {
        let affected = map_err!(
            self.conn()
                .execute("DELETE FROM models WHERE id = ?1", libsql::params![id])
                .await
        );
        Ok(affected > 0)
    }

    async fn active_model(&self) -> Result<Option<Model>, EesError> {
        let mut rows = map_err!(
            self.conn()
                .query(
                    &format!("SELECT {MODEL_COLUMNS} FROM models WHERE is_active = 1"),
                    (),
                )
                .await
        );

        match map_err!(rows.next().await) {
            Some(row) => Ok(Some(read_model(&row)?)),
            None => Ok(None),
        }
    }

    async fn deactivate_all_models(&self, tx: &mut Self::Tx) -> Result<(), EesError> {
        map_err!(
            tx.execute(
                "UPDATE models SET is_active = 0, updated_at = ?1 WHERE is_active = 1",
                libsql::params![fmt_time(Utc::now())],
            )
            .await
        );
        Ok(())
    }

    async fn set_model_active(&self, id: i64, tx: &mut Self::Tx) -> Result<bool, EesError> {
        let affected = map_err!(
            tx.execute(
                "UPDATE models SET is_active = 1, updated_at = ?1 WHERE id = ?2",
                libsql::params![fmt_time(Utc::now()), id],
            )
            .await
        );
        Ok(affected > 0)
    }
}

fn json_value(metadata: Option<&serde_json::Value>) -> Result<Value, EesError> {
    match metadata {
        Some(m) => Ok(Value::Text(map_err!(serde_json::to_string(m)))),
        None => Ok(Value::Null),
    }
}

fn read_json(s: Option<String>) -> Result<Option<serde_json::Value>, EesError> {
    match s {
        Some(s) => Ok(Some(map_err!(serde_json::from_str(&s)))),
        None => Ok(None),
    }
}

fn read_provider(row: &libsql::Row) -> Result<Provider, EesError> {
    let kind = get_text(row, 2)?;
    let kind = kind.parse::<ProviderKind>().map_err(|e| {
        EesError::new(file!(), line!(), column!(), EesErr::MalformedRow(e))
    })?;

    Ok(Provider {
        id: get_i64(row, 0)?,
        name: get_text(row, 1)?,
        kind,
        base_url: get_text(row, 3)?,
        api_key: get_opt_text(row, 4)?,
        metadata: read_json(get_opt_text(row, 5)?)?,
        created_at: get_time(row, 6)?,
        updated_at: get_time(row, 7)?,
    })
}

fn read_model(row: &libsql::Row) -> Result<Model, EesError> {
    Ok(Model {
        id: get_i64(row, 0)?,
        provider_id: get_i64(row, 1)?,
        name: get_text(row, 2)?,
        display_name: get_opt_text(row, 3)?,
        is_active: get_bool(row, 4)?,
        metadata: read_json(get_opt_text(row, 5)?)?,
        created_at: get_time(row, 6)?,
        updated_at: get_time(row, 7)?,
    })
}
