use crate::core::model::provider::{
    Model, ModelInsert, Provider, ProviderInsert, ProviderUpdate,
};
use crate::core::provider::ProviderState;
use crate::core::repo::{model::ModelRepo, Atomic};
use crate::error::EesError;
use crate::{err, map_err, transaction};
use dto::*;
use tracing::info;
use validify::Validify;

/// Operations on the model registry: provider and model CRUD plus the
/// single-active-model invariant.
#[derive(Clone)]
pub struct ModelService<Repo> {
    repo: Repo,
    providers: ProviderState,
}

impl<R> ModelService<R> {
    pub fn new(repo: R, providers: ProviderState) -> Self {
        Self { repo, providers }
    }
}

impl<Repo> ModelService<Repo>
where
    Repo: ModelRepo + Atomic + Send + Sync,
    Repo::Tx: Send + Sync,
{
    pub async fn create_provider(
        &self,
        mut payload: CreateProviderPayload,
    ) -> Result<Provider, EesError> {
        map_err!(payload.validify());

        let kind = match payload.kind.parse() {
            Ok(kind) => kind,
            Err(e) => return err!(InvalidProvider, "{e}"),
        };

        self.repo
            .insert_provider(ProviderInsert {
                name: &payload.name,
                kind,
                base_url: &payload.base_url,
                api_key: payload.api_key.as_deref(),
                metadata: payload.metadata.as_ref(),
            })
            .await
    }

    pub async fn get_provider(&self, id: i64) -> Result<Provider, EesError> {
        match self.repo.get_provider(id).await? {
            Some(provider) => Ok(provider),
            None => err!(DoesNotExist, "Provider with ID '{id}'"),
        }
    }

    pub async fn list_providers(&self) -> Result<Vec<Provider>, EesError> {
        self.repo.list_providers().await
    }

    pub async fn update_provider(
        &self,
        id: i64,
        payload: UpdateProviderPayload,
    ) -> Result<Provider, EesError> {
        let update = ProviderUpdate {
            name: payload.name.as_deref(),
            base_url: payload.base_url.as_deref(),
            api_key: payload.api_key.as_deref(),
            metadata: payload.metadata.as_ref(),
        };

        if !self.repo.update_provider(id, update).await? {
            return err!(DoesNotExist, "Provider with ID '{id}'");
        }

        self.get_provider(id).await
    }

    pub async fn delete_provider(&self, id: i64) -> Result<(), EesError> {
        if !self.repo.delete_provider(id).await? {
            return err!(DoesNotExist, "Provider with ID '{id}'");
        }
        Ok(())
    }

    pub async fn create_model(&self, mut payload: CreateModelPayload) -> Result<Model, EesError> {
        map_err!(payload.validify());

        if self.repo.get_provider(payload.provider_id).await?.is_none() {
            return err!(DoesNotExist, "Provider with ID '{}'", payload.provider_id);
        }

        let model = self
            .repo
            .insert_model(ModelInsert {
                provider_id: payload.provider_id,
                name: &payload.name,
                display_name: payload.display_name.as_deref(),
                is_active: false,
                metadata: payload.metadata.as_ref(),
            })
            .await?;

        if payload.is_active.unwrap_or(false) {
            self.activate_model(model.id).await?;
            return self.get_model(model.id).await;
        }

        Ok(model)
    }

    pub async fn get_model(&self, id: i64) -> Result<Model, EesError> {
        match self.repo.get_model(id).await? {
            Some(model) => Ok(model),
            None => err!(DoesNotExist, "Model with ID '{id}'"),
        }
    }

    pub async fn list_models(&self) -> Result<Vec<Model>, EesError> {
        self.repo.list_models().await
    }

    pub async fn delete_model(&self, id: i64) -> Result<(), EesError> {
        if !self.repo.delete_model(id).await? {
            return err!(DoesNotExist, "Model with ID '{id}'");
        }
        Ok(())
    }

    pub async fn active_model(&self) -> Result<Model, EesError> {
        match self.repo.active_model().await? {
            Some(model) => Ok(model),
            None => err!(DoesNotExist, "No active model"),
        }
    }

    /// Activate a model, deactivating every other one in the same
    /// transaction. Exactly one model is active post-commit.
    pub async fn activate_model(&self, id: i64) -> Result<Model, EesError> {
        transaction!(self.repo, |tx| async move {
            let tx: &mut <Repo as Atomic>::Tx = tx;
            self.repo.deactivate_all_models(&mut *tx).await?;
            if !self.repo.set_model_active(id, &mut *tx).await? {
                return err!(DoesNotExist, "Model with ID '{id}'");
            }
            Ok(())
        })?;

        self.get_model(id).await
    }

    /// Seed the registry with the configured default provider and its
    /// catalogue so a fresh database can answer compatibility checks.
    /// The provider's default model becomes active when nothing is.
    pub async fn ensure_default_registry(&self) -> Result<(), EesError> {
        let embedder = self.providers.embedding.default_provider();
        let kind = embedder.kind();
        let base_url = embedder.base_url();

        let provider = match self.repo.get_provider_by_endpoint(kind, &base_url).await? {
            Some(provider) => provider,
            None => {
                info!("Registering default provider '{kind}'");
                self.repo
                    .insert_provider(ProviderInsert {
                        name: kind.as_str(),
                        kind,
                        base_url: &base_url,
                        api_key: None,
                        metadata: None,
                    })
                    .await?
            }
        };

        for info in embedder.list_models() {
            if self.repo.find_model_by_name(info.name).await?.is_some() {
                continue;
            }

            let metadata = serde_json::json!({
                "dimensions": info.dimensions,
                "maxInputTokens": info.max_input_tokens,
                "pricePerToken": info.price_per_token,
            });

            self.repo
                .insert_model(ModelInsert {
                    provider_id: provider.id,
                    name: info.name,
                    display_name: None,
                    is_active: false,
                    metadata: Some(&metadata),
                })
                .await?;
        }

        if self.repo.active_model().await?.is_none() {
            let default = embedder.default_model();
            if let Some(model) = self.repo.find_model_by_name(&default).await? {
                info!("Activating default model '{default}'");
                self.activate_model(model.id).await?;
            }
        }

        Ok(())
    }
}

/// Model registry DTOs.
pub mod dto {
    use serde::Deserialize;
    use utoipa::ToSchema;
    use validify::Validify;

    #[derive(Debug, Deserialize, Validify, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateProviderPayload {
        #[validate(length(min = 1))]
        #[modify(trim)]
        pub name: String,

        /// Backend type tag, one of `ollama`, `openai`, `cohere`,
        /// `google`.
        pub kind: String,

        #[validate(length(min = 1))]
        #[modify(trim)]
        pub base_url: String,

        pub api_key: Option<String>,

        pub metadata: Option<serde_json::Value>,
    }

    #[derive(Debug, Deserialize, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct UpdateProviderPayload {
        pub name: Option<String>,
        pub base_url: Option<String>,
        pub api_key: Option<String>,
        pub metadata: Option<serde_json::Value>,
    }

    #[derive(Debug, Deserialize, Validify, ToSchema)]
    #[serde(rename_all = "camelCase")]
    pub struct CreateModelPayload {
        pub provider_id: i64,

        #[validate(length(min = 1))]
        #[modify(trim)]
        pub name: String,

        pub display_name: Option<String>,

        pub is_active: Option<bool>,

        /// Carries `dimensions` for compatibility checks.
        pub metadata: Option<serde_json::Value>,
    }
}
