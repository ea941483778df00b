use super::Atomic;
use crate::core::model::provider::{
    Model, ModelInsert, Provider, ProviderInsert, ProviderKind, ProviderUpdate,
};
use crate::error::EesError;

/// Persistence for the model registry: the `providers` and `models`
/// tables. The registry is the source of truth for dimensions and
/// provider bindings at compatibility-check time.
#[async_trait::async_trait]
pub trait ModelRepo: Atomic {
    async fn insert_provider(&self, provider: ProviderInsert<'_>) -> Result<Provider, EesError>;

    async fn get_provider(&self, id: i64) -> Result<Option<Provider>, EesError>;

    async fn get_provider_by_endpoint(
        &self,
        kind: ProviderKind,
        base_url: &str,
    ) -> Result<Option<Provider>, EesError>;

    async fn list_providers(&self) -> Result<Vec<Provider>, EesError>;

    async fn update_provider(
        &self,
        id: i64,
        update: ProviderUpdate<'_>,
    ) -> Result<bool, EesError>;

    /// Cascades to the provider's models.
    async fn delete_provider(&self, id: i64) -> Result<bool, EesError>;

    async fn insert_model(&self, model: ModelInsert<'_>) -> Result<Model, EesError>;

    async fn get_model(&self, id: i64) -> Result<Option<Model>, EesError>;

    async fn find_model_by_name(&self, name: &str) -> Result<Option<Model>, EesError>;

    async fn list_models(&self) -> Result<Vec<Model>, EesError>;

    async fn delete_model(&self, id: i64) -> Result<bool, EesError>;

    /// The single active model, when one is set.
    async fn active_model(&self) -> Result<Option<Model>, EesError>;

    /// Clears the active flag everywhere. Part of the activation
    /// transaction.
    async fn deactivate_all_models(&self, tx: &mut Self::Tx) -> Result<(), EesError>;

    /// Sets the active flag on one model. Part of the activation
    /// transaction. Returns false when the model does not exist.
    async fn set_model_active(&self, id: i64, tx: &mut Self::Tx) -> Result<bool, EesError>;
}
