use super::{embedder::Embedder, model::provider::ProviderKind};
use crate::error::EesError;
use std::sync::Arc;

pub type DynEmbedder = Arc<dyn Embedder + Send + Sync>;

/// Provider factories are used to decouple concrete embedding backends
/// from the business logic. Services obtain clients by type tag; the
/// concrete wiring happens once at process start.
pub trait ProviderFactory {
    /// Get the client registered for the given backend tag.
    fn get_provider(&self, kind: ProviderKind) -> Result<DynEmbedder, EesError>;

    /// The client requests are routed to when they don't pick one.
    fn default_provider(&self) -> DynEmbedder;

    /// List all registered backend tags.
    fn list_provider_kinds(&self) -> Vec<ProviderKind>;
}

/// Holds the embedding provider factory. Services use this to obtain
/// concrete implementations of their dependencies.
#[derive(Clone)]
pub struct ProviderState {
    pub embedding: Arc<dyn ProviderFactory + Send + Sync>,
}
