use crate::core::model::provider::ProviderKind;
use clap::Parser;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "ees.db";

const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";

const DEFAULT_PROVIDER: ProviderKind = ProviderKind::Ollama;

/// Default per-request timeout for provider calls, in seconds.
const DEFAULT_PROVIDER_TIMEOUT: u64 = 30;

#[derive(Debug, Parser)]
#[command(name = "ees", version = "0.1", about = "Embedding and search service", long_about = None)]
pub struct StartArgs {
    /// Database URL. May be `:memory:`.
    #[arg(short, long)]
    db_url: Option<String>,

    /// RUST_LOG string to use as the env filter.
    #[arg(short, long)]
    log: Option<String>,

    /// Address to listen on.
    #[arg(short, long)]
    address: Option<String>,

    /// The embedding backend requests are routed to.
    #[arg(short = 'p', long)]
    default_provider: Option<String>,

    /// CORS allowed origins. Permissive when unset.
    #[arg(short = 'c', long)]
    allowed_origins: Option<String>,

    /// Ollama endpoint.
    #[arg(long)]
    ollama_url: Option<String>,

    /// OpenAI endpoint.
    #[arg(long)]
    openai_url: Option<String>,

    /// Cohere endpoint.
    #[arg(long)]
    cohere_url: Option<String>,

    /// Google Generative Language endpoint.
    #[arg(long)]
    google_url: Option<String>,

    /// Per-request provider timeout in seconds.
    #[arg(long)]
    provider_timeout: Option<u64>,
}

impl StartArgs {
    pub fn db_url(&self) -> String {
        match &self.db_url {
            Some(url) => url.to_string(),
            None => match std::env::var("EES_DATABASE_URL") {
                Ok(url) => url,
                Err(_) => DEFAULT_DATABASE_URL.to_string(),
            },
        }
    }

    pub fn log(&self) -> String {
        match &self.log {
            Some(log) => log.to_string(),
            None => match std::env::var("RUST_LOG") {
                Ok(log) => log,
                Err(_) => "info".to_string(),
            },
        }
    }

    pub fn address(&self) -> String {
        match &self.address {
            Some(addr) => addr.to_string(),
            None => match std::env::var("EES_ADDRESS") {
                Ok(addr) => addr,
                Err(_) => DEFAULT_ADDRESS.to_string(),
            },
        }
    }

    pub fn default_provider(&self) -> ProviderKind {
        let tag = match &self.default_provider {
            Some(tag) => tag.to_string(),
            None => match std::env::var("EES_DEFAULT_PROVIDER") {
                Ok(tag) => tag,
                Err(_) => return DEFAULT_PROVIDER,
            },
        };

        match tag.parse() {
            Ok(kind) => kind,
            Err(e) => panic!("Invalid EES_DEFAULT_PROVIDER; {e}"),
        }
    }

    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins = match &self.allowed_origins {
            Some(origins) => origins.to_string(),
            None => std::env::var("EES_ALLOWED_ORIGINS").ok()?,
        };
        Some(origins.split(',').map(String::from).collect())
    }

    pub fn provider_timeout(&self) -> Duration {
        let seconds = match self.provider_timeout {
            Some(seconds) => seconds,
            None => std::env::var("EES_PROVIDER_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT),
        };
        Duration::from_secs(seconds)
    }

    pub fn base_url(&self, kind: ProviderKind) -> Option<String> {
        let arg = match kind {
            ProviderKind::Ollama => &self.ollama_url,
            ProviderKind::OpenAi => &self.openai_url,
            ProviderKind::Cohere => &self.cohere_url,
            ProviderKind::Google => &self.google_url,
        };

        match arg {
            Some(url) => Some(url.to_string()),
            None => std::env::var(env_key(kind, "BASE_URL")).ok(),
        }
    }

    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        std::env::var(env_key(kind, "API_KEY")).ok()
    }

    pub fn default_model(&self, kind: ProviderKind) -> Option<String> {
        std::env::var(env_key(kind, "DEFAULT_MODEL")).ok()
    }
}

fn env_key(kind: ProviderKind, suffix: &str) -> String {
    format!("EES_{}_{suffix}", kind.as_str().to_uppercase())
}
