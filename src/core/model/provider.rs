use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use utoipa::ToSchema;

/// The closed set of embedding backends ees can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local HTTP model runtime.
    Ollama,
    /// OpenAI compatible API.
    OpenAi,
    /// Cohere embed API.
    Cohere,
    /// Google Generative Language API.
    Google,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Ollama,
        ProviderKind::OpenAi,
        ProviderKind::Cohere,
        ProviderKind::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "ollama",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Cohere => "cohere",
            ProviderKind::Google => "google",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ollama" => Ok(ProviderKind::Ollama),
            "openai" => Ok(ProviderKind::OpenAi),
            "cohere" => Ok(ProviderKind::Cohere),
            "google" => Ok(ProviderKind::Google),
            s => Err(format!("unknown provider '{s}'")),
        }
    }
}

/// A registered embedding backend. Main model for the `providers` table.
/// Unique per `(kind, base_url)`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    /// Primary key.
    pub id: i64,

    /// Human readable name.
    pub name: String,

    /// Backend type tag.
    pub kind: ProviderKind,

    /// Endpoint base URL.
    pub base_url: String,

    /// Never serialized into responses.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Free form metadata.
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ProviderInsert<'a> {
    pub name: &'a str,
    pub kind: ProviderKind,
    pub base_url: &'a str,
    pub api_key: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
}

#[derive(Debug, Default)]
pub struct ProviderUpdate<'a> {
    pub name: Option<&'a str>,
    pub base_url: Option<&'a str>,
    pub api_key: Option<&'a str>,
    pub metadata: Option<&'a serde_json::Value>,
}

/// A model registered under a provider. Main model for the `models` table.
/// At most one model is active process-wide.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Primary key.
    pub id: i64,

    /// Owning provider.
    pub provider_id: i64,

    /// The name the provider recognizes.
    pub name: String,

    pub display_name: Option<String>,

    pub is_active: bool,

    /// Free form metadata. Carries the model's `dimensions`.
    pub metadata: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Embedding width as recorded in the registry metadata.
    pub fn dimensions(&self) -> Option<usize> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("dimensions"))
            .and_then(|d| d.as_u64())
            .map(|d| d as usize)
    }
}

pub struct ModelInsert<'a> {
    pub provider_id: i64,
    pub name: &'a str,
    pub display_name: Option<&'a str>,
    pub is_active: bool,
    pub metadata: Option<&'a serde_json::Value>,
}

/// A task type supported by a model family, e.g. Gemini's `retrieval_query`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaskType {
    pub value: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

const GEMINI_TASK_TYPES: &[TaskType] = &[
    TaskType {
        value: "retrieval_query",
        label: "Retrieval query",
        description: "Text is a query in a search or retrieval setting",
    },
    TaskType {
        value: "retrieval_document",
        label: "Retrieval document",
        description: "Text is a document being indexed for retrieval",
    },
    TaskType {
        value: "semantic_similarity",
        label: "Semantic similarity",
        description: "Text is compared against other text for similarity",
    },
    TaskType {
        value: "classification",
        label: "Classification",
        description: "Text is classified against a set of labels",
    },
    TaskType {
        value: "clustering",
        label: "Clustering",
        description: "Text is grouped with other similar text",
    },
    TaskType {
        value: "question_answering",
        label: "Question answering",
        description: "Text is a question being answered from a corpus",
    },
    TaskType {
        value: "fact_verification",
        label: "Fact verification",
        description: "Text is a statement being verified against sources",
    },
    TaskType {
        value: "code_retrieval_query",
        label: "Code retrieval query",
        description: "Text is a natural language query over a code corpus",
    },
];

const COHERE_TASK_TYPES: &[TaskType] = &[
    TaskType {
        value: "search_query",
        label: "Search query",
        description: "Text is a query in a search setting",
    },
    TaskType {
        value: "search_document",
        label: "Search document",
        description: "Text is a document being indexed for search",
    },
    TaskType {
        value: "classification",
        label: "Classification",
        description: "Text is classified against a set of labels",
    },
    TaskType {
        value: "clustering",
        label: "Clustering",
        description: "Text is grouped with other similar text",
    },
];

/// Task type catalogue for the family the model belongs to.
/// Models without task typing get an empty list.
pub fn task_types_for(model: &str) -> Vec<TaskType> {
    if model.contains("gemini") || model.starts_with("text-embedding-0") {
        return GEMINI_TASK_TYPES.to_vec();
    }
    if model.starts_with("embed-") {
        return COHERE_TASK_TYPES.to_vec();
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_round_trips() {
        for kind in ProviderKind::ALL {
            assert_eq!(kind, kind.as_str().parse().unwrap());
        }
        assert!("qdrant".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn gemini_family_has_retrieval_task_types() {
        let types = task_types_for("text-embedding-004");
        assert!(types.iter().any(|t| t.value == "retrieval_query"));
        assert!(types.iter().any(|t| t.value == "retrieval_document"));

        let types = task_types_for("gemini-embedding-001");
        assert!(!types.is_empty());
    }

    #[test]
    fn untyped_family_is_empty() {
        assert!(task_types_for("nomic-embed-text").is_empty());
        assert!(task_types_for("text-embedding-3-small").is_empty());
    }

    #[test]
    fn model_dimensions_from_metadata() {
        let model = Model {
            id: 1,
            provider_id: 1,
            name: "m".into(),
            display_name: None,
            is_active: false,
            metadata: Some(serde_json::json!({ "dimensions": 768 })),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(Some(768), model.dimensions());
    }
}
