//! Mem0 REST API request and response types.

use serde::{Deserialize, Serialize};

/// A chat message handed to Mem0 for fact extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Body of `POST /v1/memories/`.
#[derive(Debug, Clone, Serialize)]
pub struct AddMemoryRequest {
    pub messages: Vec<ChatMessage>,
    pub user_id: String,
}

/// Body of `POST /v1/memories/search/`.
#[derive(Debug, Clone, Serialize)]
pub struct SearchMemoryRequest {
    pub query: String,
    pub user_id: String,
}

/// One memory as returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<String>,
    pub memory: String,
    #[serde(default)]
    pub score: Option<f64>,
}

/// Search results come back either as a bare list or wrapped in `results`,
/// depending on the API version.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchMemoryResponse {
    List(Vec<SearchHit>),
    Wrapped { results: Vec<SearchHit> },
}

impl SearchMemoryResponse {
    pub fn into_hits(self) -> Vec<SearchHit> {
        match self {
            Self::List(hits) => hits,
            Self::Wrapped { results } => results,
        }
    }
}
