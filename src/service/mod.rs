//! Memory collaborator layer.
//!
//! The MCP tools never talk to a storage backend directly; they go through the
//! [`MemoryService`] trait, which has exactly two operations. Two backends are
//! provided: the hosted Mem0 platform and an in-process store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub mod mem0;
pub mod memory;

pub use mem0::Mem0Service;
pub use memory::InMemoryService;

/// A stored fact returned by a search. Read-only to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Fact text
    pub text: String,
    /// Relevance score, higher is more relevant
    pub score: f64,
}

impl MemoryRecord {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
        }
    }
}

/// External memory storage and search.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// Store `content` as a fact belonging to `user_id`.
    async fn add_fact(&self, content: &str, user_id: &str) -> Result<()>;

    /// Search facts belonging to `user_id`, most relevant first.
    async fn search_facts(&self, query: &str, user_id: &str) -> Result<Vec<MemoryRecord>>;
}
