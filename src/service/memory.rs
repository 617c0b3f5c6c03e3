//! In-process memory backend.
//!
//! Facts live in a per-user list for the lifetime of the process. Search is a
//! plain text-overlap ranking, good enough for local runs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::service::{MemoryRecord, MemoryService};

/// [`MemoryService`] that keeps facts in memory.
#[derive(Debug, Default)]
pub struct InMemoryService {
    facts: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of facts stored for `user_id`.
    pub async fn count(&self, user_id: &str) -> usize {
        self.facts
            .read()
            .await
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn score(text: &str, query_lower: &str, query_tokens: &[&str]) -> f64 {
    let text_lower = text.to_lowercase();
    let mut score = 0.0;

    // Exact match bonus
    if text_lower.contains(query_lower) {
        score += 1.0;
    }

    for token in query_tokens {
        if text_lower.contains(token) {
            score += 0.3;
        }
    }

    score
}

#[async_trait]
impl MemoryService for InMemoryService {
    async fn add_fact(&self, content: &str, user_id: &str) -> Result<()> {
        let mut facts = self.facts.write().await;
        facts
            .entry(user_id.to_string())
            .or_default()
            .push(content.to_string());
        debug!("Stored fact for user {}", user_id);
        Ok(())
    }

    async fn search_facts(&self, query: &str, user_id: &str) -> Result<Vec<MemoryRecord>> {
        let facts = self.facts.read().await;
        let query_lower = query.to_lowercase();
        let query_tokens: Vec<&str> = query_lower.split_whitespace().collect();

        let mut results: Vec<MemoryRecord> = facts
            .get(user_id)
            .into_iter()
            .flatten()
            .map(|text| MemoryRecord::new(text.clone(), score(text, &query_lower, &query_tokens)))
            .filter(|r| r.score > 0.0)
            .collect();

        // Stable sort keeps insertion order among equal scores.
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        Ok(results)
    }
}
