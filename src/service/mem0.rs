//! Mem0 platform backend.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::Result;
use crate::sdk::ApiClient;
use crate::service::{MemoryRecord, MemoryService};

/// [`MemoryService`] backed by the hosted Mem0 API.
pub struct Mem0Service {
    client: ApiClient,
}

impl Mem0Service {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MemoryService for Mem0Service {
    async fn add_fact(&self, content: &str, user_id: &str) -> Result<()> {
        debug!("Adding memory for user {}", user_id);
        self.client.add(content, user_id).await.inspect_err(|e| {
            error!("Error adding memory: {}", e);
        })
    }

    /// Search failures are logged and reported as "nothing found".
    async fn search_facts(&self, query: &str, user_id: &str) -> Result<Vec<MemoryRecord>> {
        debug!("Searching memories for user {}", user_id);
        match self.client.search(query, user_id).await {
            Ok(hits) => Ok(hits
                .into_iter()
                .map(|hit| MemoryRecord::new(hit.memory, hit.score.unwrap_or(0.0)))
                .collect()),
            Err(e) => {
                error!("Error searching memories: {}", e);
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_search_failure_yields_empty_list() {
        // Nothing listens on port 9 locally; the connect error must not escape.
        let client = ApiClient::new(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();
        let service = Mem0Service::new(client);

        let records = service.search_facts("tea", "u1").await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_add_failure_is_reported() {
        let client = ApiClient::new(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();
        let service = Mem0Service::new(client);

        assert!(service.add_fact("I like tea", "u1").await.is_err());
    }
}
