//! HTTP client for the Mem0 platform API.

use std::time::Duration;

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::sdk::retry::{retry_api, BackoffParams};
use crate::sdk::types::*;
use crate::VERSION;

/// Default Mem0 API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.mem0.ai";

/// System prompt sent alongside every stored fact.
const ADD_SYSTEM_PROMPT: &str = "Memory storage system";

/// User agent string for API requests.
fn user_agent() -> String {
    format!("mem0-mcp/{} (rust)", VERSION)
}

/// API client for Mem0.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
    api_key: String,
    backoff: BackoffParams,
}

impl ApiClient {
    /// Create a new API client; `timeout` bounds every individual HTTP call.
    pub fn new(api_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Auth("Mem0 API key is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            backoff: BackoffParams::default(),
        })
    }

    /// Get the API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path)
    }

    /// Make an authenticated API request.
    async fn request<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Token {}", self.api_key))
            .header("X-Request-Id", Uuid::new_v4().to_string())
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response, extracting errors.
    async fn handle_response<R: DeserializeOwned>(&self, response: Response) -> Result<R> {
        let status = response.status();

        if !status.is_success() {
            let status_text = status.canonical_reason().unwrap_or("Unknown");
            let body = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), status_text, body));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse response: {}", e)))
    }

    /// Make an API request with retry logic.
    async fn call_api_with_retry<T: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<R> {
        retry_api(|| self.request(path, body), &self.backoff).await
    }

    // ===== API Endpoints =====

    /// Store a fact for `user_id`.
    pub async fn add(&self, content: &str, user_id: &str) -> Result<()> {
        let request = AddMemoryRequest {
            messages: vec![
                ChatMessage::system(ADD_SYSTEM_PROMPT),
                ChatMessage::user(content),
            ],
            user_id: user_id.to_string(),
        };
        let _: serde_json::Value = self.call_api_with_retry("v1/memories/", &request).await?;
        Ok(())
    }

    /// Search the facts stored for `user_id`, most relevant first.
    pub async fn search(&self, query: &str, user_id: &str) -> Result<Vec<SearchHit>> {
        let request = SearchMemoryRequest {
            query: query.to_string(),
            user_id: user_id.to_string(),
        };
        let response: SearchMemoryResponse = self
            .call_api_with_retry("v1/memories/search/", &request)
            .await?;
        Ok(response.into_hits())
    }
}
