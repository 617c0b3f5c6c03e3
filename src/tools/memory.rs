//! Memory tools: store and search facts through the collaborator.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::mcp::handler::{error_result, get_string_arg, success_result, ToolHandler};
use crate::mcp::protocol::{Tool, ToolResult};
use crate::service::{MemoryRecord, MemoryService};

/// Name of the store tool.
pub const ADD_MEMORY: &str = "add-memory";
/// Name of the search tool.
pub const SEARCH_MEMORIES: &str = "search-memories";

/// Confirmation text for a successful store.
pub const MEMORY_ADDED: &str = "Memory added successfully";
/// Text returned when a search matches nothing.
pub const NO_MEMORIES_FOUND: &str = "No memories found";

const USER_ID_DESCRIPTION: &str =
    "User ID for memory storage. If not provided explicitly, use a generic user ID like, 'mem0-mcp-user'";

/// Render search hits in collaborator order.
pub fn format_records(records: &[MemoryRecord]) -> String {
    if records.is_empty() {
        return NO_MEMORIES_FOUND.to_string();
    }

    records
        .iter()
        .map(|r| format!("{}\nrelevance: {}", r.text, r.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Add memory tool.
pub struct AddMemoryTool {
    service: Arc<dyn MemoryService>,
}

impl AddMemoryTool {
    pub fn new(service: Arc<dyn MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for AddMemoryTool {
    fn definition(&self) -> Tool {
        Tool {
            name: ADD_MEMORY.to_string(),
            description: "Add a new memory. This method is called everytime the user informs anything about themselves, their preferences, or anything that has any relevent information whcih can be useful in the future conversation. This can also be called when the user asks you to remember something.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The content to store in memory"
                    },
                    "userId": {
                        "type": "string",
                        "description": USER_ID_DESCRIPTION
                    }
                },
                "required": ["content", "userId"]
            }),
        }
    }

    async fn execute(&self, args: HashMap<String, Value>) -> Result<ToolResult> {
        let content = get_string_arg(&args, "content")?;
        let user_id = get_string_arg(&args, "userId")?;

        match self.service.add_fact(&content, &user_id).await {
            Ok(()) => Ok(success_result(MEMORY_ADDED)),
            Err(e) => Ok(error_result(format!("Error: {}", e))),
        }
    }
}

/// Search memories tool.
pub struct SearchMemoriesTool {
    service: Arc<dyn MemoryService>,
}

impl SearchMemoriesTool {
    pub fn new(service: Arc<dyn MemoryService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ToolHandler for SearchMemoriesTool {
    fn definition(&self) -> Tool {
        Tool {
            name: SEARCH_MEMORIES.to_string(),
            description: "Search through stored memories. This method is called ANYTIME the user asks anything.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query. This is the query that the user has asked for. Example: 'What did I tell you about the weather last week?' or 'What did I tell you about my friend John?'"
                    },
                    "userId": {
                        "type": "string",
                        "description": USER_ID_DESCRIPTION
                    }
                },
                "required": ["query", "userId"]
            }),
        }
    }

    async fn execute(&self, args: HashMap<String, Value>) -> Result<ToolResult> {
        let query = get_string_arg(&args, "query")?;
        let user_id = get_string_arg(&args, "userId")?;

        match self.service.search_facts(&query, &user_id).await {
            Ok(records) => Ok(success_result(format_records(&records))),
            Err(e) => Ok(error_result(format!("Error: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::service::InMemoryService;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Collaborator that counts calls and returns canned results.
    #[derive(Default)]
    struct StubService {
        calls: AtomicUsize,
        fail: bool,
        records: Vec<MemoryRecord>,
    }

    #[async_trait]
    impl MemoryService for StubService {
        async fn add_fact(&self, _content: &str, _user_id: &str) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::api(502, "Bad Gateway", "upstream down"))
            } else {
                Ok(())
            }
        }

        async fn search_facts(&self, _query: &str, _user_id: &str) -> Result<Vec<MemoryRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    fn args(value: Value) -> HashMap<String, Value> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_format_records() {
        let records = vec![
            MemoryRecord::new("Likes tea", 0.9),
            MemoryRecord::new("Owns a cat", 0.4),
        ];
        assert_eq!(
            format_records(&records),
            "Likes tea\nrelevance: 0.9\nOwns a cat\nrelevance: 0.4"
        );
        assert_eq!(format_records(&[]), NO_MEMORIES_FOUND);
    }

    #[test]
    fn test_format_keeps_collaborator_order() {
        let records = vec![MemoryRecord::new("low", 0.1), MemoryRecord::new("high", 0.9)];
        let text = format_records(&records);
        assert!(text.find("low").unwrap() < text.find("high").unwrap());
    }

    #[tokio::test]
    async fn test_add_memory_success() {
        let stub = Arc::new(StubService::default());
        let tool = AddMemoryTool::new(stub.clone());

        let result = tool
            .execute(args(json!({"content": "I like tea", "userId": "u1"})))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), MEMORY_ADDED);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_memory_collaborator_failure() {
        let stub = Arc::new(StubService {
            fail: true,
            ..StubService::default()
        });
        let tool = AddMemoryTool::new(stub);

        let result = tool
            .execute(args(json!({"content": "I like tea", "userId": "u1"})))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(result.text().contains("upstream down"));
    }

    #[tokio::test]
    async fn test_add_memory_rejects_empty_content_locally() {
        let stub = Arc::new(StubService::default());
        let tool = AddMemoryTool::new(stub.clone());

        let err = tool
            .execute(args(json!({"content": "", "userId": "u1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidToolArguments(_)));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_requires_user_id() {
        let stub = Arc::new(StubService::default());
        let tool = SearchMemoriesTool::new(stub.clone());

        assert!(tool.execute(args(json!({"query": "tea"}))).await.is_err());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_no_results() {
        let tool = SearchMemoriesTool::new(Arc::new(StubService::default()));

        let result = tool
            .execute(args(json!({"query": "tea", "userId": "u1"})))
            .await
            .unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), NO_MEMORIES_FOUND);
    }

    #[tokio::test]
    async fn test_store_then_search_round_trip() {
        let service: Arc<dyn MemoryService> = Arc::new(InMemoryService::new());
        let add = AddMemoryTool::new(service.clone());
        let search = SearchMemoriesTool::new(service);

        add.execute(args(json!({"content": "I like tea", "userId": "u1"})))
            .await
            .unwrap();
        let result = search
            .execute(args(json!({"query": "tea", "userId": "u1"})))
            .await
            .unwrap();

        assert!(result.text().contains("I like tea"));
        assert!(result.text().contains("relevance: "));
    }
}
