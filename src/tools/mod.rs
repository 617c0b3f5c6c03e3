//! MCP tool implementations.
//!
//! - `memory` - Store and search facts (2 tools)

pub mod memory;

use std::sync::Arc;

use crate::mcp::handler::McpHandler;
use crate::service::MemoryService;

/// Register all tools with the handler.
pub fn register_all_tools(handler: &mut McpHandler, memory_service: Arc<dyn MemoryService>) {
    handler.register(memory::AddMemoryTool::new(memory_service.clone()));
    handler.register(memory::SearchMemoriesTool::new(memory_service));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::InMemoryService;

    #[test]
    fn test_register_all_tools() {
        let mut handler = McpHandler::new();
        register_all_tools(&mut handler, Arc::new(InMemoryService::new()));

        assert_eq!(handler.tool_count(), 2);
        assert!(handler.has_tool(memory::ADD_MEMORY));
        assert!(handler.has_tool(memory::SEARCH_MEMORIES));
    }
}
