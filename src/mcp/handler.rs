//! Tool registration and dispatch.
//!
//! [`McpHandler::dispatch`] is the boundary between the protocol and the tool
//! implementations: whatever a tool does (returns an error, or panics), the
//! caller receives a [`ToolResult`], never a transport failure.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::mcp::protocol::{ContentBlock, Tool, ToolResult};

/// Handler for MCP tool calls.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> Tool;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: HashMap<String, Value>) -> Result<ToolResult>;
}

/// Registry of tool handlers.
pub struct McpHandler {
    tools: HashMap<String, Arc<dyn ToolHandler>>,
}

impl McpHandler {
    /// Create a new handler registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool handler.
    pub fn register<T: ToolHandler + 'static>(&mut self, handler: T) {
        let tool = handler.definition();
        self.tools.insert(tool.name.clone(), Arc::new(handler));
    }

    /// Get all registered tools, sorted by name.
    pub fn list_tools(&self) -> Vec<Tool> {
        let mut tools: Vec<Tool> = self.tools.values().map(|h| h.definition()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get a tool by name.
    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool exists.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get the number of registered tools.
    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    /// Run a tool by name and shape the outcome into a [`ToolResult`].
    ///
    /// A missing argument bag, unknown tools, tool errors and panics all come
    /// back as error-marked results. The argument bag is checked first.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<HashMap<String, Value>>,
    ) -> ToolResult {
        let Some(arguments) = arguments else {
            return error_result("Error: No arguments provided");
        };

        let Some(handler) = self.get_tool(name) else {
            warn!("Call to unknown tool: {}", name);
            return error_result(Error::ToolNotFound(name.to_string()).to_string());
        };

        debug!("Dispatching tool: {}", name);

        match AssertUnwindSafe(handler.execute(arguments)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Tool {} failed: {}", name, e);
                error_result(format!("Error: {}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Tool {} panicked: {}", name, message);
                error_result(format!("Error: {}", message))
            }
        }
    }
}

impl Default for McpHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// Helper to create a text content block.
pub fn text_content(text: impl Into<String>) -> ContentBlock {
    ContentBlock::Text { text: text.into() }
}

/// Helper to create a successful tool result.
pub fn success_result(text: impl Into<String>) -> ToolResult {
    ToolResult {
        content: vec![text_content(text)],
        is_error: false,
    }
}

/// Helper to create an error tool result.
pub fn error_result(text: impl Into<String>) -> ToolResult {
    ToolResult {
        content: vec![text_content(text)],
        is_error: true,
    }
}

/// Helper to extract a required, non-blank string argument.
pub fn get_string_arg(args: &HashMap<String, Value>, name: &str) -> Result<String> {
    let value = args
        .get(name)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| {
            Error::InvalidToolArguments(format!("Missing required argument: {}", name))
        })?;

    if value.trim().is_empty() {
        return Err(Error::InvalidToolArguments(format!(
            "Argument must not be empty: {}",
            name
        )));
    }

    Ok(value)
}
