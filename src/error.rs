//! Error types for the Mem0 MCP server.

use thiserror::Error;

use crate::mcp::protocol::error_codes;

/// Result type alias for Mem0 MCP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Mem0 MCP server.
#[derive(Error, Debug)]
pub enum Error {
    // ===== Collaborator Errors =====
    #[error("API error: {status} {status_text} - {message}")]
    Api {
        status: u16,
        status_text: String,
        message: String,
    },

    #[error("Authentication error: {0}")]
    Auth(String),

    // ===== MCP Errors =====
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("MCP protocol error: {0}")]
    McpProtocol(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidToolArguments(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    // ===== Session Errors =====
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),

    #[error("Session already initialized: {0}")]
    SessionAlreadyInitialized(String),

    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Event stream closed: {0}")]
    StreamClosed(String),

    // ===== I/O Errors =====
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // ===== HTTP Errors =====
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP server error: {0}")]
    HttpServer(String),

    // ===== Internal Errors =====
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout: operation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },
}

impl Error {
    /// Create an API error from HTTP response details.
    pub fn api(status: u16, status_text: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            status_text: status_text.into(),
            message: message.into(),
        }
    }

    /// Check if this error is retriable (transient failures).
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || (*status >= 500 && *status < 600),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// JSON-RPC error code reported when this error surfaces as a protocol error.
    pub fn rpc_code(&self) -> i32 {
        match self {
            Self::Parse(_) | Self::Json(_) => error_codes::PARSE_ERROR,
            Self::McpProtocol(_) | Self::SessionAlreadyInitialized(_) => {
                error_codes::INVALID_REQUEST
            }
            Self::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            Self::InvalidParams(_) | Self::InvalidToolArguments(_) => error_codes::INVALID_PARAMS,
            Self::SessionNotFound(_) | Self::SessionClosed(_) | Self::ShuttingDown => {
                error_codes::SERVER_ERROR
            }
            _ => error_codes::INTERNAL_ERROR,
        }
    }
}
