//! Model Context Protocol (MCP) implementation.
//!
//! JSON-RPC message types, the message codec, tool dispatch, and the
//! per-message protocol engine shared by the stdio and HTTP transports.
//!
//! # Architecture
//!
//! - `protocol` - Core MCP types and message definitions
//! - `server` - MCP server implementation
//! - `transport` - Message codec, SSE framing, stdio transport
//! - `handler` - Tool registry and dispatch

pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

pub use handler::McpHandler;
pub use protocol::*;
pub use server::{McpServer, PeerState, Reply};
pub use transport::{Message, MessageKind, SseEvent, StdioTransport, Transport};

