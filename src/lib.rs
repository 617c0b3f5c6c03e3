//! Mem0 MCP Server
//!
//! A Model Context Protocol (MCP) server that lets AI assistants store facts
//! about a user and search them later, backed by the Mem0 memory platform.
//!
//! # Architecture
//!
//! 1. **SDK Layer** (`sdk`) - API client for the Mem0 REST API
//! 2. **Service Layer** (`service`) - The memory collaborator and its backends
//! 3. **MCP Layer** (`mcp`) - Protocol types, message codec, tool dispatch
//! 4. **Tools Layer** (`tools`) - `add-memory` and `search-memories`
//! 5. **HTTP Layer** (`http`) - Streamable HTTP sessions, routing, shutdown
//!
//! Clients talk to the server either over stdio (one implicit session) or
//! over streamable HTTP, where each client gets its own session.

pub mod config;
pub mod error;
pub mod http;
pub mod mcp;
pub mod metrics;
pub mod sdk;
pub mod service;
pub mod tools;

pub use error::{Error, Result};

/// Server version reported to clients.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name reported to clients.
pub const SERVER_NAME: &str = "mem0-mcp";
