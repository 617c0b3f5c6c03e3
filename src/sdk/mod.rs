//! Mem0 platform SDK.
//!
//! # Architecture
//!
//! - `api_client` - HTTP client for the Mem0 REST API
//! - `retry` - Retry logic with exponential backoff
//! - `types` - Request/response types

pub mod api_client;
pub mod retry;
pub mod types;

pub use api_client::{ApiClient, DEFAULT_API_URL};
pub use types::*;
