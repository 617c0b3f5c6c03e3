//! Configuration management for the memory server.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sdk::DEFAULT_API_URL;

/// Command-line arguments for the memory server.
#[derive(Parser, Debug, Clone)]
#[command(name = "mem0-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server that stores and searches user facts through Mem0")]
pub struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0", env = "MEM0_MCP_HOST")]
    pub host: String,

    /// HTTP port
    #[arg(short, long, default_value = "3000", env = "MEM0_MCP_PORT")]
    pub port: u16,

    /// Transport mode: http or stdio
    #[arg(short, long, default_value = "http", env = "MEM0_MCP_TRANSPORT")]
    pub transport: Transport,

    /// Memory backend: mem0 (hosted API) or memory (in-process)
    #[arg(short, long, default_value = "mem0", env = "MEM0_MCP_BACKEND")]
    pub backend: Backend,

    /// Mem0 API key
    #[arg(long, env = "MEM0_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Mem0 API URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "MEM0_API_URL")]
    pub api_url: String,

    /// Timeout for each Mem0 API request, in seconds
    #[arg(long, default_value = "30", env = "MEM0_MCP_REQUEST_TIMEOUT")]
    pub request_timeout: u64,

    /// Enable debug logging
    #[arg(short, long, env = "MEM0_MCP_DEBUG")]
    pub debug: bool,
}

/// Transport mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    #[default]
    Http,
    Stdio,
}

/// Where facts are stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Mem0,
    Memory,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind host
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Transport mode
    pub transport: Transport,
    /// Memory backend
    pub backend: Backend,
    /// Mem0 API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Mem0 API URL
    pub api_url: String,
    /// Per-request timeout in seconds
    pub request_timeout: u64,
    /// Debug mode
    pub debug: bool,
}

impl Config {
    /// `host:port` for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Check settings that would otherwise fail on first use.
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Mem0
            && self.api_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(Error::Config(
                "MEM0_API_KEY is required for the mem0 backend".to_string(),
            ));
        }
        if self.request_timeout == 0 {
            return Err(Error::Config(
                "request timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            transport: args.transport,
            backend: args.backend,
            api_key: args.api_key,
            api_url: args.api_url,
            request_timeout: args.request_timeout,
            debug: args.debug,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            transport: Transport::Http,
            backend: Backend::Mem0,
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: 30,
            debug: false,
        }
    }
}
