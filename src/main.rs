//! Mem0 MCP Server
//!
//! Stores and searches user facts for AI assistants over MCP.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use mem0_mcp::config::{Args, Backend, Config, Transport};
use mem0_mcp::error::Result;
use mem0_mcp::mcp::handler::McpHandler;
use mem0_mcp::mcp::server::McpServer;
use mem0_mcp::mcp::transport::StdioTransport;
use mem0_mcp::metrics::Metrics;
use mem0_mcp::sdk::ApiClient;
use mem0_mcp::service::{InMemoryService, Mem0Service, MemoryService};
use mem0_mcp::{tools, SERVER_NAME, VERSION};

#[tokio::main]
async fn main() {
    // A missing .env is fine.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    let config: Config = args.into();

    if let Err(e) = run(config).await {
        error!("Error starting server: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    config.validate()?;

    info!("Mem0 MCP Server v{}", VERSION);
    info!("Transport: {:?}", config.transport);
    info!("Backend: {:?}", config.backend);

    let memory_service: Arc<dyn MemoryService> = match config.backend {
        Backend::Mem0 => {
            let api_key = config.api_key.clone().unwrap_or_default();
            let client = ApiClient::new(config.api_url.clone(), api_key, config.request_timeout())?;
            Arc::new(Mem0Service::new(client))
        }
        Backend::Memory => Arc::new(InMemoryService::new()),
    };

    // Create MCP handler and register tools
    let mut handler = McpHandler::new();
    tools::register_all_tools(&mut handler, memory_service);
    info!("Registered {} MCP tools", handler.tool_count());

    let metrics = Metrics::new();
    let server = McpServer::new(handler, SERVER_NAME).with_metrics(metrics.clone());

    match config.transport {
        Transport::Stdio => {
            info!("Starting stdio transport...");
            server.run(StdioTransport::new()).await?;
        }
        Transport::Http => {
            mem0_mcp::http::start_server(&config, Arc::new(server), metrics).await?;
        }
    }

    Ok(())
}
