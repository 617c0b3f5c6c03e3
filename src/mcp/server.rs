//! MCP server implementation.
//!
//! [`McpServer`] is the per-message protocol engine. It holds no connection
//! state of its own: whoever owns the connection (the stdio loop, or an HTTP
//! session) passes in its [`PeerState`].

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::mcp::handler::McpHandler;
use crate::mcp::protocol::*;
use crate::mcp::transport::{Message, Transport};
use crate::metrics::Metrics;
use crate::VERSION;

/// Protocol state negotiated with one client.
#[derive(Debug, Default)]
pub struct PeerState {
    client: RwLock<Option<ClientInfo>>,
    protocol_version: RwLock<Option<String>>,
    log_level: RwLock<LoggingLevel>,
}

impl PeerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn client(&self) -> Option<ClientInfo> {
        self.client.read().await.clone()
    }

    pub async fn protocol_version(&self) -> Option<String> {
        self.protocol_version.read().await.clone()
    }

    pub async fn log_level(&self) -> LoggingLevel {
        *self.log_level.read().await
    }
}

/// Outcome of handling one request.
#[derive(Debug, Clone)]
pub struct Reply {
    pub response: JsonRpcResponse,
    /// Notifications to push to the client alongside the response.
    pub notifications: Vec<JsonRpcNotification>,
}

/// MCP server.
pub struct McpServer {
    handler: Arc<McpHandler>,
    name: String,
    version: String,
    metrics: Option<Arc<Metrics>>,
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(handler: McpHandler, name: impl Into<String>) -> Self {
        Self::from_shared(Arc::new(handler), name)
    }

    /// Create a server over an already shared tool registry.
    pub fn from_shared(handler: Arc<McpHandler>, name: impl Into<String>) -> Self {
        Self {
            handler,
            name: name.into(),
            version: VERSION.to_string(),
            metrics: None,
        }
    }

    /// Record tool calls into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the server with the given transport, as a single implicit session.
    pub async fn run<T: Transport>(&self, mut transport: T) -> Result<()> {
        info!("Starting MCP server: {} v{}", self.name, self.version);

        let (mut incoming, outgoing) = transport.start().await?;
        let peer = PeerState::new();

        while let Some(msg) = incoming.recv().await {
            match msg {
                Message::Request(req) => {
                    let reply = self.handle_request(req, &peer).await;
                    if outgoing.send(Message::Response(reply.response)).await.is_err() {
                        error!("Failed to send response");
                        break;
                    }
                    for notif in reply.notifications {
                        if outgoing.send(Message::Notification(notif)).await.is_err() {
                            error!("Failed to send notification");
                            break;
                        }
                    }
                }
                Message::Notification(notif) => {
                    self.handle_notification(notif).await;
                }
                Message::Response(res) => {
                    debug!("Ignoring client response (id: {:?})", res.id);
                }
            }
        }

        transport.stop().await?;
        info!("MCP server stopped");
        Ok(())
    }

    /// Handle a JSON-RPC request.
    pub async fn handle_request(&self, req: JsonRpcRequest, peer: &PeerState) -> Reply {
        debug!("Handling request: {} (id: {:?})", req.method, req.id);

        let mut notifications = Vec::new();
        let result = match req.method.as_str() {
            "initialize" => self.handle_initialize(req.params, peer).await,
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_list_tools().await,
            "tools/call" => self.handle_call_tool(req.params, peer, &mut notifications).await,
            "logging/setLevel" => self.handle_set_level(req.params, peer).await,
            _ => Err(Error::MethodNotFound(req.method.clone())),
        };

        let response = match result {
            Ok(value) => JsonRpcResponse::success(req.id, value),
            Err(e) => {
                warn!("Request {} failed: {}", req.method, e);
                JsonRpcResponse::error(Some(req.id), e.rpc_code(), e.to_string())
            }
        };

        Reply {
            response,
            notifications,
        }
    }

    /// Handle a notification.
    pub async fn handle_notification(&self, notif: JsonRpcNotification) {
        debug!("Handling notification: {}", notif.method);

        match notif.method.as_str() {
            "notifications/initialized" => {
                info!("Client initialized");
            }
            "notifications/cancelled" => {
                debug!("Client cancelled a request: {:?}", notif.params);
            }
            _ => {
                debug!("Unknown notification: {}", notif.method);
            }
        }
    }

    /// Handle initialize request.
    async fn handle_initialize(&self, params: Option<Value>, peer: &PeerState) -> Result<Value> {
        let params: InitializeParams = match params {
            Some(v) => serde_json::from_value(v).map_err(|e| Error::InvalidParams(e.to_string()))?,
            None => InitializeParams::default(),
        };

        let version = negotiate_version(params.protocol_version.as_deref());
        if let Some(ref client) = params.client_info {
            info!("Client connected: {} {}", client.name, client.version);
        }
        *peer.client.write().await = params.client_info;
        *peer.protocol_version.write().await = Some(version.to_string());

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                logging: Some(LoggingCapability {}),
            },
            server_info: ServerInfo {
                name: self.name.clone(),
                version: self.version.clone(),
            },
        };

        Ok(serde_json::to_value(result)?)
    }

    /// Handle list tools request.
    async fn handle_list_tools(&self) -> Result<Value> {
        let tools = self.handler.list_tools();
        let result = ListToolsResult { tools };
        Ok(serde_json::to_value(result)?)
    }

    /// Handle call tool request.
    ///
    /// Only malformed params fail the request; everything the tool does ends
    /// up in the result.
    async fn handle_call_tool(
        &self,
        params: Option<Value>,
        peer: &PeerState,
        notifications: &mut Vec<JsonRpcNotification>,
    ) -> Result<Value> {
        let params: CallToolParams = params
            .ok_or_else(|| Error::InvalidParams("Missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::InvalidParams(e.to_string()))
            })?;

        let result = self.handler.dispatch(&params.name, params.arguments).await;

        if let Some(ref metrics) = self.metrics {
            metrics.record_tool_call(result.is_error);
        }

        if result.is_error && peer.log_level().await <= LoggingLevel::Error {
            notifications.push(log_notification(
                LoggingLevel::Error,
                &self.name,
                serde_json::json!({
                    "tool": params.name,
                    "error": result.text(),
                }),
            ));
        }

        Ok(serde_json::to_value(result)?)
    }

    /// Handle `logging/setLevel`.
    async fn handle_set_level(&self, params: Option<Value>, peer: &PeerState) -> Result<Value> {
        let params: SetLevelParams = params
            .ok_or_else(|| Error::InvalidParams("Missing params".to_string()))
            .and_then(|v| {
                serde_json::from_value(v).map_err(|e| Error::InvalidParams(e.to_string()))
            })?;

        debug!("Client log level set to {:?}", params.level);
        *peer.log_level.write().await = params.level;
        Ok(serde_json::json!({}))
    }
}

/// Build a `notifications/message` log notification.
pub fn log_notification(level: LoggingLevel, logger: &str, data: Value) -> JsonRpcNotification {
    JsonRpcNotification::new(
        "notifications/message",
        Some(serde_json::json!({
            "level": level,
            "logger": logger,
            "data": data,
        })),
    )
}
