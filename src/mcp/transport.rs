//! MCP transport layer: message codec and the stdio transport.
//!
//! The codec is shared by every transport. It turns raw JSON-RPC payloads into
//! [`Message`] values, classifies them, and frames outbound messages as
//! server-sent events for the HTTP event stream.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};

/// A message that can be sent or received.
#[derive(Debug, Clone)]
pub enum Message {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
    Notification(JsonRpcNotification),
}

/// What a message asks of the server, as far as routing is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Initialize,
    ListTools,
    CallTool,
    /// Any other request (`ping`, `logging/setLevel`, unknown methods).
    OtherRequest,
    Notification,
    Response,
    Error,
}

impl Message {
    /// Decode a single JSON-RPC message from raw bytes.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(raw).map_err(|e| Error::Parse(e.to_string()))?;
        Self::from_value(value)
    }

    /// Classify and decode an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let (has_method, has_id, has_outcome) = {
            let obj = value.as_object().ok_or_else(|| {
                Error::McpProtocol("Expected a JSON-RPC message object".to_string())
            })?;

            if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
                return Err(Error::McpProtocol(
                    "Missing or unsupported jsonrpc version".to_string(),
                ));
            }

            (
                obj.contains_key("method"),
                obj.get("id").is_some_and(|id| !id.is_null()),
                obj.contains_key("result") || obj.contains_key("error"),
            )
        };

        let invalid = |e: serde_json::Error| Error::McpProtocol(e.to_string());

        match (has_method, has_id, has_outcome) {
            (true, true, _) => Ok(Self::Request(serde_json::from_value(value).map_err(invalid)?)),
            (true, false, _) => Ok(Self::Notification(
                serde_json::from_value(value).map_err(invalid)?,
            )),
            (false, _, true) => Ok(Self::Response(serde_json::from_value(value).map_err(invalid)?)),
            _ => Err(Error::McpProtocol(
                "Message is neither a request, notification nor response".to_string(),
            )),
        }
    }

    /// Encode to a single-line JSON string.
    pub fn encode(&self) -> Result<String> {
        let json = match self {
            Self::Request(req) => serde_json::to_string(req)?,
            Self::Response(res) => serde_json::to_string(res)?,
            Self::Notification(notif) => serde_json::to_string(notif)?,
        };
        Ok(json)
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Request(req) => match req.method.as_str() {
                "initialize" => MessageKind::Initialize,
                "tools/list" => MessageKind::ListTools,
                "tools/call" => MessageKind::CallTool,
                _ => MessageKind::OtherRequest,
            },
            Self::Notification(_) => MessageKind::Notification,
            Self::Response(res) if res.is_error() => MessageKind::Error,
            Self::Response(_) => MessageKind::Response,
        }
    }

    /// True for the `initialize` request that opens a session.
    pub fn is_initialize_request(&self) -> bool {
        self.kind() == MessageKind::Initialize
    }
}

/// One frame on a session's server-to-client event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Per-session, monotonically increasing event id.
    pub id: u64,
    /// Encoded JSON-RPC message.
    pub data: String,
}

impl SseEvent {
    pub fn from_message(id: u64, message: &Message) -> Result<Self> {
        Ok(Self {
            id,
            data: message.encode()?,
        })
    }
}

/// Transport trait for MCP communication.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start the transport, returning channels for messages.
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)>;

    /// Stop the transport.
    async fn stop(&mut self) -> Result<()>;
}

/// Stdio transport for MCP.
pub struct StdioTransport {
    running: bool,
}

impl StdioTransport {
    /// Create a new stdio transport.
    pub fn new() -> Self {
        Self { running: false }
    }
}

impl Default for StdioTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn start(&mut self) -> Result<(mpsc::Receiver<Message>, mpsc::Sender<Message>)> {
        self.running = true;

        // Channel for incoming messages (from stdin)
        let (incoming_tx, incoming_rx) = mpsc::channel::<Message>(100);
        // Channel for outgoing messages (to stdout)
        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(100);

        let tx = incoming_tx.clone();
        let errors = outgoing_tx.clone();
        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let mut reader = BufReader::new(stdin);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        debug!("EOF on stdin, stopping transport");
                        break;
                    }
                    Ok(_) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }

                        trace!("Received: {}", trimmed);

                        match Message::decode(trimmed.as_bytes()) {
                            Ok(msg) => {
                                if tx.send(msg).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message: {}", e);
                                let reply = JsonRpcResponse::error(None, e.rpc_code(), e.to_string());
                                if errors.send(Message::Response(reply)).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();

            while let Some(msg) = outgoing_rx.recv().await {
                match msg.encode() {
                    Ok(s) => {
                        trace!("Sending: {}", s);
                        if let Err(e) = stdout.write_all(s.as_bytes()).await {
                            error!("Error writing to stdout: {}", e);
                            break;
                        }
                        if let Err(e) = stdout.write_all(b"\n").await {
                            error!("Error writing newline: {}", e);
                            break;
                        }
                        if let Err(e) = stdout.flush().await {
                            error!("Error flushing stdout: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error serializing message: {}", e);
                    }
                }
            }
        });

        Ok((incoming_rx, outgoing_tx))
    }

    async fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_initialize_request() {
        let raw = br#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#;
        let msg = Message::decode(raw).unwrap();
        assert!(msg.is_initialize_request());
        assert_eq!(msg.kind(), MessageKind::Initialize);
    }

    #[test]
    fn test_decode_kinds() {
        let list = Message::from_value(json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"}))
            .unwrap();
        assert_eq!(list.kind(), MessageKind::ListTools);

        let call = Message::from_value(json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": {"name": "add-memory", "arguments": {}}
        }))
        .unwrap();
        assert_eq!(call.kind(), MessageKind::CallTool);

        let ping = Message::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": "ping"})).unwrap();
        assert_eq!(ping.kind(), MessageKind::OtherRequest);

        let notif = Message::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        assert_eq!(notif.kind(), MessageKind::Notification);
        assert!(!notif.is_initialize_request());

        let response =
            Message::from_value(json!({"jsonrpc": "2.0", "id": 4, "result": {}})).unwrap();
        assert_eq!(response.kind(), MessageKind::Response);

        let error = Message::from_value(json!({
            "jsonrpc": "2.0", "id": 5, "error": {"code": -32601, "message": "nope"}
        }))
        .unwrap();
        assert_eq!(error.kind(), MessageKind::Error);
    }

    #[test]
    fn test_initialize_without_id_is_a_notification() {
        let msg = Message::from_value(json!({"jsonrpc": "2.0", "method": "initialize"})).unwrap();
        assert!(!msg.is_initialize_request());
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        assert!(matches!(Message::decode(b"{not json"), Err(Error::Parse(_))));
        assert!(matches!(
            Message::decode(b"[1, 2, 3]"),
            Err(Error::McpProtocol(_))
        ));
        assert!(matches!(
            Message::decode(br#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#),
            Err(Error::McpProtocol(_))
        ));
        assert!(matches!(
            Message::decode(br#"{"jsonrpc":"2.0","id":1}"#),
            Err(Error::McpProtocol(_))
        ));
    }

    #[test]
    fn test_sse_event_from_notification() {
        let msg = Message::Notification(JsonRpcNotification::new(
            "notifications/message",
            Some(json!({"level": "error", "data": "boom"})),
        ));
        let event = SseEvent::from_message(7, &msg).unwrap();
        assert_eq!(event.id, 7);
        assert!(event.data.contains("notifications/message"));
        assert!(!event.data.contains('\n'));
    }
}
