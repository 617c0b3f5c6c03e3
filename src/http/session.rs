//! Per-client MCP session over streamable HTTP.
//!
//! A session moves through three states:
//!
//! - `Uninitialized` - created by the router for an `initialize` request, and
//!   only accepts that request
//! - `Active` - accepts tool and utility requests, and may hold an event stream
//! - `Closed` - terminal; every further message fails with `SessionClosed`
//!
//! Messages on one session are processed one at a time in arrival order.
//! Different sessions never share locks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::mcp::protocol::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use crate::mcp::server::{McpServer, PeerState, Reply};
use crate::mcp::transport::{Message, SseEvent};

/// Opaque session identifier handed to the client.
pub type SessionId = String;

/// Capacity of a session's event-stream buffer.
const EVENT_BUFFER: usize = 64;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Active,
    Closed,
}

/// Server-to-client half of a session's event stream.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    async fn send(&self, event: SseEvent) -> Result<()>;

    /// Release the stream. The sink is dropped afterwards either way.
    async fn close(&self) -> Result<()>;
}

/// [`EventSink`] feeding an in-process channel; the receiving half backs the
/// SSE response body.
pub struct ChannelSink {
    tx: mpsc::Sender<SseEvent>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::Receiver<SseEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, event: SseEvent) -> Result<()> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!("Event stream buffer full, dropping event {}", event.id);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(Error::StreamClosed(
                "client disconnected from event stream".to_string(),
            )),
        }
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Watches one attached event stream for the client going away.
pub struct StreamWatch {
    tx: mpsc::Sender<SseEvent>,
    detached: CancellationToken,
}

impl StreamWatch {
    /// Resolve once the stream is done with.
    ///
    /// Returns `true` when the client dropped the stream while it was still
    /// attached, `false` when it was replaced or the session closed first.
    pub async fn client_gone(self) -> bool {
        tokio::select! {
            _ = self.tx.closed() => !self.detached.is_cancelled(),
            _ = self.detached.cancelled() => false,
        }
    }
}

struct AttachedStream {
    sink: Box<dyn EventSink>,
    /// Cancelled when this stream is replaced or the session closes.
    detached: CancellationToken,
}

/// One client's MCP session.
pub struct Session {
    id: SessionId,
    created_at: DateTime<Utc>,
    last_activity: RwLock<DateTime<Utc>>,
    state: RwLock<SessionState>,
    server: Arc<McpServer>,
    peer: PeerState,
    stream: Mutex<Option<AttachedStream>>,
    next_event_id: AtomicU64,
    /// Held while a message is processed so messages run in arrival order.
    inbox: Mutex<()>,
    closed: CancellationToken,
}

impl Session {
    /// Create an uninitialized session.
    pub fn new(id: SessionId, server: Arc<McpServer>) -> Self {
        let now = Utc::now();
        Self {
            id,
            created_at: now,
            last_activity: RwLock::new(now),
            state: RwLock::new(SessionState::Uninitialized),
            server,
            peer: PeerState::new(),
            stream: Mutex::new(None),
            next_event_id: AtomicU64::new(1),
            inbox: Mutex::new(()),
            closed: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.read().await
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub fn peer(&self) -> &PeerState {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Token cancelled when the session closes.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub async fn has_stream(&self) -> bool {
        self.stream.lock().await.is_some()
    }

    async fn touch(&self) {
        *self.last_activity.write().await = Utc::now();
    }

    /// Process one client message.
    ///
    /// Returns the response for requests, `None` for notifications and client
    /// responses. Per-message protocol errors come back as error responses;
    /// `Err` means the session itself cannot take the message.
    pub async fn handle(&self, message: Message) -> Result<Option<JsonRpcResponse>> {
        let _turn = self.inbox.lock().await;

        if self.is_closed() {
            return Err(Error::SessionClosed(self.id.clone()));
        }
        self.touch().await;

        match (self.state().await, message) {
            (SessionState::Closed, _) => Err(Error::SessionClosed(self.id.clone())),
            (SessionState::Uninitialized, Message::Request(req)) if req.method == "initialize" => {
                let reply = self.process(req).await?;
                if !reply.response.is_error() {
                    self.transition(SessionState::Uninitialized, SessionState::Active)
                        .await?;
                    info!("Session initialized with ID: {}", self.id);
                }
                Ok(Some(reply.response))
            }
            (SessionState::Uninitialized, _) => Err(Error::McpProtocol(
                "Session is not initialized".to_string(),
            )),
            (SessionState::Active, Message::Request(req)) if req.method == "initialize" => {
                let e = Error::SessionAlreadyInitialized(self.id.clone());
                Ok(Some(JsonRpcResponse::error(
                    Some(req.id),
                    e.rpc_code(),
                    e.to_string(),
                )))
            }
            (SessionState::Active, Message::Request(req)) => {
                let reply = self.process(req).await?;
                for notification in reply.notifications {
                    if let Err(e) = self.notify(notification).await {
                        warn!("Event stream for session {} failed: {}", self.id, e);
                        if let Err(e) = self.close().await {
                            warn!("Error closing session {}: {}", self.id, e);
                        }
                        break;
                    }
                }
                Ok(Some(reply.response))
            }
            (SessionState::Active, Message::Notification(notif)) => {
                self.server.handle_notification(notif).await;
                Ok(None)
            }
            (SessionState::Active, Message::Response(res)) => {
                debug!("Ignoring client response on session {} (id: {:?})", self.id, res.id);
                Ok(None)
            }
        }
    }

    /// Run a request through the protocol engine, giving up if the session
    /// closes first. A reply that lands after closing is discarded.
    async fn process(&self, req: JsonRpcRequest) -> Result<Reply> {
        tokio::select! {
            _ = self.closed.cancelled() => Err(Error::SessionClosed(self.id.clone())),
            reply = self.server.handle_request(req, &self.peer) => {
                if self.is_closed() {
                    debug!("Discarding reply for closed session {}", self.id);
                    return Err(Error::SessionClosed(self.id.clone()));
                }
                Ok(reply)
            }
        }
    }

    async fn transition(&self, from: SessionState, to: SessionState) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != from {
            return Err(Error::SessionClosed(self.id.clone()));
        }
        *state = to;
        Ok(())
    }

    /// Attach an event stream, replacing (and closing) any previous one.
    ///
    /// Returns a token that is cancelled once this stream is detached.
    pub async fn attach_stream(&self, sink: Box<dyn EventSink>) -> Result<CancellationToken> {
        if self.state().await != SessionState::Active || self.is_closed() {
            return Err(Error::SessionClosed(self.id.clone()));
        }
        self.touch().await;

        let detached = self.closed.child_token();
        let previous = self.stream.lock().await.replace(AttachedStream {
            sink,
            detached: detached.clone(),
        });
        if let Some(previous) = previous {
            debug!("Replacing event stream for session {}", self.id);
            previous.detached.cancel();
            if let Err(e) = previous.sink.close().await {
                warn!("Error closing replaced stream for session {}: {}", self.id, e);
            }
        }
        Ok(detached)
    }

    /// Open (or resume) the SSE stream backed by an in-process channel.
    ///
    /// The returned [`StreamWatch`] keeps the channel open until it resolves,
    /// so it must be driven (or dropped) for the receiver to see the end.
    pub async fn open_stream(&self) -> Result<(mpsc::Receiver<SseEvent>, StreamWatch)> {
        let (sink, rx) = ChannelSink::channel();
        let tx = sink.tx.clone();
        let detached = self.attach_stream(Box::new(sink)).await?;
        Ok((rx, StreamWatch { tx, detached }))
    }

    /// Push a notification to the attached event stream.
    ///
    /// With no stream attached the notification is dropped; there is no replay
    /// buffer.
    pub async fn notify(&self, notification: JsonRpcNotification) -> Result<()> {
        let stream = self.stream.lock().await;
        let Some(sink) = stream.as_ref().map(|s| &s.sink) else {
            debug!(
                "No event stream for session {}, dropping {}",
                self.id, notification.method
            );
            return Ok(());
        };

        let id = self.next_event_id.fetch_add(1, Ordering::Relaxed);
        let event = SseEvent::from_message(id, &Message::Notification(notification))?;
        sink.send(event).await
    }

    /// Move to `Closed` and release the event stream. Idempotent.
    ///
    /// The state change always happens; the returned error only reports a
    /// failure to close the stream cleanly.
    pub async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Closed;
        }
        self.closed.cancel();

        let stream = self.stream.lock().await.take();
        debug!("Session {} closed", self.id);
        match stream {
            Some(stream) => stream.sink.close().await,
            None => Ok(()),
        }
    }
}
