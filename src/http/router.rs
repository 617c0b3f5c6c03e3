//! Request router for the `/mcp` endpoint.
//!
//! - `POST` carries one JSON-RPC message; an `initialize` without a session
//!   header opens a new session
//! - `GET` opens (or resumes) the session's SSE stream
//! - `DELETE` terminates the session

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::http::registry::SessionRegistry;
use crate::http::session::Session;
use crate::http::HttpState;
use crate::mcp::protocol::{error_codes, JsonRpcResponse, RequestId};
use crate::mcp::transport::{Message, SseEvent};

/// Header carrying the session id in both directions.
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
/// Header a reconnecting client uses to name the last event it saw.
pub const LAST_EVENT_ID_HEADER: &str = "last-event-id";

const NO_VALID_SESSION: &str = "Bad Request: No valid session ID provided";
const INVALID_SESSION: &str = "Invalid or missing session ID";

/// Session a POSTed message was routed to.
pub enum Target {
    /// Created for this `initialize` request.
    New(Arc<Session>),
    /// Already registered under the request's session header.
    Existing(Arc<Session>),
}

impl Target {
    pub fn session(&self) -> &Arc<Session> {
        match self {
            Target::New(s) | Target::Existing(s) => s,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Target::New(_))
    }
}

/// Pick the session for a message.
///
/// A session header must name a live session. Without one, only an
/// `initialize` request is accepted, and it gets a new session.
pub async fn route(
    registry: &SessionRegistry,
    session_id: Option<&str>,
    message: &Message,
) -> Result<Target> {
    match session_id {
        Some(id) => registry.get(id).await.map(Target::Existing),
        None if message.is_initialize_request() => {
            let (_, session) = registry.create().await?;
            Ok(Target::New(session))
        }
        None => Err(Error::McpProtocol("No valid session ID provided".to_string())),
    }
}

fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn with_session_header(mut response: Response, id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(id) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    response
}

fn rpc_error(status: StatusCode, id: Option<RequestId>, code: i32, message: &str) -> Response {
    (status, Json(JsonRpcResponse::error(id, code, message))).into_response()
}

/// Map a routing or session failure to its HTTP rejection.
fn reject(error: &Error, id: Option<RequestId>) -> Response {
    match error {
        Error::SessionNotFound(_) | Error::SessionClosed(_) | Error::McpProtocol(_) => rpc_error(
            StatusCode::BAD_REQUEST,
            id,
            error_codes::SERVER_ERROR,
            NO_VALID_SESSION,
        ),
        Error::ShuttingDown => rpc_error(
            StatusCode::SERVICE_UNAVAILABLE,
            id,
            error_codes::SERVER_ERROR,
            &error.to_string(),
        ),
        _ => rpc_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            id,
            error_codes::INTERNAL_ERROR,
            "Internal server error",
        ),
    }
}

/// `POST /mcp`
pub async fn handle_post(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.metrics.inc_requests();

    let message = match Message::decode(&body) {
        Ok(message) => message,
        Err(e) => {
            debug!("Rejecting undecodable message: {}", e);
            state.metrics.inc_protocol_errors();
            return rpc_error(StatusCode::BAD_REQUEST, None, e.rpc_code(), &e.to_string());
        }
    };
    let request_id = match &message {
        Message::Request(req) => Some(req.id.clone()),
        _ => None,
    };

    let session_id = session_id_from(&headers);
    let target = match route(&state.registry, session_id.as_deref(), &message).await {
        Ok(target) => target,
        Err(e) => {
            warn!("Rejecting message: {}", e);
            state.metrics.inc_protocol_errors();
            return reject(&e, request_id);
        }
    };

    let session = target.session().clone();
    let id = session.id().to_string();
    let mut pending = target
        .is_new()
        .then(|| PendingSession::new(state.registry(), &id));

    match session.handle(message).await {
        Ok(Some(response)) => {
            if let Some(pending) = pending.take() {
                if response.is_error() {
                    // Failed handshake: the session never becomes reachable.
                    pending.abandon().await;
                    return (StatusCode::OK, Json(response)).into_response();
                }
                pending.commit();
            }
            if session.is_closed() {
                discard(&state.registry, &id).await;
            }
            with_session_header((StatusCode::OK, Json(response)).into_response(), &id)
        }
        Ok(None) => {
            if let Some(pending) = pending.take() {
                pending.commit();
            }
            with_session_header(StatusCode::ACCEPTED.into_response(), &id)
        }
        Err(e) => {
            warn!("Session {} could not take message: {}", id, e);
            state.metrics.inc_protocol_errors();
            match pending.take() {
                Some(pending) => pending.abandon().await,
                None if session.is_closed() => discard(&state.registry, &id).await,
                None => {}
            }
            reject(&e, request_id)
        }
    }
}

/// A session registered for an `initialize` that has not answered yet.
///
/// Dropped without [`commit`](Self::commit) (for instance when the client
/// aborts the request mid-handshake), it removes the session again.
struct PendingSession {
    registry: Arc<SessionRegistry>,
    id: Option<String>,
}

impl PendingSession {
    fn new(registry: Arc<SessionRegistry>, id: &str) -> Self {
        Self {
            registry,
            id: Some(id.to_string()),
        }
    }

    /// The handshake succeeded; keep the session.
    fn commit(mut self) {
        self.id = None;
    }

    /// The handshake failed; remove the session now.
    async fn abandon(mut self) {
        if let Some(id) = self.id.take() {
            discard(&self.registry, &id).await;
        }
    }
}

impl Drop for PendingSession {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        debug!("Handshake for session {} abandoned", id);
        let registry = self.registry.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { discard(&registry, &id).await });
            }
            Err(_) => warn!("No runtime to remove abandoned session {}", id),
        }
    }
}

async fn discard(registry: &SessionRegistry, id: &str) {
    if let Err(e) = registry.remove(id).await {
        warn!("Error closing session {}: {}", id, e);
    }
}

fn to_sse(event: SseEvent) -> std::result::Result<Event, Infallible> {
    Ok(Event::default()
        .id(event.id.to_string())
        .event("message")
        .data(event.data))
}

/// `GET /mcp`
pub async fn handle_get(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    state.metrics.inc_requests();

    let session = match session_id_from(&headers) {
        Some(id) => state.registry.get(&id).await.ok(),
        None => None,
    };
    let Some(session) = session else {
        state.metrics.inc_protocol_errors();
        return (StatusCode::BAD_REQUEST, INVALID_SESSION).into_response();
    };

    match headers.get(LAST_EVENT_ID_HEADER).and_then(|v| v.to_str().ok()) {
        Some(last) => info!("Client reconnecting with Last-Event-ID: {}", last),
        None => info!("Establishing new SSE stream for session {}", session.id()),
    }

    let (rx, watch) = match session.open_stream().await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("Cannot open stream for session {}: {}", session.id(), e);
            state.metrics.inc_protocol_errors();
            return (StatusCode::BAD_REQUEST, INVALID_SESSION).into_response();
        }
    };

    // A client that drops the stream ends its session.
    let registry = state.registry();
    let id = session.id().to_string();
    tokio::spawn(async move {
        if watch.client_gone().await {
            info!("Event stream for session {} closed by client", id);
            discard(&registry, &id).await;
        }
    });

    let stream = ReceiverStream::new(rx).map(to_sse);
    with_session_header(
        Sse::new(stream).keep_alive(KeepAlive::default()).into_response(),
        session.id(),
    )
}

/// `DELETE /mcp`
pub async fn handle_delete(State(state): State<HttpState>, headers: HeaderMap) -> Response {
    state.metrics.inc_requests();

    let session = match session_id_from(&headers) {
        Some(id) => state.registry.get(&id).await.ok(),
        None => None,
    };
    let Some(session) = session else {
        state.metrics.inc_protocol_errors();
        return (StatusCode::BAD_REQUEST, INVALID_SESSION).into_response();
    };

    info!("Received session termination request for session {}", session.id());
    match state.registry.remove(session.id()).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            error!("Error handling session termination: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error processing session termination",
            )
                .into_response()
        }
    }
}
