//! Streamable HTTP transport.
//!
//! Every client gets its own MCP session on the `/mcp` endpoint. `/health` and
//! `/metrics` sit alongside for operators.

pub mod registry;
pub mod router;
pub mod session;
pub mod shutdown;

use axum::{
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::mcp::server::McpServer;
use crate::metrics::Metrics;

pub use registry::SessionRegistry;
pub use router::{route, Target, LAST_EVENT_ID_HEADER, SESSION_ID_HEADER};
pub use session::{ChannelSink, EventSink, Session, SessionId, SessionState};
pub use shutdown::{shutdown_signal, ShutdownCoordinator, ShutdownReport};

/// HTTP server state.
#[derive(Clone)]
pub struct HttpState {
    registry: Arc<SessionRegistry>,
    metrics: Arc<Metrics>,
}

impl HttpState {
    pub fn new(server: Arc<McpServer>, metrics: Arc<Metrics>) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new(server, metrics.clone())),
            metrics,
        }
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }
}

/// Build the HTTP router.
pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)]);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route(
            "/mcp",
            get(router::handle_get)
                .post(router::handle_post)
                .delete(router::handle_delete),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and run until a termination signal, then drain
/// every session.
pub async fn start_server(
    config: &Config,
    server: Arc<McpServer>,
    metrics: Arc<Metrics>,
) -> Result<()> {
    let state = HttpState::new(server, metrics);
    let coordinator = ShutdownCoordinator::new(state.registry());
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::HttpServer(format!("failed to bind {}: {}", addr, e)))?;
    info!("MCP Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            coordinator.shutdown().await;
        })
        .await?;

    Ok(())
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
        "sessions": state.registry.len().await,
    }))
}

/// Prometheus metrics endpoint.
async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    let body = state.metrics.to_prometheus(state.registry.len().await);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}
