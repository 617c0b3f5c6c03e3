//! Prometheus metrics for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics collector.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Total HTTP protocol requests processed
    pub requests_total: AtomicU64,
    /// Requests rejected with a protocol error
    pub protocol_errors: AtomicU64,
    /// Sessions created
    pub sessions_created: AtomicU64,
    /// Sessions terminated (any reason)
    pub sessions_closed: AtomicU64,
    /// Tool calls
    pub tool_calls: AtomicU64,
    /// Tool calls that produced an error result
    pub tool_errors: AtomicU64,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_requests(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sessions_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_sessions_closed(&self) {
        self.sessions_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a tool call and whether it ended in an error result.
    pub fn record_tool_call(&self, is_error: bool) {
        self.tool_calls.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.tool_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get all metrics as a snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            tool_calls: self.tool_calls.load(Ordering::Relaxed),
            tool_errors: self.tool_errors.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    ///
    /// `active_sessions` comes from the session registry, which owns that number.
    pub fn to_prometheus(&self, active_sessions: usize) -> String {
        let s = self.snapshot();
        format!(
            r#"# HELP mem0_mcp_requests_total Total number of MCP requests
# TYPE mem0_mcp_requests_total counter
mem0_mcp_requests_total {}

# HELP mem0_mcp_protocol_errors_total Requests rejected with a protocol error
# TYPE mem0_mcp_protocol_errors_total counter
mem0_mcp_protocol_errors_total {}

# HELP mem0_mcp_sessions_created_total Sessions created
# TYPE mem0_mcp_sessions_created_total counter
mem0_mcp_sessions_created_total {}

# HELP mem0_mcp_sessions_closed_total Sessions terminated
# TYPE mem0_mcp_sessions_closed_total counter
mem0_mcp_sessions_closed_total {}

# HELP mem0_mcp_active_sessions Live sessions
# TYPE mem0_mcp_active_sessions gauge
mem0_mcp_active_sessions {}

# HELP mem0_mcp_tool_calls_total Tool calls
# TYPE mem0_mcp_tool_calls_total counter
mem0_mcp_tool_calls_total {}

# HELP mem0_mcp_tool_errors_total Tool calls returning an error result
# TYPE mem0_mcp_tool_errors_total counter
mem0_mcp_tool_errors_total {}
"#,
            s.requests_total,
            s.protocol_errors,
            s.sessions_created,
            s.sessions_closed,
            active_sessions,
            s.tool_calls,
            s.tool_errors
        )
    }
}

/// Metrics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub protocol_errors: u64,
    pub sessions_created: u64,
    pub sessions_closed: u64,
    pub tool_calls: u64,
    pub tool_errors: u64,
}
