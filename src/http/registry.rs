//! Session registry: the one place live sessions are looked up by id.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::http::session::{Session, SessionId};
use crate::mcp::server::McpServer;
use crate::metrics::Metrics;

#[derive(Default)]
struct Entries {
    sessions: HashMap<SessionId, Arc<Session>>,
    draining: bool,
}

/// Concurrent map of live sessions.
///
/// The lock is only held for map operations, never while a session does work.
pub struct SessionRegistry {
    entries: RwLock<Entries>,
    server: Arc<McpServer>,
    metrics: Arc<Metrics>,
}

impl SessionRegistry {
    pub fn new(server: Arc<McpServer>, metrics: Arc<Metrics>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            server,
            metrics,
        }
    }

    /// Register a fresh, uninitialized session under a new id.
    pub async fn create(&self) -> Result<(SessionId, Arc<Session>)> {
        let mut entries = self.entries.write().await;
        if entries.draining {
            return Err(Error::ShuttingDown);
        }

        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !entries.sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Arc::new(Session::new(id.clone(), self.server.clone()));
        entries.sessions.insert(id.clone(), session.clone());
        self.metrics.inc_sessions_created();
        debug!("Registered session {}", id);

        Ok((id, session))
    }

    /// Look up a live session.
    pub async fn get(&self, id: &str) -> Result<Arc<Session>> {
        let entries = self.entries.read().await;
        match entries.sessions.get(id) {
            Some(session) if !session.is_closed() => Ok(session.clone()),
            _ => Err(Error::SessionNotFound(id.to_string())),
        }
    }

    /// Remove a session and close it. Removing an unknown id is a no-op.
    ///
    /// Returns whether an entry was removed. The entry is gone even when the
    /// close itself reports an error.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let removed = self.entries.write().await.sessions.remove(id);
        let Some(session) = removed else {
            return Ok(false);
        };

        self.metrics.inc_sessions_closed();
        info!("Session {} removed", id);
        session.close().await?;
        Ok(true)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Registered session ids, in no particular order.
    pub async fn ids(&self) -> Vec<SessionId> {
        self.entries.read().await.sessions.keys().cloned().collect()
    }

    pub async fn is_accepting(&self) -> bool {
        !self.entries.read().await.draining
    }

    /// Stop accepting new sessions and hand back every registered one.
    ///
    /// The registry is empty afterwards; closing the returned sessions is up
    /// to the caller.
    pub async fn begin_shutdown(&self) -> Vec<Arc<Session>> {
        let mut entries = self.entries.write().await;
        entries.draining = true;
        let drained: Vec<Arc<Session>> = entries.sessions.drain().map(|(_, s)| s).collect();
        for _ in &drained {
            self.metrics.inc_sessions_closed();
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::session::tests::test_server;
    use std::collections::HashSet;

    fn registry() -> Arc<SessionRegistry> {
        Arc::new(SessionRegistry::new(test_server(), Metrics::new()))
    }

    #[tokio::test]
    async fn test_create_get_remove() {
        let registry = registry();
        let (id, session) = registry.create().await.unwrap();
        assert_eq!(session.id(), id);
        assert_eq!(registry.len().await, 1);

        let found = registry.get(&id).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));

        assert!(registry.remove(&id).await.unwrap());
        assert!(session.is_closed());
        assert!(registry.is_empty().await);
        assert!(matches!(
            registry.get(&id).await,
            Err(Error::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = registry();
        let (id, _) = registry.create().await.unwrap();

        assert!(registry.remove(&id).await.unwrap());
        assert!(!registry.remove(&id).await.unwrap());
        assert!(!registry.remove("never-existed").await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_session_is_not_found() {
        let registry = registry();
        let (id, session) = registry.create().await.unwrap();
        session.close().await.unwrap();

        assert!(registry.get(&id).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_remove() {
        let registry = registry();

        let creates: Vec<_> = (0..100)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.create().await.unwrap().0 })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in creates {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 100);
        assert_eq!(registry.len().await, 100);

        let removes: Vec<_> = ids
            .into_iter()
            .map(|id| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.remove(&id).await.unwrap() })
            })
            .collect();
        for handle in removes {
            assert!(handle.await.unwrap());
        }

        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_refused_while_draining() {
        let registry = registry();
        registry.create().await.unwrap();

        let drained = registry.begin_shutdown().await;
        assert_eq!(drained.len(), 1);
        assert!(!registry.is_accepting().await);
        assert!(registry.is_empty().await);
        assert!(matches!(registry.create().await, Err(Error::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_session_metrics() {
        let metrics = Metrics::new();
        let registry = SessionRegistry::new(test_server(), metrics.clone());

        let (id, _) = registry.create().await.unwrap();
        registry.create().await.unwrap();
        registry.remove(&id).await.unwrap();
        registry.begin_shutdown().await;

        let s = metrics.snapshot();
        assert_eq!(s.sessions_created, 2);
        assert_eq!(s.sessions_closed, 2);
    }
}
