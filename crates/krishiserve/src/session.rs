//! Chat sessions and server-wide analytics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// One joined chat session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    /// WebSocket connection that joined it
    pub connection_id: String,

    /// When the session joined
    pub join_time: DateTime<Utc>,

    /// Last chat message
    pub last_activity: DateTime<Utc>,

    /// Chat messages sent
    pub query_count: u64,
}

/// Active sessions keyed by session id
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionInfo>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a session joining over a connection; rejoining resets it
    pub async fn join(&self, session_id: &str, connection_id: &str) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            session_id.to_string(),
            SessionInfo {
                connection_id: connection_id.to_string(),
                join_time: now,
                last_activity: now,
                query_count: 0,
            },
        );
        info!("Session joined: {} (active: {})", session_id, sessions.len());
    }

    /// Count a chat message; unknown sessions are ignored
    pub async fn touch(&self, session_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(session_id) {
            session.last_activity = Utc::now();
            session.query_count += 1;
        }
    }

    /// Drop every session joined over a connection
    pub async fn remove_connection(&self, connection_id: &str) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.connection_id != connection_id);
        before - sessions.len()
    }

    /// Session details
    pub async fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Number of active sessions
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Server-wide counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    /// Answered queries
    pub total_queries: u64,

    /// Running average response time in milliseconds
    pub avg_response_time: f64,

    /// Open WebSocket connections
    pub active_users: u64,

    /// Share of failed chat messages
    pub error_rate: f64,

    #[serde(skip)]
    errors: u64,
}

/// Shared analytics counters
#[derive(Clone, Default)]
pub struct Analytics {
    inner: Arc<RwLock<AnalyticsSnapshot>>,
}

impl Analytics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count an answered query.
    ///
    /// The average halves toward each new sample rather than averaging
    /// over all queries.
    pub async fn record_query(&self, response_time_ms: f64) {
        let mut stats = self.inner.write().await;
        stats.total_queries += 1;
        stats.avg_response_time = (stats.avg_response_time + response_time_ms) / 2.0;
        stats.error_rate = rate(stats.errors, stats.total_queries + stats.errors);
    }

    /// Count a failed chat message
    pub async fn record_error(&self) {
        let mut stats = self.inner.write().await;
        stats.errors += 1;
        stats.error_rate = rate(stats.errors, stats.total_queries + stats.errors);
    }

    /// Count a new connection
    pub async fn connect(&self) {
        self.inner.write().await.active_users += 1;
    }

    /// Count a closed connection
    pub async fn disconnect(&self) {
        let mut stats = self.inner.write().await;
        stats.active_users = stats.active_users.saturating_sub(1);
    }

    /// Current values
    pub async fn snapshot(&self) -> AnalyticsSnapshot {
        self.inner.read().await.clone()
    }
}

fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_touch_and_remove() {
        let registry = SessionRegistry::new();
        registry.join("s1", "conn_1").await;
        registry.join("s2", "conn_1").await;
        registry.join("s3", "conn_2").await;

        registry.touch("s1").await;
        registry.touch("s1").await;
        registry.touch("missing").await;
        assert_eq!(registry.get("s1").await.unwrap().query_count, 2);
        assert_eq!(registry.count().await, 3);

        assert_eq!(registry.remove_connection("conn_1").await, 2);
        assert_eq!(registry.count().await, 1);
        assert!(registry.get("s3").await.is_some());
    }

    #[tokio::test]
    async fn test_rejoin_resets_count() {
        let registry = SessionRegistry::new();
        registry.join("s1", "conn_1").await;
        registry.touch("s1").await;
        registry.join("s1", "conn_2").await;

        let session = registry.get("s1").await.unwrap();
        assert_eq!(session.query_count, 0);
        assert_eq!(session.connection_id, "conn_2");
    }

    #[tokio::test]
    async fn test_running_average() {
        let analytics = Analytics::new();
        analytics.record_query(100.0).await;
        analytics.record_query(50.0).await;

        let stats = analytics.snapshot().await;
        assert_eq!(stats.total_queries, 2);
        assert!((stats.avg_response_time - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_active_users_and_errors() {
        let analytics = Analytics::new();
        analytics.disconnect().await;
        analytics.connect().await;
        analytics.connect().await;
        analytics.disconnect().await;
        analytics.record_query(10.0).await;
        analytics.record_error().await;

        let stats = analytics.snapshot().await;
        assert_eq!(stats.active_users, 1);
        assert!((stats.error_rate - 0.5).abs() < 1e-9);

        let json = serde_json::to_value(&stats).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["total_queries"], 1);
    }
}
