//! WebSocket chat protocol
//!
//! JSON text frames tagged by `type`. The client joins a session, then
//! sends chat messages; the server answers each with a typing indicator,
//! the answer and a second typing indicator.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::answer::{offline_answer, KB_SOURCE};
use crate::error::{ApiError, ApiResult};
use crate::handlers::{elapsed_ms, AppState};
use crate::responses::SourceRef;

/// Maximum WebSocket message size (1MB)
pub const MAX_WS_MESSAGE_SIZE: usize = 1_000_000;

/// Maximum WebSocket frame size (16KB)
pub const MAX_WS_FRAME_SIZE: usize = 16_384;

/// Sent with every `ai-error`
pub const CHAT_ERROR_MESSAGE: &str = "Sorry, I encountered an error processing your request.";

/// Greeting sent after `join-session`
pub const WELCOME_MESSAGE: &str = "Connected to KrishiSahay AI Server";

/// Capabilities listed in the greeting
pub const CAPABILITIES: &[&str] = &["Real-time AI Chat", "Agricultural Knowledge Base", "Expert Guidance"];

/// Answer to one chat message
#[derive(Debug, Clone, Serialize)]
pub struct AiResponse {
    /// Message as sent
    pub query: String,

    /// Quick knowledge-base answer
    pub offline_answer: String,

    /// Model or knowledge-base chat answer
    pub online_answer: String,

    /// Confidence of the online answer
    pub confidence: f64,

    /// Sources consulted
    pub sources: Vec<SourceRef>,

    /// Follow-ups from the search
    pub follow_up_suggestions: Vec<String>,

    /// Full search outcome
    pub search_results: serde_json::Value,

    /// Detected intent
    pub intent: krishisearch::Intent,

    /// Whether a language model answered
    pub llm_enabled: bool,

    /// Handling time in milliseconds
    pub response_time_ms: f64,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// Server to client events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsEvent {
    /// Sent once on connect
    ConnectionStatus {
        /// Always true
        connected: bool,
    },

    /// Session greeting
    SystemUpdate {
        /// Update kind, `welcome` after joining
        kind: String,

        /// Text for the user
        message: String,

        /// What the server offers
        capabilities: Vec<String>,
    },

    /// Typing indicator
    AiTyping {
        /// Whether an answer is being prepared
        typing: bool,
    },

    /// Chat answer
    AiResponse(Box<AiResponse>),

    /// Chat failure
    AiError {
        /// Text for the user
        message: String,

        /// Cause
        error: String,
    },

    /// Keep-alive
    Heartbeat {
        /// Unix timestamp in milliseconds
        timestamp: i64,
    },
}

impl WsEvent {
    /// Get event type string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ConnectionStatus { .. } => "connection-status",
            Self::SystemUpdate { .. } => "system-update",
            Self::AiTyping { .. } => "ai-typing",
            Self::AiResponse(_) => "ai-response",
            Self::AiError { .. } => "ai-error",
            Self::Heartbeat { .. } => "heartbeat",
        }
    }

    /// Session greeting
    pub fn welcome() -> Self {
        Self::SystemUpdate {
            kind: "welcome".to_string(),
            message: WELCOME_MESSAGE.to_string(),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Chat failure with its cause
    pub fn chat_error(error: impl Into<String>) -> Self {
        Self::AiError {
            message: CHAT_ERROR_MESSAGE.to_string(),
            error: error.into(),
        }
    }

    /// Heartbeat stamped now
    pub fn heartbeat() -> Self {
        Self::Heartbeat {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Client to server messages
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Start or resume a session
    JoinSession {
        /// Session id chosen by the client
        #[serde(alias = "sessionId")]
        session_id: String,
    },

    /// Ask a question
    ChatMessage {
        /// Session the message belongs to
        #[serde(default, alias = "sessionId")]
        session_id: String,

        /// Question text
        message: String,
    },
}

/// Client connection state
#[derive(Debug, Clone)]
pub struct ConnectionState {
    /// Unique connection ID
    pub id: String,

    /// When the socket was upgraded
    pub connected_at: DateTime<Utc>,
}

/// WebSocket connection manager
#[derive(Clone, Default)]
pub struct WsManager {
    /// Active connections: connection_id -> state
    connections: Arc<tokio::sync::RwLock<HashMap<String, ConnectionState>>>,
}

impl WsManager {
    /// Create new WebSocket manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection
    pub async fn register_connection(&self, conn_id: String) {
        let state = ConnectionState {
            id: conn_id.clone(),
            connected_at: Utc::now(),
        };
        let mut connections = self.connections.write().await;
        connections.insert(conn_id.clone(), state);
        info!("WebSocket connected: {} (active: {})", conn_id, connections.len());
    }

    /// Unregister a connection
    pub async fn unregister_connection(&self, conn_id: &str) {
        let mut connections = self.connections.write().await;
        connections.remove(conn_id);
        info!("WebSocket disconnected: {} (active: {})", conn_id, connections.len());
    }

    /// Get number of active connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get connection info by ID
    pub async fn get_connection(&self, id: &str) -> Option<ConnectionState> {
        self.connections.read().await.get(id).cloned()
    }
}

/// Refuse new connections once the configured limit is reached
pub async fn admit(state: &AppState) -> ApiResult<()> {
    let active = state.connections.connection_count().await;
    if active >= state.config.max_ws_connections {
        warn!("Rejecting WebSocket connection: {} active", active);
        return Err(ApiError::unavailable("Too many WebSocket connections"));
    }
    Ok(())
}

/// GET /ws - Upgrade to the chat protocol
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> ApiResult<Response> {
    admit(&state).await?;

    Ok(ws
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .max_frame_size(MAX_WS_FRAME_SIZE)
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4().to_string();
    state.connections.register_connection(conn_id.clone()).await;
    state.analytics.connect().await;

    let (mut sender, mut receiver) = socket.split();

    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(state.config.ws_heartbeat_interval_secs));
    heartbeat.tick().await;

    if send_event(&mut sender, &WsEvent::ConnectionStatus { connected: true })
        .await
        .is_ok()
    {
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if send_event(&mut sender, &WsEvent::heartbeat()).await.is_err() {
                        break;
                    }
                }
                message = receiver.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if handle_client_message(&state, &conn_id, &text, &mut sender).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket {} receive error: {}", conn_id, e);
                        break;
                    }
                },
            }
        }
    }

    let removed = state.sessions.remove_connection(&conn_id).await;
    if removed > 0 {
        debug!("Removed {} sessions of {}", removed, conn_id);
    }
    state.analytics.disconnect().await;
    state.connections.unregister_connection(&conn_id).await;
}

/// Serialize and send one event
pub async fn send_event<S>(sender: &mut S, event: &WsEvent) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    match event.to_json() {
        Ok(text) => sender.send(Message::Text(text)).await,
        Err(e) => {
            error!("Failed to serialize {} event: {}", event.event_type(), e);
            Ok(())
        }
    }
}

/// Handle one text frame. Errors only when the socket can no longer be written.
pub async fn handle_client_message<S>(
    state: &AppState,
    conn_id: &str,
    text: &str,
    sender: &mut S,
) -> Result<(), S::Error>
where
    S: Sink<Message> + Unpin,
{
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            debug!("Unrecognized WebSocket message from {}: {}", conn_id, e);
            return send_event(sender, &WsEvent::chat_error(format!("Invalid message: {}", e))).await;
        }
    };

    match message {
        ClientMessage::JoinSession { session_id } => {
            state.sessions.join(&session_id, conn_id).await;
            send_event(sender, &WsEvent::welcome()).await
        }
        ClientMessage::ChatMessage { session_id, message } => {
            send_event(sender, &WsEvent::AiTyping { typing: true }).await?;

            let event = match chat_response(state, &session_id, &message).await {
                Ok(response) => WsEvent::AiResponse(Box::new(response)),
                Err(e) => {
                    error!("Error processing message from {}: {}", session_id, e);
                    state.analytics.record_error().await;
                    WsEvent::chat_error(e)
                }
            };

            send_event(sender, &event).await?;
            send_event(sender, &WsEvent::AiTyping { typing: false }).await
        }
    }
}

async fn chat_response(state: &AppState, session_id: &str, message: &str) -> Result<AiResponse, String> {
    let message = message.trim();
    if message.is_empty() {
        return Err("Message is required".to_string());
    }

    let started = Instant::now();
    state.sessions.touch(session_id).await;

    let reply = state.chat.process_message(message, session_id).await;
    let search_results = serde_json::to_value(&reply.search_results).map_err(|e| e.to_string())?;
    let total = reply.search_results.total_results;

    let response_time = elapsed_ms(started);
    state.analytics.record_query(response_time).await;

    info!(
        "AI response for {} in {:.2}ms with {} search results",
        session_id, response_time, total
    );

    Ok(AiResponse {
        query: message.to_string(),
        offline_answer: offline_answer(message, state.chat.knowledge_base()),
        sources: vec![
            SourceRef::new(reply.source.clone(), reply.confidence),
            SourceRef::new(KB_SOURCE, 0.88),
            SourceRef::new(format!("{} sources found", total), 0.85),
        ],
        online_answer: reply.response,
        confidence: reply.confidence,
        follow_up_suggestions: reply.suggestions,
        search_results,
        intent: reply.intent,
        llm_enabled: state.chat.generator().is_available(),
        response_time_ms: response_time,
        timestamp: Utc::now(),
    })
}
