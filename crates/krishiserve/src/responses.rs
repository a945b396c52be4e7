//! API request and response types matching the frontend contract

use crate::llm::{GeneratedAnswer, GenerationContext, LlmStats};
use crate::session::AnalyticsSnapshot;
use chrono::{DateTime, Utc};
use krishisearch::{ConversationEntry, CorpusHit, SearchContext, SearchOutcome, SearchStats};
use serde::{Deserialize, Serialize};

/// Default number of corpus hits
pub const DEFAULT_CORPUS_TOP_K: usize = 5;

/// Upper bound on requested corpus hits
pub const MAX_CORPUS_TOP_K: usize = 50;

/// Named source with a fixed confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Display name
    pub name: String,

    /// Fixed confidence
    pub confidence: f64,
}

impl SourceRef {
    /// Create a source entry
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Component readiness in the health report
#[derive(Debug, Clone, Serialize)]
pub struct Components {
    /// WebSocket endpoint
    pub websocket: &'static str,

    /// Knowledge base entries loaded
    pub knowledge_base: usize,

    /// Q&A pairs loaded, `None` without a corpus
    pub corpus: Option<usize>,

    /// Search engine
    pub ai_search: &'static str,

    /// `enabled` or `disabled`
    pub llm: &'static str,
}

/// GET /api/health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when answering
    pub status: &'static str,

    /// Service name
    pub service: &'static str,

    /// Crate version
    pub version: &'static str,

    /// Report time
    pub timestamp: DateTime<Utc>,

    /// Component readiness
    pub components: Components,

    /// Language model status
    pub llm: LlmStats,

    /// Server counters
    pub stats: AnalyticsSnapshot,
}

/// GET /api/status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Open WebSocket connections
    pub active_connections: usize,

    /// Joined chat sessions
    pub active_sessions: usize,

    /// Answered queries
    pub total_queries: u64,

    /// Running average response time in milliseconds
    pub avg_response_time: f64,

    /// Report time
    pub timestamp: DateTime<Utc>,
}

/// GET /api/analytics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    /// Server counters
    #[serde(flatten)]
    pub stats: AnalyticsSnapshot,

    /// Joined chat sessions
    pub active_sessions: usize,

    /// Report time
    pub timestamp: DateTime<Utc>,
}

/// POST /api/query body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    /// Farmer question
    #[serde(default)]
    pub query: Option<String>,

    /// `online` (default) adds a model or knowledge-base answer
    #[serde(default)]
    pub mode: Option<String>,
}

/// POST /api/query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Always true
    pub success: bool,

    /// Question as sent
    pub query: String,

    /// Quick knowledge-base answer
    pub offline_answer: String,

    /// Model or knowledge-base answer in online mode
    pub online_answer: Option<String>,

    /// Fixed confidence
    pub confidence: f64,

    /// Sources consulted
    pub sources: Vec<SourceRef>,

    /// Canned follow-up questions
    pub follow_up_suggestions: Vec<String>,

    /// Question shape
    pub question_type: String,

    /// Mode used
    pub mode: String,

    /// Handling time in milliseconds
    pub response_time: f64,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// POST /api/search body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    /// Farmer question
    #[serde(default)]
    pub query: Option<String>,

    /// Caller hints
    #[serde(default)]
    pub context: Option<SearchContext>,
}

/// POST /api/search
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse<'kb> {
    /// Always true
    pub success: bool,

    /// Full search outcome
    pub search_results: SearchOutcome<'kb>,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// GET /api/trending
#[derive(Debug, Clone, Serialize)]
pub struct TrendingResponse {
    /// Always true
    pub success: bool,

    /// Most frequent recent queries
    pub trending_queries: Vec<String>,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// GET /api/search-stats
#[derive(Debug, Clone, Serialize)]
pub struct SearchStatsResponse {
    /// Always true
    pub success: bool,

    /// Search counters
    pub stats: SearchStats,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// GET /api/conversation/:session_id
#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    /// Always true
    pub success: bool,

    /// Requested session
    pub session_id: String,

    /// Recent exchanges, oldest first
    pub conversation: Vec<ConversationEntry>,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// POST /api/corpus/search body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorpusSearchRequest {
    /// Farmer question
    #[serde(default)]
    pub query: Option<String>,

    /// Hits wanted, [`DEFAULT_CORPUS_TOP_K`] when absent
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// POST /api/corpus/search
#[derive(Debug, Clone, Serialize)]
pub struct CorpusSearchResponse {
    /// Always true
    pub success: bool,

    /// Question as sent
    pub query: String,

    /// Most similar Q&A pairs
    pub hits: Vec<CorpusHit>,

    /// Numbered answer text from the hits
    pub offline_answer: String,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// GET /api/llm/status
#[derive(Debug, Clone, Serialize)]
pub struct LlmStatusResponse {
    /// Always true
    pub success: bool,

    /// Language model status
    pub llm: LlmStats,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// POST /api/llm/generate body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    /// Farmer question
    #[serde(default)]
    pub query: Option<String>,

    /// Prompt context
    #[serde(default)]
    pub context: GenerationContext,
}

/// POST /api/llm/generate
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    /// Always true
    pub success: bool,

    /// Generated answer
    pub response: GeneratedAnswer,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

/// Acknowledgement for POST actions
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Always true
    pub success: bool,

    /// What happened
    pub message: String,

    /// Reply time
    pub timestamp: DateTime<Utc>,
}

impl MessageResponse {
    /// Successful acknowledgement
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Non-blank query text, trimmed
pub fn required_query(query: Option<&str>) -> Option<&str> {
    query.map(str::trim).filter(|q| !q.is_empty())
}
