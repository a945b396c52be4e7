//! HTTP handlers for REST API endpoints

use anyhow::Context;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use krishisearch::{format_offline_answer, HashingEmbedder, QaCorpus, SearchEngine};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::answer::{detect_question_type, followup_suggestions, offline_answer};
use crate::chat::ChatCoordinator;
use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::llm::{ResponseGenerator, WatsonxClient};
use crate::responses::{
    required_query, AnalyticsResponse, Components, ConversationResponse, CorpusSearchRequest,
    CorpusSearchResponse, GenerateRequest, GenerateResponse, HealthResponse, LlmStatusResponse,
    MessageResponse, QueryRequest, QueryResponse, SearchRequest, SearchResponse,
    SearchStatsResponse, SourceRef, StatusResponse, TrendingResponse, DEFAULT_CORPUS_TOP_K,
    MAX_CORPUS_TOP_K,
};
use crate::session::{Analytics, SessionRegistry};
use crate::websocket::{ws_handler, WsManager};

/// Confidence reported by /api/query
pub const QUERY_CONFIDENCE: f64 = 0.85;

/// State shared across all handlers
///
/// Everything mutable sits behind its own lock; handlers never hold one
/// across an await on the language model.
#[derive(Clone)]
pub struct AppState {
    /// Search, conversation log and answer generation
    pub chat: Arc<ChatCoordinator>,

    /// Kisan Call Centre Q&A pairs, `None` when loading failed
    pub corpus: Option<Arc<QaCorpus>>,

    /// Joined chat sessions
    pub sessions: SessionRegistry,

    /// Server-wide counters
    pub analytics: Analytics,

    /// Open WebSocket connections
    pub connections: WsManager,

    /// Immutable server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create state around a ready coordinator
    pub fn new(chat: ChatCoordinator, corpus: Option<QaCorpus>, config: ServerConfig) -> Self {
        Self {
            chat: Arc::new(chat),
            corpus: corpus.map(Arc::new),
            sessions: SessionRegistry::new(),
            analytics: Analytics::new(),
            connections: WsManager::new(),
            config: Arc::new(config),
        }
    }

    /// Load the knowledge base, search configuration, corpus and LLM client.
    ///
    /// Unset paths fall back to the embedded resources. A corpus that fails
    /// to load is logged and left out; everything else is fatal.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let kb = config.load_knowledge_base()?;
        info!("Knowledge base ready: {} entries", kb.len());

        let search_config = config.load_search_config()?;
        let engine = SearchEngine::from_config(&search_config)
            .context("Failed to build search engine")?;

        let corpus = match &config.corpus_path {
            Some(path) => QaCorpus::load(path, Box::new(HashingEmbedder::default())),
            None => QaCorpus::builtin(),
        };
        let corpus = match corpus {
            Ok(corpus) => Some(corpus),
            Err(e) => {
                warn!("Q&A corpus unavailable: {}", e);
                None
            }
        };

        let generator: Arc<dyn ResponseGenerator> = Arc::new(
            WatsonxClient::new(config.llm.clone()).context("Failed to create LLM client")?,
        );

        let chat = ChatCoordinator::new(Arc::new(kb), engine, &search_config.history, generator);
        Ok(Self::new(chat, corpus, config))
    }
}

/// Milliseconds since `started`
pub(crate) fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let llm = state.chat.generator().stats();
    let components = Components {
        websocket: "active",
        knowledge_base: state.chat.knowledge_base().len(),
        corpus: state.corpus.as_ref().map(|c| c.len()),
        ai_search: "ready",
        llm: if llm.is_available { "enabled" } else { "disabled" },
    };

    Ok(Json(HealthResponse {
        status: "healthy",
        service: "krishiserve",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        components,
        llm,
        stats: state.analytics.snapshot().await,
    }))
}

/// GET /api/status - Connection and query counters
pub async fn get_status(State(state): State<AppState>) -> ApiResult<Json<StatusResponse>> {
    let stats = state.analytics.snapshot().await;
    Ok(Json(StatusResponse {
        active_connections: state.connections.connection_count().await,
        active_sessions: state.sessions.count().await,
        total_queries: stats.total_queries,
        avg_response_time: stats.avg_response_time,
        timestamp: Utc::now(),
    }))
}

/// GET /api/analytics - Server counters
pub async fn get_analytics(State(state): State<AppState>) -> ApiResult<Json<AnalyticsResponse>> {
    Ok(Json(AnalyticsResponse {
        stats: state.analytics.snapshot().await,
        active_sessions: state.sessions.count().await,
        timestamp: Utc::now(),
    }))
}

/// POST /api/query - Quick offline answer plus an optional online answer
pub async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<QueryResponse>> {
    let started = Instant::now();
    let query = required_query(request.query.as_deref())
        .ok_or_else(ApiError::query_required)?
        .to_string();
    let mode = request.mode.unwrap_or_else(|| "online".to_string());

    info!("Query ({} mode): {}", mode, query);

    let offline = offline_answer(&query, state.chat.knowledge_base());
    let online = if mode == "online" {
        Some(state.chat.answer_query(&query).await.text)
    } else {
        None
    };

    let response_time = elapsed_ms(started);
    state.analytics.record_query(response_time).await;

    Ok(Json(QueryResponse {
        success: true,
        offline_answer: offline,
        online_answer: online,
        confidence: QUERY_CONFIDENCE,
        sources: vec![
            SourceRef::new("Kisan Call Centre Database", 0.95),
            SourceRef::new("Agricultural Guidelines", 0.88),
        ],
        follow_up_suggestions: followup_suggestions(&query),
        question_type: detect_question_type(&query).to_string(),
        query,
        mode,
        response_time,
        timestamp: Utc::now(),
    }))
}

/// POST /api/search - Full knowledge search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Response> {
    let query = required_query(request.query.as_deref()).ok_or_else(ApiError::query_required)?;

    let outcome = state.chat.search(query, request.context.as_ref()).await;
    info!("Search '{}': {} results", query, outcome.total_results);

    Ok(Json(SearchResponse {
        success: true,
        search_results: outcome,
        timestamp: Utc::now(),
    })
    .into_response())
}

/// GET /api/trending - Most frequent recent queries
pub async fn get_trending(State(state): State<AppState>) -> ApiResult<Json<TrendingResponse>> {
    Ok(Json(TrendingResponse {
        success: true,
        trending_queries: state.chat.trending_queries().await,
        timestamp: Utc::now(),
    }))
}

/// GET /api/search-stats - Search counters
pub async fn get_search_stats(
    State(state): State<AppState>,
) -> ApiResult<Json<SearchStatsResponse>> {
    Ok(Json(SearchStatsResponse {
        success: true,
        stats: state.chat.search_stats().await,
        timestamp: Utc::now(),
    }))
}

/// GET /api/conversation/:session_id - Recent exchanges of a session
pub async fn get_conversation(
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = state.chat.conversation_context(&session_id).await;
    Ok(Json(ConversationResponse {
        success: true,
        session_id,
        conversation,
        timestamp: Utc::now(),
    }))
}

/// POST /api/corpus/search - Similar Kisan Call Centre questions
pub async fn corpus_search(
    State(state): State<AppState>,
    Json(request): Json<CorpusSearchRequest>,
) -> ApiResult<Json<CorpusSearchResponse>> {
    let corpus = state
        .corpus
        .as_ref()
        .ok_or_else(|| ApiError::unavailable("Q&A corpus not loaded"))?;
    let query = required_query(request.query.as_deref()).ok_or_else(ApiError::query_required)?;
    let top_k = request
        .top_k
        .unwrap_or(DEFAULT_CORPUS_TOP_K)
        .clamp(1, MAX_CORPUS_TOP_K);

    let hits = corpus.search(query, top_k);
    Ok(Json(CorpusSearchResponse {
        success: true,
        query: query.to_string(),
        offline_answer: format_offline_answer(&hits),
        hits,
        timestamp: Utc::now(),
    }))
}

/// GET /api/llm/status - Language model status
pub async fn llm_status(State(state): State<AppState>) -> ApiResult<Json<LlmStatusResponse>> {
    Ok(Json(LlmStatusResponse {
        success: true,
        llm: state.chat.generator().stats(),
        timestamp: Utc::now(),
    }))
}

/// POST /api/llm/generate - Direct model generation
pub async fn llm_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> ApiResult<Json<GenerateResponse>> {
    let query = required_query(request.query.as_deref()).ok_or_else(ApiError::query_required)?;

    let generator = state.chat.generator();
    if !generator.is_available() {
        return Err(ApiError::unavailable("IBM Watsonx API not configured"));
    }

    let response = generator.generate(query, &request.context).await;
    Ok(Json(GenerateResponse {
        success: true,
        response,
        timestamp: Utc::now(),
    }))
}

/// POST /api/llm/clear-cache - Drop cached model answers
pub async fn llm_clear_cache(State(state): State<AppState>) -> ApiResult<Json<MessageResponse>> {
    state.chat.generator().clear_cache();
    Ok(Json(MessageResponse::ok("LLM cache cleared")))
}

/// Create router with all API endpoints
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/analytics", get(get_analytics))
        .route("/api/query", post(query))
        .route("/api/search", post(search))
        .route("/api/trending", get(get_trending))
        .route("/api/search-stats", get(get_search_stats))
        .route("/api/conversation/:session_id", get(get_conversation))
        .route("/api/corpus/search", post(corpus_search))
        .route("/api/llm/status", get(llm_status))
        .route("/api/llm/generate", post(llm_generate))
        .route("/api/llm/clear-cache", post(llm_clear_cache))
        .route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_from_default_config() {
        let state = AppState::from_config(ServerConfig::default()).unwrap();
        assert_eq!(state.chat.knowledge_base().len(), 6);
        assert!(state.corpus.is_some());
        assert!(!state.chat.generator().is_available());
    }

    #[test]
    fn test_missing_corpus_is_not_fatal() {
        let config = ServerConfig {
            corpus_path: Some("/nonexistent/kcc.json".to_string()),
            ..Default::default()
        };
        let state = AppState::from_config(config).unwrap();
        assert!(state.corpus.is_none());
    }

    #[test]
    fn test_missing_knowledge_base_is_fatal() {
        let config = ServerConfig {
            knowledge_path: Some("/nonexistent/kb.json".to_string()),
            ..Default::default()
        };
        let error = AppState::from_config(config).err().unwrap();
        assert!(error.to_string().contains("/nonexistent/kb.json"));
    }

    #[test]
    fn test_elapsed_ms_non_negative() {
        assert!(elapsed_ms(Instant::now()) >= 0.0);
    }
}
