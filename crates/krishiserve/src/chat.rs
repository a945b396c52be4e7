//! Chat coordination
//!
//! Ties one chat message to a knowledge search, an answer (model or
//! knowledge base) and the shared conversation log.

use crate::answer::{kb_answer, KB_CONFIDENCE, KB_SOURCE};
use crate::llm::{GenerationContext, KnowledgeSnippet, ResponseGenerator};
use chrono::{DateTime, Utc};
use krishisearch::{
    ConversationEntry, ConversationLog, HistoryConfig, Intent, KnowledgeBase, SearchContext,
    SearchEngine, SearchHistory, SearchOutcome, SearchStats,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Conversation entries passed to the model as earlier queries
pub const PREVIOUS_QUERY_WINDOW: usize = 3;

/// Outcome of one chat message
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply<'kb> {
    /// Message as sent
    pub message: String,

    /// Answer text
    pub response: String,

    /// Knowledge search behind the answer
    pub search_results: SearchOutcome<'kb>,

    /// Follow-up questions from the search
    pub suggestions: Vec<String>,

    /// Detected intent
    pub intent: Intent,

    /// Fixed confidence of the answer source
    pub confidence: f64,

    /// Answer source label
    pub source: String,

    /// When the reply was produced
    pub timestamp: DateTime<Utc>,
}

/// Answer text with its provenance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Answer text
    pub text: String,

    /// Fixed confidence of the source
    pub confidence: f64,

    /// Source label
    pub source: String,
}

/// Shared chat state for every connection
pub struct ChatCoordinator {
    kb: Arc<KnowledgeBase>,
    engine: SearchEngine,
    history: Mutex<SearchHistory>,
    conversations: Mutex<ConversationLog>,
    user_context: SearchContext,
    generator: Arc<dyn ResponseGenerator>,
}

impl ChatCoordinator {
    /// Create a coordinator over a loaded knowledge base
    pub fn new(
        kb: Arc<KnowledgeBase>,
        engine: SearchEngine,
        history_config: &HistoryConfig,
        generator: Arc<dyn ResponseGenerator>,
    ) -> Self {
        Self {
            kb,
            engine,
            history: Mutex::new(SearchHistory::new(history_config)),
            conversations: Mutex::new(ConversationLog::new(history_config)),
            user_context: SearchContext::default(),
            generator,
        }
    }

    /// Set the context applied to every chat search
    pub fn with_user_context(mut self, context: SearchContext) -> Self {
        self.user_context = context;
        self
    }

    /// Knowledge base in use
    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    /// Answer generator in use
    pub fn generator(&self) -> &Arc<dyn ResponseGenerator> {
        &self.generator
    }

    /// Search the knowledge base and record the query
    pub async fn search(&self, query: &str, context: Option<&SearchContext>) -> SearchOutcome<'_> {
        let outcome = self.engine.search(query, &self.kb, context);
        self.history.lock().await.record(query, outcome.total_results);
        outcome
    }

    /// Answer one chat message
    pub async fn process_message(&self, message: &str, session_id: &str) -> ChatReply<'_> {
        let context = has_hints(&self.user_context).then_some(&self.user_context);
        let outcome = self.search(message, context).await;

        let previous_queries = if self.generator.is_available() {
            self.conversations
                .lock()
                .await
                .previous_messages(session_id, PREVIOUS_QUERY_WINDOW)
        } else {
            Vec::new()
        };
        let answer = self.answer(message, &outcome, previous_queries).await;

        self.conversations
            .lock()
            .await
            .record(session_id, message, answer.text.clone());

        debug!(
            "Chat message from '{}' answered by {} ({} results)",
            session_id, answer.source, outcome.total_results
        );

        ChatReply {
            message: message.to_string(),
            response: answer.text,
            suggestions: outcome.suggestions.clone(),
            intent: outcome.intent.clone(),
            search_results: outcome,
            confidence: answer.confidence,
            source: answer.source,
            timestamp: Utc::now(),
        }
    }

    /// Search and answer a one-off query outside any conversation
    pub async fn answer_query(&self, query: &str) -> Answer {
        let outcome = self.search(query, None).await;
        self.answer(query, &outcome, Vec::new()).await
    }

    /// Model answer when the generator is available, knowledge-base text otherwise
    async fn answer(
        &self,
        message: &str,
        outcome: &SearchOutcome<'_>,
        previous_queries: Vec<String>,
    ) -> Answer {
        if !self.generator.is_available() {
            return Answer {
                text: kb_answer(message, outcome),
                confidence: KB_CONFIDENCE,
                source: KB_SOURCE.to_string(),
            };
        }

        let generation = GenerationContext {
            search_results: outcome.results.iter().map(KnowledgeSnippet::from).collect(),
            intent: Some(outcome.intent.clone()),
            location: self.user_context.location.clone(),
            crop: None,
            previous_queries,
        };
        let generated = self.generator.generate(message, &generation).await;

        Answer {
            text: generated.answer,
            confidence: generated.confidence,
            source: generated.source,
        }
    }

    /// Recent exchanges of one session, oldest first
    pub async fn conversation_context(&self, session_id: &str) -> Vec<ConversationEntry> {
        self.conversations.lock().await.for_session(session_id)
    }

    /// Most frequent recent queries
    pub async fn trending_queries(&self) -> Vec<String> {
        self.history.lock().await.trending_queries()
    }

    /// Search counters
    pub async fn search_stats(&self) -> SearchStats {
        self.history.lock().await.stats()
    }
}

fn has_hints(context: &SearchContext) -> bool {
    context.location.is_some() || !context.previous_queries.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{fallback_answer, GeneratedAnswer, LlmStats};
    use async_trait::async_trait;
    use krishisearch::KnowledgeEntry;
    use std::sync::Mutex as StdMutex;

    /// Generator that records what it was asked
    #[derive(Default)]
    struct Recording {
        available: bool,
        seen: StdMutex<Vec<GenerationContext>>,
    }

    #[async_trait]
    impl ResponseGenerator for Recording {
        async fn generate(&self, query: &str, context: &GenerationContext) -> GeneratedAnswer {
            self.seen.lock().unwrap().push(context.clone());
            GeneratedAnswer {
                answer: format!("model says {}", query),
                confidence: 0.92,
                source: "test model".to_string(),
                ..fallback_answer(query, context)
            }
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn stats(&self) -> LlmStats {
            LlmStats {
                is_available: self.available,
                model: "test".into(),
                region: "local".into(),
                cache_size: 0,
                authenticated: false,
                token_valid: false,
            }
        }

        fn clear_cache(&self) {}
    }

    fn coordinator(generator: Arc<Recording>) -> ChatCoordinator {
        ChatCoordinator::new(
            Arc::new(KnowledgeBase::builtin().unwrap()),
            SearchEngine::new(),
            &HistoryConfig::default(),
            generator,
        )
    }

    #[tokio::test]
    async fn test_kb_answer_when_generator_unavailable() {
        let chat = coordinator(Arc::new(Recording::default()));
        let reply = chat.process_message("How to control aphids in mustard?", "s1").await;

        assert_eq!(reply.source, "Knowledge Base");
        assert_eq!(reply.confidence, 0.80);
        assert_eq!(reply.intent.topic, "pest_control");
        assert!(reply.response.contains("**aphids**"));
        assert_eq!(reply.suggestions, reply.search_results.suggestions);
    }

    #[tokio::test]
    async fn test_generator_receives_results_and_session_history() {
        let generator = Arc::new(Recording {
            available: true,
            ..Default::default()
        });
        let chat = coordinator(generator.clone());

        chat.process_message("first question", "s1").await;
        chat.process_message("other session", "s2").await;
        let reply = chat.process_message("aphids in mustard", "s1").await;

        assert_eq!(reply.source, "test model");
        assert_eq!(reply.response, "model says aphids in mustard");

        let seen = generator.seen.lock().unwrap();
        let last = seen.last().unwrap();
        assert_eq!(last.previous_queries, vec!["first question".to_string()]);
        assert_eq!(last.search_results[0].key, "aphids");
        assert_eq!(last.intent.as_ref().map(|i| i.topic.as_str()), Some("pest_control"));
    }

    #[tokio::test]
    async fn test_answer_query_leaves_conversation_untouched() {
        let chat = coordinator(Arc::new(Recording::default()));
        let answer = chat.answer_query("whitefly on cotton").await;

        assert_eq!(answer.source, "Knowledge Base");
        assert!(answer.text.contains("**whitefly**"));
        assert!(chat.conversation_context("").await.is_empty());
        assert_eq!(chat.search_stats().await.total_searches, 1);
    }

    #[tokio::test]
    async fn test_conversation_context_per_session() {
        let chat = coordinator(Arc::new(Recording::default()));
        for i in 0..12 {
            chat.process_message(&format!("message {}", i), "s1").await;
        }
        chat.process_message("elsewhere", "s2").await;

        let context = chat.conversation_context("s1").await;
        assert_eq!(context.len(), 10);
        assert_eq!(context[0].message, "message 2");
        assert_eq!(context[9].message, "message 11");
        assert!(chat.conversation_context("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_searches_are_recorded() {
        let chat = coordinator(Arc::new(Recording::default()));
        chat.process_message("whitefly", "s1").await;
        chat.search("whitefly", None).await;
        chat.search("aphids", None).await;

        let stats = chat.search_stats().await;
        assert_eq!(stats.total_searches, 3);
        assert_eq!(chat.trending_queries().await[0], "whitefly");
    }

    #[tokio::test]
    async fn test_user_context_runs_refiner_path() {
        let kb = KnowledgeBase::from_entries(vec![("aphids", KnowledgeEntry::default())]);
        let chat = ChatCoordinator::new(
            Arc::new(kb),
            SearchEngine::new(),
            &HistoryConfig::default(),
            Arc::new(Recording::default()),
        )
        .with_user_context(SearchContext::with_location("Punjab"));

        let reply = chat.process_message("aphids", "s1").await;
        assert_eq!(reply.search_results.total_results, 1);
    }
}
