// Core search engine implementation
//
// normalize -> classify + expand -> match -> rank -> refine -> suggest.
// The pipeline is synchronous and total: every input yields an outcome.

use crate::config::{self, SearchConfig};
use crate::context::{ContextRefiner, PassThrough, SearchContext};
use crate::history::SearchHistory;
use crate::intent::{Intent, IntentClassifier};
use crate::knowledge::KnowledgeBase;
use crate::matcher::{collect_matches, SearchResult};
use crate::normalize::normalize_query;
use crate::ranking::Ranker;
use crate::suggest::SuggestionGenerator;
use crate::synonyms::SynonymTable;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Result of one search call.
///
/// `results` is truncated for external consumption; `total_results` keeps
/// the full match count.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome<'kb> {
    /// Query as given
    pub query: String,

    /// Normalized query
    pub processed_query: String,

    /// Detected intent
    pub intent: Intent,

    /// Top ranked results
    pub results: Vec<SearchResult<'kb>>,

    /// Number of matches before truncation
    pub total_results: usize,

    /// When the search ran
    pub search_time: DateTime<Utc>,

    /// Follow-up questions
    pub suggestions: Vec<String>,
}

impl<'kb> SearchOutcome<'kb> {
    /// Highest ranked result
    pub fn top(&self) -> Option<&SearchResult<'kb>> {
        self.results.first()
    }
}

/// Intent-aware keyword search over a [`KnowledgeBase`]
pub struct SearchEngine {
    classifier: IntentClassifier,
    synonyms: SynonymTable,
    ranker: Ranker,
    suggester: SuggestionGenerator,
    refiner: Box<dyn ContextRefiner>,
    fuzzy_cutoff: f64,
    result_limit: usize,
}

impl SearchEngine {
    /// Create an engine with the embedded configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from a configuration, compiling its patterns
    pub fn from_config(config: &SearchConfig) -> Result<Self, config::Error> {
        config.validate()?;

        Ok(Self {
            classifier: IntentClassifier::from_config(config)?,
            synonyms: SynonymTable::new(config.synonyms.clone()),
            ranker: Ranker::new()
                .with_boost_factor(config.boost_factor)
                .with_resort_after_boost(config.resort_after_boost),
            suggester: SuggestionGenerator::new().with_limits(
                config.suggestion_source,
                config.suggestion_limit,
                config.suggestion_crops,
            ),
            refiner: Box::new(PassThrough),
            fuzzy_cutoff: config.fuzzy_cutoff,
            result_limit: config.result_limit,
        })
    }

    /// Replace the context refiner
    pub fn with_refiner(mut self, refiner: impl ContextRefiner + 'static) -> Self {
        self.refiner = Box::new(refiner);
        self
    }

    /// Intent classifier in use
    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    /// Search the knowledge base.
    ///
    /// Pure with respect to `(query, kb, context)`: repeated calls return
    /// the same ranking. The context refiner only runs when a context is
    /// supplied.
    pub fn search<'kb>(
        &self,
        query: &str,
        kb: &'kb KnowledgeBase,
        context: Option<&SearchContext>,
    ) -> SearchOutcome<'kb> {
        let processed = normalize_query(query);
        let intent = self.classifier.classify(&processed);
        let variants = self.synonyms.expand(&processed);

        let matches = collect_matches(&variants, kb, self.fuzzy_cutoff);
        debug!(
            "Search '{}': {} variants, {} matches, intent {}",
            processed,
            variants.len(),
            matches.len(),
            intent.topic
        );

        let mut ranked = self.ranker.rank(matches, &intent);
        if let Some(context) = context {
            ranked = self.refiner.refine(ranked, context);
        }

        let suggestions = self.suggester.generate(&ranked);
        let total_results = ranked.len();
        ranked.truncate(self.result_limit);

        SearchOutcome {
            query: query.to_string(),
            processed_query: processed,
            intent,
            results: ranked,
            total_results,
            search_time: Utc::now(),
            suggestions,
        }
    }

    /// Search and record the query in a history log
    pub fn search_and_record<'kb>(
        &self,
        query: &str,
        kb: &'kb KnowledgeBase,
        context: Option<&SearchContext>,
        history: &mut SearchHistory,
    ) -> SearchOutcome<'kb> {
        let outcome = self.search(query, kb, context);
        history.record(query, outcome.total_results);
        outcome
    }
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default()).expect("embedded search configuration is valid")
    }
}
