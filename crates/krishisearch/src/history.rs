// Search and Conversation History
//
// Bounded rolling logs. Owned by the caller and passed in explicitly; the
// serving layer wraps them in a mutex.

use crate::config::HistoryConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// FIFO log that drops its oldest entries beyond a fixed capacity
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// Create an empty log. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full
    pub fn push(&mut self, entry: T) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    /// The last `n` entries, oldest first
    pub fn last(&self, n: usize) -> impl Iterator<Item = &T> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One recorded search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRecord {
    /// Query as the user typed it
    pub query: String,

    /// When it ran
    pub timestamp: DateTime<Utc>,

    /// Total matches before truncation
    pub results_count: usize,
}

/// Aggregate search statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchStats {
    /// Searches since start, including evicted ones
    pub total_searches: u64,

    /// Searches currently retained
    pub recent_searches: usize,

    /// Most frequent recent queries
    pub trending_queries: Vec<String>,
}

/// Rolling search history with a lifetime counter
#[derive(Debug, Clone)]
pub struct SearchHistory {
    log: BoundedLog<SearchRecord>,
    total_searches: u64,
    trending_window: usize,
    trending_limit: usize,
}

impl SearchHistory {
    /// Create with the given sizes
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            log: BoundedLog::new(config.search_capacity),
            total_searches: 0,
            trending_window: config.trending_window,
            trending_limit: config.trending_limit,
        }
    }

    /// Record a search
    pub fn record(&mut self, query: impl Into<String>, results_count: usize) {
        self.push(SearchRecord {
            query: query.into(),
            timestamp: Utc::now(),
            results_count,
        });
    }

    /// Record a search with an explicit timestamp
    pub fn push(&mut self, record: SearchRecord) {
        self.log.push(record);
        self.total_searches += 1;
    }

    /// Retained records, oldest first
    pub fn records(&self) -> impl Iterator<Item = &SearchRecord> {
        self.log.iter()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Searches recorded since creation
    pub fn total_searches(&self) -> u64 {
        self.total_searches
    }

    /// Most frequent exact queries among the most recent searches.
    ///
    /// Ties keep the order in which the queries first appear in the window.
    pub fn trending_queries(&self) -> Vec<String> {
        let mut order: Vec<&str> = Vec::new();
        let mut counts: HashMap<&str, usize> = HashMap::new();

        for record in self.log.last(self.trending_window) {
            let count = counts.entry(record.query.as_str()).or_insert(0);
            if *count == 0 {
                order.push(record.query.as_str());
            }
            *count += 1;
        }

        // stable: equal counts stay in first-seen order
        order.sort_by(|a, b| counts[b].cmp(&counts[a]));
        order
            .into_iter()
            .take(self.trending_limit)
            .map(str::to_string)
            .collect()
    }

    /// Snapshot of the counters and trending list
    pub fn stats(&self) -> SearchStats {
        SearchStats {
            total_searches: self.total_searches,
            recent_searches: self.log.len(),
            trending_queries: self.trending_queries(),
        }
    }
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

/// One chat exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationEntry {
    /// Session that sent the message
    pub session_id: String,

    /// User message
    pub message: String,

    /// Assistant response
    pub response: String,

    /// When the exchange completed
    pub timestamp: DateTime<Utc>,
}

/// Rolling conversation log shared by all sessions
#[derive(Debug, Clone)]
pub struct ConversationLog {
    log: BoundedLog<ConversationEntry>,
    context_limit: usize,
}

impl ConversationLog {
    /// Create with the given sizes
    pub fn new(config: &HistoryConfig) -> Self {
        Self {
            log: BoundedLog::new(config.conversation_capacity),
            context_limit: config.context_limit,
        }
    }

    /// Record an exchange
    pub fn record(
        &mut self,
        session_id: impl Into<String>,
        message: impl Into<String>,
        response: impl Into<String>,
    ) {
        self.log.push(ConversationEntry {
            session_id: session_id.into(),
            message: message.into(),
            response: response.into(),
            timestamp: Utc::now(),
        });
    }

    /// The most recent exchanges of one session, oldest first
    pub fn for_session(&self, session_id: &str) -> Vec<ConversationEntry> {
        let matching: Vec<&ConversationEntry> =
            self.log.iter().filter(|e| e.session_id == session_id).collect();
        matching
            .iter()
            .skip(matching.len().saturating_sub(self.context_limit))
            .map(|e| (*e).clone())
            .collect()
    }

    /// Messages of this session among the last `window` exchanges overall
    pub fn previous_messages(&self, session_id: &str, window: usize) -> Vec<String> {
        self.log
            .last(window)
            .filter(|e| e.session_id == session_id)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Number of retained exchanges
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_log_evicts_oldest() {
        let mut log = BoundedLog::new(3);
        for i in 0..5 {
            log.push(i);
        }
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(log.last(2).copied().collect::<Vec<_>>(), vec![3, 4]);
        assert_eq!(log.last(10).count(), 3);
    }

    #[test]
    fn test_search_history_keeps_last_hundred() {
        let mut history = SearchHistory::default();
        for i in 0..150 {
            history.record(format!("q{}", i), i);
        }

        assert_eq!(history.len(), 100);
        assert_eq!(history.total_searches(), 150);
        let queries: Vec<_> = history.records().map(|r| r.query.clone()).collect();
        let expected: Vec<_> = (50..150).map(|i| format!("q{}", i)).collect();
        assert_eq!(queries, expected);
    }

    #[test]
    fn test_trending_counts_and_ties() {
        let mut history = SearchHistory::default();
        for q in ["wheat rust", "aphids", "pm kisan", "aphids", "wheat rust", "aphids"] {
            history.record(q, 1);
        }
        assert_eq!(history.trending_queries(), vec!["aphids", "wheat rust", "pm kisan"]);
    }

    #[test]
    fn test_trending_tie_first_seen_order() {
        let mut history = SearchHistory::default();
        for q in ["b", "a", "c", "a", "b"] {
            history.record(q, 0);
        }
        assert_eq!(history.trending_queries(), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_trending_window_and_limit() {
        let mut history = SearchHistory::default();
        // old query outside the last 50
        for _ in 0..10 {
            history.record("old", 0);
        }
        for i in 0..50 {
            history.record(format!("new{}", i % 12), 0);
        }

        let trending = history.trending_queries();
        assert_eq!(trending.len(), 10);
        assert!(!trending.contains(&"old".to_string()));
        assert_eq!(trending[0], "new0");
    }

    #[test]
    fn test_stats() {
        let mut history = SearchHistory::default();
        history.record("aphids", 3);
        history.record("aphids", 3);

        let stats = history.stats();
        assert_eq!(stats.total_searches, 2);
        assert_eq!(stats.recent_searches, 2);
        assert_eq!(stats.trending_queries, vec!["aphids"]);
    }

    #[test]
    fn test_empty_history() {
        let history = SearchHistory::default();
        assert!(history.trending_queries().is_empty());
        assert_eq!(history.stats().total_searches, 0);
    }

    #[test]
    fn test_conversation_log_capacity() {
        let mut log = ConversationLog::default();
        for i in 0..60 {
            log.record("s1", format!("m{}", i), "r");
        }
        assert_eq!(log.len(), 50);
    }

    #[test]
    fn test_conversation_for_session() {
        let mut log = ConversationLog::default();
        for i in 0..15 {
            log.record("s1", format!("m{}", i), "r");
            log.record("s2", format!("other{}", i), "r");
        }

        let context = log.for_session("s1");
        assert_eq!(context.len(), 10);
        assert_eq!(context[0].message, "m5");
        assert_eq!(context[9].message, "m14");
        assert!(log.for_session("nobody").is_empty());
    }

    #[test]
    fn test_previous_messages_window_is_global() {
        let mut log = ConversationLog::default();
        log.record("s1", "first", "r");
        log.record("s1", "second", "r");
        log.record("s2", "x", "r");
        log.record("s2", "y", "r");

        // last 3 overall are second, x, y
        assert_eq!(log.previous_messages("s1", 3), vec!["second"]);
        assert_eq!(log.previous_messages("s2", 3), vec!["x", "y"]);
    }
}
