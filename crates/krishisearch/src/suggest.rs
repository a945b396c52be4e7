// Follow-up suggestions derived from top results

use crate::config::{DEFAULT_SUGGESTION_CROPS, DEFAULT_SUGGESTION_LIMIT, DEFAULT_SUGGESTION_SOURCE};
use crate::matcher::SearchResult;

/// Builds follow-up questions from the structured fields of top results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuggestionGenerator {
    source: usize,
    limit: usize,
    crops_per_result: usize,
}

impl SuggestionGenerator {
    /// Create a generator with the default slice sizes
    pub fn new() -> Self {
        Self {
            source: DEFAULT_SUGGESTION_SOURCE,
            limit: DEFAULT_SUGGESTION_LIMIT,
            crops_per_result: DEFAULT_SUGGESTION_CROPS,
        }
    }

    /// Override the slice sizes
    ///
    /// # Arguments
    ///
    /// * `source` - Number of top results to read
    /// * `limit` - Maximum number of suggestions
    /// * `crops_per_result` - Crops per result turned into suggestions
    pub fn with_limits(mut self, source: usize, limit: usize, crops_per_result: usize) -> Self {
        self.source = source;
        self.limit = limit;
        self.crops_per_result = crops_per_result;
        self
    }

    /// Generate suggestions from ranked results.
    ///
    /// Duplicates are dropped keeping first-generated order, then the list
    /// is capped.
    pub fn generate(&self, results: &[SearchResult<'_>]) -> Vec<String> {
        let mut suggestions: Vec<String> = Vec::new();

        for result in results.iter().take(self.source) {
            for crop in result.entry.crops().iter().take(self.crops_per_result) {
                push_unique(&mut suggestions, format!("How to manage {} in {}?", result.key, crop));
            }
            if !result.entry.prevention().is_empty() {
                push_unique(&mut suggestions, format!("How to prevent {}?", result.key));
            }
        }

        suggestions.truncate(self.limit);
        suggestions
    }
}

impl Default for SuggestionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn push_unique(suggestions: &mut Vec<String>, suggestion: String) {
    if !suggestions.contains(&suggestion) {
        suggestions.push(suggestion);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeEntry;
    use std::collections::HashSet;

    fn result<'kb>(key: &'kb str, entry: &'kb KnowledgeEntry) -> SearchResult<'kb> {
        SearchResult {
            key,
            entry,
            score: 1.0,
            matched_query: String::new(),
        }
    }

    #[test]
    fn test_crop_and_prevention_suggestions() {
        let aphids = KnowledgeEntry {
            crops: Some(vec!["mustard".into(), "wheat".into()]),
            prevention: Some(vec!["monitoring".into()]),
            ..Default::default()
        };

        let suggestions = SuggestionGenerator::new().generate(&[result("aphids", &aphids)]);
        let set: HashSet<_> = suggestions.iter().map(String::as_str).collect();
        assert_eq!(
            set,
            HashSet::from([
                "How to manage aphids in mustard?",
                "How to manage aphids in wheat?",
                "How to prevent aphids?",
            ])
        );
        assert_eq!(suggestions.len(), 3);
    }

    #[test]
    fn test_only_first_two_crops() {
        let entry = KnowledgeEntry {
            crops: Some(vec!["a".into(), "b".into(), "c".into()]),
            ..Default::default()
        };
        let suggestions = SuggestionGenerator::new().generate(&[result("x", &entry)]);
        assert_eq!(suggestions, vec!["How to manage x in a?", "How to manage x in b?"]);
    }

    #[test]
    fn test_empty_prevention_skipped() {
        let entry = KnowledgeEntry {
            prevention: Some(vec![]),
            ..Default::default()
        };
        assert!(SuggestionGenerator::new().generate(&[result("x", &entry)]).is_empty());
    }

    #[test]
    fn test_capped_and_deduplicated() {
        let entry = KnowledgeEntry {
            crops: Some(vec!["rice".into(), "rice".into()]),
            prevention: Some(vec!["p".into()]),
            ..Default::default()
        };
        let results: Vec<_> = ["a", "b", "c"].iter().map(|k| result(k, &entry)).collect();

        let suggestions = SuggestionGenerator::new().generate(&results);
        assert_eq!(suggestions.len(), 5);
        let unique: HashSet<_> = suggestions.iter().collect();
        assert_eq!(unique.len(), suggestions.len());
    }

    #[test]
    fn test_reads_only_top_slice() {
        let entry = KnowledgeEntry {
            prevention: Some(vec!["p".into()]),
            ..Default::default()
        };
        let keys = ["k1", "k2", "k3", "k4", "k5", "k6"];
        let results: Vec<_> = keys.iter().map(|k| result(k, &entry)).collect();

        let suggestions = SuggestionGenerator::new().with_limits(5, 10, 2).generate(&results);
        assert_eq!(suggestions.len(), 5);
        assert!(!suggestions.contains(&"How to prevent k6?".to_string()));
    }

    #[test]
    fn test_no_results() {
        assert!(SuggestionGenerator::new().generate(&[]).is_empty());
    }
}
