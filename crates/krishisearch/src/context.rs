// Context Refinement
//
// Post-ranking hook keyed by caller hints. The shipped refiner leaves the
// ranking untouched.

use crate::matcher::SearchResult;
use serde::{Deserialize, Serialize};

/// Caller-supplied hints about the person asking
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchContext {
    /// Farmer location (state or district)
    #[serde(default)]
    pub location: Option<String>,

    /// Earlier queries in the same session, oldest first
    #[serde(default)]
    pub previous_queries: Vec<String>,
}

impl SearchContext {
    /// Context with a location
    pub fn with_location(location: impl Into<String>) -> Self {
        Self {
            location: Some(location.into()),
            previous_queries: Vec::new(),
        }
    }
}

/// Adjusts a ranked list given the search context.
///
/// Implementations must be pure: same input, same output.
pub trait ContextRefiner: Send + Sync {
    /// Return the possibly reordered or filtered results
    fn refine<'kb>(
        &self,
        results: Vec<SearchResult<'kb>>,
        context: &SearchContext,
    ) -> Vec<SearchResult<'kb>>;
}

/// Refiner that returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ContextRefiner for PassThrough {
    fn refine<'kb>(
        &self,
        results: Vec<SearchResult<'kb>>,
        _context: &SearchContext,
    ) -> Vec<SearchResult<'kb>> {
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeEntry;

    #[test]
    fn test_pass_through_is_identity() {
        let entry = KnowledgeEntry::default();
        let results = vec![
            SearchResult { key: "b", entry: &entry, score: 2.0, matched_query: "q".into() },
            SearchResult { key: "a", entry: &entry, score: 1.0, matched_query: "q".into() },
        ];
        let context = SearchContext {
            location: Some("Punjab".into()),
            previous_queries: vec!["wheat rust".into()],
        };

        let refined = PassThrough.refine(results.clone(), &context);
        assert_eq!(refined, results);
    }

    #[test]
    fn test_context_deserializes_partial() {
        let context: SearchContext = serde_json::from_str(r#"{"location": "Bihar"}"#).unwrap();
        assert_eq!(context, SearchContext::with_location("Bihar"));

        let empty: SearchContext = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, SearchContext::default());
    }
}
