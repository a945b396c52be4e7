// Knowledge Matching
//
// Score every knowledge entry against every query variant and collect the
// first positive match per entry.

use crate::knowledge::{KnowledgeBase, KnowledgeEntry};
use crate::similarity::sequence_ratio;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Whole key found in the query
pub const KEY_WEIGHT: f64 = 10.0;

/// Any key word found in the query
pub const KEY_WORD_WEIGHT: f64 = 5.0;

/// Multiplier on the sequence similarity ratio
pub const FUZZY_WEIGHT: f64 = 3.0;

/// Per crop found in the query
pub const CROP_WEIGHT: f64 = 4.0;

/// Category found in the query
pub const CATEGORY_WEIGHT: f64 = 3.0;

/// Per symptom found in the query
pub const SYMPTOM_WEIGHT: f64 = 2.0;

/// Per distinct word shared with the solution text
pub const SOLUTION_WORD_WEIGHT: f64 = 0.5;

/// One matched knowledge entry.
///
/// Borrows the entry from the knowledge base it was matched against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult<'kb> {
    /// Entry key
    pub key: &'kb str,

    /// Matched entry
    #[serde(rename = "data")]
    pub entry: &'kb KnowledgeEntry,

    /// Relevance score, always positive
    pub score: f64,

    /// Query variant that produced the match
    pub matched_query: String,
}

/// Relevance of one entry to one query variant.
///
/// `fuzzy_cutoff` gates the similarity term: ratios below it contribute
/// nothing. A cutoff of 0.0 always counts the ratio.
pub fn relevance(query: &str, key: &str, entry: &KnowledgeEntry, fuzzy_cutoff: f64) -> f64 {
    let mut score = 0.0;

    if query.contains(key) {
        score += KEY_WEIGHT;
    }

    if key.split_whitespace().any(|word| query.contains(word)) {
        score += KEY_WORD_WEIGHT;
    }

    let ratio = sequence_ratio(query, key);
    if ratio >= fuzzy_cutoff {
        score += ratio * FUZZY_WEIGHT;
    }

    score += entry.crops().iter().filter(|crop| query.contains(crop.as_str())).count() as f64
        * CROP_WEIGHT;

    if let Some(category) = &entry.category {
        if query.contains(category.as_str()) {
            score += CATEGORY_WEIGHT;
        }
    }

    score += entry
        .symptoms()
        .iter()
        .filter(|symptom| query.contains(symptom.as_str()))
        .count() as f64
        * SYMPTOM_WEIGHT;

    if let Some(solution) = &entry.solution {
        let solution = solution.to_lowercase();
        let solution_words: HashSet<&str> = solution.split_whitespace().collect();
        let query_words: HashSet<&str> = query.split_whitespace().collect();
        score += solution_words.intersection(&query_words).count() as f64 * SOLUTION_WORD_WEIGHT;
    }

    score
}

/// Collect positive matches over all variants.
///
/// Variants are the outer loop and entries the inner loop, in knowledge
/// base order. An entry is recorded at most once, with the score of the
/// first variant that matched it.
pub fn collect_matches<'kb>(
    variants: &[String],
    kb: &'kb KnowledgeBase,
    fuzzy_cutoff: f64,
) -> Vec<SearchResult<'kb>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut results = Vec::new();

    for variant in variants {
        for (key, entry) in kb.iter() {
            if seen.contains(key) {
                continue;
            }

            let score = relevance(variant, key, entry, fuzzy_cutoff);
            if !score.is_finite() {
                warn!("Skipping knowledge entry '{}': non-finite score", key);
                continue;
            }

            if score > 0.0 {
                seen.insert(key);
                results.push(SearchResult {
                    key,
                    entry,
                    score,
                    matched_query: variant.clone(),
                });
            }
        }
    }

    results
}
