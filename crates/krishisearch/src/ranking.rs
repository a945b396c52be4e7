// Result ranking with intent boost

use crate::config::{DEFAULT_BOOST_FACTOR, RESORT_AFTER_BOOST};
use crate::intent::Intent;
use crate::matcher::SearchResult;
use std::cmp::Ordering;

/// Orders matches by score and boosts those aligned with the intent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranker {
    /// Multiplier for results whose category matches the intent prefix
    boost_factor: f64,

    /// Re-sort after boosting
    resort_after_boost: bool,
}

impl Ranker {
    /// Create a ranker with the default boost
    pub fn new() -> Self {
        Self {
            boost_factor: DEFAULT_BOOST_FACTOR,
            resort_after_boost: RESORT_AFTER_BOOST,
        }
    }

    /// Set a custom boost factor
    pub fn with_boost_factor(mut self, boost_factor: f64) -> Self {
        self.boost_factor = boost_factor;
        self
    }

    /// Choose whether boosted results may overtake higher unboosted ones
    pub fn with_resort_after_boost(mut self, resort: bool) -> Self {
        self.resort_after_boost = resort;
        self
    }

    /// The configured boost factor
    pub fn boost_factor(&self) -> f64 {
        self.boost_factor
    }

    /// Rank matches.
    ///
    /// Sorts by score descending, keeping knowledge base order for ties.
    /// Unless the intent is `general`, every result whose category equals
    /// the intent's topic prefix is multiplied by the boost factor and the
    /// list is sorted again, so a boosted result can overtake an unboosted
    /// one when the boost closes the gap.
    pub fn rank<'kb>(&self, results: Vec<SearchResult<'kb>>, intent: &Intent) -> Vec<SearchResult<'kb>> {
        let mut ranked = results;
        sort_by_score(&mut ranked);

        if intent.is_general() {
            return ranked;
        }

        let prefix = intent.category_prefix();
        for result in &mut ranked {
            if result.entry.category.as_deref() == Some(prefix) {
                result.score *= self.boost_factor;
            }
        }

        if self.resort_after_boost {
            sort_by_score(&mut ranked);
        }

        ranked
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable sort, highest score first
fn sort_by_score(results: &mut [SearchResult<'_>]) {
    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}
