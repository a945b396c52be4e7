// Search Configuration
//
// Intent patterns, action verbs, synonyms and ranking knobs are data, loaded
// from TOML. A complete default ships embedded in the crate.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Embedded default configuration
const BUILTIN_CONFIG: &str = include_str!("../data/search.toml");

/// Multiplier applied to results whose category matches the intent topic prefix
pub const DEFAULT_BOOST_FACTOR: f64 = 1.2;

/// Minimum sequence-similarity ratio for the fuzzy term to count
pub const DEFAULT_FUZZY_CUTOFF: f64 = 0.6;

/// Number of ranked results returned to callers
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Number of top results suggestions are derived from
pub const DEFAULT_SUGGESTION_SOURCE: usize = 5;

/// Maximum number of suggestions
pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

/// Crops per result turned into "How to manage" suggestions
pub const DEFAULT_SUGGESTION_CROPS: usize = 2;

/// Action verbs match as raw substrings ("use" matches inside "cause").
/// Set to `false` to require whole-word matches.
pub const LOOSE_ACTION_MATCH: bool = true;

/// Re-sort after the intent boost, letting a boosted result overtake a
/// higher unboosted one. Set to `false` to keep the pre-boost order.
pub const RESORT_AFTER_BOOST: bool = true;

/// One intent label with its patterns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentGroupConfig {
    /// Topic label, snake_case (e.g. `pest_control`)
    pub label: String,

    /// Regular expressions, matched case-insensitively
    pub patterns: Vec<String>,
}

/// Bounded log sizes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoryConfig {
    /// Search history capacity
    #[serde(default = "default_search_capacity")]
    pub search_capacity: usize,

    /// Conversation log capacity
    #[serde(default = "default_conversation_capacity")]
    pub conversation_capacity: usize,

    /// Number of recent searches considered for trending
    #[serde(default = "default_trending_window")]
    pub trending_window: usize,

    /// Number of trending queries returned
    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,

    /// Conversation entries returned per session
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            search_capacity: default_search_capacity(),
            conversation_capacity: default_conversation_capacity(),
            trending_window: default_trending_window(),
            trending_limit: default_trending_limit(),
            context_limit: default_context_limit(),
        }
    }
}

fn default_search_capacity() -> usize {
    100
}

fn default_conversation_capacity() -> usize {
    50
}

fn default_trending_window() -> usize {
    50
}

fn default_trending_limit() -> usize {
    10
}

fn default_context_limit() -> usize {
    10
}

fn default_boost_factor() -> f64 {
    DEFAULT_BOOST_FACTOR
}

fn default_fuzzy_cutoff() -> f64 {
    DEFAULT_FUZZY_CUTOFF
}

fn default_result_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}

fn default_suggestion_source() -> usize {
    DEFAULT_SUGGESTION_SOURCE
}

fn default_suggestion_limit() -> usize {
    DEFAULT_SUGGESTION_LIMIT
}

fn default_suggestion_crops() -> usize {
    DEFAULT_SUGGESTION_CROPS
}

fn default_loose_action_match() -> bool {
    LOOSE_ACTION_MATCH
}

fn default_resort_after_boost() -> bool {
    RESORT_AFTER_BOOST
}

/// Search engine configuration.
///
/// Omitted `intents`, `action_verbs` or `synonyms` mean "none"; omitted
/// scalar knobs take the documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchConfig {
    /// Intent groups in match order
    #[serde(default)]
    pub intents: Vec<IntentGroupConfig>,

    /// Action verbs in match order
    #[serde(default)]
    pub action_verbs: Vec<String>,

    /// Canonical term -> alternates
    #[serde(default)]
    pub synonyms: BTreeMap<String, Vec<String>>,

    /// Intent boost multiplier
    #[serde(default = "default_boost_factor")]
    pub boost_factor: f64,

    /// Fuzzy similarity cutoff in `[0, 1]`
    #[serde(default = "default_fuzzy_cutoff")]
    pub fuzzy_cutoff: f64,

    /// Results exposed per search
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,

    /// Top results used for suggestions
    #[serde(default = "default_suggestion_source")]
    pub suggestion_source: usize,

    /// Maximum suggestions
    #[serde(default = "default_suggestion_limit")]
    pub suggestion_limit: usize,

    /// Crops per result used for suggestions
    #[serde(default = "default_suggestion_crops")]
    pub suggestion_crops: usize,

    /// See [`LOOSE_ACTION_MATCH`]
    #[serde(default = "default_loose_action_match")]
    pub loose_action_match: bool,

    /// See [`RESORT_AFTER_BOOST`]
    #[serde(default = "default_resort_after_boost")]
    pub resort_after_boost: bool,

    /// Bounded log sizes
    #[serde(default)]
    pub history: HistoryConfig,
}

impl SearchConfig {
    /// Parse the embedded default configuration
    pub fn builtin() -> Result<Self, Error> {
        Self::from_toml_str(BUILTIN_CONFIG)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: SearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate knob ranges
    pub fn validate(&self) -> Result<(), Error> {
        if !self.boost_factor.is_finite() || self.boost_factor <= 0.0 {
            return Err(Error::Invalid(format!(
                "boost_factor must be a positive number, got {}",
                self.boost_factor
            )));
        }

        if !(0.0..=1.0).contains(&self.fuzzy_cutoff) {
            return Err(Error::Invalid(format!(
                "fuzzy_cutoff must be within [0, 1], got {}",
                self.fuzzy_cutoff
            )));
        }

        if self.history.search_capacity == 0 || self.history.conversation_capacity == 0 {
            return Err(Error::Invalid("history capacities must be greater than zero".to_string()));
        }

        if let Some(group) = self.intents.iter().find(|g| g.label.trim().is_empty()) {
            return Err(Error::Invalid(format!(
                "intent group with patterns {:?} has an empty label",
                group.patterns
            )));
        }

        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::builtin().expect("embedded search configuration is valid")
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File could not be read
    #[error("Failed to read search config {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("Invalid search config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A pattern failed to compile
    #[error("Invalid regex pattern in intent '{label}': {pattern}: {source}")]
    InvalidPattern {
        /// Intent label owning the pattern
        label: String,
        /// Offending pattern
        pattern: String,
        /// Regex error
        #[source]
        source: regex::Error,
    },

    /// A knob is out of range
    #[error("Invalid search config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_config() {
        let config = SearchConfig::builtin().unwrap();
        let labels: Vec<_> = config.intents.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "pest_control",
                "disease_management",
                "fertilizer",
                "crop_management",
                "government_schemes"
            ]
        );
        assert_eq!(config.action_verbs[0], "control");
        assert_eq!(config.action_verbs.len(), 8);
        assert_eq!(config.synonyms["pest"], vec!["insect", "bug", "parasite", "infestation"]);
        assert_eq!(config.boost_factor, DEFAULT_BOOST_FACTOR);
        assert_eq!(config.history.search_capacity, 100);
        assert_eq!(config.history.conversation_capacity, 50);
        assert!(config.loose_action_match);
        assert!(config.resort_after_boost);
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = SearchConfig::from_toml_str("").unwrap();
        assert!(config.intents.is_empty());
        assert!(config.synonyms.is_empty());
        assert_eq!(config.result_limit, DEFAULT_RESULT_LIMIT);
        assert_eq!(config.fuzzy_cutoff, DEFAULT_FUZZY_CUTOFF);
        assert_eq!(config.history, HistoryConfig::default());
    }

    #[test]
    fn test_invalid_boost_factor() {
        let result = SearchConfig::from_toml_str("boost_factor = -1.0");
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_invalid_fuzzy_cutoff() {
        let result = SearchConfig::from_toml_str("fuzzy_cutoff = 1.5");
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_empty_intent_label_rejected() {
        let result = SearchConfig::from_toml_str(
            r#"
            [[intents]]
            label = " "
            patterns = ["x"]
            "#,
        );
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = SearchConfig::from_toml_str("boost_factor = [");
        assert!(matches!(result, Err(Error::Toml(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search.toml");
        std::fs::write(&path, "result_limit = 3\naction_verbs = [\"spray\"]\n").unwrap();

        let config = SearchConfig::load(&path).unwrap();
        assert_eq!(config.result_limit, 3);
        assert_eq!(config.action_verbs, vec!["spray"]);
    }
}
