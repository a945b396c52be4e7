// Intent Classification
//
// Assign a coarse topic to a normalized query by regex pattern groups,
// and pick out the first action verb it mentions.

use crate::config::{self, SearchConfig};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Topic assigned when no pattern group matches
pub const DEFAULT_TOPIC: &str = "general";

/// Confidence reported on any pattern match. A flag, not a probability.
pub const MATCH_CONFIDENCE: f64 = 0.9;

/// Classification of one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Topic label, `general` when nothing matched
    #[serde(rename = "type")]
    pub topic: String,

    /// First action verb found in the query
    pub action: Option<String>,

    /// 0.0 or [`MATCH_CONFIDENCE`]
    pub confidence: f64,
}

impl Intent {
    /// The unclassified intent
    pub fn general() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            action: None,
            confidence: 0.0,
        }
    }

    /// Whether a pattern group matched
    pub fn is_general(&self) -> bool {
        self.topic == DEFAULT_TOPIC
    }

    /// Category this intent boosts: the topic up to its first underscore
    pub fn category_prefix(&self) -> &str {
        topic_prefix(&self.topic)
    }
}

impl Default for Intent {
    fn default() -> Self {
        Self::general()
    }
}

/// Substring of a snake_case topic before the first underscore, or the
/// whole label if it has none.
pub fn topic_prefix(topic: &str) -> &str {
    topic.split('_').next().unwrap_or(topic)
}

struct IntentGroup {
    label: String,
    patterns: Vec<Regex>,
}

/// Compiled intent pattern groups and action verbs
pub struct IntentClassifier {
    groups: Vec<IntentGroup>,
    action_verbs: Vec<String>,
    loose_action_match: bool,
}

impl IntentClassifier {
    /// Compile the patterns of a search configuration.
    ///
    /// Fails on the first pattern that is not a valid regular expression.
    pub fn from_config(config: &SearchConfig) -> Result<Self, config::Error> {
        let mut groups = Vec::with_capacity(config.intents.len());

        for group in &config.intents {
            let mut patterns = Vec::with_capacity(group.patterns.len());
            for pattern in &group.patterns {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| config::Error::InvalidPattern {
                        label: group.label.clone(),
                        pattern: pattern.clone(),
                        source,
                    })?;
                patterns.push(regex);
            }
            groups.push(IntentGroup {
                label: group.label.clone(),
                patterns,
            });
        }

        Ok(Self {
            groups,
            action_verbs: config.action_verbs.iter().map(|v| v.to_lowercase()).collect(),
            loose_action_match: config.loose_action_match,
        })
    }

    /// Classify a normalized query
    pub fn classify(&self, query: &str) -> Intent {
        let mut intent = Intent::general();

        if let Some(group) = self
            .groups
            .iter()
            .find(|group| group.patterns.iter().any(|p| p.is_match(query)))
        {
            intent.topic = group.label.clone();
            intent.confidence = MATCH_CONFIDENCE;
        }

        intent.action = self.detect_action(query);
        intent
    }

    /// First configured verb present in the query
    fn detect_action(&self, query: &str) -> Option<String> {
        let query = query.to_lowercase();

        let found = if self.loose_action_match {
            self.action_verbs.iter().find(|verb| query.contains(verb.as_str()))
        } else {
            let words: Vec<&str> = query
                .split(|c: char| !c.is_alphanumeric())
                .filter(|w| !w.is_empty())
                .collect();
            self.action_verbs.iter().find(|verb| words.contains(&verb.as_str()))
        };

        found.cloned()
    }

    /// Labels in match order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|g| g.label.as_str())
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::from_config(&SearchConfig::default()).expect("embedded intent patterns are valid")
    }
}
