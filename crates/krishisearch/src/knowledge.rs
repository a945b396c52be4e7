// Knowledge Base
//
// Static agricultural knowledge keyed by topic (pest, disease, scheme...),
// loaded once and shared read-only by every search.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Built-in knowledge base used when no file is configured
const BUILTIN_KNOWLEDGE: &str = include_str!("../data/knowledge.json");

/// One knowledge record.
///
/// Every field is optional. An absent field contributes nothing to scoring
/// or to generated answer text.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KnowledgeEntry {
    /// Crops the entry applies to, in priority order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crops: Option<Vec<String>>,

    /// Free-text recommended solution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solution: Option<String>,

    /// Severity label (low / medium / high)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,

    /// Category label (pest, disease, nutrition, scheme...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Observable symptoms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symptoms: Option<Vec<String>>,

    /// Preventive practices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prevention: Option<Vec<String>>,

    /// Organic treatments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organic_solutions: Option<Vec<String>>,

    /// Chemical treatments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chemical_solutions: Option<Vec<String>>,

    /// When to apply treatments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_timing: Option<Vec<String>>,

    /// Dosage instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dosage: Option<String>,

    /// Scheme benefits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benefits: Option<Vec<String>>,

    /// Scheme eligibility criteria
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<Vec<String>>,
}

impl KnowledgeEntry {
    /// Build an entry from an untyped JSON value.
    ///
    /// Fields of the wrong shape are dropped (and logged) instead of
    /// failing the whole entry. A non-object value yields an empty entry.
    pub fn from_value(key: &str, value: &Value) -> Self {
        let Some(fields) = value.as_object() else {
            warn!("Knowledge entry '{}' is not an object, keeping it without fields", key);
            return Self::default();
        };

        Self {
            crops: string_list(key, fields, "crops"),
            solution: string_field(key, fields, "solution"),
            severity: string_field(key, fields, "severity"),
            category: string_field(key, fields, "category"),
            symptoms: string_list(key, fields, "symptoms"),
            prevention: string_list(key, fields, "prevention"),
            organic_solutions: string_list(key, fields, "organic_solutions"),
            chemical_solutions: string_list(key, fields, "chemical_solutions"),
            application_timing: string_list(key, fields, "application_timing"),
            dosage: string_field(key, fields, "dosage"),
            benefits: string_list(key, fields, "benefits"),
            eligibility: string_list(key, fields, "eligibility"),
        }
    }

    /// Crops as a slice, empty when absent
    pub fn crops(&self) -> &[String] {
        self.crops.as_deref().unwrap_or_default()
    }

    /// Symptoms as a slice, empty when absent
    pub fn symptoms(&self) -> &[String] {
        self.symptoms.as_deref().unwrap_or_default()
    }

    /// Prevention practices as a slice, empty when absent
    pub fn prevention(&self) -> &[String] {
        self.prevention.as_deref().unwrap_or_default()
    }
}

fn string_field(key: &str, fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            warn!("Knowledge entry '{}': field '{}' is not a string ({}), ignoring", key, name, other);
            None
        }
    }
}

fn string_list(key: &str, fields: &Map<String, Value>, name: &str) -> Option<Vec<String>> {
    let value = fields.get(name)?;
    let Some(items) = value.as_array() else {
        if !value.is_null() {
            warn!("Knowledge entry '{}': field '{}' is not a list, ignoring", key, name);
        }
        return None;
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(s) => out.push(s.to_string()),
            None => {
                warn!(
                    "Knowledge entry '{}': field '{}' contains a non-string value, ignoring field",
                    key, name
                );
                return None;
            }
        }
    }
    Some(out)
}

/// Ordered, immutable mapping of topic key to [`KnowledgeEntry`].
///
/// Iteration order is load order; search tie-breaking depends on it.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    entries: Vec<(String, KnowledgeEntry)>,
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Create an empty knowledge base
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(key, entry)` pairs. Duplicate keys keep the first entry.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, KnowledgeEntry)>,
        K: Into<String>,
    {
        let mut kb = Self::new();
        for (key, entry) in entries {
            let key = key.into();
            if kb.index.contains_key(&key) {
                warn!("Duplicate knowledge key '{}', keeping first definition", key);
                continue;
            }
            kb.index.insert(key.clone(), kb.entries.len());
            kb.entries.push((key, entry));
        }
        kb
    }

    /// Parse a JSON object of `{ key: { field: value } }`
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let root: Value = serde_json::from_str(json)?;
        let Value::Object(map) = root else {
            return Err(Error::NotAnObject);
        };

        // `preserve_order` keeps the map in file order
        let kb = Self::from_entries(
            map.iter()
                .map(|(key, value)| (key.clone(), KnowledgeEntry::from_value(key, value))),
        );

        debug!("Loaded {} knowledge entries", kb.len());
        Ok(kb)
    }

    /// Load from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// The embedded default knowledge base
    pub fn builtin() -> Result<Self, Error> {
        Self::from_json_str(BUILTIN_KNOWLEDGE)
    }

    /// Look up an entry by key
    pub fn get(&self, key: &str) -> Option<&KnowledgeEntry> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    /// Iterate entries in load order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &KnowledgeEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Keys in load order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Knowledge base loading errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File could not be read
    #[error("Failed to read knowledge base {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Content is not valid JSON
    #[error("Invalid knowledge base JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Top-level JSON value is not an object
    #[error("Knowledge base must be a JSON object keyed by topic")]
    NotAnObject,
}
