//! Language model collaborator
//!
//! The chat layer talks to a [`ResponseGenerator`]. Generators never fail:
//! any problem reaching the model yields [`fallback_answer`] instead.

pub mod watsonx;

pub use watsonx::WatsonxClient;

use crate::answer::push_bullets;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use krishisearch::{Intent, SearchResult};
use serde::{Deserialize, Serialize};

/// Knowledge results quoted in a prompt
pub const PROMPT_RESULTS: usize = 3;

/// Confidence of a fallback answer
pub const FALLBACK_CONFIDENCE: f64 = 0.75;

/// Source label of a fallback answer
pub const FALLBACK_SOURCE: &str = "Knowledge Base (Fallback)";

/// Header placed before every model answer
pub const ANSWER_HEADER: &str = "**IBM Watsonx Granite AI Response:**\n\n";

const SYSTEM_PROMPT: &str = "You are an expert agricultural advisor specializing in Indian farming practices. \n\
You provide practical, science-based solutions for farmers. Your responses should be:\n\
- Clear and actionable\n\
- Specific to Indian agricultural conditions\n\
- Include both organic and chemical solutions when applicable\n\
- Mention proper dosages and timing\n\
- Consider local resources and farmer constraints";

const ANSWER_PREFIXES: &[&str] = &["Response:", "Answer:", "AI:", "Assistant:", "Here is", "Here's"];

/// Owned copy of a knowledge result for prompting
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    /// Entry key
    pub key: String,

    /// Recommended solution
    #[serde(default)]
    pub solution: Option<String>,

    /// Observable symptoms
    #[serde(default)]
    pub symptoms: Vec<String>,

    /// Preventive practices
    #[serde(default)]
    pub prevention: Vec<String>,
}

impl From<&SearchResult<'_>> for KnowledgeSnippet {
    fn from(result: &SearchResult<'_>) -> Self {
        Self {
            key: result.key.to_string(),
            solution: result.entry.solution.clone(),
            symptoms: result.entry.symptoms().to_vec(),
            prevention: result.entry.prevention().to_vec(),
        }
    }
}

/// What the model is told besides the question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Ranked knowledge results, best first
    #[serde(default)]
    pub search_results: Vec<KnowledgeSnippet>,

    /// Detected intent
    #[serde(default)]
    pub intent: Option<Intent>,

    /// Farmer location
    #[serde(default)]
    pub location: Option<String>,

    /// Crop in question
    #[serde(default)]
    pub crop: Option<String>,

    /// Earlier messages of the same session, oldest first
    #[serde(default)]
    pub previous_queries: Vec<String>,
}

/// One generated answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedAnswer {
    /// Answer text
    pub answer: String,

    /// Fixed confidence by source
    pub confidence: f64,

    /// Human-readable source label
    pub source: String,

    /// Model id, `offline` for fallbacks
    pub model: String,

    /// Tokens the model produced
    pub tokens_used: u64,

    /// Served from the response cache
    pub cached: bool,

    /// When the answer was produced
    pub timestamp: DateTime<Utc>,
}

/// Generator status for health endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmStats {
    /// Credentials configured
    pub is_available: bool,

    /// Model id
    pub model: String,

    /// Cloud region
    pub region: String,

    /// Cached answers
    pub cache_size: u64,

    /// A token has been obtained
    pub authenticated: bool,

    /// The held token has not expired
    pub token_valid: bool,
}

/// Produces chat answers from a language model
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Answer a question. Never fails; falls back to knowledge-base text.
    async fn generate(&self, query: &str, context: &GenerationContext) -> GeneratedAnswer;

    /// Whether the model can be reached at all
    fn is_available(&self) -> bool;

    /// Current status
    fn stats(&self) -> LlmStats;

    /// Drop cached answers
    fn clear_cache(&self);
}

/// Complete prompt for one question
pub fn build_prompt(query: &str, context: &GenerationContext) -> String {
    let mut context_info = String::new();

    if !context.search_results.is_empty() {
        context_info.push_str("\n\nRelevant Information from Knowledge Base:\n");
        for result in context.search_results.iter().take(PROMPT_RESULTS) {
            context_info.push_str(&format!("\n**{}**:\n", result.key.to_uppercase()));
            if let Some(solution) = &result.solution {
                context_info.push_str(&format!("Solution: {}\n", solution));
            }
            if !result.symptoms.is_empty() {
                context_info.push_str(&format!("Symptoms: {}\n", result.symptoms.join(", ")));
            }
        }
    }

    if let Some(location) = &context.location {
        context_info.push_str(&format!("\nUser Location: {}\n", location));
    }

    if let Some(previous) = context.previous_queries.last() {
        context_info.push_str(&format!("\nPrevious Query: {}\n", previous));
    }

    format!(
        "{}\n\n{}\n\nFarmer's Question: {}\n\n\
         Please provide a comprehensive, practical answer with:\n\
         1. Immediate action steps\n\
         2. Detailed solution with dosages\n\
         3. Prevention measures\n\
         4. Alternative methods (organic and chemical)\n\
         5. Important precautions\n\n\
         Response:",
        SYSTEM_PROMPT, context_info, query
    )
}

/// Strip answer prefixes the model likes to emit and add the header
pub fn post_process(text: &str) -> String {
    let mut text = text.trim();
    for prefix in ANSWER_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim();
        }
    }
    format!("{}{}", ANSWER_HEADER, text)
}

/// Cache key: trimmed lowercase query, then location and crop when given
pub fn cache_key(query: &str, context: &GenerationContext) -> String {
    let mut parts = vec![query.trim().to_lowercase()];
    parts.extend(context.location.iter().cloned());
    parts.extend(context.crop.iter().cloned());
    parts.join("|")
}

/// Knowledge-base answer used whenever the model cannot answer
pub fn fallback_answer(query: &str, context: &GenerationContext) -> GeneratedAnswer {
    let mut text = format!(
        "**Agricultural Guidance** (Offline Mode)\n\nI understand you're asking about: \"{}\"\n\n",
        query
    );

    match context.search_results.first() {
        Some(result) => {
            text.push_str("**Based on our knowledge base:**\n\n");
            if let Some(solution) = &result.solution {
                text.push_str(&format!("**Solution:**\n{}\n\n", solution));
            }
            if !result.symptoms.is_empty() {
                push_bullets(&mut text, "Symptoms", &result.symptoms);
            }
            if !result.prevention.is_empty() {
                push_bullets(&mut text, "Prevention", &result.prevention);
            }
        }
        None => text.push_str(
            "**General Recommendations:**\n\
             • Consult with local agricultural extension officers\n\
             • Conduct soil and crop health assessments\n\
             • Follow integrated pest and disease management\n\
             • Maintain proper irrigation and drainage\n\
             • Use recommended fertilizers based on soil tests\n\n\
             For AI-enhanced responses, please configure IBM Watsonx API credentials.",
        ),
    }

    GeneratedAnswer {
        answer: text,
        confidence: FALLBACK_CONFIDENCE,
        source: FALLBACK_SOURCE.to_string(),
        model: "offline".to_string(),
        tokens_used: 0,
        cached: false,
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snippet(key: &str) -> KnowledgeSnippet {
        KnowledgeSnippet {
            key: key.to_string(),
            solution: Some(format!("treat {}", key)),
            symptoms: vec!["curled leaves".into(), "sticky honeydew".into()],
            prevention: vec!["early sowing".into()],
        }
    }

    #[test]
    fn test_build_prompt_sections() {
        let context = GenerationContext {
            search_results: vec![snippet("aphids"), snippet("b"), snippet("c"), snippet("d")],
            location: Some("Punjab".into()),
            previous_queries: vec!["first".into(), "second".into()],
            ..Default::default()
        };
        let prompt = build_prompt("How to control aphids?", &context);

        assert!(prompt.starts_with("You are an expert agricultural advisor"));
        assert!(prompt.contains("**APHIDS**:\nSolution: treat aphids\nSymptoms: curled leaves, sticky honeydew"));
        assert!(prompt.contains("**C**"));
        assert!(!prompt.contains("**D**"));
        assert!(prompt.contains("User Location: Punjab"));
        assert!(prompt.contains("Previous Query: second"));
        assert!(!prompt.contains("Previous Query: first"));
        assert!(prompt.contains("Farmer's Question: How to control aphids?"));
        assert!(prompt.ends_with("Response:"));
    }

    #[test]
    fn test_build_prompt_without_context() {
        let prompt = build_prompt("q", &GenerationContext::default());
        assert!(!prompt.contains("Relevant Information"));
        assert!(!prompt.contains("User Location"));
    }

    #[test]
    fn test_post_process() {
        assert_eq!(post_process("  Answer: Use neem oil. "), format!("{}Use neem oil.", ANSWER_HEADER));
        assert_eq!(post_process("Response: Here's the plan"), format!("{}the plan", ANSWER_HEADER));
        assert_eq!(post_process("Spray early"), format!("{}Spray early", ANSWER_HEADER));
    }

    #[test]
    fn test_cache_key() {
        let mut context = GenerationContext::default();
        assert_eq!(cache_key("  Aphids ", &context), "aphids");

        context.location = Some("Punjab".into());
        context.crop = Some("mustard".into());
        assert_eq!(cache_key("Aphids", &context), "aphids|Punjab|mustard");
    }

    #[test]
    fn test_fallback_with_results() {
        let context = GenerationContext {
            search_results: vec![snippet("aphids")],
            ..Default::default()
        };
        let answer = fallback_answer("aphids?", &context);

        assert!(answer.answer.starts_with("**Agricultural Guidance** (Offline Mode)"));
        assert!(answer.answer.contains("**Solution:**\ntreat aphids"));
        assert!(answer.answer.contains("• Curled leaves\n"));
        assert!(answer.answer.contains("• Early sowing\n"));
        assert_eq!(answer.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(answer.source, FALLBACK_SOURCE);
        assert_eq!(answer.model, "offline");
        assert_eq!(answer.tokens_used, 0);
        assert!(!answer.cached);
    }

    #[test]
    fn test_fallback_without_results() {
        let answer = fallback_answer("rain?", &GenerationContext::default());
        assert!(answer.answer.contains("**General Recommendations:**"));
        assert!(answer.answer.ends_with("please configure IBM Watsonx API credentials."));
    }

    #[test]
    fn test_context_deserializes_with_defaults() {
        let context: GenerationContext =
            serde_json::from_str(r#"{"location": "Bihar", "search_results": [{"key": "aphids"}]}"#).unwrap();
        assert_eq!(context.location.as_deref(), Some("Bihar"));
        assert_eq!(context.search_results[0].key, "aphids");
        assert!(context.previous_queries.is_empty());
        assert!(context.intent.is_none());
    }
}
