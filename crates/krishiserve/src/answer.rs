//! Answer text built from the knowledge base without a language model

use krishisearch::{KnowledgeBase, KnowledgeEntry, SearchOutcome};
use serde::Serialize;

/// Items listed per bullet section
pub const MAX_BULLETS: usize = 5;

/// Entries listed by [`offline_answer`]
pub const OFFLINE_RESULTS: usize = 3;

/// Confidence of a knowledge-base chat answer
pub const KB_CONFIDENCE: f64 = 0.80;

/// Source label of a knowledge-base chat answer
pub const KB_SOURCE: &str = "Knowledge Base";

/// Coarse shape of a farmer's question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuestionType {
    /// "how", "method"...
    #[serde(rename = "How-To Guide")]
    HowTo,
    /// "what", "which"...
    #[serde(rename = "Information Query")]
    Information,
    /// "when", "timing"...
    #[serde(rename = "Timing & Schedule")]
    Timing,
    /// "why", "reason"...
    #[serde(rename = "Explanation")]
    Explanation,
    /// "where", "location"...
    #[serde(rename = "Location-based")]
    Location,
    /// "best", "recommend"...
    #[serde(rename = "Recommendation")]
    Recommendation,
    /// "problem", "help"...
    #[serde(rename = "Problem Solving")]
    ProblemSolving,
    /// Nothing matched
    #[serde(rename = "General Query")]
    General,
}

impl QuestionType {
    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            Self::HowTo => "How-To Guide",
            Self::Information => "Information Query",
            Self::Timing => "Timing & Schedule",
            Self::Explanation => "Explanation",
            Self::Location => "Location-based",
            Self::Recommendation => "Recommendation",
            Self::ProblemSolving => "Problem Solving",
            Self::General => "General Query",
        }
    }
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// Checked in order; substring matches, so "show" counts as "how".
const QUESTION_KEYWORDS: &[(QuestionType, &[&str])] = &[
    (QuestionType::HowTo, &["how", "method", "way", "process"]),
    (QuestionType::Information, &["what", "which", "define"]),
    (QuestionType::Timing, &["when", "timing", "time"]),
    (QuestionType::Explanation, &["why", "reason", "cause"]),
    (QuestionType::Location, &["where", "location", "place"]),
    (QuestionType::Recommendation, &["best", "recommend", "suggest"]),
    (QuestionType::ProblemSolving, &["problem", "issue", "trouble", "help"]),
];

/// First keyword family found in the query
pub fn detect_question_type(query: &str) -> QuestionType {
    let lower = query.to_lowercase();
    QUESTION_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(QuestionType::General)
}

const FOLLOWUPS: &[(&[&str], [&str; 4])] = &[
    (
        &["pest", "aphid", "whitefly"],
        [
            "How to identify beneficial insects?",
            "Organic pest control methods",
            "Integrated pest management strategies",
            "When to apply pesticides for maximum effectiveness?",
        ],
    ),
    (
        &["disease", "spot", "blight"],
        [
            "Disease-resistant crop varieties",
            "Preventive fungicide spray schedule",
            "Crop rotation for disease management",
            "How to improve plant immunity naturally?",
        ],
    ),
    (
        &["fertilizer", "nutrient"],
        [
            "Soil testing procedures and interpretation",
            "Organic vs chemical fertilizers comparison",
            "Micronutrient deficiency symptoms",
            "Fertilizer application timing guide",
        ],
    ),
    (
        &["scheme", "kisan"],
        [
            "Other government schemes for farmers",
            "Crop insurance application process",
            "Subsidy programs for agricultural equipment",
            "How to get agricultural loans?",
        ],
    ),
];

const DEFAULT_FOLLOWUPS: [&str; 4] = [
    "Weather impact on crop growth",
    "Best practices for your region",
    "Market price trends for your crops",
    "Seasonal farming calendar",
];

/// Four canned follow-up questions for the query's topic family
pub fn followup_suggestions(query: &str) -> Vec<String> {
    let lower = query.to_lowercase();
    let chosen = FOLLOWUPS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, followups)| followups)
        .unwrap_or(&DEFAULT_FOLLOWUPS);
    chosen.iter().map(|s| s.to_string()).collect()
}

/// Uppercase the first character and lowercase the rest
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Append a titled bullet list of at most [`MAX_BULLETS`] capitalized items
pub(crate) fn push_bullets(out: &mut String, title: &str, items: &[String]) {
    out.push_str(&format!("**{}:**\n", title));
    for item in items.iter().take(MAX_BULLETS) {
        out.push_str(&format!("• {}\n", capitalize(item)));
    }
    out.push('\n');
}

/// Solution, symptoms, prevention and dosage of one entry
pub(crate) fn push_entry_details(out: &mut String, entry: &KnowledgeEntry, with_dosage: bool) {
    if let Some(solution) = &entry.solution {
        out.push_str(&format!("**Solution:**\n{}\n\n", solution));
    }
    if let Some(symptoms) = &entry.symptoms {
        push_bullets(out, "Symptoms", symptoms);
    }
    if let Some(prevention) = &entry.prevention {
        push_bullets(out, "Prevention", prevention);
    }
    if with_dosage {
        if let Some(dosage) = &entry.dosage {
            out.push_str(&format!("**Dosage:** {}\n\n", dosage));
        }
    }
}

/// Chat answer from the top search result, or general advice when nothing matched
pub fn kb_answer(message: &str, outcome: &SearchOutcome<'_>) -> String {
    let top = match outcome.top() {
        Some(top) if outcome.total_results > 0 => top,
        _ => return no_match_advice(message),
    };

    let mut response = String::from("**AI Agricultural Assistant**\n\n");
    response.push_str(&format!(
        "Based on your query about **{}**, here's what I found:\n\n",
        top.key
    ));
    push_entry_details(&mut response, top.entry, true);

    if outcome.total_results > 1 {
        response.push_str(&format!(
            "\nI found {} related topics. Would you like to know more about any specific aspect?",
            outcome.total_results
        ));
    }
    response
}

/// Chat answer when the knowledge base has nothing on the topic
pub fn no_match_advice(message: &str) -> String {
    format!(
        "I understand you're asking about \"{}\".\n\n\
         While I don't have specific information about this in my current knowledge base, here are some general recommendations:\n\n\
         **General Agricultural Advice:**\n\
         • Consult with local agricultural extension officers\n\
         • Conduct soil and crop health assessments\n\
         • Follow integrated pest and disease management practices\n\
         • Maintain proper irrigation and drainage\n\
         • Use recommended fertilizers based on soil tests\n\n\
         Would you like to rephrase your question or ask about something else?",
        message
    )
}

/// Generic guidance for queries the quick scorer cannot place
pub fn generic_advice(query: &str) -> String {
    format!(
        "Based on your query about \"{}\", here are general agricultural recommendations:\n\n\
         **General Guidelines:**\n\
         • Conduct soil testing before planting\n\
         • Ensure proper irrigation scheduling\n\
         • Monitor weather conditions regularly\n\
         • Use organic fertilizers when possible\n\
         • Practice crop rotation for better soil health\n\
         • Maintain field hygiene and sanitation\n\n\
         For specific advice, please provide more details about your crop, location, and symptoms.",
        query
    )
}

/// Substring score used by the REST quick answer
pub fn quick_relevance(query: &str, key: &str, entry: &KnowledgeEntry) -> u32 {
    let lower = query.to_lowercase();
    let mut score = 0;

    if lower.contains(key) {
        score += 10;
    }
    score += 5 * entry.crops().iter().filter(|c| lower.contains(c.as_str())).count() as u32;
    if entry.category.as_deref().is_some_and(|c| lower.contains(c)) {
        score += 3;
    }
    score
}

/// Top three entries by [`quick_relevance`], or [`generic_advice`]
pub fn offline_answer(query: &str, kb: &KnowledgeBase) -> String {
    let mut scored: Vec<(u32, &str, &KnowledgeEntry)> = kb
        .iter()
        .map(|(key, entry)| (quick_relevance(query, key, entry), key, entry))
        .filter(|(score, _, _)| *score > 0)
        .collect();

    if scored.is_empty() {
        return generic_advice(query);
    }
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut answer = String::from("**Agricultural Knowledge Base Results:**\n\n");
    for (i, (_, key, entry)) in scored.iter().take(OFFLINE_RESULTS).enumerate() {
        answer.push_str(&format!(
            "**{}. {}** ({})\n",
            i + 1,
            key.to_uppercase(),
            entry.category.as_deref().unwrap_or("general")
        ));
        answer.push_str(&format!("**Crops:** {}\n", entry.crops().join(", ")));
        if let Some(solution) = &entry.solution {
            answer.push_str(&format!("**Solution:** {}\n", solution));
        }
        if let Some(symptoms) = &entry.symptoms {
            answer.push_str(&format!("**Symptoms:** {}\n", symptoms.join(", ")));
        }
        if let Some(severity) = &entry.severity {
            answer.push_str(&format!("**Severity:** {}\n", severity));
        }
        answer.push('\n');
    }
    answer.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use krishisearch::SearchEngine;
    use rstest::rstest;

    #[rstest]
    #[case("How to control aphids?", QuestionType::HowTo)]
    #[case("What is leaf spot", QuestionType::Information)]
    #[case("sowing timing for wheat", QuestionType::Timing)]
    #[case("reason for yellow leaves", QuestionType::Explanation)]
    #[case("where to buy seeds", QuestionType::Location)]
    #[case("best fertilizer for rice", QuestionType::Recommendation)]
    #[case("need help with my crop", QuestionType::ProblemSolving)]
    #[case("aphids mustard", QuestionType::General)]
    fn test_detect_question_type(#[case] query: &str, #[case] expected: QuestionType) {
        assert_eq!(detect_question_type(query), expected);
    }

    #[test]
    fn test_question_type_first_family_wins() {
        // "how" is checked before "when"
        assert_eq!(detect_question_type("When and how to spray"), QuestionType::HowTo);
        assert_eq!(QuestionType::Timing.to_string(), "Timing & Schedule");
    }

    #[test]
    fn test_followup_suggestions() {
        assert_eq!(followup_suggestions("Whitefly on cotton")[0], "How to identify beneficial insects?");
        assert_eq!(followup_suggestions("leaf spot")[0], "Disease-resistant crop varieties");
        assert_eq!(followup_suggestions("PM Kisan status")[3], "How to get agricultural loans?");
        assert_eq!(followup_suggestions("rain forecast"), DEFAULT_FOLLOWUPS.map(String::from).to_vec());
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("curled LEAVES"), "Curled leaves");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("ß"), "SS");
    }

    #[test]
    fn test_offline_answer_ranks_by_quick_score() {
        let kb = KnowledgeBase::builtin().unwrap();
        let answer = offline_answer("aphids in mustard", &kb);

        assert!(answer.starts_with("**Agricultural Knowledge Base Results:**"));
        assert!(answer.contains("**1. APHIDS** (pest)"));
        assert!(answer.contains("**Crops:**"));
        assert!(!answer.ends_with('\n'));
    }

    #[test]
    fn test_offline_answer_generic_when_nothing_scores() {
        let kb = KnowledgeBase::builtin().unwrap();
        let answer = offline_answer("xyzabc123", &kb);
        assert_eq!(answer, generic_advice("xyzabc123"));
        assert!(answer.contains("Conduct soil testing before planting"));
    }

    #[test]
    fn test_quick_relevance() {
        let entry = KnowledgeEntry {
            crops: Some(vec!["mustard".into(), "wheat".into()]),
            category: Some("pest".into()),
            ..Default::default()
        };
        assert_eq!(quick_relevance("Aphids pest in mustard and wheat", "aphids", &entry), 23);
        assert_eq!(quick_relevance("rice", "aphids", &entry), 0);
    }

    #[test]
    fn test_kb_answer_from_top_result() {
        let entry = KnowledgeEntry {
            solution: Some("Spray neem oil".into()),
            symptoms: Some((1..=7).map(|i| format!("SYMPTOM {}", i)).collect()),
            dosage: Some("5ml per liter".into()),
            ..Default::default()
        };
        let kb = KnowledgeBase::from_entries(vec![("aphids", entry)]);
        let outcome = SearchEngine::new().search("aphids", &kb, None);

        let answer = kb_answer("aphids", &outcome);
        assert!(answer.starts_with("**AI Agricultural Assistant**"));
        assert!(answer.contains("Based on your query about **aphids**"));
        assert!(answer.contains("• Symptom 5\n"));
        assert!(!answer.contains("Symptom 6"));
        assert!(answer.contains("**Dosage:** 5ml per liter"));
        assert!(!answer.contains("related topics"));
    }

    #[test]
    fn test_kb_answer_without_results() {
        let kb = KnowledgeBase::new();
        let outcome = SearchEngine::new().search("xyzabc123", &kb, None);
        let answer = kb_answer("xyzabc123", &outcome);
        assert!(answer.starts_with("I understand you're asking about \"xyzabc123\"."));
        assert!(answer.contains("**General Agricultural Advice:**"));
    }
}
