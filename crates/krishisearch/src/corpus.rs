// Q&A Corpus Search
//
// Kisan Call Centre question/answer pairs, embedded once at load time and
// searched by cosine similarity.

use crate::normalize::normalize_query;
use crate::vector::{self, VectorIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Built-in sample corpus
const BUILTIN_CORPUS: &str = include_str!("../data/kcc_qa.json");

/// Default dimension of [`HashingEmbedder`] vectors
pub const DEFAULT_HASH_DIMENSION: usize = 512;

/// Answers included in an offline answer or an LLM context block
pub const MAX_CONTEXT_ANSWERS: usize = 3;

/// Text returned when nothing relevant was found
pub const NO_MATCH_ANSWER: &str = "No relevant information found in the database.";

/// Words too common to carry meaning in a farmer's question
const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "of", "in", "on", "for", "to", "and", "or", "what", "how",
    "which", "when", "my", "i", "do", "does", "can", "with", "from", "by", "at", "be", "it",
];

/// One question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    /// Farmer question
    #[serde(default)]
    pub question: String,

    /// Expert answer
    #[serde(default)]
    pub answer: String,
}

/// A corpus row matched by similarity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusHit {
    /// Stored question
    pub question: String,

    /// Stored answer
    pub answer: String,

    /// Cosine similarity to the query, in `(0, 1]`
    pub similarity: f32,
}

/// Turns text into a fixed-length vector
pub trait Embedder: Send + Sync {
    /// Embed one text
    fn embed(&self, text: &str) -> Vec<f32>;

    /// Length of every vector produced
    fn dimension(&self) -> usize;
}

/// Feature-hashed bag of words, L2-normalized.
///
/// Needs no model files; good enough for short, keyword-heavy questions.
#[derive(Debug, Clone, Copy)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create with the given vector length (at least 1)
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        let normalized = normalize_query(text);
        for word in normalized
            .split(|c: char| c.is_whitespace() || c == '?')
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        {
            let bucket = (fnv1a(word.as_bytes()) % self.dimension as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// 64-bit FNV-1a, stable across runs and platforms
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, &b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Searchable Q&A corpus
pub struct QaCorpus {
    pairs: Vec<QaPair>,
    index: VectorIndex,
    embedder: Box<dyn Embedder>,
}

impl QaCorpus {
    /// Clean and index pairs.
    ///
    /// Both fields are trimmed; rows with an empty question or answer and
    /// repeated questions are dropped. Question and answer are embedded
    /// together.
    pub fn from_pairs(
        pairs: impl IntoIterator<Item = QaPair>,
        embedder: Box<dyn Embedder>,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        let mut dropped = 0usize;

        for pair in pairs {
            let question = pair.question.trim().to_string();
            let answer = pair.answer.trim().to_string();
            if question.is_empty() || answer.is_empty() || !seen.insert(question.clone()) {
                dropped += 1;
                continue;
            }
            kept.push(QaPair { question, answer });
        }

        let mut index = VectorIndex::new(embedder.dimension());
        for pair in &kept {
            index.insert(embedder.embed(&format!("{} {}", pair.question, pair.answer)))?;
        }

        if dropped > 0 {
            debug!("Dropped {} empty or duplicate Q&A rows", dropped);
        }
        info!("Indexed {} Q&A pairs", kept.len());

        Ok(Self {
            pairs: kept,
            index,
            embedder,
        })
    }

    /// Parse a JSON array of `{question, answer}` objects
    pub fn from_json_str(json: &str, embedder: Box<dyn Embedder>) -> Result<Self, Error> {
        let pairs: Vec<QaPair> = serde_json::from_str(json)?;
        Self::from_pairs(pairs, embedder)
    }

    /// Load a JSON file
    pub fn load<P: AsRef<Path>>(path: P, embedder: Box<dyn Embedder>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content, embedder)
    }

    /// The embedded sample corpus with the hashing embedder
    pub fn builtin() -> Result<Self, Error> {
        Self::from_json_str(BUILTIN_CORPUS, Box::new(HashingEmbedder::default()))
    }

    /// Most similar pairs with positive similarity, best first
    pub fn search(&self, query: &str, top_k: usize) -> Vec<CorpusHit> {
        let embedding = self.embedder.embed(query);
        self.index
            .search(&embedding, top_k)
            .into_iter()
            .filter(|(_, similarity)| *similarity > 0.0)
            .filter_map(|(id, similarity)| {
                self.pairs.get(id).map(|pair| CorpusHit {
                    question: pair.question.clone(),
                    answer: pair.answer.clone(),
                    similarity,
                })
            })
            .collect()
    }

    /// Stored pairs in load order
    pub fn pairs(&self) -> &[QaPair] {
        &self.pairs
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the corpus is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Numbered list of up to three distinct answers
pub fn format_offline_answer(hits: &[CorpusHit]) -> String {
    if hits.is_empty() {
        return NO_MATCH_ANSWER.to_string();
    }

    let mut seen = HashSet::new();
    let answers: Vec<&str> = hits
        .iter()
        .map(|hit| hit.answer.as_str())
        .filter(|answer| seen.insert(*answer))
        .take(MAX_CONTEXT_ANSWERS)
        .collect();

    let mut formatted = String::from("Based on Kisan Call Centre Database:\n\n");
    for (i, answer) in answers.iter().enumerate() {
        formatted.push_str(&format!("{}. {}\n\n", i + 1, answer));
    }
    formatted.trim_end().to_string()
}

/// LLM prompt grounding the question in up to three corpus hits
pub fn context_prompt(query: &str, hits: &[CorpusHit]) -> String {
    let mut context = String::from("Relevant information from Kisan Call Centre database:\n\n");
    for hit in hits.iter().take(MAX_CONTEXT_ANSWERS) {
        context.push_str(&format!("Q: {}\nA: {}\n\n", hit.question, hit.answer));
    }

    format!(
        "You are an expert agricultural assistant helping Indian farmers.\n\
         Use the following information from the Kisan Call Centre database to answer the farmer's question.\n\n\
         {}\n\
         Farmer's Question: {}\n\n\
         Provide a clear, practical answer in simple language. Include specific recommendations, dosages, or steps when applicable.",
        context, query
    )
}

/// Corpus loading errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File could not be read
    #[error("Failed to read Q&A corpus {path}: {source}")]
    Io {
        /// Path that failed
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Content is not a JSON array of Q&A objects
    #[error("Invalid Q&A corpus JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedder produced an unusable vector
    #[error("Failed to index Q&A corpus: {0}")]
    Index(#[from] vector::Error),
}
