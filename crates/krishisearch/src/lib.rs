// krishisearch - Agricultural Knowledge Search
//
// Intent-aware keyword search over a static knowledge base, plus
// similarity search over Kisan Call Centre Q&A pairs.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod context;
pub mod corpus;
pub mod history;
pub mod intent;
pub mod knowledge;
pub mod matcher;
pub mod normalize;
pub mod ranking;
pub mod search;
pub mod similarity;
pub mod suggest;
pub mod synonyms;
pub mod vector;

pub use config::{HistoryConfig, IntentGroupConfig, SearchConfig};
pub use context::{ContextRefiner, PassThrough, SearchContext};
pub use corpus::{context_prompt, format_offline_answer, CorpusHit, Embedder, HashingEmbedder, QaCorpus, QaPair};
pub use history::{BoundedLog, ConversationEntry, ConversationLog, SearchHistory, SearchRecord, SearchStats};
pub use intent::{Intent, IntentClassifier};
pub use knowledge::{KnowledgeBase, KnowledgeEntry};
pub use matcher::SearchResult;
pub use normalize::normalize_query;
pub use ranking::Ranker;
pub use search::{SearchEngine, SearchOutcome};
pub use suggest::SuggestionGenerator;
pub use synonyms::SynonymTable;
pub use vector::VectorIndex;
