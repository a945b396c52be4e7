// Vector Search
//
// Brute-force cosine similarity over a dense, append-only index. Corpus
// sizes here are a few thousand rows at most.

/// Dense vector index addressed by insertion position
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Row-major embeddings, one per inserted item
    embeddings: Vec<Vec<f32>>,

    /// Embedding dimension
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index
    ///
    /// # Arguments
    ///
    /// * `dimension` - Length every inserted embedding must have
    pub fn new(dimension: usize) -> Self {
        Self {
            embeddings: Vec::new(),
            dimension,
        }
    }

    /// Append an embedding and return its id
    ///
    /// # Returns
    ///
    /// The position of the new vector, or an error if its length differs
    /// from the index dimension or it contains NaN/infinite values
    pub fn insert(&mut self, embedding: Vec<f32>) -> Result<usize, Error> {
        if embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                got: embedding.len(),
            });
        }

        if embedding.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidEmbedding(format!(
                "vector {} contains non-finite values",
                self.embeddings.len()
            )));
        }

        self.embeddings.push(embedding);
        Ok(self.embeddings.len() - 1)
    }

    /// Top-k ids by cosine similarity, highest first.
    ///
    /// Equal similarities keep insertion order. A query of the wrong
    /// dimension matches nothing.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dimension || top_k == 0 {
            return Vec::new();
        }

        let mut results: Vec<(usize, f32)> = self
            .embeddings
            .iter()
            .enumerate()
            .map(|(id, embedding)| (id, cosine_similarity(query, embedding)))
            .collect();

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        results
    }

    /// Number of vectors
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Embedding dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding by id
    pub fn get(&self, id: usize) -> Option<&[f32]> {
        self.embeddings.get(id).map(Vec::as_slice)
    }
}

/// Cosine similarity in `[-1, 1]`, or 0.0 when either vector is zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Vector index errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Embedding length does not match the index dimension
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch {
        /// Expected dimension
        expected: usize,
        /// Actual dimension received
        got: usize,
    },

    /// Embedding contains NaN or infinite values
    #[error("Invalid embedding: {0}")]
    InvalidEmbedding(String),
}
