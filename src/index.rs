//! Session-scoped similarity index.
//!
//! Built fresh from the chunk snapshot on every answering call and dropped
//! afterwards; nothing is cached or shared across requests. Two backends:
//!
//! - **semantic** — dense vectors from the configured embedding provider,
//!   ranked by cosine similarity.
//! - **lexical** — a TF-IDF vector space over the chunk texts (English stop
//!   words removed, vocabulary capped), ranked by cosine in that space.
//!
//! An index over zero chunks is a valid null state: every similarity query
//! answers with an empty result, never an error.

use anyhow::Result;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};

/// Vocabulary cap for the lexical backend.
const MAX_VOCAB: usize = 20_000;

pub enum SessionIndex {
    Lexical(TfidfIndex),
    Semantic(DenseIndex),
}

impl SessionIndex {
    /// Build the configured backend over `texts`, in chunk order.
    pub async fn build(
        backend: &str,
        texts: &[String],
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        match backend {
            "lexical" => Ok(Self::Lexical(TfidfIndex::build(texts))),
            _ => Ok(Self::Semantic(DenseIndex::build(texts, embedder).await?)),
        }
    }

    /// Similarity of `query` to every indexed chunk, in build order.
    /// Empty index yields an empty vector.
    pub async fn similarities(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>> {
        match self {
            Self::Lexical(index) => Ok(index.similarities(query)),
            Self::Semantic(index) => index.similarities(query, embedder).await,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Lexical(index) => index.vectors.len(),
            Self::Semantic(index) => index.vectors.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================
// Semantic backend
// ============================================================

/// Dense embedding index: one vector per chunk, query ranked by cosine.
pub struct DenseIndex {
    vectors: Vec<Vec<f32>>,
}

impl DenseIndex {
    pub async fn build(texts: &[String], embedder: &dyn EmbeddingProvider) -> Result<Self> {
        // The null state never touches the provider.
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            embedder.embed(texts).await?
        };
        Ok(Self { vectors })
    }

    pub async fn similarities(
        &self,
        query: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Vec<f32>> {
        if self.vectors.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = embed_query(embedder, query).await?;
        Ok(self
            .vectors
            .iter()
            .map(|v| cosine_similarity(&query_vec, v))
            .collect())
    }
}

// ============================================================
// Lexical backend
// ============================================================

/// TF-IDF index over chunk texts.
///
/// Tokens are lowercased alphanumeric runs of length >= 2 with English stop
/// words removed. When the corpus holds more distinct terms than
/// [`MAX_VOCAB`], the most frequent terms are kept (ties broken
/// alphabetically). Chunk vectors and query vectors are L2-normalized, so a
/// sparse dot product is cosine similarity.
pub struct TfidfIndex {
    vocab: HashMap<String, u32>,
    idf: Vec<f32>,
    vectors: Vec<Vec<(u32, f32)>>,
}

impl TfidfIndex {
    pub fn build(texts: &[String]) -> Self {
        Self::with_limit(texts, MAX_VOCAB)
    }

    fn with_limit(texts: &[String], max_vocab: usize) -> Self {
        let tokenized: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t)).collect();

        let mut corpus_tf: HashMap<String, usize> = HashMap::new();
        let mut df: HashMap<String, usize> = HashMap::new();
        for tokens in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens {
                *corpus_tf.entry(token.clone()).or_insert(0) += 1;
                if seen.insert(token) {
                    *df.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }

        // Cap the vocabulary by corpus frequency, ties alphabetical.
        let mut terms: Vec<(String, usize)> = corpus_tf.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(max_vocab);

        let mut selected: Vec<String> = terms.into_iter().map(|(term, _)| term).collect();
        selected.sort();

        let total_docs = texts.len() as f32;
        let mut vocab = HashMap::with_capacity(selected.len());
        let mut idf = Vec::with_capacity(selected.len());
        for (index, term) in selected.into_iter().enumerate() {
            let term_df = df.get(&term).copied().unwrap_or(0) as f32;
            idf.push(((1.0 + total_docs) / (1.0 + term_df)).ln() + 1.0);
            vocab.insert(term, index as u32);
        }

        let vectors = tokenized
            .iter()
            .map(|tokens| sparse_vector(tokens, &vocab, &idf))
            .collect();

        Self { vocab, idf, vectors }
    }

    /// Cosine similarity of `query` to every chunk vector. A query with no
    /// in-vocabulary terms scores 0.0 everywhere.
    pub fn similarities(&self, query: &str) -> Vec<f32> {
        if self.vectors.is_empty() {
            return Vec::new();
        }

        let tokens = tokenize(query);
        let query_vec = sparse_vector(&tokens, &self.vocab, &self.idf);
        if query_vec.is_empty() {
            return vec![0.0; self.vectors.len()];
        }

        let query_map: HashMap<u32, f32> = query_vec.into_iter().collect();
        self.vectors
            .iter()
            .map(|vector| {
                vector
                    .iter()
                    .map(|(term, weight)| query_map.get(term).copied().unwrap_or(0.0) * weight)
                    .sum()
            })
            .collect()
    }
}

/// L2-normalized sparse TF-IDF vector, sorted by term index.
fn sparse_vector(tokens: &[String], vocab: &HashMap<String, u32>, idf: &[f32]) -> Vec<(u32, f32)> {
    let mut counts: HashMap<u32, f32> = HashMap::new();
    for token in tokens {
        if let Some(&index) = vocab.get(token) {
            *counts.entry(index).or_insert(0.0) += 1.0;
        }
    }

    let mut vector: Vec<(u32, f32)> = counts
        .into_iter()
        .map(|(index, count)| (index, count * idf[index as usize]))
        .collect();

    let norm = vector.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for (_, w) in &mut vector {
            *w /= norm;
        }
    }
    vector.sort_by_key(|(index, _)| *index);
    vector
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| t.len() >= 2 && !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "below", "between", "both", "but",
        "by", "can", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
        "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
        "how", "i", "if", "in", "into", "is", "it", "its", "just", "me", "more", "most", "my",
        "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other", "our",
        "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such", "than",
        "that", "the", "their", "theirs", "them", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "you",
        "your", "yours",
    ]
    .into_iter()
    .collect()
});
