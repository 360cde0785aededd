//! Chunk retrieval: similarity search plus a lexical keyword bonus.
//!
//! Every call reads a fresh chunk snapshot, builds a session index over it,
//! and ranks chunks against the question by:
//!
//! ```text
//! fused = cosine(question, chunk) + keyword_bonus × distinct matching keywords
//! ```
//!
//! The bonus rewards exact term overlap independent of the index's semantic
//! judgment and is deliberately uncapped — a chunk hitting many question
//! keywords may score above 1.0.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::index::SessionIndex;
use crate::models::Chunk;

/// One retrieval candidate with its fused relevance score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Load the chunk snapshot, optionally scoped to a set of documents.
/// Returned in id order so repeated calls rank deterministically.
pub async fn list_chunks(pool: &SqlitePool, document_ids: Option<&[i64]>) -> Result<Vec<Chunk>> {
    let rows = match document_ids {
        None => {
            sqlx::query("SELECT id, document_id, text, position FROM chunks ORDER BY id ASC")
                .fetch_all(pool)
                .await?
        }
        Some([]) => return Ok(Vec::new()),
        Some(ids) => {
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!(
                "SELECT id, document_id, text, position FROM chunks \
                 WHERE document_id IN ({}) ORDER BY id ASC",
                placeholders
            );
            let mut query = sqlx::query(&sql);
            for id in ids {
                query = query.bind(id);
            }
            query.fetch_all(pool).await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| Chunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            text: row.get("text"),
            position: row.get("position"),
        })
        .collect())
}

/// Retrieve the `top_k` most relevant chunks for `question`.
///
/// Builds the session index over the snapshot, scores every candidate, and
/// returns them sorted by fused score descending. Empty snapshot (or a
/// filter matching nothing) yields an empty result, never an error.
pub async fn retrieve(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    question: &str,
    top_k: usize,
    document_ids: Option<&[i64]>,
) -> Result<Vec<ScoredChunk>> {
    let chunks = list_chunks(pool, document_ids).await?;
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let index = SessionIndex::build(&config.index.backend, &texts, embedder).await?;
    let similarities = index.similarities(question, embedder).await?;

    Ok(rank(
        chunks,
        &similarities,
        question,
        config.retrieval.keyword_bonus,
        top_k,
    ))
}

// ============================================================
// Scoring
// ============================================================

/// Fuse similarity with the keyword bonus, sort descending, keep `top_k`.
/// The sort is stable, so equal scores keep snapshot order.
fn rank(
    chunks: Vec<Chunk>,
    similarities: &[f32],
    question: &str,
    bonus_per_keyword: f32,
    top_k: usize,
) -> Vec<ScoredChunk> {
    let mut results: Vec<ScoredChunk> = chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let similarity = similarities.get(i).copied().unwrap_or(0.0);
            let bonus = keyword_bonus(question, &chunk.text, bonus_per_keyword);
            ScoredChunk {
                chunk,
                score: similarity + bonus,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

/// Bonus for distinct question keywords appearing verbatim in the chunk.
///
/// Keywords are the lowercase whitespace-split question tokens, duplicates
/// collapsed, punctuation kept as typed. Each keyword found as a substring
/// of the lowercased chunk text adds `bonus_per_keyword`.
fn keyword_bonus(question: &str, chunk_text: &str, bonus_per_keyword: f32) -> f32 {
    let question_lower = question.to_lowercase();
    let keywords: HashSet<&str> = question_lower.split_whitespace().collect();
    if keywords.is_empty() {
        return 0.0;
    }

    let chunk_lower = chunk_text.to_lowercase();
    let hits = keywords.iter().filter(|k| chunk_lower.contains(**k)).count();
    bonus_per_keyword * hits as f32
}
