//! Answer fusion: the heart of the question pipeline.
//!
//! For each retrieved candidate chunk the extractive reader proposes a span
//! with a confidence; retrieval relevance and reader confidence are fused:
//!
//! ```text
//! combined = reader_confidence × 0.7 + retrieval_score × 0.3
//! ```
//!
//! When the reader comes back empty or below the confidence floor, the
//! numeric extractor takes a shot at the chunk; a hit overwrites the answer
//! and lifts the score to at least 0.95. The single best candidate wins
//! (strict comparison, first seen keeps ties), but every retrieved candidate
//! is reported as provenance regardless of who won.
//!
//! A reader failure on one candidate is logged and skipped; only retrieval
//! itself (storage, index build) can fail the whole call.

use anyhow::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::models::{AnswerResult, QaRecord, SourceRef};
use crate::numeric::NumericExtractor;
use crate::reader::{create_reader, ReaderProvider};
use crate::retrieve::{self, ScoredChunk};

const READER_WEIGHT: f32 = 0.7;
const RETRIEVAL_WEIGHT: f32 = 0.3;
/// Reader confidence below this routes the candidate into the numeric
/// fallback.
const MIN_READER_CONFIDENCE: f32 = 0.4;
/// Score floor applied when the numeric fallback produces the answer.
const NUMERIC_OVERRIDE_SCORE: f32 = 0.95;
/// The reported context is the first this many characters of the winning
/// chunk.
const CONTEXT_CHARS: usize = 1000;
/// Retrieval over-fetch: examine more candidates than the caller asked for.
const MIN_FETCH: usize = 8;

/// Answer `question` against the stored corpus.
///
/// Returns the canonical empty result for a blank question or an empty
/// (possibly filtered-to-empty) corpus. Candidates are fetched beyond
/// `top_k` to give fusion more material; all of them appear in `sources`.
pub async fn answer_question(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    reader: &dyn ReaderProvider,
    question: &str,
    top_k: usize,
    document_ids: Option<&[i64]>,
) -> Result<AnswerResult> {
    if question.trim().is_empty() {
        return Ok(AnswerResult::empty());
    }

    let fetch_k = (2 * top_k).max(MIN_FETCH);
    let candidates =
        retrieve::retrieve(pool, config, embedder, question, fetch_k, document_ids).await?;
    if candidates.is_empty() {
        return Ok(AnswerResult::empty());
    }
    debug!(candidates = candidates.len(), fetch_k, "retrieved candidates");

    let sources: Vec<SourceRef> = candidates
        .iter()
        .map(|c| SourceRef {
            chunk_id: c.chunk.id,
            score: c.score,
        })
        .collect();

    let extractor = NumericExtractor::new();
    let (answer, score, context) = fuse(reader, &extractor, question, &candidates).await;
    info!(score, answered = !answer.is_empty(), "answer selected");

    Ok(AnswerResult {
        answer,
        score,
        sources,
        context,
    })
}

/// Run the reader over each candidate and keep the best fused answer.
/// Returns `(answer, score, context)`; all empty/zero when no candidate
/// produced a usable extraction.
async fn fuse(
    reader: &dyn ReaderProvider,
    extractor: &NumericExtractor,
    question: &str,
    candidates: &[ScoredChunk],
) -> (String, f32, String) {
    let mut best_answer = String::new();
    let mut best_score = 0.0f32;
    let mut best_context = String::new();

    for candidate in candidates {
        let output = match reader.infer(question, &candidate.chunk.text).await {
            Ok(output) => output,
            Err(err) => {
                warn!(
                    chunk_id = candidate.chunk.id,
                    error = %err,
                    "reader failed on candidate, skipping"
                );
                continue;
            }
        };

        let mut answer = output.answer;
        let mut combined = output.score * READER_WEIGHT + candidate.score * RETRIEVAL_WEIGHT;

        if answer.trim().is_empty() || output.score < MIN_READER_CONFIDENCE {
            if let Some(extracted) = extractor.extract(question, &candidate.chunk.text) {
                answer = extracted;
                combined = combined.max(NUMERIC_OVERRIDE_SCORE);
            }
        }
        debug!(
            chunk_id = candidate.chunk.id,
            reader_score = output.score,
            combined,
            "candidate scored"
        );

        // Strict > keeps the earlier candidate on ties.
        if combined > best_score {
            best_score = combined;
            best_answer = answer;
            best_context = candidate.chunk.text.chars().take(CONTEXT_CHARS).collect();
        }
    }

    (best_answer, best_score, best_context)
}

// ============================================================
// History
// ============================================================

/// Record one answered question; returns the history row id.
pub async fn record_history(
    pool: &SqlitePool,
    question: &str,
    result: &AnswerResult,
) -> Result<i64> {
    let source_ids = result
        .sources
        .iter()
        .map(|s| s.chunk_id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let inserted = sqlx::query(
        "INSERT INTO qa_history (question, answer, score, source_chunk_ids, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(question)
    .bind(&result.answer)
    .bind(result.score as f64)
    .bind(&source_ids)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(inserted.last_insert_rowid())
}

/// Most recent history entries, newest first.
pub async fn list_history(pool: &SqlitePool, limit: i64) -> Result<Vec<QaRecord>> {
    let rows = sqlx::query(
        "SELECT id, question, answer, score, source_chunk_ids, created_at \
         FROM qa_history ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| QaRecord {
            id: row.get("id"),
            question: row.get("question"),
            answer: row.get("answer"),
            score: row.get("score"),
            source_chunk_ids: row.get("source_chunk_ids"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Wire shape shared by the HTTP `/ask` endpoint and `dqa ask --json`.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub qa_id: i64,
    pub question: String,
    pub answer: String,
    pub score: f32,
    pub sources: Vec<SourceRef>,
    pub context: String,
}

/// Answer and persist to history in one step.
pub async fn ask_and_record(
    pool: &SqlitePool,
    config: &Config,
    embedder: &dyn EmbeddingProvider,
    reader: &dyn ReaderProvider,
    question: &str,
    top_k: usize,
    document_ids: Option<&[i64]>,
) -> Result<AskResponse> {
    let result =
        answer_question(pool, config, embedder, reader, question, top_k, document_ids).await?;
    let qa_id = record_history(pool, question, &result).await?;

    Ok(AskResponse {
        qa_id,
        question: question.to_string(),
        answer: result.answer,
        score: result.score,
        sources: result.sources,
        context: result.context,
    })
}

// ============================================================
// CLI commands
// ============================================================

pub async fn run_ask(
    config: &Config,
    question: &str,
    top_k: Option<usize>,
    document_ids: &[i64],
    json: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question must be provided");
    }

    let pool = db::connect(config).await?;
    let embedder = create_embedder(&config.embedding)?;
    let reader = create_reader(&config.reader)?;

    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    let scope = if document_ids.is_empty() {
        None
    } else {
        Some(document_ids)
    };

    let response = ask_and_record(
        &pool,
        config,
        embedder.as_ref(),
        reader.as_ref(),
        question,
        top_k,
        scope,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.answer.is_empty() {
        println!("No answer found.");
    } else {
        println!("Answer: {}", response.answer);
    }
    println!("Score: {:.3}", response.score);
    if response.sources.is_empty() {
        println!("Sources: none");
    } else {
        let listed = response
            .sources
            .iter()
            .map(|s| format!("chunk {} ({:.3})", s.chunk_id, s.score))
            .collect::<Vec<_>>()
            .join(", ");
        println!("Sources: {}", listed);
    }

    Ok(())
}

pub async fn run_history(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let records = list_history(&pool, limit).await?;

    if records.is_empty() {
        println!("No history.");
        return Ok(());
    }

    for record in &records {
        println!(
            "[{}] {}  {}",
            record.id, record.created_at, record.question
        );
        let shown = if record.answer.is_empty() {
            "(no answer)"
        } else {
            record.answer.as_str()
        };
        println!("    -> {} (score {:.3})", shown, record.score);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;
    use crate::reader::ReaderOutput;
    use async_trait::async_trait;

    struct FixedReader {
        answer: &'static str,
        score: f32,
    }

    #[async_trait]
    impl ReaderProvider for FixedReader {
        async fn infer(&self, _question: &str, _context: &str) -> Result<ReaderOutput> {
            Ok(ReaderOutput {
                answer: self.answer.to_string(),
                score: self.score,
            })
        }
    }

    struct FailingReader;

    #[async_trait]
    impl ReaderProvider for FailingReader {
        async fn infer(&self, _question: &str, _context: &str) -> Result<ReaderOutput> {
            anyhow::bail!("model exploded")
        }
    }

    fn candidate(id: i64, text: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id,
                document_id: 1,
                text: text.to_string(),
                position: 0,
            },
            score,
        }
    }

    #[tokio::test]
    async fn test_fusion_weights() {
        let reader = FixedReader {
            answer: "some answer",
            score: 0.5,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![candidate(1, "plain prose without numbers", 0.8)];
        let (answer, score, _) = fuse(&reader, &extractor, "question", &candidates).await;
        assert_eq!(answer, "some answer");
        // 0.5 * 0.7 + 0.8 * 0.3
        assert!((score - 0.59).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_low_confidence_routes_to_numeric_fallback() {
        let reader = FixedReader {
            answer: "vague words",
            score: 0.1,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![candidate(1, "Weight: 0.209 kg, width 12 cm", 0.6)];
        let (answer, score, _) = fuse(&reader, &extractor, "what is the weight?", &candidates).await;
        assert_eq!(answer, "0.209 kg");
        assert!((score - 0.95).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_empty_answer_routes_to_numeric_fallback() {
        let reader = FixedReader {
            answer: "   ",
            score: 0.9,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![candidate(1, "Battery rated at 4500 mah", 0.5)];
        let (answer, score, _) = fuse(&reader, &extractor, "battery?", &candidates).await;
        assert_eq!(answer, "4500 mah");
        assert!((score - 0.95).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_fallback_miss_keeps_reader_answer() {
        let reader = FixedReader {
            answer: "maybe this",
            score: 0.2,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![candidate(1, "no measurements in here", 0.5)];
        let (answer, score, _) = fuse(&reader, &extractor, "question", &candidates).await;
        assert_eq!(answer, "maybe this");
        // 0.2 * 0.7 + 0.5 * 0.3, no override
        assert!((score - 0.29).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_reader_failure_skips_candidate() {
        let extractor = NumericExtractor::new();
        let candidates = vec![
            candidate(1, "first chunk", 0.9),
            candidate(2, "second chunk", 0.8),
        ];
        let (answer, score, context) =
            fuse(&FailingReader, &extractor, "question", &candidates).await;
        assert_eq!(answer, "");
        assert_eq!(score, 0.0);
        assert_eq!(context, "");
    }

    #[tokio::test]
    async fn test_higher_retrieval_score_wins_with_equal_reader() {
        let reader = FixedReader {
            answer: "the answer",
            score: 0.5,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![
            candidate(1, "weaker candidate text", 0.2),
            candidate(2, "stronger candidate text", 0.9),
        ];
        let (_, score, context) = fuse(&reader, &extractor, "question", &candidates).await;
        assert!((score - (0.5 * 0.7 + 0.9 * 0.3)).abs() < 1e-6);
        assert_eq!(context, "stronger candidate text");
    }

    #[tokio::test]
    async fn test_tie_keeps_first_candidate() {
        let reader = FixedReader {
            answer: "tied",
            score: 0.5,
        };
        let extractor = NumericExtractor::new();
        let candidates = vec![
            candidate(1, "first text", 0.5),
            candidate(2, "second text", 0.5),
        ];
        let (_, _, context) = fuse(&reader, &extractor, "question", &candidates).await;
        assert_eq!(context, "first text");
    }

    #[tokio::test]
    async fn test_context_limited_to_winning_chunk_prefix() {
        let reader = FixedReader {
            answer: "ok",
            score: 0.9,
        };
        let extractor = NumericExtractor::new();
        let long_text = "x".repeat(1500);
        let candidates = vec![candidate(1, &long_text, 0.5)];
        let (_, _, context) = fuse(&reader, &extractor, "question", &candidates).await;
        assert_eq!(context.chars().count(), 1000);
    }
}
