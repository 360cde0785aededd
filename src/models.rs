//! Core data models shared by the ingest, retrieval, and answering pipeline.
//!
//! Documents and chunks mirror the SQLite schema (see [`crate::migrate`]);
//! answer types define the output contract of [`crate::answer`].

use serde::Serialize;

/// A stored document. Created on ingest, never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    /// Display name, as the file was named when ingested.
    pub filename: String,
    /// Where the ingested copy lives under the upload directory.
    pub stored_path: String,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

/// A contiguous excerpt of a document's text, the unit of retrieval
/// and extraction. `position` is zero-based within the owning document.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub id: i64,
    pub document_id: i64,
    pub text: String,
    pub position: i64,
}

/// Provenance entry for one retrieved candidate.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub chunk_id: i64,
    pub score: f32,
}

/// Result of one answering call.
///
/// `sources` lists every retrieved candidate with its retrieval score,
/// independent of which candidate won. `context` holds at most the first
/// 1000 characters of the winning chunk's text, empty when nothing won.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub answer: String,
    pub score: f32,
    pub sources: Vec<SourceRef>,
    pub context: String,
}

impl AnswerResult {
    /// The canonical empty answer, returned for an empty corpus or a
    /// blank question. Not an error.
    pub fn empty() -> Self {
        Self {
            answer: String::new(),
            score: 0.0,
            sources: Vec::new(),
            context: String::new(),
        }
    }
}

/// A recorded question/answer exchange.
#[derive(Debug, Clone, Serialize)]
pub struct QaRecord {
    pub id: i64,
    pub question: String,
    pub answer: String,
    pub score: f64,
    /// Comma-separated chunk ids of every retrieved candidate.
    pub source_chunk_ids: String,
    pub created_at: String,
}
