//! Text cleanup and chunking.
//!
//! Documents are split into word-bounded chunks before indexing. The
//! sentence policy keeps an overlap window between adjacent chunks so an
//! answer span straddling a boundary is still visible to the reader; the
//! window policy is a plain fixed-size split with no overlap.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::ChunkingConfig;

static NEWLINE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("newline regex is valid"));
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" {2,}").expect("space regex is valid"));
static STRAY_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s.,:/()%-]").expect("symbol regex is valid"));
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("boundary regex is valid"));

/// Normalize extracted text: collapse newline and space runs, drop symbols
/// that PDF extraction tends to mangle, keep word characters and basic
/// punctuation.
pub fn clean_text(text: &str) -> String {
    let text = NEWLINE_RUNS.replace_all(text, "\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = STRAY_SYMBOLS.replace_all(&text, "");
    text.trim().to_string()
}

/// Split `text` according to the configured policy.
pub fn split(config: &ChunkingConfig, text: &str) -> Vec<String> {
    match config.policy.as_str() {
        "window" => chunk_by_windows(text, config.target_words),
        _ => chunk_by_sentences(text, config.target_words, config.overlap_words),
    }
}

// ============================================================
// Sentence policy
// ============================================================

/// Sentence-aware chunking with overlap.
///
/// Sentences accumulate until adding the next one would push the chunk past
/// `target_words`; the chunk is then emitted and the next one is seeded with
/// the last `overlap_words` words of it. A single sentence longer than
/// `target_words` is emitted whole, never truncated.
pub fn chunk_by_sentences(text: &str, target_words: usize, overlap_words: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for sentence in split_sentences(text) {
        let words: Vec<&str> = sentence.split_whitespace().collect();
        if !current.is_empty() && current.len() + words.len() > target_words {
            chunks.push(current.join(" "));
            current = current[current.len().saturating_sub(overlap_words)..].to_vec();
        }
        current.extend(words);
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

/// Sentence boundary heuristic: a sentence ends at `.`, `!`, or `?` followed
/// by whitespace and an ASCII capital or digit. Abbreviations followed by a
/// lowercase word do not split. Approximate by construction.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_BOUNDARY.find_iter(text) {
        let starts_sentence = text[m.end()..]
            .chars()
            .next()
            .map(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .unwrap_or(false);
        if !starts_sentence {
            continue;
        }
        // The punctuation mark stays with the sentence it closes.
        sentences.push(&text[start..m.start() + 1]);
        start = m.end();
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

// ============================================================
// Window policy
// ============================================================

/// Fixed-size word windows, no overlap. Whitespace is flattened to single
/// spaces in the output.
pub fn chunk_by_windows(text: &str, target_words: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(target_words.max(1))
        .map(|window| window.join(" "))
        .collect()
}
