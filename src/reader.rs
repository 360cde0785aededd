//! Extractive answering providers.
//!
//! A reader takes (question, chunk text) and returns a literal answer span
//! with a confidence in `[0, 1]`. Two implementations:
//! - **[`LexicalReader`]** — offline heuristic: the context sentence with the
//!   highest question-keyword overlap is the answer, the overlap fraction is
//!   the confidence. Weak on purpose; low-confidence output is what routes a
//!   question into the numeric fallback.
//! - **[`HttpReader`]** — posts `{question, context}` to an external
//!   extractive QA endpoint returning `{answer, score}`.
//!
//! A reader failure counts against one candidate chunk only; the answer loop
//! logs it and moves on. Because of that, [`HttpReader`] does not retry.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::chunk::split_sentences;
use crate::config::ReaderConfig;

/// One extraction attempt: the literal span and the model's confidence.
#[derive(Debug, Clone)]
pub struct ReaderOutput {
    pub answer: String,
    pub score: f32,
}

#[async_trait]
pub trait ReaderProvider: Send + Sync {
    /// Extract an answer span for `question` from `context`.
    async fn infer(&self, question: &str, context: &str) -> Result<ReaderOutput>;
}

// ============ Lexical Reader ============

/// Keyword-overlap reader. Never fails; produces an empty answer with score
/// 0.0 when nothing in the context overlaps the question.
pub struct LexicalReader;

impl LexicalReader {
    fn best_sentence(question: &str, context: &str) -> ReaderOutput {
        let question_lower = question.to_lowercase();
        let keywords: HashSet<&str> = question_lower
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|t| !t.is_empty())
            .collect();

        if keywords.is_empty() {
            return ReaderOutput {
                answer: String::new(),
                score: 0.0,
            };
        }

        let mut best_answer = String::new();
        let mut best_score = 0.0f32;

        for sentence in split_sentences(context) {
            let sentence_lower = sentence.to_lowercase();
            let hits = keywords
                .iter()
                .filter(|k| sentence_lower.contains(**k))
                .count();
            let score = hits as f32 / keywords.len() as f32;
            // Strict > keeps the earliest sentence on ties.
            if score > best_score {
                best_score = score;
                best_answer = sentence.trim().to_string();
            }
        }

        ReaderOutput {
            answer: best_answer,
            score: best_score,
        }
    }
}

#[async_trait]
impl ReaderProvider for LexicalReader {
    async fn infer(&self, question: &str, context: &str) -> Result<ReaderOutput> {
        Ok(Self::best_sentence(question, context))
    }
}

// ============ HTTP Reader ============

/// Reader backed by an external extractive QA service.
///
/// The endpoint contract is `POST <url>` with body
/// `{"question": "...", "context": "..."}`, answering
/// `{"answer": "...", "score": 0.87}`.
pub struct HttpReader {
    url: String,
    client: reqwest::Client,
}

impl HttpReader {
    pub fn new(config: &ReaderConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("reader.url required for HTTP reader"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { url, client })
    }
}

#[async_trait]
impl ReaderProvider for HttpReader {
    async fn infer(&self, question: &str, context: &str) -> Result<ReaderOutput> {
        let body = serde_json::json!({
            "question": question,
            "context": context,
        });

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Reader API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_reader_response(&json)
    }
}

fn parse_reader_response(json: &serde_json::Value) -> Result<ReaderOutput> {
    let answer = json
        .get("answer")
        .and_then(|a| a.as_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid reader response: missing answer"))?
        .to_string();
    let score = json.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) as f32;

    Ok(ReaderOutput { answer, score })
}

/// Create the configured [`ReaderProvider`].
pub fn create_reader(config: &ReaderConfig) -> Result<Box<dyn ReaderProvider>> {
    match config.provider.as_str() {
        "lexical" => Ok(Box::new(LexicalReader)),
        "http" => Ok(Box::new(HttpReader::new(config)?)),
        other => bail!("Unknown reader provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lexical_picks_best_overlap_sentence() {
        let context = "The box weighs nothing. Battery capacity is 4500 mah. \
                       Shipping takes two days.";
        let out = LexicalReader
            .infer("battery capacity?", context)
            .await
            .unwrap();
        assert_eq!(out.answer, "Battery capacity is 4500 mah.");
        assert!((out.score - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_lexical_score_is_overlap_fraction() {
        let out = LexicalReader
            .infer("what is the battery capacity", "Battery capacity is 4500 mah")
            .await
            .unwrap();
        // battery, capacity, is match; what, the do not.
        assert!((out.score - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_lexical_no_overlap_yields_empty_answer() {
        let out = LexicalReader
            .infer("quantum flux?", "The cat sat on the mat.")
            .await
            .unwrap();
        assert_eq!(out.answer, "");
        assert_eq!(out.score, 0.0);
    }

    #[tokio::test]
    async fn test_lexical_blank_question_yields_empty_answer() {
        let out = LexicalReader.infer("  ", "Some context.").await.unwrap();
        assert_eq!(out.answer, "");
        assert_eq!(out.score, 0.0);
    }

    #[tokio::test]
    async fn test_lexical_tie_keeps_earlier_sentence() {
        let context = "Alpha beta here. Alpha beta there.";
        let out = LexicalReader.infer("alpha beta", context).await.unwrap();
        assert_eq!(out.answer, "Alpha beta here.");
    }

    #[test]
    fn test_parse_reader_response() {
        let json = serde_json::json!({"answer": "42 kg", "score": 0.87});
        let out = parse_reader_response(&json).unwrap();
        assert_eq!(out.answer, "42 kg");
        assert!((out.score - 0.87).abs() < 1e-6);

        let missing = serde_json::json!({"score": 0.5});
        assert!(parse_reader_response(&missing).is_err());
    }

    #[test]
    fn test_create_reader_requires_url_for_http() {
        let config = ReaderConfig {
            provider: "http".to_string(),
            url: None,
            timeout_secs: 5,
        };
        assert!(create_reader(&config).is_err());
    }

    #[test]
    fn test_create_reader_unknown_provider() {
        let config = ReaderConfig {
            provider: "oracle".to_string(),
            url: None,
            timeout_secs: 5,
        };
        assert!(create_reader(&config).is_err());
    }
}
