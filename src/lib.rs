//! # docqa
//!
//! A local-first document question-answering pipeline.
//!
//! docqa ingests documents (PDF, DOCX, plain text), chunks them into
//! overlapping passages, and answers natural-language questions by
//! retrieving the best-matching chunks, running an extractive reader
//! over each candidate, and fusing reader confidence with retrieval
//! score. Answers are persisted with their source chunks and can be
//! exported as a DOCX report.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌───────────┐
//! │   Files   │──▶│   Pipeline   │──▶│  SQLite   │
//! │ pdf/docx  │   │ Extract+Chunk│   │ docs+chks │
//! └───────────┘   └──────────────┘   └─────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (dqa)   │       │  (axum)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! Per question, retrieval builds a session index over the chunk
//! snapshot (dense embeddings or TF-IDF), scores every chunk with a
//! keyword bonus on top, and hands the top candidates to the reader.
//! A numeric extractor backstops the reader on spec-style questions
//! ("how much", "how many") where extractive readers are weakest.
//!
//! ## Quick Start
//!
//! ```bash
//! dqa init                          # write starter config, create database
//! dqa add manual.pdf notes.docx     # ingest documents
//! dqa ask "what is the battery capacity?"
//! dqa history                       # recent answers
//! dqa export --ids 1,2 --out answers.docx
//! dqa serve                         # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF, DOCX, and plain-text extraction |
//! | [`chunk`] | Text cleanup and chunking |
//! | [`ingest`] | Document ingestion and storage |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Per-question session index (dense or TF-IDF) |
//! | [`retrieve`] | Candidate retrieval with keyword bonus |
//! | [`reader`] | Extractive reader providers |
//! | [`numeric`] | Numeric span fallback extractor |
//! | [`answer`] | Score fusion, answer assembly, history |
//! | [`export`] | DOCX export of answered questions |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod numeric;
pub mod reader;
pub mod retrieve;
pub mod server;
