//! Document ingestion.
//!
//! Copies the source file into the upload directory under a UUID-prefixed
//! name, extracts and cleans its text, chunks it, and stores document plus
//! chunks in a single transaction. A failed ingest leaves no partial rows.

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chunk;
use crate::config::Config;
use crate::db;
use crate::extract;
use crate::models::Document;

/// What one ingest produced; also the HTTP upload response body.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub document_id: i64,
    pub filename: String,
    pub chunks: usize,
}

/// Ingest one document from `source_path`.
pub async fn ingest_file(
    pool: &SqlitePool,
    config: &Config,
    source_path: &Path,
) -> Result<IngestSummary> {
    let filename = source_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .ok_or_else(|| anyhow::anyhow!("not a file path: {}", source_path.display()))?;

    std::fs::create_dir_all(&config.storage.upload_dir)?;
    let stored_name = format!("{}_{}", Uuid::new_v4(), filename);
    let stored_path = config.storage.upload_dir.join(&stored_name);
    std::fs::copy(source_path, &stored_path)
        .with_context(|| format!("Failed to copy {} into upload dir", source_path.display()))?;

    let raw = extract::extract_file(&stored_path)
        .with_context(|| format!("Failed to extract text from {}", filename))?;
    let cleaned = chunk::clean_text(&raw);
    if cleaned.is_empty() {
        anyhow::bail!("no text found in {}", filename);
    }
    let texts = chunk::split(&config.chunking, &cleaned);

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO documents (filename, stored_path, created_at) VALUES (?, ?, ?)",
    )
    .bind(&filename)
    .bind(stored_path.to_string_lossy().as_ref())
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut *tx)
    .await?;
    let document_id = inserted.last_insert_rowid();

    for (position, text) in texts.iter().enumerate() {
        sqlx::query("INSERT INTO chunks (document_id, text, position) VALUES (?, ?, ?)")
            .bind(document_id)
            .bind(text)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(IngestSummary {
        document_id,
        filename,
        chunks: texts.len(),
    })
}

/// All stored documents, oldest first.
pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let rows = sqlx::query(
        "SELECT id, filename, stored_path, created_at FROM documents ORDER BY id ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| Document {
            id: row.get("id"),
            filename: row.get("filename"),
            stored_path: row.get("stored_path"),
            created_at: row.get("created_at"),
        })
        .collect())
}

/// Delete a document, its chunks, and its stored file.
/// Returns false when the id does not exist.
pub async fn delete_document(pool: &SqlitePool, document_id: i64) -> Result<bool> {
    let stored_path: Option<String> =
        sqlx::query_scalar("SELECT stored_path FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(pool)
            .await?;

    let Some(stored_path) = stored_path else {
        return Ok(false);
    };

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    // Rows are gone; a missing file on disk is not worth failing over.
    if let Err(err) = std::fs::remove_file(&stored_path) {
        tracing::warn!(path = %stored_path, error = %err, "could not remove stored file");
    }

    Ok(true)
}

// ============================================================
// CLI commands
// ============================================================

pub async fn run_add(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let pool = db::connect(config).await?;

    let mut total_chunks = 0usize;
    for path in paths {
        let summary = ingest_file(&pool, config, path).await?;
        println!(
            "  {} -> document {} ({} chunks)",
            summary.filename, summary.document_id, summary.chunks
        );
        total_chunks += summary.chunks;
    }

    println!("added {} documents, {} chunks", paths.len(), total_chunks);
    println!("ok");

    pool.close().await;
    Ok(())
}

pub async fn run_ls(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let documents = list_documents(&pool).await?;

    if documents.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for doc in &documents {
        println!("{:>4}  {}  {}", doc.id, doc.created_at, doc.filename);
    }

    Ok(())
}

pub async fn run_rm(config: &Config, document_id: i64) -> Result<()> {
    let pool = db::connect(config).await?;

    if !delete_document(&pool, document_id).await? {
        anyhow::bail!("document not found: {}", document_id);
    }

    println!("removed document {}", document_id);
    Ok(())
}
