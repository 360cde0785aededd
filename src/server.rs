//! JSON HTTP API for document question answering.
//!
//! Exposes ingestion, retrieval-backed question answering, history, and
//! DOCX export over HTTP so the pipeline can back a web frontend or be
//! called from scripts.
//!
//! # Endpoints
//!
//! | Method   | Path              | Description |
//! |----------|-------------------|-------------|
//! | `GET`    | `/health`         | Health check (returns version) |
//! | `POST`   | `/documents`      | Ingest a file by path |
//! | `GET`    | `/documents`      | List ingested documents |
//! | `DELETE` | `/documents/{id}` | Remove a document and its chunks |
//! | `POST`   | `/ask`            | Answer a question over the corpus |
//! | `GET`    | `/history`        | Recent answered questions |
//! | `POST`   | `/export`         | Download selected history as DOCX |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "Question must be provided." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser frontends
//! can call the API directly during development.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{self, AskResponse};
use crate::config::Config;
use crate::db;
use crate::embedding::{create_embedder, EmbeddingProvider};
use crate::export;
use crate::ingest::{self, IngestSummary};
use crate::migrate;
use crate::models::{Document, QaRecord};
use crate::reader::{create_reader, ReaderProvider};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    /// Application configuration (wrapped in `Arc` for cheap cloning across handlers).
    config: Arc<Config>,
    /// Connection pool shared by every handler.
    pool: SqlitePool,
    /// Embedding provider, constructed once at startup.
    embedder: Arc<dyn EmbeddingProvider>,
    /// Reader provider, constructed once at startup.
    reader: Arc<dyn ReaderProvider>,
}

/// Starts the HTTP API server.
///
/// Applies migrations, builds the providers named in the config, binds to
/// `[server].bind`, and serves until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    migrate::run_migrations(config).await?;
    let pool = db::connect(config).await?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(create_embedder(&config.embedding)?);
    let reader: Arc<dyn ReaderProvider> = Arc::from(create_reader(&config.reader)?);

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        embedder,
        reader,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_ingest).get(handle_list_documents))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_history))
        .route("/export", post(handle_export))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

/// Inner error detail with a machine-readable code and human-readable message.
#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Constructs a 404 Not Found error.
fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

/// Constructs a 500 Internal Server Error.
fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

/// Maps pipeline errors to the most appropriate HTTP status code so
/// handlers can stay on `anyhow::Result` internally. Validation wording
/// from the ingest and answer paths becomes 400, missing rows become 404,
/// everything else is a 500.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("not found") {
        not_found(msg)
    } else if msg.contains("must be provided")
        || msg.contains("must not be empty")
        || msg.contains("not a file path")
        || msg.contains("no text found")
        || msg.contains("Failed to copy")
    {
        bad_request(msg)
    } else {
        internal(err)
    }
}

// ============ GET /health ============

/// JSON response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Handler for `GET /health`.
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /documents ============

/// JSON request body for `POST /documents`.
#[derive(Deserialize)]
struct IngestRequest {
    /// Path to a file on the server host.
    path: String,
}

/// Handler for `POST /documents`.
///
/// Copies the file into the upload directory, extracts and chunks its
/// text, and stores document and chunk rows. Returns the ingest summary.
async fn handle_ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestSummary>, AppError> {
    if req.path.trim().is_empty() {
        return Err(bad_request("path must not be empty"));
    }

    let summary = ingest::ingest_file(&state.pool, &state.config, std::path::Path::new(&req.path))
        .await
        .map_err(classify_error)?;

    Ok(Json(summary))
}

// ============ GET /documents ============

/// Handler for `GET /documents`.
async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = ingest::list_documents(&state.pool).await.map_err(internal)?;
    Ok(Json(documents))
}

// ============ DELETE /documents/{id} ============

/// Handler for `DELETE /documents/{id}`.
///
/// Removes the document row, its chunks, and the stored file. Returns
/// `404` when no document has the given id.
async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = ingest::delete_document(&state.pool, id)
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found(format!("document {} not found", id)));
    }
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ============ POST /ask ============

/// JSON request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
    /// Number of chunks to cite; defaults to `[retrieval].top_k`.
    top_k: Option<usize>,
    /// Restrict retrieval to these documents. Empty or absent means all.
    document_ids: Option<Vec<i64>>,
}

/// Handler for `POST /ask`.
///
/// Runs retrieval and reading over the stored corpus, records the result
/// in history, and returns the answer with its sources.
async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    if req.question.trim().is_empty() {
        return Err(bad_request("Question must be provided."));
    }

    let top_k = req.top_k.unwrap_or(state.config.retrieval.top_k);
    let scope = req.document_ids.as_deref().filter(|ids| !ids.is_empty());

    let response = answer::ask_and_record(
        &state.pool,
        &state.config,
        state.embedder.as_ref(),
        state.reader.as_ref(),
        &req.question,
        top_k,
        scope,
    )
    .await
    .map_err(classify_error)?;

    Ok(Json(response))
}

// ============ GET /history ============

/// Query parameters for `GET /history`.
#[derive(Deserialize)]
struct HistoryParams {
    /// Maximum number of records to return (newest first). Defaults to 50.
    limit: Option<i64>,
}

/// Handler for `GET /history`.
async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<QaRecord>>, AppError> {
    let limit = params.limit.unwrap_or(50);
    let records = answer::list_history(&state.pool, limit)
        .await
        .map_err(internal)?;
    Ok(Json(records))
}

// ============ POST /export ============

/// JSON request body for `POST /export`.
#[derive(Deserialize)]
struct ExportRequest {
    /// History record ids to include.
    qa_ids: Vec<i64>,
    /// Document title; defaults to "Q&A Export".
    title: Option<String>,
}

/// Handler for `POST /export`.
///
/// Builds a DOCX file from the selected history records and returns it
/// as an attachment.
async fn handle_export(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> Result<Response, AppError> {
    if req.qa_ids.is_empty() {
        return Err(bad_request("qa_ids must not be empty"));
    }

    let records = export::fetch_qa_by_ids(&state.pool, &req.qa_ids)
        .await
        .map_err(internal)?;
    if records.is_empty() {
        return Err(not_found("no history records found for the given ids"));
    }

    let title = req.title.unwrap_or_else(|| "Q&A Export".to_string());
    let bytes = export::build_docx(&records, &title).map_err(internal)?;

    let headers = [
        (
            header::CONTENT_TYPE,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        (
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"qa_export.docx\"",
        ),
    ];

    Ok((headers, bytes).into_response())
}
