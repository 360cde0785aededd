use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            upload_dir: default_upload_dir(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docqa.sqlite")
}
fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Splitting policy: `sentence` (sentence-aware with overlap) or
    /// `window` (fixed word windows, no overlap).
    #[serde(default = "default_policy")]
    pub policy: String,
    #[serde(default = "default_target_words")]
    pub target_words: usize,
    #[serde(default = "default_overlap_words")]
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            target_words: default_target_words(),
            overlap_words: default_overlap_words(),
        }
    }
}

fn default_policy() -> String {
    "sentence".to_string()
}
fn default_target_words() -> usize {
    400
}
fn default_overlap_words() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Index backend: `semantic` (dense embeddings) or `lexical` (TF-IDF).
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "semantic".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Additive bonus per distinct question keyword found in a chunk.
    #[serde(default = "default_keyword_bonus")]
    pub keyword_bonus: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            keyword_bonus: default_keyword_bonus(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_keyword_bonus() -> f32 {
    0.05
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `hash` (offline feature hashing), `openai`, `ollama`, or `disabled`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReaderConfig {
    /// `lexical` (offline sentence-overlap heuristic) or `http`
    /// (external extractive QA endpoint).
    #[serde(default = "default_reader_provider")]
    pub provider: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            provider: default_reader_provider(),
            url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_reader_provider() -> String {
    "lexical".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "Failed to read config file: {} (run `dqa init` to create one)",
            path.display()
        )
    })?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.target_words == 0 {
        anyhow::bail!("chunking.target_words must be > 0");
    }
    if config.chunking.overlap_words >= config.chunking.target_words {
        anyhow::bail!("chunking.overlap_words must be < chunking.target_words");
    }
    match config.chunking.policy.as_str() {
        "sentence" | "window" => {}
        other => anyhow::bail!(
            "Unknown chunking policy: '{}'. Must be sentence or window.",
            other
        ),
    }

    match config.index.backend.as_str() {
        "semantic" | "lexical" => {}
        other => anyhow::bail!(
            "Unknown index backend: '{}'. Must be semantic or lexical.",
            other
        ),
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.keyword_bonus) {
        anyhow::bail!("retrieval.keyword_bonus must be in [0.0, 1.0]");
    }

    match config.embedding.provider.as_str() {
        "hash" | "disabled" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, openai, ollama, or disabled.",
            other
        ),
    }

    if config.index.backend == "semantic" && !config.embedding.is_enabled() {
        anyhow::bail!(
            "index.backend = 'semantic' requires an embedding provider. \
             Set [embedding] provider, or use index.backend = 'lexical'."
        );
    }

    match config.reader.provider.as_str() {
        "lexical" => {}
        "http" => {
            if config.reader.url.is_none() {
                anyhow::bail!("reader.url must be specified when provider is 'http'");
            }
        }
        other => anyhow::bail!("Unknown reader provider: '{}'. Must be lexical or http.", other),
    }

    Ok(())
}

/// Commented starter configuration written by `dqa init`.
pub const STARTER_CONFIG: &str = r#"# docqa configuration

[storage]
db_path = "./data/docqa.sqlite"
upload_dir = "./data/uploads"

[chunking]
# "sentence" accumulates sentences up to target_words and carries
# overlap_words of context into the next chunk; "window" emits fixed
# word windows with no overlap.
policy = "sentence"
target_words = 400
overlap_words = 20

[index]
# "semantic" ranks chunks by dense-embedding similarity, "lexical" by
# TF-IDF similarity. The index is rebuilt from storage on every question.
backend = "semantic"

[retrieval]
top_k = 3
keyword_bonus = 0.05

[embedding]
# "hash" needs no network or model download. For real models use
# "openai" (set OPENAI_API_KEY, model, dims) or "ollama" (set url,
# model, dims).
provider = "hash"

[reader]
# "lexical" answers with the best-overlapping sentence of the chunk.
# "http" posts {question, context} to an extractive QA endpoint that
# returns {answer, score}.
provider = "lexical"

[server]
bind = "127.0.0.1:8000"
"#;

pub fn write_starter_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, STARTER_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}
