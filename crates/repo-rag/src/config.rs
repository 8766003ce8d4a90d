//! Configuration for the RAG service
//!
//! Every section has a `Default`. [`RagConfig::load`] layers an optional TOML
//! file and then environment variables on top of the defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main RAG service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Where the index and sync state live
    pub data: DataConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Text extraction / OCR configuration
    pub extraction: ExtractionConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chat model configuration
    pub llm: LlmConfig,
    /// GitHub configuration
    pub github: GitHubConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

impl RagConfig {
    /// Load configuration from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Apply environment overrides using the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.llm.base_url = base;
        }
        if let Some(model) = lookup("REPO_RAG_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(token) = lookup("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(dir) = lookup("REPO_RAG_DATA_DIR") {
            self.data.data_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.embeddings.base_url = url;
        }
        if let Some(model) = lookup("REPO_RAG_EMBED_MODEL") {
            self.embeddings.model = model;
        }
        if let Some(port) = lookup("REPO_RAG_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Check cross-field invariants
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_words == 0 {
            return Err(Error::Config("chunking.max_words must be positive".to_string()));
        }
        if self.chunking.overlap_words >= self.chunking.max_words {
            return Err(Error::Config(format!(
                "chunking.overlap_words ({}) must be smaller than chunking.max_words ({})",
                self.chunking.overlap_words, self.chunking.max_words
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be positive".to_string()));
        }
        if self.extraction.pdf_timeout_secs == 0 {
            return Err(Error::Config("extraction.pdf_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 50MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 50 * 1024 * 1024,
        }
    }
}

/// Storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root data directory
    pub data_dir: PathBuf,
}

impl DataConfig {
    /// Directory holding the vector index files
    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index")
    }

    /// Directory for uploaded files
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Last ingested commit per repository
    pub fn commit_state_path(&self) -> PathBuf {
        self.data_dir.join("last_commit.json")
    }

    /// Last ingested repository URL and branch
    pub fn repo_source_path(&self) -> PathBuf {
        self.data_dir.join("repo_url.json")
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("repo-rag"),
        }
    }
}

/// Word-window chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Words per chunk
    pub max_words: usize,
    /// Words shared between consecutive chunks
    pub overlap_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_words: 500,
            overlap_words: 100,
        }
    }
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Minimum trimmed characters on a PDF page before falling back to OCR
    pub ocr_threshold: usize,
    /// Render resolution for OCR
    pub ocr_dpi: u32,
    /// Tesseract language
    pub ocr_language: String,
    /// Limit on reading one PDF's text layer
    pub pdf_timeout_secs: u64,
    /// Extensions accepted when loading local files
    pub allowed_extensions: Vec<String>,
    /// Extensions skipped during repository sync
    pub skipped_extensions: Vec<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_threshold: 30,
            ocr_dpi: 300,
            ocr_language: "eng".to_string(),
            pdf_timeout_secs: 60,
            allowed_extensions: ["md", "txt", "json", "pdf"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skipped_extensions: ["png", "jpg", "jpeg", "gif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Which service produces embeddings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible `/embeddings` endpoint (uses the LLM base URL and key)
    OpenAi,
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend
    pub backend: EmbeddingBackend,
    /// Ollama base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "bge-large".to_string(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Chat model configuration (OpenAI-compatible API, OpenRouter by default)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API base URL
    pub base_url: String,
    /// API key (usually from `OPENAI_API_KEY`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model: "microsoft/mai-ds-r1:free".to_string(),
            temperature: 0.2,
            timeout_secs: 300,
            max_retries: 3,
        }
    }
}

/// GitHub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL
    pub api_base: String,
    /// Raw content base URL
    pub raw_base: String,
    /// Personal access token
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            token: None,
            timeout_secs: 60,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}
