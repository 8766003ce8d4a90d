//! Application state for the RAG server

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::github::{GitHubClient, RepoSource, RepoSyncer, SyncReport, SyncStateStore};
use crate::index::{IngestSummary, VectorStore};
use crate::ingestion::{extension_of, DocumentLoader, Extractor, WordChunker};
use crate::providers::{build_embedder, build_llm, EmbeddingProvider, LlmProvider};
use crate::rag::{RagAnswer, RagPipeline};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Chunk vectors and document records
    store: Arc<VectorStore>,
    /// Embedding provider
    embedder: Arc<dyn EmbeddingProvider>,
    /// GitHub API client (token can be replaced at runtime)
    github: Arc<GitHubClient>,
    /// Incremental repository sync
    syncer: RepoSyncer,
    /// Question answering, absent without an LLM key
    pipeline: Option<RagPipeline>,
    /// Local file loading
    loader: DocumentLoader,
    chunker: WordChunker,
    /// Serializes ingest, sync and upload
    ingest_lock: Mutex<()>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Create new application state from configuration
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing RAG application state...");

        let index_dir = config.data.index_dir();
        let store = tokio::task::spawn_blocking(move || VectorStore::open(index_dir))
            .await
            .map_err(|e| Error::internal(format!("Failed to open vector store: {}", e)))??;
        tracing::info!("Vector store initialized ({} documents)", store.len());

        let embedder = build_embedder(&config)?;
        let llm = match build_llm(&config) {
            Ok(llm) => Some(llm),
            Err(e) => {
                tracing::warn!("Query endpoint disabled: {}", e);
                None
            }
        };

        Self::from_parts(config, Arc::new(store), embedder, llm)
    }

    /// Assemble state from already-built components
    pub fn from_parts(
        config: RagConfig,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Option<Arc<dyn LlmProvider>>,
    ) -> Result<Self> {
        let github = Arc::new(GitHubClient::new(&config.github)?);
        let syncer = RepoSyncer::new(
            github.clone(),
            store.clone(),
            embedder.clone(),
            SyncStateStore::from_config(&config.data),
            &config,
        )?;
        let pipeline = llm.map(|llm| RagPipeline::new(store.clone(), embedder.clone(), llm));
        let loader = DocumentLoader::new(
            Extractor::from_config(&config.extraction),
            &config.extraction.allowed_extensions,
        );
        let chunker = WordChunker::from_config(&config.chunking)?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                embedder,
                github,
                syncer,
                pipeline,
                loader,
                chunker,
                ingest_lock: Mutex::new(()),
                ready: RwLock::new(true),
            }),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get vector store
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.inner.store
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Remove a document and save the store
    pub async fn delete_document(&self, doc_id: &str) -> Result<bool> {
        if !self.inner.store.remove_document(doc_id) {
            return Ok(false);
        }
        self.inner.store.flush().await?;
        Ok(true)
    }

    /// Use `token` for subsequent GitHub requests
    pub fn set_github_token(&self, token: String) {
        self.inner.github.set_token(Some(token));
        tracing::info!("GitHub token updated");
    }

    /// Sync a repository and remember it for `/sync`
    pub async fn ingest_repo(&self, repo_url: &str, branch: &str) -> Result<SyncReport> {
        let _guard = self.inner.ingest_lock.lock().await;
        let report = self.inner.syncer.ingest_changed_files(repo_url, branch).await?;
        self.inner.syncer.state().save_source(&RepoSource {
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
        })?;
        Ok(report)
    }

    /// Re-sync the last ingested repository
    pub async fn sync_saved_repo(&self) -> Result<SyncReport> {
        let _guard = self.inner.ingest_lock.lock().await;
        let source = self
            .inner
            .syncer
            .state()
            .load_source()?
            .ok_or(Error::NotIngested)?;
        self.inner
            .syncer
            .ingest_changed_files(&source.repo_url, &source.branch)
            .await
    }

    /// Ingest a local file or directory tree
    pub async fn ingest_path(&self, path: &Path) -> Result<IngestSummary> {
        let _guard = self.inner.ingest_lock.lock().await;
        self.ingest_path_locked(path.to_path_buf()).await
    }

    /// Save an uploaded file under the uploads directory, replacing any
    /// previous copy, then ingest it
    pub async fn ingest_upload(&self, file_name: &str, data: Vec<u8>) -> Result<IngestSummary> {
        let name = sanitize_file_name(file_name)?;
        let ext = extension_of(&name);
        let allowed = self
            .inner
            .config
            .extraction
            .allowed_extensions
            .iter()
            .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(&ext));
        if ext.is_empty() || !allowed {
            return Err(Error::UnsupportedFileType(name));
        }

        let _guard = self.inner.ingest_lock.lock().await;

        let uploads = self.inner.config.data.uploads_dir();
        tokio::fs::create_dir_all(&uploads).await?;
        let target = uploads.join(&name);
        if tokio::fs::try_exists(&target).await? {
            tokio::fs::remove_file(&target).await?;
        }
        tokio::fs::write(&target, &data).await?;
        tracing::info!("Saved upload {} ({} bytes)", target.display(), data.len());

        self.ingest_path_locked(target).await
    }

    async fn ingest_path_locked(&self, path: PathBuf) -> Result<IngestSummary> {
        if !path.exists() {
            return Err(Error::DocumentNotFound(path.display().to_string()));
        }

        let inner = self.inner.clone();
        let documents = tokio::task::spawn_blocking(move || {
            if path.is_dir() {
                inner.loader.load_dir(&path)
            } else {
                inner.loader.load_file(&path)
            }
        })
        .await
        .map_err(|e| Error::internal(format!("Loader task failed: {}", e)))?;

        self.inner
            .store
            .upsert_documents(documents, self.inner.embedder.as_ref(), &self.inner.chunker)
            .await
    }

    /// Answer a question; `top_k` defaults to the configured depth
    pub async fn query(&self, query: &str, top_k: Option<usize>) -> Result<RagAnswer> {
        let pipeline = self
            .inner
            .pipeline
            .as_ref()
            .ok_or_else(|| Error::llm("No LLM configured; set OPENAI_API_KEY"))?;
        let k = top_k.unwrap_or(self.inner.config.retrieval.top_k);
        pipeline.run(query, k).await
    }
}

/// Keep only the final path component of an uploaded file name
fn sanitize_file_name(file_name: &str) -> Result<String> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::BadRequest(format!("Invalid file name: {:?}", file_name)));
    }
    Ok(name.to_string())
}
