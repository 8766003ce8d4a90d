//! Incremental repository sync: ingest only what changed since the last commit

use serde::Serialize;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::index::{IngestSummary, VectorStore};
use crate::ingestion::{extension_of, Extractor, FileKind, WordChunker};
use crate::providers::EmbeddingProvider;

use super::client::{ChangeSet, GitHubClient};
use super::repo::RepoRef;
use super::state::{SyncState, SyncStateStore};

/// Result of one sync run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// `owner/repo`
    pub repo: String,
    /// Head commit that was synced
    pub commit: String,
    /// Nothing to do: the head commit was already ingested
    pub up_to_date: bool,
    pub files_changed: usize,
    pub files_deleted: usize,
    /// Images and binary files
    pub files_skipped: usize,
    #[serde(flatten)]
    pub summary: IngestSummary,
}

/// Pulls changed files from GitHub into the vector store
pub struct RepoSyncer {
    client: Arc<GitHubClient>,
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: WordChunker,
    extractor: Extractor,
    skipped_extensions: Vec<String>,
    state: SyncStateStore,
}

impl RepoSyncer {
    pub fn new(
        client: Arc<GitHubClient>,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        state: SyncStateStore,
        config: &RagConfig,
    ) -> Result<Self> {
        Ok(Self {
            client,
            store,
            embedder,
            chunker: WordChunker::from_config(&config.chunking)?,
            extractor: Extractor::from_config(&config.extraction),
            skipped_extensions: config
                .extraction
                .skipped_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            state,
        })
    }

    /// Sync bookkeeping files
    pub fn state(&self) -> &SyncStateStore {
        &self.state
    }

    /// Bring the store up to date with `branch` of `repo_url`
    ///
    /// The first sync of a repository ingests the whole tree; later syncs use
    /// the compare API between the stored commit and the branch head.
    pub async fn ingest_changed_files(&self, repo_url: &str, branch: &str) -> Result<SyncReport> {
        let repo = RepoRef::parse(repo_url)?;
        let slug = repo.slug();
        let latest = self.client.latest_commit_sha(&repo, branch).await?;

        let previous = self.state.load_commit()?.filter(|s| s.repo == slug);
        let mut report = SyncReport {
            repo: slug.clone(),
            commit: latest.clone(),
            ..SyncReport::default()
        };

        let changes = match previous {
            Some(state) if state.commit == latest => {
                tracing::info!("No new commit for {} ({}); skipping ingestion", slug, latest);
                report.up_to_date = true;
                return Ok(report);
            }
            Some(state) => {
                tracing::info!("Syncing {} from {} to {}", slug, state.commit, latest);
                self.client.compare(&repo, &state.commit, &latest).await?
            }
            None => {
                tracing::info!("First sync of {} at {}; ingesting full tree", slug, latest);
                ChangeSet {
                    changed: self.client.tree_files(&repo, branch).await?,
                    deleted: Vec::new(),
                }
            }
        };

        report.files_changed = changes.changed.len();
        report.files_deleted = changes.deleted.len();

        if !changes.deleted.is_empty() {
            for path in &changes.deleted {
                tracing::info!("Removing deleted file from index: {}", path);
            }
            self.store.remove_documents(&changes.deleted);
        }

        for path in &changes.changed {
            if self.is_skipped(path) {
                tracing::debug!("Skipping image: {}", path);
                report.files_skipped += 1;
                continue;
            }

            match self.ingest_path(&repo, branch, path).await {
                Ok(Some(outcome)) => report.summary.record(outcome),
                Ok(None) => report.files_skipped += 1,
                Err(e) if e.halts_ingestion() => {
                    tracing::error!(
                        "Sync of {} stopped at {}: {}; commit {} not recorded",
                        slug,
                        path,
                        e,
                        latest
                    );
                    if let Err(save) = self.store.flush().await {
                        tracing::error!("Failed to save vector store: {}", save);
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", path, e);
                    report.summary.failed += 1;
                }
            }
        }

        self.store.flush().await?;
        self.state.save_commit(&SyncState {
            repo: slug,
            commit: latest,
        })?;

        tracing::info!(
            "Sync of {} complete: {} added, {} updated, {} unchanged, {} failed, {} deleted",
            report.repo,
            report.summary.added,
            report.summary.updated,
            report.summary.unchanged,
            report.summary.failed,
            report.files_deleted
        );
        Ok(report)
    }

    fn is_skipped(&self, path: &str) -> bool {
        let ext = extension_of(path);
        self.skipped_extensions.iter().any(|s| *s == ext)
    }

    /// `Ok(None)` when the file is binary
    async fn ingest_path(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<Option<crate::index::UpsertOutcome>> {
        let (status, bytes) = self.client.raw_file(repo, branch, path).await?;
        if status != 200 {
            return Err(Error::github(
                status,
                format!("Failed to fetch content for {}", path),
            ));
        }

        if FileKind::detect(path, &bytes) == FileKind::Binary {
            tracing::debug!("Skipping binary file: {}", path);
            return Ok(None);
        }

        let extractor = self.extractor.clone();
        let name = path.to_string();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&name, &bytes))
            .await
            .map_err(|e| Error::internal(format!("Extraction task failed: {}", e)))??
            .ok_or_else(|| Error::extraction(path, "no text content"))?;

        tracing::info!("Re-ingesting file: {}", path);
        let outcome = self
            .store
            .upsert(path, &text, self.embedder.as_ref(), &self.chunker)
            .await?;
        Ok(Some(outcome))
    }
}
