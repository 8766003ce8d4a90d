//! Persistent document store: chunk text, content hashes and the vector index

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::ingestion::{extension_of, LoadedDocument, WordChunker};
use crate::providers::EmbeddingProvider;

use super::flat::FlatIndex;

const INDEX_FILE: &str = "index.bin";
const METADATA_FILE: &str = "metadata.json";

/// Everything stored for one ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub content_hash: String,
    pub content: String,
    pub chunks: Vec<String>,
    /// Index ids, parallel to `chunks`
    pub vector_ids: Vec<u64>,
    pub file_type: String,
    pub ingested_at: DateTime<Utc>,
}

/// Lightweight listing entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub file_type: String,
    pub chunks: usize,
    pub content_hash: String,
    pub ingested_at: DateTime<Utc>,
}

impl From<&DocumentRecord> for DocumentInfo {
    fn from(record: &DocumentRecord) -> Self {
        Self {
            doc_id: record.doc_id.clone(),
            file_type: record.file_type.clone(),
            chunks: record.chunks.len(),
            content_hash: record.content_hash.clone(),
            ingested_at: record.ingested_at,
        }
    }
}

/// A retrieved chunk
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub chunk: String,
    pub chunk_index: usize,
    /// Squared L2 distance, lower is closer
    pub distance: f32,
}

/// What happened to a document on upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added { chunks: usize },
    Updated { chunks: usize },
    Unchanged,
    /// No text to index; any previous version was removed
    Empty,
}

/// Counters for a batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub empty: usize,
    pub failed: usize,
    pub chunks: usize,
}

impl IngestSummary {
    /// Count one outcome
    pub fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Added { chunks } => {
                self.added += 1;
                self.chunks += chunks;
            }
            UpsertOutcome::Updated { chunks } => {
                self.updated += 1;
                self.chunks += chunks;
            }
            UpsertOutcome::Unchanged => self.unchanged += 1,
            UpsertOutcome::Empty => self.empty += 1,
        }
    }

    /// Documents that ended up indexed, new or not
    pub fn indexed(&self) -> usize {
        self.added + self.updated + self.unchanged
    }
}

#[derive(Default)]
struct Inner {
    index: FlatIndex,
    documents: HashMap<String, DocumentRecord>,
    /// vector id -> (doc id, chunk index)
    doc_by_vector: HashMap<u64, (String, usize)>,
    /// Changed since the last flush
    dirty: bool,
}

impl Inner {
    fn from_parts(index: FlatIndex, records: Vec<DocumentRecord>) -> Self {
        let mut inner = Self {
            index,
            ..Self::default()
        };
        for record in records {
            inner.track(&record);
            inner.documents.insert(record.doc_id.clone(), record);
        }
        inner
    }

    fn track(&mut self, record: &DocumentRecord) {
        for (chunk_index, id) in record.vector_ids.iter().enumerate() {
            self.doc_by_vector
                .insert(*id, (record.doc_id.clone(), chunk_index));
        }
    }

    fn remove(&mut self, doc_id: &str) -> bool {
        let Some(record) = self.documents.remove(doc_id) else {
            return false;
        };
        self.index.remove(&record.vector_ids);
        for id in &record.vector_ids {
            self.doc_by_vector.remove(id);
        }
        self.dirty = true;
        true
    }
}

/// Encoded store files, ready to be written
struct Snapshot {
    index: Vec<u8>,
    metadata: Vec<u8>,
}

impl Snapshot {
    fn encode(inner: &Inner) -> Result<Self> {
        let index = bincode::serde::encode_to_vec(&inner.index, bincode::config::standard())
            .map_err(|e| Error::index(format!("Failed to encode vector index: {}", e)))?;

        let mut records: Vec<&DocumentRecord> = inner.documents.values().collect();
        records.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        let metadata = serde_json::to_vec(&records)?;

        Ok(Self { index, metadata })
    }

    fn write(&self, dir: &Path) -> Result<()> {
        write_atomic(&dir.join(INDEX_FILE), &self.index)?;
        write_atomic(&dir.join(METADATA_FILE), &self.metadata)?;
        tracing::debug!(
            "Saved vector store to {} ({} + {} bytes)",
            dir.display(),
            self.index.len(),
            self.metadata.len()
        );
        Ok(())
    }
}

/// Vector store with per-document bookkeeping
///
/// Reads (search, listing) share the lock and mutations take it exclusively.
/// Mutations only touch memory; [`VectorStore::flush`] writes the files off
/// the async runtime.
pub struct VectorStore {
    dir: Option<PathBuf>,
    inner: RwLock<Inner>,
    /// Orders concurrent flushes so an older snapshot never lands last
    save_lock: Mutex<()>,
}

impl VectorStore {
    /// Open the store in `dir`, loading persisted state when present
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let index_path = dir.join(INDEX_FILE);
        let metadata_path = dir.join(METADATA_FILE);

        let inner = if metadata_path.exists() {
            let bytes = std::fs::read(&index_path).map_err(|e| {
                Error::index(format!("Failed to read {}: {}", index_path.display(), e))
            })?;
            let (index, _): (FlatIndex, usize) =
                bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                    .map_err(|e| Error::index(format!("Corrupt vector index: {}", e)))?;
            let records: Vec<DocumentRecord> =
                serde_json::from_slice(&std::fs::read(&metadata_path)?)?;

            tracing::info!(
                "Loaded vector store from {} ({} documents, {} vectors)",
                dir.display(),
                records.len(),
                index.len()
            );
            Inner::from_parts(index, records)
        } else {
            tracing::info!("Creating new vector store in {}", dir.display());
            Inner::default()
        };

        Ok(Self {
            dir: Some(dir),
            inner: RwLock::new(inner),
            save_lock: Mutex::new(()),
        })
    }

    /// Store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            inner: RwLock::new(Inner::default()),
            save_lock: Mutex::new(()),
        }
    }

    /// SHA-256 of the document text, hex encoded
    pub fn content_hash(content: &str) -> String {
        hex::encode(Sha256::digest(content.as_bytes()))
    }

    /// Index `content` under `doc_id`, replacing any previous version
    pub async fn upsert(
        &self,
        doc_id: &str,
        content: &str,
        embedder: &dyn EmbeddingProvider,
        chunker: &WordChunker,
    ) -> Result<UpsertOutcome> {
        let content_hash = Self::content_hash(content);
        let existed = {
            let inner = self.inner.read();
            match inner.documents.get(doc_id) {
                Some(record) if record.content_hash == content_hash => {
                    tracing::debug!("Skipping unchanged document: {}", doc_id);
                    return Ok(UpsertOutcome::Unchanged);
                }
                Some(_) => true,
                None => false,
            }
        };

        let chunks = chunker.chunk(content);
        if chunks.is_empty() {
            if existed {
                self.remove_document(doc_id);
            }
            return Ok(UpsertOutcome::Empty);
        }

        let embeddings = embedder.embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings for {}, got {}",
                chunks.len(),
                doc_id,
                embeddings.len()
            )));
        }

        let mut inner = self.inner.write();
        let replaced = inner.remove(doc_id);
        let vector_ids = inner.index.add(&embeddings)?;
        let record = DocumentRecord {
            doc_id: doc_id.to_string(),
            content_hash,
            content: content.to_string(),
            vector_ids,
            file_type: extension_of(doc_id),
            ingested_at: Utc::now(),
            chunks,
        };
        let chunk_count = record.chunks.len();
        inner.track(&record);
        inner.documents.insert(record.doc_id.clone(), record);
        inner.dirty = true;

        if replaced {
            tracing::info!("Updated {} ({} chunks)", doc_id, chunk_count);
            Ok(UpsertOutcome::Updated {
                chunks: chunk_count,
            })
        } else {
            tracing::info!("Added {} ({} chunks)", doc_id, chunk_count);
            Ok(UpsertOutcome::Added {
                chunks: chunk_count,
            })
        }
    }

    /// Upsert a batch and flush once at the end
    ///
    /// Per-document failures are logged and counted. An embedding or index
    /// failure stops the batch and is returned after saving what was indexed.
    pub async fn upsert_documents(
        &self,
        documents: Vec<LoadedDocument>,
        embedder: &dyn EmbeddingProvider,
        chunker: &WordChunker,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for (doc_id, content) in documents {
            match self.upsert(&doc_id, &content, embedder, chunker).await {
                Ok(outcome) => summary.record(outcome),
                Err(e) if e.halts_ingestion() => {
                    tracing::error!("Stopping batch at {}: {}", doc_id, e);
                    if let Err(save) = self.flush().await {
                        tracing::error!("Failed to save vector store: {}", save);
                    }
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Failed to index {}: {}", doc_id, e);
                    summary.failed += 1;
                }
            }
        }
        self.flush().await?;
        Ok(summary)
    }

    /// Delete a document and its vectors
    pub fn remove_document(&self, doc_id: &str) -> bool {
        let removed = self.inner.write().remove(doc_id);
        if removed {
            tracing::info!("Removed {}", doc_id);
        }
        removed
    }

    /// Delete several documents; returns how many existed
    pub fn remove_documents(&self, doc_ids: &[String]) -> usize {
        let mut inner = self.inner.write();
        let removed = doc_ids.iter().filter(|id| inner.remove(id)).count();
        if removed > 0 {
            tracing::info!("Removed {} documents", removed);
        }
        removed
    }

    /// Nearest chunks to `query_embedding`
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let inner = self.inner.read();
        let hits = inner.index.search(query_embedding, k)?;

        Ok(hits
            .into_iter()
            .filter_map(|(id, distance)| {
                let (doc_id, chunk_index) = inner.doc_by_vector.get(&id)?;
                let record = inner.documents.get(doc_id)?;
                Some(SearchHit {
                    doc_id: doc_id.clone(),
                    chunk: record.chunks.get(*chunk_index)?.clone(),
                    chunk_index: *chunk_index,
                    distance,
                })
            })
            .collect())
    }

    /// Full record for one document
    pub fn get_document(&self, doc_id: &str) -> Option<DocumentRecord> {
        self.inner.read().documents.get(doc_id).cloned()
    }

    /// All documents, sorted by id
    pub fn list_documents(&self) -> Vec<DocumentInfo> {
        let inner = self.inner.read();
        let mut docs: Vec<DocumentInfo> = inner.documents.values().map(DocumentInfo::from).collect();
        docs.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        docs
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.inner.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of indexed vectors
    pub fn vector_count(&self) -> usize {
        self.inner.read().index.len()
    }

    /// Unsaved changes are pending
    pub fn is_dirty(&self) -> bool {
        self.inner.read().dirty
    }

    /// Write pending changes to disk
    ///
    /// Encoding happens under a shared read guard, so searches keep running;
    /// the file writes run on the blocking pool.
    pub async fn flush(&self) -> Result<()> {
        let Some(dir) = self.dir.clone() else {
            return Ok(());
        };
        let _saving = self.save_lock.lock().await;

        let snapshot = {
            let inner = self.inner.upgradable_read();
            if !inner.dirty {
                return Ok(());
            }
            let snapshot = Snapshot::encode(&inner)?;
            RwLockUpgradableReadGuard::upgrade(inner).dirty = false;
            snapshot
        };

        let result = tokio::task::spawn_blocking(move || snapshot.write(&dir))
            .await
            .map_err(|e| Error::internal(format!("Store save task failed: {}", e)))
            .and_then(|written| written);

        if result.is_err() {
            self.inner.write().dirty = true;
        }
        result
    }
}

/// Write via a temp file in the same directory, then rename into place
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, LetterEmbedder};

    fn chunker() -> WordChunker {
        WordChunker::new(4, 1).unwrap()
    }

    #[tokio::test]
    async fn test_add_then_unchanged() {
        let store = VectorStore::in_memory();
        let embedder = LetterEmbedder;

        let first = store
            .upsert("docs/a.md", "alpha beta gamma delta epsilon", &embedder, &chunker())
            .await
            .unwrap();
        assert_eq!(first, UpsertOutcome::Added { chunks: 2 });

        let second = store
            .upsert("docs/a.md", "alpha beta gamma delta epsilon", &embedder, &chunker())
            .await
            .unwrap();
        assert_eq!(second, UpsertOutcome::Unchanged);
        assert_eq!(store.vector_count(), 2);

        let record = store.get_document("docs/a.md").unwrap();
        assert_eq!(record.file_type, "md");
        assert_eq!(record.content_hash, VectorStore::content_hash("alpha beta gamma delta epsilon"));
    }

    #[tokio::test]
    async fn test_update_replaces_vectors() {
        let store = VectorStore::in_memory();
        let embedder = LetterEmbedder;

        store
            .upsert("a.txt", "one two three four five", &embedder, &chunker())
            .await
            .unwrap();
        assert_eq!(store.vector_count(), 2);

        let outcome = store
            .upsert("a.txt", "short text", &embedder, &chunker())
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { chunks: 1 });
        assert_eq!(store.vector_count(), 1);

        let hits = store.search(&embedder.vector("short text"), 5).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk, "short text");
    }

    #[tokio::test]
    async fn test_empty_content_removes_previous_version() {
        let store = VectorStore::in_memory();
        let embedder = LetterEmbedder;

        store.upsert("a.txt", "some words", &embedder, &chunker()).await.unwrap();
        let outcome = store.upsert("a.txt", "   ", &embedder, &chunker()).await.unwrap();

        assert_eq!(outcome, UpsertOutcome::Empty);
        assert!(store.is_empty());
        assert_eq!(store.vector_count(), 0);
    }

    #[tokio::test]
    async fn test_search_returns_closest_document() {
        let store = VectorStore::in_memory();
        let embedder = LetterEmbedder;

        let summary = store
            .upsert_documents(
                vec![
                    ("zebra.md".to_string(), "zzz zebra zoo".to_string()),
                    ("apple.md".to_string(), "apple apricot avocado".to_string()),
                ],
                &embedder,
                &chunker(),
            )
            .await
            .unwrap();
        assert_eq!(summary.added, 2);
        assert_eq!(summary.indexed(), 2);

        let hits = store.search(&embedder.vector("zoo zebra"), 1).unwrap();
        assert_eq!(hits[0].doc_id, "zebra.md");
        assert_eq!(hits[0].chunk, "zzz zebra zoo");
    }

    #[tokio::test]
    async fn test_remove_document() {
        let store = VectorStore::in_memory();
        let embedder = LetterEmbedder;

        store.upsert("a.md", "hello world", &embedder, &chunker()).await.unwrap();
        store.upsert("b.md", "another file", &embedder, &chunker()).await.unwrap();

        assert!(store.remove_document("a.md"));
        assert!(!store.remove_document("a.md"));
        assert_eq!(
            store.remove_documents(&["b.md".to_string(), "missing".to_string()]),
            1
        );
        assert!(store.is_empty());
        assert!(store.search(&embedder.vector("hello"), 3).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = LetterEmbedder;

        {
            let store = VectorStore::open(dir.path()).unwrap();
            store
                .upsert("guide.md", "install the cli first", &embedder, &chunker())
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let reopened = VectorStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.list_documents()[0].doc_id, "guide.md");

        let hits = reopened
            .search(&embedder.vector("install the cli"), 1)
            .unwrap();
        assert_eq!(hits[0].doc_id, "guide.md");

        let outcome = reopened
            .upsert("guide.md", "install the cli first", &embedder, &chunker())
            .await
            .unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_mutations_reach_disk_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();

        store
            .upsert("a.md", "first words here", &LetterEmbedder, &chunker())
            .await
            .unwrap();
        assert!(store.is_dirty());
        assert!(!dir.path().join(METADATA_FILE).exists());

        store.flush().await.unwrap();
        assert!(!store.is_dirty());
        assert_eq!(VectorStore::open(dir.path()).unwrap().len(), 1);

        assert!(store.remove_document("a.md"));
        assert_eq!(VectorStore::open(dir.path()).unwrap().len(), 1);
        store.flush().await.unwrap();
        assert!(VectorStore::open(dir.path()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_flushes_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = VectorStore::open(dir.path()).unwrap();

        let summary = store
            .upsert_documents(
                vec![
                    ("a.md".to_string(), "alpha words".to_string()),
                    ("b.md".to_string(), "beta words".to_string()),
                ],
                &LetterEmbedder,
                &chunker(),
            )
            .await
            .unwrap();

        assert_eq!(summary.added, 2);
        assert!(!store.is_dirty());
        assert_eq!(VectorStore::open(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_embedding_failure_stops_batch() {
        let store = VectorStore::in_memory();
        let err = tokio_test::block_on(store.upsert_documents(
            vec![
                ("a.md".to_string(), "text".to_string()),
                ("b.md".to_string(), "more text".to_string()),
            ],
            &FailingEmbedder,
            &chunker(),
        ))
        .unwrap_err();

        assert!(matches!(err, Error::Embedding(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = IngestSummary::default();
        summary.record(UpsertOutcome::Added { chunks: 3 });
        summary.record(UpsertOutcome::Updated { chunks: 2 });
        summary.record(UpsertOutcome::Unchanged);
        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.chunks, 5);
        assert_eq!(summary.indexed(), 3);
    }
}
