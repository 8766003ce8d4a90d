//! Retrieve, build the prompt, generate

use serde::Serialize;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::index::VectorStore;
use crate::providers::{EmbeddingProvider, LlmProvider};

use super::prompt::PromptBuilder;

/// Answer with the documents it was grounded on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    /// Distinct document ids, in retrieval order
    pub sources: Vec<String>,
}

/// Retrieval-augmented generation over the vector store
pub struct RagPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    llm: Arc<dyn LlmProvider>,
}

impl RagPipeline {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            store,
            embedder,
            llm,
        }
    }

    /// Answer `query` from the `k` closest chunks
    pub async fn run(&self, query: &str, k: usize) -> Result<RagAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::BadRequest("query must not be empty".to_string()));
        }
        if k == 0 {
            return Err(Error::BadRequest("top_k must be positive".to_string()));
        }

        tracing::info!("Querying docs (k={})", k);
        let embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(&embedding, k)?;
        if hits.is_empty() {
            tracing::warn!("No indexed content matched; answering without context");
        }

        let context = PromptBuilder::build_context(&hits);
        let messages = PromptBuilder::build_messages(&context, query);

        tracing::info!("Asking {} ({})", self.llm.name(), self.llm.model());
        let answer = self.llm.chat(&messages).await?;

        let mut sources: Vec<String> = Vec::new();
        for hit in hits {
            if !sources.contains(&hit.doc_id) {
                sources.push(hit.doc_id);
            }
        }

        Ok(RagAnswer {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::WordChunker;
    use crate::testing::{FailingEmbedder, LetterEmbedder, ScriptedLlm};

    async fn seeded_store() -> Arc<VectorStore> {
        let store = Arc::new(VectorStore::in_memory());
        let chunker = WordChunker::new(3, 1).unwrap();
        for (doc_id, text) in [
            ("events.md", "events trigger workflows events"),
            ("events-more.md", "events events trigger"),
            ("zzz.md", "zzz zap zoom"),
        ] {
            store.upsert(doc_id, text, &LetterEmbedder, &chunker).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_run_returns_trimmed_answer_and_sources() {
        let store = seeded_store().await;
        let llm = Arc::new(ScriptedLlm::new("\n  Events trigger workflows.  \n"));
        let pipeline = RagPipeline::new(store, Arc::new(LetterEmbedder), llm.clone());

        let answer = pipeline.run("events trigger", 6).await.unwrap();

        assert_eq!(answer.answer, "Events trigger workflows.");
        assert_eq!(answer.sources.len(), 3);
        assert_eq!(answer.sources.last().map(String::as_str), Some("zzz.md"));

        let seen = llm.seen.lock();
        let prompt = &seen[0][1].content;
        assert!(prompt.starts_with("Context:\n[1] "));
        assert!(prompt.ends_with("Question: events trigger\nAnswer:"));
    }

    #[tokio::test]
    async fn test_sources_are_distinct() {
        let store = Arc::new(VectorStore::in_memory());
        let chunker = WordChunker::new(2, 0).unwrap();
        store
            .upsert("long.md", "alpha beta alpha beta alpha beta", &LetterEmbedder, &chunker)
            .await
            .unwrap();

        let pipeline = RagPipeline::new(store, Arc::new(LetterEmbedder), Arc::new(ScriptedLlm::new("ok")));
        let answer = pipeline.run("alpha beta", 5).await.unwrap();
        assert_eq!(answer.sources, vec!["long.md"]);
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected() {
        let pipeline = RagPipeline::new(
            Arc::new(VectorStore::in_memory()),
            Arc::new(LetterEmbedder),
            Arc::new(ScriptedLlm::new("unused")),
        );
        assert!(matches!(pipeline.run("   ", 5).await, Err(Error::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces() {
        let pipeline = RagPipeline::new(
            Arc::new(VectorStore::in_memory()),
            Arc::new(FailingEmbedder),
            Arc::new(ScriptedLlm::new("unused")),
        );
        assert!(matches!(pipeline.run("hello", 5).await, Err(Error::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_store_still_answers() {
        let pipeline = RagPipeline::new(
            Arc::new(VectorStore::in_memory()),
            Arc::new(LetterEmbedder),
            Arc::new(ScriptedLlm::new("I don't know.")),
        );
        let answer = pipeline.run("anything", 5).await.unwrap();
        assert_eq!(answer.answer, "I don't know.");
        assert!(answer.sources.is_empty());
    }
}
