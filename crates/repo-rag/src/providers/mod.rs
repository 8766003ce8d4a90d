//! Provider abstractions for embeddings and chat generation

mod embedding;
mod llm;
mod ollama;
mod openai;
mod retry;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, LlmProvider, Role};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use retry::RetryPolicy;

use std::sync::Arc;

use crate::config::{EmbeddingBackend, RagConfig};
use crate::error::Result;

/// Build the configured embedding provider
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
        EmbeddingBackend::Ollama => Arc::new(OllamaClient::new(&config.embeddings)?),
        EmbeddingBackend::OpenAi => Arc::new(OpenAiClient::for_embeddings(
            &config.llm,
            &config.embeddings,
        )?),
    };
    tracing::info!(
        "Embedding provider: {} ({})",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}

/// Build the chat model client
pub fn build_llm(config: &RagConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider = OpenAiClient::for_chat(&config.llm)?;
    tracing::info!("LLM provider: {} ({})", LlmProvider::name(&provider), config.llm.model);
    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_embedder_defaults_to_ollama() {
        let embedder = build_embedder(&RagConfig::default()).unwrap();
        assert_eq!(embedder.name(), "ollama");
        assert_eq!(embedder.model(), "bge-large");
    }

    #[test]
    fn test_build_llm_requires_key() {
        let mut config = RagConfig::default();
        assert!(build_llm(&config).is_err());

        config.llm.api_key = Some("sk-test".to_string());
        let llm = build_llm(&config).unwrap();
        assert_eq!(llm.model(), "microsoft/mai-ds-r1:free");
    }
}
