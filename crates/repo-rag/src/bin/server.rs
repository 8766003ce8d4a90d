//! RAG Server binary
//!
//! Run with: cargo run -p repo-rag --bin repo-rag-server
//! Set `REPO_RAG_CONFIG` to load a TOML configuration file.

use repo_rag::{
    config::{EmbeddingBackend, RagConfig},
    providers::OllamaClient,
    server::RagServer,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repo_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                       GS RAG Agent                        ║
║        Repository Documentation Q&A with Live Sync        ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let config_path = std::env::var_os("REPO_RAG_CONFIG").map(PathBuf::from);
    let config = RagConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Data directory: {}", config.data.data_dir.display());
    tracing::info!("  - Embedding model: {} ({:?})", config.embeddings.model, config.embeddings.backend);
    tracing::info!("  - LLM model: {} at {}", config.llm.model, config.llm.base_url);
    tracing::info!(
        "  - Chunking: {} words, {} overlap",
        config.chunking.max_words,
        config.chunking.overlap_words
    );

    if config.embeddings.backend == EmbeddingBackend::Ollama {
        tracing::info!("Checking Ollama at {}...", config.embeddings.base_url);
        let ollama = OllamaClient::new(&config.embeddings)?;
        if ollama.health_check().await? {
            tracing::info!("Ollama is running");
        } else {
            tracing::warn!("Ollama not available at {}", config.embeddings.base_url);
            tracing::warn!("  Start it with `ollama serve` and pull the model: ollama pull {}", config.embeddings.model);
        }
    }

    let server = RagServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("\nEndpoints:");
    println!("  POST /ingest    - Sync a GitHub repository");
    println!("  POST /sync      - Re-sync the last repository");
    println!("  POST /query     - Ask questions");
    println!("  POST /upload    - Upload a single file");
    println!("  POST /token     - Set a GitHub token");
    println!("  GET  /documents - List documents");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
