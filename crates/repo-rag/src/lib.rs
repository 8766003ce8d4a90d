//! repo-rag: retrieval-augmented Q&A over a GitHub repository's documentation
//!
//! Files are pulled from GitHub (incrementally, by diffing commits) or from the
//! local filesystem, turned into text (PDF pages fall back to OCR when their
//! text layer is sparse), split into overlapping word windows, embedded and
//! stored in a persistent exact-L2 index. Queries retrieve the closest chunks
//! and ask an OpenAI-compatible chat model to answer from them.

pub mod config;
pub mod error;
pub mod github;
pub mod index;
pub mod ingestion;
pub mod providers;
pub mod rag;
pub mod server;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use github::{RepoRef, RepoSyncer, SyncReport};
pub use index::{SearchHit, VectorStore};
pub use rag::{RagAnswer, RagPipeline};
pub use server::{state::AppState, RagServer};
