//! Document ingestion: text extraction, OCR and chunking

mod chunker;
mod extractor;
mod loader;
mod ocr;

pub use chunker::{chunk_text, WordChunker};
pub use extractor::{decode_text, extension_of, Extractor, FileKind};
pub use loader::{clone_repo, repo_dir_name, DocumentLoader, LoadedDocument};
pub use ocr::OcrEngine;
