//! Vector index and document store

mod flat;
mod store;

pub use flat::FlatIndex;
pub use store::{
    DocumentInfo, DocumentRecord, IngestSummary, SearchHit, UpsertOutcome, VectorStore,
};

pub(crate) use store::write_atomic;
