//! Response bodies

use serde::{Deserialize, Serialize};

use crate::github::SyncReport;
use crate::index::DocumentInfo;

/// Answer to a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Acknowledgement of an ingest or sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: SyncReport,
}

/// Document listing
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentInfo>,
    pub total: usize,
}
