//! Document listing endpoints

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::{Error, Result};
use crate::index::DocumentInfo;
use crate::server::state::AppState;
use crate::types::{DocumentListResponse, MessageResponse};

/// GET /documents - List all indexed documents
pub async fn list_documents(State(state): State<AppState>) -> Json<DocumentListResponse> {
    let documents = state.store().list_documents();
    let total = documents.len();
    Json(DocumentListResponse { documents, total })
}

/// GET /documents/*doc_id - Get one document
pub async fn get_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<DocumentInfo>> {
    let record = state
        .store()
        .get_document(&doc_id)
        .ok_or_else(|| Error::DocumentNotFound(doc_id.clone()))?;
    Ok(Json(DocumentInfo::from(&record)))
}

/// DELETE /documents/*doc_id - Remove a document and its vectors
pub async fn delete_document(
    State(state): State<AppState>,
    Path(doc_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    if !state.delete_document(&doc_id).await? {
        return Err(Error::DocumentNotFound(doc_id));
    }
    tracing::info!("Deleted document '{}'", doc_id);
    Ok(Json(MessageResponse::new(format!("Document '{}' deleted", doc_id))))
}
