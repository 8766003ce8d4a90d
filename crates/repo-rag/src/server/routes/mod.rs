//! API routes for the RAG server

pub mod documents;
pub mod ingest;
pub mod query;
pub mod sync;
pub mod token;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;
use crate::types::MessageResponse;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/ingest", post(ingest::ingest_repo))
        .route("/sync", post(sync::sync_documentation))
        .route("/query", post(query::ask_question))
        .route("/token", post(token::save_token))
        .route(
            "/upload",
            post(upload::upload_file).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/*doc_id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/info", get(info))
}

/// GET / - liveness banner
async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("GS RAG Agent is running!"))
}

/// API info endpoint
async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "repo-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "RAG agent for GitHub repository and file ingestion",
        "endpoints": {
            "POST /ingest": "Sync a GitHub repository into the index",
            "POST /sync": "Re-sync the last ingested repository",
            "POST /query": "Answer a question from the indexed documents",
            "POST /upload": "Upload and ingest a single file",
            "POST /token": "Set the GitHub access token",
            "GET /documents": "List indexed documents",
            "GET /documents/*id": "Get document details",
            "DELETE /documents/*id": "Remove a document from the index"
        }
    }))
}
