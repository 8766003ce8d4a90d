//! Query endpoint

use axum::{extract::State, Json};
use std::time::Instant;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /query - Answer a question from the indexed documents
pub async fn ask_question(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let start = Instant::now();
    tracing::info!("Query: \"{}\"", request.query);

    let result = state.query(&request.query, request.top_k).await?;

    tracing::info!(
        "Answered in {}ms from {} sources",
        start.elapsed().as_millis(),
        result.sources.len()
    );

    Ok(Json(QueryResponse {
        answer: result.answer,
        sources: result.sources,
    }))
}
