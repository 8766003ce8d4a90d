//! Repository ingestion endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::{RepoInput, SyncResponse};

/// POST /ingest - Sync a GitHub repository into the index
pub async fn ingest_repo(
    State(state): State<AppState>,
    Json(input): Json<RepoInput>,
) -> Result<Json<SyncResponse>> {
    tracing::info!("Ingest requested: {} ({})", input.repo_url, input.branch);

    let report = state.ingest_repo(&input.repo_url, &input.branch).await?;

    Ok(Json(SyncResponse {
        message: "Repo ingested successfully".to_string(),
        report,
    }))
}
