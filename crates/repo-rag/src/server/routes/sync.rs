//! Re-sync endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::SyncResponse;

/// POST /sync - Pull changes for the last ingested repository
pub async fn sync_documentation(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    let report = state.sync_saved_repo().await?;

    Ok(Json(SyncResponse {
        message: "Synced successfully".to_string(),
        report,
    }))
}
