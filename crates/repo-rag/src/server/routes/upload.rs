//! Single-file upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::MessageResponse;

/// POST /upload - Save a file under the uploads directory and ingest it
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<MessageResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::BadRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| Error::BadRequest("Uploaded file has no name".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::BadRequest(format!("Failed to read file: {}", e)))?;

        tracing::info!("Processing upload: {} ({} bytes)", filename, data.len());
        let summary = state.ingest_upload(&filename, data.to_vec()).await?;
        if summary.indexed() == 0 {
            return Err(Error::extraction(filename, "no text could be indexed"));
        }

        return Ok(Json(MessageResponse::new(format!(
            "File '{}' saved and ingested successfully.",
            filename
        ))));
    }

    Err(Error::BadRequest("Missing multipart field 'file'".to_string()))
}
