//! GitHub token endpoint

use axum::{extract::State, Json};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{MessageResponse, TokenRequest};

/// POST /token - Use a personal access token for GitHub requests
pub async fn save_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<MessageResponse>> {
    let token = request.github_token.trim();
    if token.is_empty() {
        return Err(Error::BadRequest("Github_token must not be empty".to_string()));
    }

    state.set_github_token(token.to_string());
    Ok(Json(MessageResponse::new("GitHub token saved")))
}
