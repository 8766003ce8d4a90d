//! Request bodies

use serde::{Deserialize, Serialize};

fn default_branch() -> String {
    "main".to_string()
}

/// Repository to ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoInput {
    pub repo_url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

/// Question for the RAG pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    /// Overrides the configured retrieval depth
    #[serde(default)]
    pub top_k: Option<usize>,
}

/// GitHub access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    #[serde(rename = "Github_token")]
    pub github_token: String,
}
