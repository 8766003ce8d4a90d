//! GitHub REST API client for commit, compare, tree and raw-content lookups

use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GitHubConfig;
use crate::error::{Error, Result};

use super::repo::RepoRef;

/// Paths touched between two commits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    /// Added or modified paths, to (re-)ingest
    pub changed: Vec<String>,
    /// Paths that no longer exist at the head commit
    pub deleted: Vec<String>,
}

#[derive(Deserialize)]
struct CommitResponse {
    sha: String,
}

#[derive(Deserialize)]
struct CompareResponse {
    #[serde(default)]
    files: Vec<CompareFile>,
}

#[derive(Deserialize)]
struct CompareFile {
    filename: String,
    status: String,
    #[serde(default)]
    previous_filename: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

/// Thin client over the endpoints the sync needs
pub struct GitHubClient {
    client: Client,
    api_base: String,
    raw_base: String,
    token: RwLock<Option<String>>,
}

impl GitHubClient {
    /// Create a new client
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("repo-rag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            token: RwLock::new(config.token.clone()),
        })
    }

    /// Replace the access token used for subsequent requests
    pub fn set_token(&self, token: Option<String>) {
        *self.token.write() = token.filter(|t| !t.trim().is_empty());
    }

    /// Whether requests are authenticated
    pub fn has_token(&self) -> bool {
        self.token.read().is_some()
    }

    fn get(&self, url: impl reqwest::IntoUrl) -> RequestBuilder {
        let request = self.client.get(url);
        match self.token.read().as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn api_get(&self, url: &str) -> Result<Response> {
        tracing::debug!("GET {}", url);
        let response = self
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
                .unwrap_or(body);
            return Err(Error::github(
                status.as_u16(),
                format!("GET {} failed: {}", url, message),
            ));
        }
        Ok(response)
    }

    /// SHA of the branch head
    pub async fn latest_commit_sha(&self, repo: &RepoRef, branch: &str) -> Result<String> {
        let url = format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_base, repo.owner, repo.repo, branch
        );
        let commit: CommitResponse = self.api_get(&url).await?.json().await?;
        Ok(commit.sha)
    }

    /// Files changed between `base` and `head`
    pub async fn compare(&self, repo: &RepoRef, base: &str, head: &str) -> Result<ChangeSet> {
        let url = format!(
            "{}/repos/{}/{}/compare/{}...{}",
            self.api_base, repo.owner, repo.repo, base, head
        );
        let compare: CompareResponse = self.api_get(&url).await?.json().await?;

        let mut changes = ChangeSet::default();
        for file in compare.files {
            match file.status.as_str() {
                "added" | "modified" | "changed" | "copied" => changes.changed.push(file.filename),
                "removed" => changes.deleted.push(file.filename),
                "renamed" => {
                    if let Some(previous) = file.previous_filename {
                        changes.deleted.push(previous);
                    }
                    changes.changed.push(file.filename);
                }
                other => tracing::debug!("Ignoring {} ({})", file.filename, other),
            }
        }
        Ok(changes)
    }

    /// Every blob path at the branch head
    pub async fn tree_files(&self, repo: &RepoRef, branch: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base, repo.owner, repo.repo, branch
        );
        let tree: TreeResponse = self.api_get(&url).await?.json().await?;
        if tree.truncated {
            tracing::warn!("Tree listing for {} was truncated by GitHub", repo);
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    /// Raw file bytes at `branch`; the status is returned instead of an error
    pub async fn raw_file(&self, repo: &RepoRef, branch: &str, path: &str) -> Result<(u16, Vec<u8>)> {
        let url = self.raw_url(repo, branch, path)?;
        tracing::debug!("GET {}", url);
        let response = self.get(url).send().await?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await?;
        Ok((status, bytes.to_vec()))
    }

    /// Raw-content URL with each path segment percent-encoded
    fn raw_url(&self, repo: &RepoRef, branch: &str, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.raw_base)
            .map_err(|e| Error::Config(format!("Invalid raw base URL {}: {}", self.raw_base, e)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("Raw base URL cannot take a path: {}", self.raw_base)))?
            .pop_if_empty()
            .push(&repo.owner)
            .push(&repo.repo)
            .extend(branch.split('/'))
            .extend(path.split('/'));
        Ok(url)
    }
}
