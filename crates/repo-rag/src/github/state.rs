//! Sync bookkeeping: last ingested commit and the configured repository

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::DataConfig;
use crate::error::Result;
use crate::index::write_atomic;

/// Last commit ingested for a repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// `owner/repo`
    pub repo: String,
    pub commit: String,
}

/// The repository `/sync` re-ingests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoSource {
    pub repo_url: String,
    pub branch: String,
}

/// JSON files holding [`SyncState`] and [`RepoSource`]
#[derive(Debug, Clone)]
pub struct SyncStateStore {
    commit_path: PathBuf,
    source_path: PathBuf,
}

impl SyncStateStore {
    pub fn new(commit_path: impl Into<PathBuf>, source_path: impl Into<PathBuf>) -> Self {
        Self {
            commit_path: commit_path.into(),
            source_path: source_path.into(),
        }
    }

    /// Files under the data directory
    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.commit_state_path(), config.repo_source_path())
    }

    pub fn load_commit(&self) -> Result<Option<SyncState>> {
        load_json(&self.commit_path)
    }

    pub fn save_commit(&self, state: &SyncState) -> Result<()> {
        save_json(&self.commit_path, state)
    }

    pub fn load_source(&self) -> Result<Option<RepoSource>> {
        load_json(&self.source_path)
    }

    pub fn save_source(&self, source: &RepoSource) -> Result<()> {
        save_json(&self.source_path, source)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read(path)?;
    match serde_json::from_slice(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            // An empty `{}` left by an older run counts as no state
            tracing::warn!("Ignoring unreadable {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    write_atomic(path, &serde_json::to_vec_pretty(value)?)
}
