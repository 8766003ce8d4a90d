//! Repository URL parsing

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// `owner/repo` on GitHub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    /// Parse `https://github.com/owner/repo(.git)(/)`, `git@github.com:owner/repo.git`
    /// or a bare `owner/repo`; the last two path segments are owner and repo
    pub fn parse(url: &str) -> Result<Self> {
        let trimmed = url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

        let path = if let Some((_, after_scheme)) = trimmed.split_once("://") {
            after_scheme.split_once('/').map(|(_, path)| path).unwrap_or("")
        } else if let Some((_, path)) = trimmed.split_once(':') {
            path
        } else {
            trimmed
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [.., owner, repo] => Ok(Self {
                owner: owner.to_string(),
                repo: repo.to_string(),
            }),
            _ => Err(Error::InvalidRepoUrl(url.to_string())),
        }
    }

    /// `owner/repo`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
