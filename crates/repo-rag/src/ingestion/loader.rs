//! Loading documents from the local filesystem

use std::path::{Path, PathBuf};
use std::process::Command;
use walkdir::WalkDir;

use crate::error::{Error, Result};

use super::extractor::{extension_of, Extractor};

/// A loaded document: `(path, text)`
pub type LoadedDocument = (String, String);

/// Loads text from files whose extension is in an allow-list
pub struct DocumentLoader {
    extractor: Extractor,
    allowed_extensions: Vec<String>,
}

impl DocumentLoader {
    /// Create a new loader. Extensions are compared case-insensitively, without dots.
    pub fn new(extractor: Extractor, allowed_extensions: &[String]) -> Self {
        Self {
            extractor,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    fn is_allowed(&self, path: &Path) -> bool {
        let ext = extension_of(&path.to_string_lossy());
        !ext.is_empty() && self.allowed_extensions.iter().any(|a| *a == ext)
    }

    /// Recursively load every allowed file under `dir`.
    ///
    /// Unreadable or unextractable files are logged and skipped.
    pub fn load_dir(&self, dir: &Path) -> Vec<LoadedDocument> {
        let mut docs = Vec::new();

        for entry in WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if !self.is_allowed(path) {
                continue;
            }

            match self.load_path(path) {
                Ok(Some(doc)) => docs.push(doc),
                Ok(None) => tracing::debug!("No text in {}", path.display()),
                Err(e) => tracing::warn!("Failed to read {}: {}", path.display(), e),
            }
        }

        tracing::info!("Loaded {} documents from {}", docs.len(), dir.display());
        docs
    }

    /// Load a single file if its extension is allowed
    pub fn load_file(&self, path: &Path) -> Vec<LoadedDocument> {
        if !path.is_file() || !self.is_allowed(path) {
            tracing::warn!("Skipping {} (missing or extension not allowed)", path.display());
            return Vec::new();
        }

        match self.load_path(path) {
            Ok(Some(doc)) => vec![doc],
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn load_path(&self, path: &Path) -> Result<Option<LoadedDocument>> {
        let data = std::fs::read(path)?;
        let name = path.to_string_lossy().to_string();
        Ok(self
            .extractor
            .extract(&name, &data)?
            .map(|text| (name, text)))
    }
}

/// Repository directory name from its URL (`.../name.git` -> `name`)
pub fn repo_dir_name(repo_url: &str) -> Result<String> {
    let name = repo_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim_end_matches(".git");

    if name.is_empty() {
        return Err(Error::InvalidRepoUrl(repo_url.to_string()));
    }
    Ok(name.to_string())
}

/// Shallow-clone a repository branch into `save_dir/<repo name>`, replacing any
/// existing checkout. Returns the checkout path.
pub fn clone_repo(repo_url: &str, branch: &str, save_dir: &Path) -> Result<PathBuf> {
    let local_path = save_dir.join(repo_dir_name(repo_url)?);

    if local_path.exists() {
        std::fs::remove_dir_all(&local_path)?;
    }
    std::fs::create_dir_all(save_dir)?;

    tracing::info!("Cloning {} ({}) -> {}", repo_url, branch, local_path.display());

    let output = Command::new("git")
        .args(["clone", "--depth", "1", "--branch", branch, repo_url])
        .arg(&local_path)
        .output()
        .map_err(|e| Error::Internal(format!("Failed to run git: {}", e)))?;

    if !output.status.success() {
        return Err(Error::Internal(format!(
            "git clone failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(local_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader() -> DocumentLoader {
        let allowed: Vec<String> = ["md", ".TXT", "json"].iter().map(|s| s.to_string()).collect();
        DocumentLoader::new(Extractor::default(), &allowed)
    }

    #[test]
    fn test_load_dir_filters_extensions_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("docs/guide");
        std::fs::create_dir_all(&nested).unwrap();

        std::fs::write(dir.path().join("README.md"), "Intro text").unwrap();
        std::fs::write(nested.join("notes.TXT"), "Nested notes").unwrap();
        std::fs::write(nested.join("empty.md"), "   ").unwrap();
        std::fs::write(nested.join("main.rs"), "fn main() {}").unwrap();

        let mut docs = loader().load_dir(dir.path());
        docs.sort();

        assert_eq!(docs.len(), 2);
        assert!(docs[0].0.ends_with("README.md"));
        assert_eq!(docs[0].1, "Intro text");
        assert!(docs[1].0.ends_with("notes.TXT"));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let docs = loader().load_file(&path);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].1, r#"{"a": 1}"#);

        assert!(loader().load_file(&dir.path().join("missing.md")).is_empty());
    }

    #[test]
    fn test_repo_dir_name() {
        assert_eq!(repo_dir_name("https://github.com/org/docs.git").unwrap(), "docs");
        assert_eq!(repo_dir_name("https://github.com/org/docs/").unwrap(), "docs");
        assert!(repo_dir_name("").is_err());
    }
}
