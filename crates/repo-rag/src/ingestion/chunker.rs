//! Overlapping word-window chunking

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};

/// Splits text into windows of `max_words` words, consecutive windows sharing
/// `overlap_words` words.
#[derive(Debug, Clone, Copy)]
pub struct WordChunker {
    max_words: usize,
    overlap_words: usize,
}

impl WordChunker {
    /// Create a new chunker. The overlap must be smaller than the window.
    pub fn new(max_words: usize, overlap_words: usize) -> Result<Self> {
        if max_words == 0 || overlap_words >= max_words {
            return Err(Error::Config(format!(
                "invalid chunk window: max_words={} overlap_words={}",
                max_words, overlap_words
            )));
        }
        Ok(Self {
            max_words,
            overlap_words,
        })
    }

    /// Create from configuration
    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_words, config.overlap_words)
    }

    /// Window step
    fn stride(&self) -> usize {
        self.max_words - self.overlap_words
    }

    /// Chunk text. Whitespace runs (including newlines) collapse to a single space.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::with_capacity(words.len() / self.stride() + 1);

        let mut start = 0;
        while start < words.len() {
            let end = (start + self.max_words).min(words.len());
            chunks.push(words[start..end].join(" "));
            start += self.stride();
        }

        chunks
    }
}

impl Default for WordChunker {
    fn default() -> Self {
        Self {
            max_words: 500,
            overlap_words: 100,
        }
    }
}

/// Convenience wrapper around [`WordChunker`]
pub fn chunk_text(text: &str, max_words: usize, overlap_words: usize) -> Result<Vec<String>> {
    Ok(WordChunker::new(max_words, overlap_words)?.chunk(text))
}
