//! Exact token counting with the embedding model's own tokenizer.
//!
//! Chunk sizes and the context budget are both measured in tokens of the
//! embedding model. A generic word or character count would let chunks
//! overflow the model's input window and get silently truncated.

use crate::types::{AppError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokenizers::Tokenizer;

/// Counts tokens and reports where each token sits in the input.
pub trait TokenCounter: Send + Sync {
    /// Number of tokens in `text`, excluding special tokens.
    fn count(&self, text: &str) -> Result<usize>;

    /// Byte range of every token in `text`, in order.
    fn offsets(&self, text: &str) -> Result<Vec<(usize, usize)>>;

    /// Hex sha256 of the tokenizer definition, if known.
    fn digest(&self) -> Option<&str> {
        None
    }
}

/// A HuggingFace `tokenizer.json` loaded through the `tokenizers` crate.
pub struct HfTokenizer {
    inner: Tokenizer,
    digest: String,
    max_length: Option<usize>,
    special_tokens: usize,
}

impl HfTokenizer {
    /// Load a tokenizer definition from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::Chunking(format!(
                "Tokenizer unavailable at {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Load a tokenizer from its JSON definition.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut inner = Tokenizer::from_bytes(bytes)
            .map_err(|e| AppError::Chunking(format!("Failed to parse tokenizer: {}", e)))?;

        let max_length = inner.get_truncation().map(|t| t.max_length);
        // Counting must see every token, so truncation and padding are disabled
        inner
            .with_truncation(None)
            .map_err(|e| AppError::Chunking(format!("Failed to configure tokenizer: {}", e)))?;
        inner.with_padding(None);

        let with_special = inner
            .encode("", true)
            .map_err(|e| AppError::Chunking(format!("Tokenizer failed: {}", e)))?
            .len();

        Ok(Self {
            inner,
            digest: hex::encode(Sha256::digest(bytes)),
            max_length,
            special_tokens: with_special,
        })
    }

    /// Maximum sequence length declared by the tokenizer, if any.
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Number of special tokens the model adds around every input.
    pub fn special_tokens(&self) -> usize {
        self.special_tokens
    }

    /// Ensure chunks of `chunk_size` tokens fit the model's input window.
    pub fn check_chunk_size(&self, chunk_size: usize) -> Result<()> {
        if let Some(max) = self.max_length {
            if chunk_size + self.special_tokens > max {
                return Err(AppError::Chunking(format!(
                    "chunk_size_tokens {} plus {} special tokens exceeds the model input length {}",
                    chunk_size, self.special_tokens, max
                )));
            }
        }
        Ok(())
    }

    fn encode(&self, text: &str) -> Result<tokenizers::Encoding> {
        self.inner
            .encode(text, false)
            .map_err(|e| AppError::Chunking(format!("Tokenizer failed: {}", e)))
    }
}

impl TokenCounter for HfTokenizer {
    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.encode(text)?.len())
    }

    fn offsets(&self, text: &str) -> Result<Vec<(usize, usize)>> {
        Ok(self.encode(text)?.get_offsets().to_vec())
    }

    fn digest(&self) -> Option<&str> {
        Some(&self.digest)
    }
}

impl std::fmt::Debug for HfTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfTokenizer")
            .field("digest", &self.digest)
            .field("max_length", &self.max_length)
            .finish()
    }
}
