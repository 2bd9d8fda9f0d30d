//! Persistence layer for forum-vector.
//!
//! An index is saved as a single JSON artifact:
//!
//! ```text
//! {
//!   "header":  { format_version, embedding_model, tokenizer_sha256,
//!                dimensions, chunk_count, checksum, built_at },
//!   "entries": [ { id, ordinal, byte_offset, text, vector }, ... ]
//! }
//! ```
//!
//! Loading goes through [`TrustedDir`]: an artifact can only be read from
//! inside a directory the operator configured, and every structural property
//! (count, dimensions, unit norms, unique ids, checksum) is verified before
//! the index is handed out. Nothing in the artifact is ever executed.

use crate::error::{Error, Result};
use crate::index::FlatIndex;
use crate::types::{IndexDescriptor, IndexEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Current artifact format version.
pub const FORMAT_VERSION: u32 = 1;

/// Artifact header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    /// Artifact format version.
    pub format_version: u32,
    /// Embedding model, tokenizer digest and dimensions.
    #[serde(flatten)]
    pub descriptor: IndexDescriptor,
    /// Number of entries.
    pub chunk_count: usize,
    /// Hex sha256 over all entries.
    pub checksum: String,
    /// When the artifact was written.
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    header: ArtifactHeader,
    entries: Vec<IndexEntry>,
}

/// A directory from which index artifacts may be loaded.
#[derive(Debug, Clone)]
pub struct TrustedDir {
    root: PathBuf,
}

impl TrustedDir {
    /// Designate `dir` as trusted. The directory must exist.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let root = std::fs::canonicalize(dir).map_err(|_| Error::NotFound(dir.to_path_buf()))?;
        Ok(Self { root })
    }

    /// Canonical path of the trusted directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` and ensure it lies inside the trusted directory.
    ///
    /// Symlinks and `..` components are resolved first, so neither can be
    /// used to escape the directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let resolved =
            std::fs::canonicalize(&candidate).map_err(|_| Error::NotFound(candidate.clone()))?;
        if !resolved.starts_with(&self.root) {
            return Err(Error::Untrusted(resolved));
        }
        Ok(resolved)
    }
}

/// Compute the artifact checksum over entries in order.
pub fn checksum(entries: &[IndexEntry]) -> String {
    let mut hasher = Sha256::new();
    for entry in entries {
        hasher.update(entry.id.as_bytes());
        hasher.update([0u8]);
        hasher.update((entry.ordinal as u64).to_le_bytes());
        hasher.update(entry.text.as_bytes());
        hasher.update([0u8]);
        for x in &entry.vector {
            hasher.update(x.to_le_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Save an index to `path`.
///
/// The artifact is written to a sibling temporary file and renamed into
/// place, so a crash never leaves a half-written index behind.
pub async fn save_index(index: &FlatIndex, path: impl AsRef<Path>) -> Result<ArtifactHeader> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let header = ArtifactHeader {
        format_version: FORMAT_VERSION,
        descriptor: index.descriptor().clone(),
        chunk_count: index.len(),
        checksum: checksum(index.entries()),
        built_at: Utc::now(),
    };

    let artifact = ArtifactRef {
        header: &header,
        entries: index.entries(),
    };
    let json = serde_json::to_vec(&artifact)
        .map_err(|e| Error::Persistence(format!("Failed to serialize index: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(
        path = %path.display(),
        entries = header.chunk_count,
        dimensions = header.descriptor.dimensions,
        "Saved index"
    );
    Ok(header)
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    header: &'a ArtifactHeader,
    entries: &'a [IndexEntry],
}

/// Load and validate an index from inside a trusted directory.
pub async fn load_index(
    trusted: &TrustedDir,
    path: impl AsRef<Path>,
) -> Result<(FlatIndex, ArtifactHeader)> {
    let resolved = trusted.resolve(path)?;
    let bytes = tokio::fs::read(&resolved).await?;
    let artifact: Artifact = serde_json::from_slice(&bytes)
        .map_err(|e| Error::Integrity(format!("Failed to parse index artifact: {}", e)))?;

    let header = artifact.header;
    if header.format_version != FORMAT_VERSION {
        return Err(Error::Persistence(format!(
            "Unsupported index format version {} (expected {})",
            header.format_version, FORMAT_VERSION
        )));
    }
    if header.chunk_count != artifact.entries.len() {
        return Err(Error::Integrity(format!(
            "header declares {} chunks but artifact holds {}",
            header.chunk_count,
            artifact.entries.len()
        )));
    }
    let actual = checksum(&artifact.entries);
    if actual != header.checksum {
        return Err(Error::Integrity(format!(
            "checksum mismatch: header {}, computed {}",
            header.checksum, actual
        )));
    }
    debug!(path = %resolved.display(), "Index checksum verified");

    let index = FlatIndex::build(header.descriptor.clone(), artifact.entries).map_err(|e| {
        match e {
            Error::DimensionMismatch { .. } | Error::InvalidVector(_) | Error::DuplicateId(_) => {
                Error::Integrity(e.to_string())
            }
            other => other,
        }
    })?;

    info!(
        path = %resolved.display(),
        entries = index.len(),
        dimensions = index.dimensions(),
        model = %header.descriptor.embedding_model,
        "Loaded index"
    );
    Ok((index, header))
}
