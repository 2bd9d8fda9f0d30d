//! Error types for forum-vector.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for forum-vector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, searching, saving or loading an index.
#[derive(Error, Debug)]
pub enum Error {
    /// Dimension mismatch between a vector and the index.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimensions.
        expected: usize,
        /// Actual dimensions provided.
        actual: usize,
    },

    /// Invalid vector (empty, NaN/infinite components, not unit length).
    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    /// Two entries share the same chunk id.
    #[error("Duplicate entry id '{0}'")]
    DuplicateId(String),

    /// The persisted artifact failed a structural or checksum check.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// The artifact lies outside the trusted directory.
    #[error("Refusing to load index from untrusted location {}", .0.display())]
    Untrusted(PathBuf),

    /// The artifact or trusted directory does not exist.
    #[error("Index artifact not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Persistence error (serialization, format version, etc.).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
