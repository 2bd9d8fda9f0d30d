//! # forum-vector
//!
//! An exact (flat) vector index for unit-norm text embeddings, with an
//! integrity-checked on-disk format.
//!
//! ## Features
//!
//! - **Exact search**: every entry is scored, so top-k is the true top-k
//! - **Deterministic**: ties are broken by corpus ordinal
//! - **Read-only after build**: safe to share across concurrent searches
//! - **Validated persistence**: checksums, dimension and norm checks, and a
//!   trusted-directory gate on every load
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forum_vector::{FlatIndex, IndexDescriptor, IndexEntry, TrustedDir};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), forum_vector::Error> {
//!     let index = FlatIndex::build(IndexDescriptor::new("my-model", 384), entries)?;
//!     forum_vector::save_index(&index, "res/forum_index.json").await?;
//!
//!     let trusted = TrustedDir::new("res")?;
//!     let (index, _header) = forum_vector::load_index(&trusted, "forum_index.json").await?;
//!     let hits = index.search(&query, 20)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod distance;
pub mod error;
pub mod index;
pub mod persistence;
pub mod types;

// Re-exports for convenience
pub use distance::normalize;
pub use error::{Error, Result};
pub use index::FlatIndex;
pub use persistence::{load_index, save_index, ArtifactHeader, TrustedDir};
pub use types::{EntryId, IndexDescriptor, IndexEntry, SearchHit};
