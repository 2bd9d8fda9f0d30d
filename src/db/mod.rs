//! Vector indexes.
//!
//! - `local` - exact flat index loaded from a checksummed artifact (default)
//! - `qdrant` - remote Qdrant collection over gRPC (feature `qdrant`)
//!
//! Select the backend in the `[index]` section of `forum-rag.toml`.

#![allow(missing_docs)]

pub mod local_index;
#[cfg(feature = "qdrant")]
pub mod qdrant;
pub mod vectorstore;

// Re-exports
pub use local_index::LocalIndex;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantIndex;
pub use vectorstore::VectorIndex;
