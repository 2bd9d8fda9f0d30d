//! Vector Index Abstraction Layer
//!
//! The serving path only ever needs one operation from an index: the `k`
//! nearest chunks to a query vector, ranked best first. [`VectorIndex`]
//! captures that, with two backends:
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │             VectorIndex Trait            │
//! ├──────────────────────────────────────────┤
//! │   search   │   len   │   dimensions      │
//! └──────────────────────────────────────────┘
//!          ▲                      ▲
//!    ┌─────┴──────┐        ┌──────┴─────┐
//!    │ LocalIndex │        │   Qdrant   │
//!    │ (artifact) │        │  (remote)  │
//!    └────────────┘        └────────────┘
//! ```
//!
//! Thresholding and truncation to `k` are not the index's concern; the
//! retriever applies them uniformly to whatever the backend returns.

use crate::types::{AppError, Chunk, Result, RetrievalResult};
use crate::utils::toml_config::{ForumRagConfig, IndexConfig};
use async_trait::async_trait;
use forum_vector::IndexDescriptor;
use std::sync::Arc;
use tracing::info;

use super::local_index::LocalIndex;
#[cfg(feature = "qdrant")]
use super::qdrant::QdrantIndex;

// ============================================================================
// Vector Index Trait
// ============================================================================

/// Read side of a chunk vector index.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of this backend.
    fn provider_name(&self) -> &'static str;

    /// The `k` nearest chunks to `query`, ordered by descending score with
    /// ties broken by ascending chunk ordinal.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>>;

    /// Number of stored chunks.
    async fn len(&self) -> Result<usize>;

    /// Vector dimensionality.
    fn dimensions(&self) -> usize;

    /// Embedding model the stored vectors were produced with.
    fn embedding_model(&self) -> &str;

    /// Digest of the tokenizer the chunks were cut with, if recorded.
    fn tokenizer_sha256(&self) -> Option<&str> {
        None
    }
}

/// Sort candidates best first, breaking score ties by corpus order.
#[cfg_attr(not(feature = "qdrant"), allow(dead_code))]
pub(crate) fn rank(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk.ordinal.cmp(&b.chunk.ordinal))
    });
}

// ============================================================================
// Provider Factory
// ============================================================================

impl IndexConfig {
    /// Open the configured index for serving.
    ///
    /// Fails if the index was built with a different embedding model than
    /// the one configured for queries.
    pub async fn open_index(&self, config: &ForumRagConfig) -> Result<Arc<dyn VectorIndex>> {
        let expected_model = &config.rag.embedding_model_name;
        match self {
            IndexConfig::Local { path, trusted_dir } => {
                let index = LocalIndex::open(trusted_dir, path).await?;
                if index.embedding_model() != expected_model {
                    return Err(AppError::Index(format!(
                        "Index was built with embedding model '{}' but '{}' is configured",
                        index.embedding_model(),
                        expected_model
                    )));
                }
                Ok(Arc::new(index))
            }
            #[cfg(feature = "qdrant")]
            IndexConfig::Qdrant {
                url,
                collection,
                api_key_env,
            } => {
                let api_key = resolve_key(config, api_key_env.as_deref())?;
                let index = QdrantIndex::connect(
                    url,
                    collection,
                    api_key.as_deref(),
                    expected_model,
                    config.timeouts.search(),
                )
                .await?;
                Ok(Arc::new(index))
            }

            #[cfg(not(feature = "qdrant"))]
            IndexConfig::Qdrant { .. } => Err(qdrant_disabled()),
        }
    }

    /// Publish freshly embedded chunks to the configured index.
    ///
    /// Local indexes are written as a checksummed artifact; Qdrant
    /// collections are recreated and filled. Returns the number of stored
    /// chunks.
    #[cfg_attr(not(feature = "qdrant"), allow(unused_variables))]
    pub async fn publish(
        &self,
        config: &ForumRagConfig,
        descriptor: IndexDescriptor,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<usize> {
        match self {
            IndexConfig::Local { path, trusted_dir } => {
                let index = LocalIndex::build(descriptor, chunks, vectors)?;
                let target = if path.is_absolute() {
                    path.clone()
                } else {
                    trusted_dir.join(path)
                };
                let header = index.save(&target).await?;
                info!(
                    path = %target.display(),
                    chunks = header.chunk_count,
                    checksum = %header.checksum,
                    "Wrote index artifact"
                );
                Ok(header.chunk_count)
            }
            #[cfg(feature = "qdrant")]
            IndexConfig::Qdrant {
                url,
                collection,
                api_key_env,
            } => {
                let api_key = resolve_key(config, api_key_env.as_deref())?;
                let stored = QdrantIndex::rebuild(
                    url,
                    collection,
                    api_key.as_deref(),
                    &descriptor,
                    chunks,
                    &vectors,
                    config.timeouts.search(),
                )
                .await?;
                info!(collection = %collection, chunks = stored, "Published Qdrant collection");
                Ok(stored)
            }

            #[cfg(not(feature = "qdrant"))]
            IndexConfig::Qdrant { .. } => Err(qdrant_disabled()),
        }
    }
}

#[cfg(not(feature = "qdrant"))]
fn qdrant_disabled() -> AppError {
    AppError::Configuration("Qdrant index requires the 'qdrant' feature".to_string())
}

#[cfg(feature = "qdrant")]
fn resolve_key(config: &ForumRagConfig, env: Option<&str>) -> Result<Option<String>> {
    env.map(|name| {
        config
            .require_env(name)
            .map_err(|e| AppError::Configuration(e.to_string()))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(ordinal: usize, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                id: format!("c{}", ordinal),
                ordinal,
                text: String::new(),
                byte_offset: None,
            },
            score,
        }
    }

    #[test]
    fn test_rank_orders_by_score_then_ordinal() {
        let mut results = vec![result(3, 0.5), result(1, 0.9), result(0, 0.5), result(2, 0.7)];
        rank(&mut results);
        let order: Vec<_> = results.iter().map(|r| r.chunk.ordinal).collect();
        assert_eq!(order, vec![1, 2, 0, 3]);
    }
}
