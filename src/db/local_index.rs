//! In-process index backed by a persisted `forum-vector` artifact.

use crate::types::{AppError, Chunk, Result, RetrievalResult};
use async_trait::async_trait;
use forum_vector::{
    load_index, save_index, ArtifactHeader, FlatIndex, IndexDescriptor, IndexEntry, SearchHit,
    TrustedDir,
};
use std::path::Path;
use tracing::info;

use super::vectorstore::VectorIndex;

/// Exact flat index held in memory.
///
/// Immutable once built, so concurrent searches need no locking.
#[derive(Debug)]
pub struct LocalIndex {
    index: FlatIndex,
    header: Option<ArtifactHeader>,
}

impl LocalIndex {
    /// Wrap an already built index.
    pub fn new(index: FlatIndex) -> Self {
        Self {
            index,
            header: None,
        }
    }

    /// Build from chunks and their vectors, paired by position.
    pub fn build(
        descriptor: IndexDescriptor,
        chunks: &[Chunk],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(AppError::Index(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }

        let entries = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry {
                id: chunk.id.clone(),
                ordinal: chunk.ordinal,
                byte_offset: chunk.byte_offset,
                text: chunk.text.clone(),
                vector,
            })
            .collect();

        Ok(Self::new(FlatIndex::build(descriptor, entries)?))
    }

    /// Load an artifact. `path` must resolve inside `trusted_dir`.
    pub async fn open(trusted_dir: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<Self> {
        let trusted = TrustedDir::new(trusted_dir)?;
        let (index, header) = load_index(&trusted, path).await?;
        info!(
            entries = header.chunk_count,
            dimensions = header.descriptor.dimensions,
            model = %header.descriptor.embedding_model,
            built_at = %header.built_at,
            "Loaded index artifact"
        );
        Ok(Self {
            index,
            header: Some(header),
        })
    }

    /// Persist as a checksummed artifact.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<ArtifactHeader> {
        Ok(save_index(&self.index, path).await?)
    }

    /// Header of the artifact this index was loaded from.
    pub fn header(&self) -> Option<&ArtifactHeader> {
        self.header.as_ref()
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        self.index.descriptor()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        self.index.entries()
    }
}

fn to_result(hit: SearchHit) -> RetrievalResult {
    RetrievalResult {
        chunk: Chunk {
            id: hit.id,
            ordinal: hit.ordinal,
            text: hit.text,
            byte_offset: hit.byte_offset,
        },
        score: hit.score,
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn provider_name(&self) -> &'static str {
        "local"
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        let hits = self
            .index
            .search(query, k)
            .map_err(|e| AppError::Retrieval(e.to_string()))?;
        Ok(hits.into_iter().map(to_result).collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }

    fn dimensions(&self) -> usize {
        self.index.dimensions()
    }

    fn embedding_model(&self) -> &str {
        &self.index.descriptor().embedding_model
    }

    fn tokenizer_sha256(&self) -> Option<&str> {
        self.index.descriptor().tokenizer_sha256.as_deref()
    }
}
