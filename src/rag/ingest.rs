//! Offline index build: corpus → normalized text → chunks → vectors → index.

use crate::db::LocalIndex;
use crate::rag::chunker::Chunker;
use crate::rag::embeddings::EmbeddingService;
use crate::rag::preprocess::{read_corpus, Preprocessor};
use crate::types::{AppError, Chunk, RawThread, Result};
use crate::utils::toml_config::ForumRagConfig;
use forum_vector::IndexDescriptor;
use std::path::PathBuf;
use tracing::info;

/// Inputs of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub corpus: PathBuf,
    /// Keep only the first `limit` threads.
    pub limit: Option<usize>,
    /// Where to write the normalized corpus, if anywhere.
    pub normalized_out: Option<PathBuf>,
}

/// Summary of a finished ingestion run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub threads: usize,
    pub chunks: usize,
    pub dimensions: usize,
    pub stored: usize,
}

/// Chunks and vectors ready to be written to an index.
#[derive(Debug, Clone)]
pub struct EmbeddedCorpus {
    pub descriptor: IndexDescriptor,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

pub struct Ingestor {
    preprocessor: Preprocessor,
    chunker: Chunker,
    embeddings: EmbeddingService,
    tokenizer_digest: Option<String>,
}

impl Ingestor {
    pub fn new(
        chunker: Chunker,
        embeddings: EmbeddingService,
        tokenizer_digest: Option<String>,
    ) -> Self {
        Self {
            preprocessor: Preprocessor::new(),
            chunker,
            embeddings,
            tokenizer_digest,
        }
    }

    /// Normalize and chunk threads. Returns the normalized corpus text too.
    pub fn prepare(&self, threads: &[RawThread]) -> Result<(String, Vec<Chunk>)> {
        let text = self.preprocessor.normalize_corpus(threads);
        let chunks = self.chunker.chunk(&text)?;
        info!(
            threads = threads.len(),
            bytes = text.len(),
            chunks = chunks.len(),
            chunk_size = self.chunker.chunk_size(),
            overlap = self.chunker.overlap(),
            "Chunked corpus"
        );
        Ok((text, chunks))
    }

    /// Embed chunks in batches.
    pub async fn embed(&self, chunks: Vec<Chunk>) -> Result<EmbeddedCorpus> {
        if chunks.is_empty() {
            return Err(AppError::Ingestion(
                "Corpus produced no chunks; nothing to index".to_string(),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embeddings.embed_documents(&texts).await?;
        let dimensions = vectors.first().map(Vec::len).unwrap_or_default();

        let mut descriptor = IndexDescriptor::new(self.embeddings.model_name(), dimensions);
        if let Some(digest) = &self.tokenizer_digest {
            descriptor = descriptor.with_tokenizer_sha256(digest.clone());
        }

        Ok(EmbeddedCorpus {
            descriptor,
            chunks,
            vectors,
        })
    }

    /// Build an in-memory index from threads without persisting it.
    pub async fn build_local(&self, threads: &[RawThread]) -> Result<LocalIndex> {
        let (_, chunks) = self.prepare(threads)?;
        let embedded = self.embed(chunks).await?;
        LocalIndex::build(embedded.descriptor, &embedded.chunks, embedded.vectors)
    }

    /// Run a full ingestion and publish to the configured index.
    pub async fn run(
        &self,
        config: &ForumRagConfig,
        options: &IngestOptions,
    ) -> Result<IngestReport> {
        let threads = read_corpus(&options.corpus, options.limit).await?;
        let (text, chunks) = self.prepare(&threads)?;

        if let Some(out) = &options.normalized_out {
            tokio::fs::write(out, &text).await.map_err(|e| {
                AppError::Ingestion(format!(
                    "Failed to write normalized corpus {}: {}",
                    out.display(),
                    e
                ))
            })?;
            info!(path = %out.display(), "Wrote normalized corpus");
        }

        let embedded = self.embed(chunks).await?;
        let chunk_count = embedded.chunks.len();
        let dimensions = embedded.descriptor.dimensions;

        let stored = config
            .index
            .publish(config, embedded.descriptor, &embedded.chunks, embedded.vectors)
            .await?;

        Ok(IngestReport {
            threads: threads.len(),
            chunks: chunk_count,
            dimensions,
            stored,
        })
    }
}
