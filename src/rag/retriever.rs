//! Query-time retrieval: embed, search, then threshold.

use crate::db::VectorIndex;
use crate::rag::embeddings::EmbeddingService;
use crate::types::{excerpt, AppError, Result, RetrievalResult, RetrievalSet};
use crate::utils::toml_config::{ForumRagConfig, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const LOG_EXCERPT_CHARS: usize = 80;

/// Finds the chunks most similar to a query.
#[derive(Clone)]
pub struct Retriever {
    embeddings: EmbeddingService,
    index: Arc<dyn VectorIndex>,
    k: usize,
    threshold: f32,
    search_timeout: Duration,
    retry: RetryConfig,
}

impl Retriever {
    pub fn new(
        embeddings: EmbeddingService,
        index: Arc<dyn VectorIndex>,
        k: usize,
        threshold: f32,
        search_timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            embeddings,
            index,
            k,
            threshold,
            search_timeout,
            retry,
        }
    }

    pub fn from_config(
        embeddings: EmbeddingService,
        index: Arc<dyn VectorIndex>,
        config: &ForumRagConfig,
    ) -> Self {
        Self::new(
            embeddings,
            index,
            config.rag.retrieval_k,
            config.rag.similarity_threshold,
            config.timeouts.search(),
            config.retry.clone(),
        )
    }

    pub fn embeddings(&self) -> &EmbeddingService {
        &self.embeddings
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed `query` and retrieve for it.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalSet> {
        let vector = self.embeddings.embed_query(query).await?;
        self.retrieve_by_vector(&vector).await
    }

    /// Search the index for `k` candidates, then drop those below the
    /// similarity threshold.
    ///
    /// Transient index failures are retried with backoff.
    pub async fn retrieve_by_vector(&self, vector: &[f32]) -> Result<RetrievalSet> {
        let mut attempt = 0u32;
        let candidates = loop {
            attempt += 1;
            match self.search_once(vector).await {
                Ok(candidates) => break candidates,
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying index search"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        };

        let candidate_count = candidates.len();
        let set = RetrievalSet::from_ranked(candidates, self.k, self.threshold)?;

        for result in &set {
            debug!(
                chunk_id = %result.chunk.id,
                score = result.score,
                excerpt = %excerpt(&result.chunk.text, LOG_EXCERPT_CHARS),
                "Retrieved chunk"
            );
        }
        debug!(
            candidates = candidate_count,
            kept = set.len(),
            threshold = self.threshold,
            "Retrieval complete"
        );
        Ok(set)
    }

    async fn search_once(&self, vector: &[f32]) -> Result<Vec<RetrievalResult>> {
        tokio::time::timeout(self.search_timeout, self.index.search(vector, self.k))
            .await
            .map_err(|_| {
                AppError::RetrievalUnavailable(format!(
                    "Index search timed out after {}s",
                    self.search_timeout.as_secs()
                ))
            })?
    }
}
