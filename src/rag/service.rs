//! The query service: one explicitly constructed pipeline shared by every
//! request handler.

use crate::db::VectorIndex;
use crate::llm::LLMClient;
use crate::rag::chunker::Chunker;
use crate::rag::context::ContextAssembler;
use crate::rag::embeddings::{Embedder, EmbeddingService};
use crate::rag::ingest::Ingestor;
use crate::rag::orchestrator::{Orchestrator, QueryTrace};
use crate::rag::retriever::Retriever;
use crate::rag::tokenizer::{HfTokenizer, TokenCounter};
use crate::types::{AppError, HealthResponse, QueryResponse, Result};
use crate::utils::toml_config::ForumRagConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Load the configured tokenizer.
pub fn load_tokenizer(config: &ForumRagConfig) -> Result<HfTokenizer> {
    let path = config
        .tokenizer_path()
        .map_err(|e| AppError::Chunking(e.to_string()))?;
    let tokenizer = HfTokenizer::from_file(path)?;
    info!(path = %path.display(), max_length = ?tokenizer.max_length(), "Loaded tokenizer");
    Ok(tokenizer)
}

/// Build an [`Ingestor`] from configuration.
pub async fn ingestor_from_config(config: &ForumRagConfig) -> Result<Ingestor> {
    let tokenizer = load_tokenizer(config)?;
    tokenizer.check_chunk_size(config.rag.chunk_size_tokens)?;
    let digest = tokenizer.digest().map(str::to_string);

    let chunker = Chunker::new(
        Arc::new(tokenizer),
        config.rag.chunk_size_tokens,
        config.rag.chunk_overlap_tokens,
    )?;
    let embedder = config.embedder.create_embedder(config).await?;
    Ok(Ingestor::new(
        chunker,
        EmbeddingService::from_config(embedder, config),
        digest,
    ))
}

#[derive(Clone)]
pub struct RagService {
    orchestrator: Orchestrator,
}

impl RagService {
    /// Load tokenizer, embedder, index and generator as configured.
    pub async fn from_config(config: &ForumRagConfig) -> Result<Self> {
        let tokenizer = Arc::new(load_tokenizer(config)?);
        let embedder = config.embedder.create_embedder(config).await?;
        let index = config.index.open_index(config).await?;
        let llm = config.generator.create_client(config).await?;
        Self::from_parts(tokenizer, embedder, index, llm, config)
    }

    /// Assemble the service from already constructed parts.
    ///
    /// Rejects an index whose dimension or tokenizer digest does not match
    /// the embedder and tokenizer supplied.
    pub fn from_parts(
        tokenizer: Arc<dyn TokenCounter>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: Arc<dyn LLMClient>,
        config: &ForumRagConfig,
    ) -> Result<Self> {
        if let Some(dims) = embedder.dimensions() {
            if dims != index.dimensions() {
                return Err(AppError::Index(format!(
                    "Index dimension {} does not match embedder dimension {}",
                    index.dimensions(),
                    dims
                )));
            }
        }
        if let (Some(expected), Some(actual)) = (tokenizer.digest(), index.tokenizer_sha256()) {
            if expected != actual {
                return Err(AppError::Index(format!(
                    "Index was chunked with tokenizer {} but {} is configured",
                    actual, expected
                )));
            }
        }

        let embeddings = EmbeddingService::from_config(embedder, config);
        let retriever = Retriever::from_config(embeddings, index, config);
        let assembler = ContextAssembler::new(tokenizer, config.rag.context_token_budget);
        let orchestrator = Orchestrator::from_config(retriever, assembler, llm, config);

        Ok(Self { orchestrator })
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Answer one query under a fresh request id.
    pub async fn query(&self, query: &str) -> Result<QueryResponse> {
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let QueryTrace { answer, .. } = self.orchestrator.run(&request_id, query).await?;

        Ok(QueryResponse {
            degraded: answer.is_degraded(),
            answer: answer.text,
            status: answer.status,
            sources: answer.sources,
            request_id,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let retriever = self.orchestrator.retriever();
        let index = retriever.index();
        Ok(HealthResponse {
            status: "ok".to_string(),
            index_entries: index.len().await?,
            dimensions: index.dimensions(),
            embedding_model: retriever.embeddings().model_name().to_string(),
            generator_model: self.orchestrator.llm().model_name().to_string(),
            retrieval: None,
        })
    }
}
