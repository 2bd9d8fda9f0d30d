//! # forum-rag - Question answering over forum conversations
//!
//! Retrieval-augmented generation over a corpus of forum threads: threads are
//! normalized into plain conversation text, split into token-bounded chunks,
//! embedded into unit vectors and indexed. A question is embedded the same
//! way, the most similar chunks are packed into a token-budgeted context and
//! an LLM answers from that context only.
//!
//! ## Overview
//!
//! forum-rag can be used in two ways:
//!
//! 1. **As a binary** - `forum-rag index` builds the index, `forum-rag serve`
//!    starts the HTTP query service, `forum-rag ask` answers one question
//! 2. **As a library** - Assemble the pipeline from your own parts
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use forum_rag::{ForumRagConfig, RagService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ForumRagConfig::load("forum-rag.toml")?;
//!     let service = RagService::from_config(&config).await?;
//!
//!     let response = service.query("Wie bekomme ich mein Baby zum Schlafen?").await?;
//!     println!("{}", response.answer);
//!     Ok(())
//! }
//! ```
//!
//! ### Building an Index
//!
//! ```rust,ignore
//! use forum_rag::rag::{ingest::IngestOptions, service::ingestor_from_config};
//!
//! let ingestor = ingestor_from_config(&config).await?;
//! let report = ingestor
//!     .run(&config, &IngestOptions {
//!         corpus: "threads.json".into(),
//!         limit: Some(100),
//!         normalized_out: None,
//!     })
//!     .await?;
//! println!("{} chunks indexed", report.stored);
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI-compatible generation via async-openai (default) |
//! | `local-embeddings` | In-process ONNX embedding models via fastembed |
//! | `ollama` | Generation through a local Ollama server |
//! | `qdrant` | Qdrant collections as the vector index via qdrant-client |
//! | `full` | All of the above |
//!
//! ## Modules
//!
//! - [`api`] - REST API handlers and routes
//! - [`cli`] - Command-line parsing and output
//! - [`db`] - Vector index backends (local artifact, Qdrant)
//! - [`llm`] - Generation clients
//! - [`rag`] - The retrieval-augmented generation pipeline
//! - [`types`] - Common types and error handling
//! - [`utils`] - Configuration loading
//!
//! ## Configuration
//!
//! Everything is configured in one TOML file (`forum-rag.toml`). Secrets are
//! never stored in it; the file names the environment variables that hold
//! them.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// HTTP API handlers and routes.
pub mod api;
/// Command-line interface.
pub mod cli;
/// Vector index backends.
pub mod db;
/// LLM client implementations.
pub mod llm;
/// Retrieval-augmented generation pipeline.
pub mod rag;
/// Common types and error handling.
pub mod types;
/// Configuration loading and validation.
pub mod utils;

#[cfg(feature = "qdrant")]
pub use db::QdrantIndex;
pub use db::{LocalIndex, VectorIndex};
#[cfg(feature = "openai")]
pub use llm::OpenAIClient;
pub use llm::{AnthropicClient, LLMClient};
pub use rag::embeddings::{Embedder, EmbeddingService};
pub use rag::orchestrator::Orchestrator;
pub use rag::service::RagService;
pub use types::{AppError, Result};
pub use utils::toml_config::ForumRagConfig;

use std::sync::Arc;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration
    pub config: Arc<ForumRagConfig>,
    /// The query pipeline, constructed once at startup
    pub service: Arc<RagService>,
}
