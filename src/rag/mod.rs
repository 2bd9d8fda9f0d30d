//! Retrieval Augmented Generation (RAG) Pipeline
//!
//! # Module Structure
//!
//! - [`preprocess`] - corpus records to normalized conversation text
//! - [`tokenizer`] - exact token counting with the embedding model's tokenizer
//! - [`chunker`] - token-bounded, overlapping chunks
//! - [`embeddings`] - embedding models and the normalization policy
//! - [`retriever`] - query embedding, index search, threshold filtering
//! - [`context`] - budgeted context assembly with provenance tags
//! - [`prompt`] - the generation prompt
//! - [`orchestrator`] - the per-request state machine
//! - [`ingest`] - the offline index build
//! - [`service`] - the shared query service
//!
//! # Pipeline
//!
//! At index-build time:
//!
//! 1. **Preprocess** - strip markup, fill missing posters, one block per thread
//! 2. **Chunk** - split by paragraph and line breaks into overlapping chunks
//! 3. **Embed** - batch-embed chunks into unit vectors
//! 4. **Store** - write the index artifact or fill the Qdrant collection
//!
//! At query time:
//!
//! 1. **Retrieve** - embed the query, take the top `k`, drop weak matches
//! 2. **Assemble** - wrap chunks in `<conversation>` tags up to the token budget
//! 3. **Generate** - render the prompt and call the LLM
//!
//! # Example
//!
//! ```ignore
//! use forum_rag::rag::service::RagService;
//!
//! let service = RagService::from_config(&config).await?;
//! let response = service.query("Mein Kind schläft schlecht").await?;
//! println!("{}", response.answer);
//! ```

pub mod chunker;
pub mod context;
pub mod embeddings;
pub mod ingest;
pub mod orchestrator;
pub mod preprocess;
pub mod prompt;
pub mod retriever;
pub mod service;
pub mod tokenizer;
