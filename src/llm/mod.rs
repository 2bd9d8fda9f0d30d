//! LLM Provider Clients
//!
//! The orchestrator only needs `generate(prompt, max_output_tokens)`; each
//! provider implements it behind [`LLMClient`], selected by the
//! `[generator]` section of `forum-rag.toml`:
//!
//! - `anthropic` - Anthropic Messages API
//! - `openai` - any OpenAI-compatible chat completions endpoint (feature `openai`)
//! - `ollama` - local Ollama server (feature `ollama`)

/// Core LLM client trait and failure classification.
pub mod client;

pub mod anthropic;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "ollama")]
pub mod ollama;

pub use anthropic::AnthropicClient;
pub use client::{classify_status, LLMClient};
#[cfg(feature = "openai")]
pub use openai::OpenAIClient;
