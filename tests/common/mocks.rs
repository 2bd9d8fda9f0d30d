//! Mock implementations for testing.
//!
//! Deterministic stand-ins for the embedding model and the generator, plus a
//! word-level tokenizer, so the whole pipeline runs without network access or
//! model downloads.

use async_trait::async_trait;
use forum_rag::llm::LLMClient;
use forum_rag::rag::embeddings::Embedder;
use forum_rag::rag::tokenizer::HfTokenizer;
use forum_rag::types::{AppError, GenerationFailure, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Word-level tokenizer: every run of word characters or punctuation is one token.
pub const WORD_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {"type": "WordLevel", "vocab": {"[UNK]": 0}, "unk_token": "[UNK]"}
}"#;

pub fn word_tokenizer() -> HfTokenizer {
    HfTokenizer::from_bytes(WORD_TOKENIZER.as_bytes()).unwrap()
}

// ============= Embedder =============

/// Topics the keyword embedder distinguishes, one vector axis each.
pub const TOPICS: &[&str] = &["schlafen", "stillen", "kita", "zahn", "brei", "fieber"];

/// Weight of the constant axis that keeps every vector non-zero.
const BIAS: f32 = 0.1;

/// Embeds text as keyword counts over [`TOPICS`] plus a constant axis.
///
/// Texts about the same topic score close to 1.0 against each other, texts
/// without a shared topic score close to 0.0.
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = TOPICS
            .iter()
            .map(|t| lower.matches(t).count() as f32)
            .collect();
        v.push(BIAS);
        v
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> Option<usize> {
        Some(TOPICS.len() + 1)
    }

    fn model_name(&self) -> &str {
        "keyword-test"
    }
}

// ============= Generator =============

/// Mock LLM client that replays scripted outcomes.
///
/// Each call pops the next scripted outcome; once the script is used up the
/// fallback is returned for every further call. Every prompt is recorded.
///
/// # Examples
///
/// ```ignore
/// // Always answers with the same text
/// let client = MockLLMClient::new("Das sagen andere Nutzer dazu: ...");
///
/// // Rate limited once, then answers
/// let client = MockLLMClient::rate_limited_then("Das sagen andere Nutzer dazu: ...");
///
/// // Always fails with a transient provider error
/// let client = MockLLMClient::failing();
/// ```
pub struct MockLLMClient {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

#[derive(Clone)]
pub enum Outcome {
    Answer(String),
    Fail(GenerationFailure),
}

impl Outcome {
    fn into_result(self) -> Result<String> {
        match self {
            Outcome::Answer(text) => Ok(text),
            Outcome::Fail(failure) => Err(AppError::generation(
                failure,
                format!("Mock provider failure: {:?}", failure),
            )),
        }
    }
}

impl MockLLMClient {
    fn with_fallback(fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a client that always returns `response`.
    pub fn new(response: &str) -> Self {
        Self::with_fallback(Outcome::Answer(response.to_string()))
    }

    /// Create a client that always fails with a transient provider error.
    pub fn failing() -> Self {
        Self::with_fallback(Outcome::Fail(GenerationFailure::Provider { transient: true }))
    }

    /// Create a client whose credentials are always rejected.
    pub fn auth_failing() -> Self {
        Self::with_fallback(Outcome::Fail(GenerationFailure::Auth))
    }

    /// Create a client that is rate limited once, then returns `response`.
    pub fn rate_limited_then(response: &str) -> Self {
        let client = Self::new(response);
        client.push(Outcome::Fail(GenerationFailure::RateLimited));
        client
    }

    /// Create a client that takes `delay` before every answer.
    pub fn slow(response: &str, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(response)
        }
    }

    /// Queue an outcome ahead of the fallback.
    pub fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, prompt: &str, _max_output_tokens: u32) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted
            .unwrap_or_else(|| self.fallback.clone())
            .into_result()
    }

    fn model_name(&self) -> &str {
        "mock-llm"
    }
}
