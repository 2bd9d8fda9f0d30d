//! Shared fixtures for the integration tests.
#![allow(dead_code)]

pub mod mocks;

use forum_rag::llm::LLMClient;
use forum_rag::rag::chunker::Chunker;
use forum_rag::rag::embeddings::{Embedder, EmbeddingService};
use forum_rag::rag::ingest::Ingestor;
use forum_rag::rag::tokenizer::TokenCounter;
use forum_rag::types::{RawPost, RawThread};
use forum_rag::{ForumRagConfig, LocalIndex, RagService};
use mocks::{word_tokenizer, KeywordEmbedder};
use std::sync::Arc;

pub const ANSWER: &str =
    "Das sagen andere Nutzer dazu: Ein festes Abendritual hilft vielen Eltern beim Schlafen.";

/// Configuration sized for [`corpus`]: every thread becomes one chunk.
pub const TEST_CONFIG: &str = r#"
[rag]
embedding_model_name = "keyword-test"
chunk_size_tokens = 40
chunk_overlap_tokens = 5
retrieval_k = 3
similarity_threshold = 0.5
context_token_budget = 200
generation_max_tokens = 256
embedding_batch_size = 2

[index]
type = "local"
path = "index.json"
trusted_dir = "."

[generator]
type = "ollama"
model = "test-model"

[timeouts]
generation_secs = 2

[retry]
max_attempts = 3
base_backoff_ms = 1
"#;

pub fn test_config() -> ForumRagConfig {
    ForumRagConfig::from_toml_str(TEST_CONFIG).unwrap()
}

fn post(poster: Option<&str>, text: &str) -> RawPost {
    RawPost {
        poster: poster.map(str::to_string),
        post: text.to_string(),
    }
}

/// Three short threads on three topics.
pub fn corpus() -> Vec<RawThread> {
    vec![
        RawThread {
            title: "Baby will nicht schlafen".to_string(),
            posts: vec![
                post(
                    Some("anna"),
                    "Unser Baby kann abends nicht schlafen und weint viel.",
                ),
                post(
                    None,
                    "Bei uns half ein festes Ritual vor dem Schlafen. Viel Geduld euch allen!",
                ),
            ],
        },
        RawThread {
            title: "Stillen in der Nacht".to_string(),
            posts: vec![
                post(
                    Some("clara"),
                    "Stillen nachts ist ganz normal, sagt unsere Hebamme.",
                ),
                post(
                    Some("dora"),
                    "Wir haben mit einem Jahr abgestillt und es ging gut.",
                ),
            ],
        },
        RawThread {
            title: "<b>Kita</b> Eingewöhnung".to_string(),
            posts: vec![
                post(
                    Some("emil"),
                    "Die Eingewöhnung in der Kita dauerte bei uns drei Wochen.",
                ),
                post(Some(""), "Bei uns <i>nur</i> eine Woche, jedes Kind ist anders."),
            ],
        },
    ]
}

pub fn corpus_json() -> String {
    serde_json::to_string_pretty(&corpus()).unwrap()
}

pub fn ingestor(config: &ForumRagConfig, embedder: Arc<dyn Embedder>) -> Ingestor {
    let tokenizer = Arc::new(word_tokenizer());
    let digest = tokenizer.digest().map(str::to_string);
    let chunker = Chunker::new(
        tokenizer,
        config.rag.chunk_size_tokens,
        config.rag.chunk_overlap_tokens,
    )
    .unwrap();
    Ingestor::new(
        chunker,
        EmbeddingService::from_config(embedder, config),
        digest,
    )
}

pub async fn build_index(config: &ForumRagConfig) -> LocalIndex {
    ingestor(config, Arc::new(KeywordEmbedder::new()))
        .build_local(&corpus())
        .await
        .unwrap()
}

/// Index [`corpus`] and assemble a service around `llm`.
pub async fn build_service(config: &ForumRagConfig, llm: Arc<dyn LLMClient>) -> RagService {
    let index = build_index(config).await;
    RagService::from_parts(
        Arc::new(word_tokenizer()),
        Arc::new(KeywordEmbedder::new()),
        Arc::new(index),
        llm,
        config,
    )
    .unwrap()
}
