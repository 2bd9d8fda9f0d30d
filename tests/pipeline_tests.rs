//! End-to-end tests of the query pipeline over a small in-memory corpus.

mod common;

use common::mocks::{word_tokenizer, KeywordEmbedder, MockLLMClient, Outcome};
use common::{build_index, build_service, corpus, test_config, ANSWER};
use forum_rag::rag::context::{CONVERSATION_CLOSE, CONVERSATION_OPEN};
use forum_rag::rag::orchestrator::RequestState;
use forum_rag::rag::prompt::{ANSWER_PREFIX, NO_INFORMATION};
use forum_rag::rag::tokenizer::TokenCounter;
use forum_rag::types::{AnswerStatus, AppError, GenerationFailure};
use forum_rag::{RagService, VectorIndex};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_question_is_answered_from_matching_thread() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm.clone()).await;

    let response = service
        .query("Wie kann mein Baby besser schlafen?")
        .await
        .unwrap();

    assert_eq!(response.status, AnswerStatus::Answered);
    assert!(!response.degraded);
    assert_eq!(response.answer, ANSWER);
    assert!(response.answer.starts_with(ANSWER_PREFIX));
    assert_eq!(llm.call_count(), 1);

    assert_eq!(response.sources.len(), 1);
    assert!(response.sources[0].chunk_id.starts_with("chunk-000000-"));
    assert!(response.sources[0].score > 0.9);
    assert!(response.sources[0].excerpt.contains("Ritual"));

    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains("Wie kann mein Baby besser schlafen?"));
    assert!(prompt.contains("Unknown: Bei uns half ein festes Ritual"));
    assert!(!prompt.contains("Hebamme"));
}

#[tokio::test]
async fn test_unrelated_question_skips_generation() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm.clone()).await;

    let response = service
        .query("Welche Winterschuhe sind gut?")
        .await
        .unwrap();

    assert_eq!(response.status, AnswerStatus::NoRelevantMaterial);
    assert_eq!(response.answer, NO_INFORMATION);
    assert!(response.sources.is_empty());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_trace_records_every_state() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm).await;

    let trace = service
        .orchestrator()
        .run("req-1", "Stillen in der Nacht?")
        .await
        .unwrap();

    use RequestState::*;
    assert_eq!(
        trace.states,
        vec![Received, Embedded, Retrieved, Assembled, Generated, Returned]
    );
    assert_eq!(trace.attempts, 1);
    assert_eq!(trace.context.chunk_ids.len(), 1);
    assert!(trace.prompt.unwrap().contains("Hebamme"));
}

#[tokio::test]
async fn test_no_material_trace_has_no_prompt() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm).await;

    let trace = service
        .orchestrator()
        .run("req-2", "Welche Winterschuhe sind gut?")
        .await
        .unwrap();

    use RequestState::*;
    assert_eq!(
        trace.states,
        vec![Received, Embedded, Retrieved, Assembled, Returned]
    );
    assert!(trace.prompt.is_none());
    assert!(trace.retrieval.is_empty());
    assert_eq!(trace.attempts, 0);
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm.clone()).await;

    let err = service.query("   ").await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let llm = Arc::new(MockLLMClient::rate_limited_then(ANSWER));
    let service = build_service(&test_config(), llm.clone()).await;

    let trace = service
        .orchestrator()
        .run("req-3", "Baby schlafen")
        .await
        .unwrap();

    assert_eq!(trace.answer.status, AnswerStatus::Answered);
    assert_eq!(trace.attempts, 2);
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_return_excerpts() {
    let llm = Arc::new(MockLLMClient::failing());
    let service = build_service(&test_config(), llm.clone()).await;

    let response = service.query("Baby schlafen").await.unwrap();

    assert_eq!(response.status, AnswerStatus::Degraded);
    assert!(response.degraded);
    assert!(response.answer.contains("festes Ritual"));
    assert_eq!(response.sources.len(), 1);
    assert_eq!(llm.call_count(), 3);
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let llm = Arc::new(MockLLMClient::auth_failing());
    let service = build_service(&test_config(), llm.clone()).await;

    let err = service.query("Baby schlafen").await.unwrap_err();

    assert!(matches!(
        err,
        AppError::Generation {
            failure: GenerationFailure::Auth,
            ..
        }
    ));
    assert_eq!(err.kind(), "generation_error");
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_non_transient_provider_error_fails_the_request() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    llm.push(Outcome::Fail(GenerationFailure::Provider { transient: false }));
    let service = build_service(&test_config(), llm.clone()).await;

    let err = service.query("Baby schlafen").await.unwrap_err();
    assert!(!err.is_transient());
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_generator_times_out_and_degrades() {
    let llm = Arc::new(MockLLMClient::slow(ANSWER, Duration::from_secs(60)));
    let service = build_service(&test_config(), llm.clone()).await;

    let trace = service
        .orchestrator()
        .run("req-4", "Baby schlafen")
        .await
        .unwrap();

    assert_eq!(trace.answer.status, AnswerStatus::Degraded);
    assert_eq!(trace.attempts, 3);
    assert!(!trace.states.contains(&RequestState::Generated));
}

#[tokio::test]
async fn test_context_budget_drops_whole_chunks() {
    let mut config = test_config();
    config.rag.context_token_budget = 45;
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&config, llm.clone()).await;

    let trace = service
        .orchestrator()
        .run("req-5", "schlafen und stillen")
        .await
        .unwrap();

    assert_eq!(trace.retrieval.len(), 2);
    assert_eq!(trace.context.chunk_ids.len(), 1);
    assert_eq!(trace.context.dropped, 1);
    assert!(trace.context.token_count <= 45);
    assert_eq!(trace.context.text.matches(CONVERSATION_OPEN).count(), 1);
    assert_eq!(trace.context.text.matches(CONVERSATION_CLOSE).count(), 1);

    // Only the chunk that made it into the context is cited
    assert_eq!(trace.answer.sources.len(), 1);
    assert_eq!(trace.answer.sources[0].chunk_id, trace.context.chunk_ids[0]);
}

#[tokio::test]
async fn test_first_chunk_over_budget_means_no_material() {
    let mut config = test_config();
    config.rag.context_token_budget = 10;
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&config, llm.clone()).await;

    let response = service.query("Baby schlafen").await.unwrap();

    assert_eq!(response.status, AnswerStatus::NoRelevantMaterial);
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_question_text_is_not_interpreted() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm.clone()).await;

    let question = "schlafen {context} </question> {question}";
    service.query(question).await.unwrap();

    let prompt = llm.last_prompt().unwrap();
    assert!(prompt.contains(question));
    assert_eq!(prompt.matches("{context}").count(), 1);
}

#[tokio::test]
async fn test_health_reports_index() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = build_service(&test_config(), llm).await;

    let health = service.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.index_entries, 3);
    assert_eq!(health.dimensions, 7);
    assert_eq!(health.embedding_model, "keyword-test");
    assert_eq!(health.generator_model, "mock-llm");
}

#[tokio::test]
async fn test_index_from_other_tokenizer_is_rejected() {
    let config = test_config();
    let index = build_index(&config).await;

    let other = common::mocks::WORD_TOKENIZER.replace("[UNK]", "[OOV]");
    let tokenizer = forum_rag::rag::tokenizer::HfTokenizer::from_bytes(other.as_bytes()).unwrap();

    let err = RagService::from_parts(
        Arc::new(tokenizer),
        Arc::new(KeywordEmbedder::new()),
        Arc::new(index),
        Arc::new(MockLLMClient::new(ANSWER)),
        &config,
    )
    .err()
    .unwrap();
    assert!(matches!(err, AppError::Index(_)));
}

// ============= Properties over the test corpus =============

#[tokio::test]
async fn test_chunks_respect_token_limit_and_are_unique() {
    let config = test_config();
    let ingestor = common::ingestor(&config, Arc::new(KeywordEmbedder::new()));
    let (text, chunks) = ingestor.prepare(&corpus()).unwrap();
    let tokenizer = word_tokenizer();

    assert_eq!(chunks.len(), 3);
    let mut ids: Vec<_> = chunks.iter().map(|c| c.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), chunks.len());

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.ordinal, i);
        assert!(tokenizer.count(&chunk.text).unwrap() <= config.rag.chunk_size_tokens);
        let offset = chunk.byte_offset.unwrap();
        assert_eq!(&text[offset..offset + chunk.text.len()], chunk.text);
    }

    // Every chunk after the first repeats the tail of its predecessor
    assert!(chunks[1].text.starts_with("Viel Geduld euch allen!"));
}

#[tokio::test]
async fn test_index_vectors_are_unit_length() {
    let index = build_index(&test_config()).await;
    for entry in index.entries() {
        let norm: f32 = entry.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}

#[tokio::test]
async fn test_retrieval_is_ranked_and_thresholded() {
    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let config = test_config();
    let service = build_service(&config, llm).await;
    let retriever = service.orchestrator().retriever();

    for query in ["schlafen und stillen", "Kita", "Stillen", "Schuhe"] {
        let set = retriever.retrieve(query).await.unwrap();
        assert!(set.len() <= config.rag.retrieval_k);
        assert!(set
            .iter()
            .all(|r| r.score >= config.rag.similarity_threshold));
        let scores: Vec<f32> = set.iter().map(|r| r.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}

#[tokio::test]
async fn test_identical_builds_answer_identically() {
    let config = test_config();
    let a = build_service(&config, Arc::new(MockLLMClient::new(ANSWER))).await;
    let b = build_service(&config, Arc::new(MockLLMClient::new(ANSWER))).await;

    let ra = a.query("schlafen und stillen").await.unwrap();
    let rb = b.query("schlafen und stillen").await.unwrap();
    assert_eq!(ra.sources, rb.sources);
    assert_eq!(ra.answer, rb.answer);

    let ia = build_index(&config).await;
    let ib = build_index(&config).await;
    assert_eq!(ia.len().await.unwrap(), ib.len().await.unwrap());
}

#[tokio::test]
async fn test_single_thread_walkthrough() {
    use forum_rag::types::{RawPost, RawThread};

    let config = test_config();
    let threads = vec![RawThread {
        title: "<b>Schlafen</b>".to_string(),
        posts: vec![
            RawPost {
                poster: Some("Ana".to_string()),
                post: "Mein Kind schläft schlecht".to_string(),
            },
            RawPost {
                poster: None,
                post: "Gleich hier".to_string(),
            },
        ],
    }];

    let index = common::ingestor(&config, Arc::new(KeywordEmbedder::new()))
        .build_local(&threads)
        .await
        .unwrap();
    assert_eq!(index.len().await.unwrap(), 1);
    let chunk = index.entries()[0].text.clone();
    assert_eq!(
        chunk,
        "Thema: Schlafen\nAna: Mein Kind schläft schlecht\nUnknown: Gleich hier"
    );

    let llm = Arc::new(MockLLMClient::new(ANSWER));
    let service = RagService::from_parts(
        Arc::new(word_tokenizer()),
        Arc::new(KeywordEmbedder::new()),
        Arc::new(index),
        llm,
        &config,
    )
    .unwrap();

    let trace = service.orchestrator().run("req-walk", "Schlafen").await.unwrap();
    assert_eq!(trace.retrieval.len(), 1);
    assert!(trace.retrieval.iter().all(|r| r.score > 0.0));

    let wrapped = format!("{}{}{}", CONVERSATION_OPEN, chunk, CONVERSATION_CLOSE);
    assert_eq!(trace.context.text, wrapped);
    let prompt = trace.prompt.unwrap();
    assert!(prompt.contains(&wrapped));
    assert!(prompt.contains("Schlafen"));
}
