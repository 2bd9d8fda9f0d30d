//! Per-request pipeline: retrieve, assemble, prompt, generate.
//!
//! Each request walks a small state machine:
//!
//! ```text
//! Received → Embedded → Retrieved → Assembled → Generated → Returned
//!     │          │          │           │  └──────────────────┘ ▲
//!     └──────────┴──────────┴───────────┴──→ Failed       (no material)
//! ```
//!
//! An empty context skips generation entirely and returns the fixed
//! "nothing found" answer. Transient generation failures are retried with
//! backoff; once retries run out the retrieved excerpts are returned as a
//! degraded answer instead of an error.

use crate::llm::LLMClient;
use crate::rag::context::ContextAssembler;
use crate::rag::prompt::{self, NO_INFORMATION};
use crate::rag::retriever::Retriever;
use crate::types::{
    excerpt, Answer, AnswerStatus, AppError, Context, GenerationFailure, Result, RetrievalSet,
    Source,
};
use crate::utils::toml_config::{ForumRagConfig, RetryConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Characters of chunk text shown per source.
pub const SOURCE_EXCERPT_CHARS: usize = 200;

/// Characters of chunk text shown per excerpt in a degraded answer.
const DEGRADED_EXCERPT_CHARS: usize = 600;

const DEGRADED_HEADER: &str =
    "Die Antwort konnte gerade nicht erstellt werden. Das sind die passendsten Forenbeiträge:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Embedded,
    Retrieved,
    Assembled,
    Generated,
    Returned,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Returned | RequestState::Failed)
    }

    /// Whether `next` may follow `self`.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Received, Embedded)
            | (Embedded, Retrieved)
            | (Retrieved, Assembled)
            | (Assembled, Generated)
            | (Assembled, Returned)
            | (Generated, Returned) => true,
            _ => false,
        }
    }
}

/// Tracks and logs the state of one request.
#[derive(Debug)]
struct StateTracker {
    state: RequestState,
    history: Vec<RequestState>,
}

impl StateTracker {
    fn new() -> Self {
        debug!(state = ?RequestState::Received, "Request state");
        Self {
            state: RequestState::Received,
            history: vec![RequestState::Received],
        }
    }

    fn advance(&mut self, next: RequestState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "Invalid request state transition {:?} -> {:?}",
                self.state, next
            )));
        }
        debug!(from = ?self.state, to = ?next, "Request state");
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    fn fail(&mut self, err: AppError) -> AppError {
        error!(state = ?self.state, kind = err.kind(), error = %err, "Request failed");
        if self.state.can_transition_to(RequestState::Failed) {
            self.state = RequestState::Failed;
            self.history.push(RequestState::Failed);
        }
        err
    }
}

/// Everything produced while answering one query.
#[derive(Debug, Clone)]
pub struct QueryTrace {
    pub answer: Answer,
    pub retrieval: RetrievalSet,
    pub context: Context,
    /// Rendered prompt; `None` when generation was skipped.
    pub prompt: Option<String>,
    /// Generation attempts made.
    pub attempts: u32,
    /// States visited, in order.
    pub states: Vec<RequestState>,
}

/// Stateless request pipeline. Holds only shared immutable handles.
#[derive(Clone)]
pub struct Orchestrator {
    retriever: Retriever,
    assembler: ContextAssembler,
    llm: Arc<dyn LLMClient>,
    max_output_tokens: u32,
    generation_timeout: Duration,
    retry: RetryConfig,
}

impl Orchestrator {
    pub fn new(
        retriever: Retriever,
        assembler: ContextAssembler,
        llm: Arc<dyn LLMClient>,
        max_output_tokens: u32,
        generation_timeout: Duration,
        retry: RetryConfig,
    ) -> Self {
        Self {
            retriever,
            assembler,
            llm,
            max_output_tokens,
            generation_timeout,
            retry,
        }
    }

    pub fn from_config(
        retriever: Retriever,
        assembler: ContextAssembler,
        llm: Arc<dyn LLMClient>,
        config: &ForumRagConfig,
    ) -> Self {
        Self::new(
            retriever,
            assembler,
            llm,
            config.rag.generation_max_tokens,
            config.timeouts.generation(),
            config.retry.clone(),
        )
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn llm(&self) -> &Arc<dyn LLMClient> {
        &self.llm
    }

    /// Answer `query`.
    pub async fn answer(&self, request_id: &str, query: &str) -> Result<Answer> {
        Ok(self.run(request_id, query).await?.answer)
    }

    /// Answer `query`, keeping every intermediate result.
    #[instrument(skip(self, query), fields(request_id = %request_id))]
    pub async fn run(&self, request_id: &str, query: &str) -> Result<QueryTrace> {
        let mut tracker = StateTracker::new();

        if query.trim().is_empty() {
            return Err(tracker.fail(AppError::InvalidInput("query must not be empty".to_string())));
        }

        let vector = match self.retriever.embeddings().embed_query(query).await {
            Ok(v) => v,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(RequestState::Embedded)?;

        let retrieval = match self.retriever.retrieve_by_vector(&vector).await {
            Ok(set) => set,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(RequestState::Retrieved)?;

        let context = match self.assembler.assemble(&retrieval) {
            Ok(c) => c,
            Err(e) => return Err(tracker.fail(e)),
        };
        tracker.advance(RequestState::Assembled)?;

        let sources = retrieval
            .iter()
            .filter(|r| context.chunk_ids.contains(&r.chunk.id))
            .map(|r| Source {
                chunk_id: r.chunk.id.clone(),
                score: r.score,
                excerpt: excerpt(&r.chunk.text, SOURCE_EXCERPT_CHARS),
            })
            .collect::<Vec<_>>();

        if context.is_empty() {
            debug!(retrieved = retrieval.len(), "No relevant material, skipping generation");
            tracker.advance(RequestState::Returned)?;
            return Ok(QueryTrace {
                answer: Answer {
                    text: NO_INFORMATION.to_string(),
                    status: AnswerStatus::NoRelevantMaterial,
                    sources: Vec::new(),
                },
                retrieval,
                context,
                prompt: None,
                attempts: 0,
                states: tracker.history,
            });
        }

        let prompt = prompt::render(&context.text, query);
        let (generated, attempts) = self.generate_with_retry(&prompt).await;

        let answer = match generated {
            Ok(text) => {
                tracker.advance(RequestState::Generated)?;
                Answer {
                    text,
                    status: AnswerStatus::Answered,
                    sources,
                }
            }
            Err(e) if e.is_transient() => {
                error!(attempts, error = %e, "Generation retries exhausted, returning excerpts");
                Answer {
                    text: degraded_text(&retrieval, &context),
                    status: AnswerStatus::Degraded,
                    sources,
                }
            }
            Err(e) => return Err(tracker.fail(e)),
        };

        tracker.advance(RequestState::Returned)?;
        Ok(QueryTrace {
            answer,
            retrieval,
            context,
            prompt: Some(prompt),
            attempts,
            states: tracker.history,
        })
    }

    /// Call the generator, retrying transient failures. Returns the final
    /// outcome and the number of attempts made.
    async fn generate_with_retry(&self, prompt: &str) -> (Result<String>, u32) {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.generation_timeout,
                self.llm.generate(prompt, self.max_output_tokens),
            )
            .await
            .unwrap_or_else(|_| {
                Err(AppError::generation(
                    GenerationFailure::Timeout,
                    format!(
                        "Generation timed out after {}s",
                        self.generation_timeout.as_secs()
                    ),
                ))
            });

            match outcome {
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Retrying generation"
                    );
                    tokio::time::sleep(backoff).await;
                }
                other => return (other, attempt),
            }
        }
    }
}

fn degraded_text(retrieval: &RetrievalSet, context: &Context) -> String {
    let mut text = DEGRADED_HEADER.to_string();
    for result in retrieval
        .iter()
        .filter(|r| context.chunk_ids.contains(&r.chunk.id))
    {
        text.push_str("\n\n- ");
        text.push_str(&excerpt(&result.chunk.text, DEGRADED_EXCERPT_CHARS));
    }
    text
}
