use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============= API Request/Response Types =============

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryRequest {
    pub query: String,
}

/// Query string of the legacy `GET /input` route.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InputParams {
    pub input_string: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    pub answer: String,
    pub status: AnswerStatus,
    pub degraded: bool,
    pub sources: Vec<Source>,
    pub request_id: String,
    pub duration_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct Source {
    pub chunk_id: String,
    pub score: f32,
    pub excerpt: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub index_entries: usize,
    pub dimensions: usize,
    pub embedding_model: String,
    pub generator_model: String,
    /// Retrieval parameters the server was started with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retrieval: Option<RetrievalSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RetrievalSettings {
    pub retrieval_k: usize,
    pub similarity_threshold: f32,
    pub context_token_budget: usize,
    pub index_backend: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    pub kind: String,
    pub message: String,
}

// ============= Corpus Types =============

/// One forum thread as it appears in the corpus file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawThread {
    pub title: String,
    pub posts: Vec<RawPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawPost {
    #[serde(default)]
    pub poster: Option<String>,
    pub post: String,
}

/// A contiguous, token-bounded span of the normalized corpus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub ordinal: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<usize>,
}

// ============= Retrieval Types =============

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ranked retrieval output.
///
/// Only constructible through [`RetrievalSet::from_ranked`], which guarantees
/// the sequence is non-increasing by score, holds at most `k` results and
/// contains nothing below the similarity threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalSet {
    results: Vec<RetrievalResult>,
}

impl RetrievalSet {
    /// Keep the first `k` ranked candidates, then drop those scoring below
    /// `threshold`. Candidates must already be ranked best first.
    pub fn from_ranked(
        candidates: Vec<RetrievalResult>,
        k: usize,
        threshold: f32,
    ) -> Result<Self> {
        if candidates.windows(2).any(|w| w[1].score > w[0].score) {
            return Err(AppError::Retrieval(
                "index returned candidates out of score order".to_string(),
            ));
        }

        let results = candidates
            .into_iter()
            .take(k)
            .filter(|r| r.score >= threshold)
            .collect();
        Ok(Self { results })
    }

    pub fn results(&self) -> &[RetrievalResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievalResult> {
        self.results.iter()
    }

    /// Source diagnostics for the answer, with excerpts cut to `max_chars`.
    pub fn sources(&self, max_chars: usize) -> Vec<Source> {
        self.results
            .iter()
            .map(|r| Source {
                chunk_id: r.chunk.id.clone(),
                score: r.score,
                excerpt: excerpt(&r.chunk.text, max_chars),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a RetrievalSet {
    type Item = &'a RetrievalResult;
    type IntoIter = std::slice::Iter<'a, RetrievalResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Context handed to the generator: whole chunks wrapped in provenance tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    pub text: String,
    pub token_count: usize,
    pub chunk_ids: Vec<String>,
    /// Chunks left out because the budget was reached.
    pub dropped: usize,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.chunk_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Synthesized by the generator from retrieved material.
    Answered,
    /// Nothing relevant was retrieved; the generator was not called.
    NoRelevantMaterial,
    /// Generation failed after retries; excerpts are returned unsynthesized.
    Degraded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub status: AnswerStatus,
    pub sources: Vec<Source>,
}

impl Answer {
    pub fn is_degraded(&self) -> bool {
        self.status == AnswerStatus::Degraded
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

// ============= Error Types =============

/// Why a generation call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationFailure {
    Auth,
    RateLimited,
    Timeout,
    /// Any other provider error; `transient` marks 5xx and transport errors.
    Provider { transient: bool },
}

impl GenerationFailure {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationFailure::Auth => false,
            GenerationFailure::RateLimited | GenerationFailure::Timeout => true,
            GenerationFailure::Provider { transient } => *transient,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Chunking error: {0}")]
    Chunking(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Remote index unreachable, rate limited or timed out.
    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Generation error: {message}")]
    Generation {
        failure: GenerationFailure,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn generation(failure: GenerationFailure, message: impl Into<String>) -> Self {
        AppError::Generation {
            failure,
            message: message.into(),
        }
    }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Ingestion(_) => "ingestion_error",
            AppError::Chunking(_) => "chunking_error",
            AppError::Embedding(_) => "embedding_error",
            AppError::Index(_) => "index_error",
            AppError::Retrieval(_) | AppError::RetrievalUnavailable(_) => "retrieval_error",
            AppError::Generation { .. } => "generation_error",
            AppError::Configuration(_) => "configuration_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::RetrievalUnavailable(_) => true,
            AppError::Generation { failure, .. } => failure.is_transient(),
            _ => false,
        }
    }

    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::RetrievalUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Retrieval(_) => StatusCode::BAD_GATEWAY,
            AppError::Generation { failure, .. } => match failure {
                GenerationFailure::RateLimited => StatusCode::SERVICE_UNAVAILABLE,
                GenerationFailure::Timeout => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::BAD_GATEWAY,
            },
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<forum_vector::Error> for AppError {
    fn from(err: forum_vector::Error) -> Self {
        AppError::Index(err.to_string())
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorBody {
            error: ErrorDetail {
                kind: self.kind().to_string(),
                message: self.to_string(),
            },
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
