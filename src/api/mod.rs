//! HTTP API Handlers and Routes
//!
//! The query service of forum-rag, built on the Axum web framework.
//!
//! # Module Structure
//!
//! - [`api::handlers`](crate::api::handlers) - Request handlers for each endpoint
//! - [`api::routes`](crate::api::routes) - Route definitions and router configuration
//!
//! # API Endpoints
//!
//! ## Query
//! - `POST /api/query` - Answer a question from the indexed conversations
//! - `GET /input?input_string=...` - Same, with the question in the query string
//!
//! ## Health
//! - `GET /health` - Index size, dimension and models in use
//!
//! Failures are returned as `{ "error": { "kind", "message" } }` with a
//! status code matching the error kind.
//!
//! # OpenAPI Documentation
//!
//! The OpenAPI description is served at `/api-docs/openapi.json`.

use utoipa::OpenApi;

/// Request and response handlers for all API endpoints.
pub mod handlers;
/// Router configuration and route definitions.
pub mod routes;

/// OpenAPI description of the query service.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "forum-rag",
        description = "Question answering over forum conversations"
    ),
    paths(
        handlers::query::query,
        handlers::query::input,
        handlers::health::health,
    ),
    components(schemas(
        crate::types::QueryRequest,
        crate::types::QueryResponse,
        crate::types::Source,
        crate::types::AnswerStatus,
        crate::types::HealthResponse,
        crate::types::RetrievalSettings,
        crate::types::ErrorBody,
        crate::types::ErrorDetail,
    )),
    tags(
        (name = "query", description = "Question answering"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;
