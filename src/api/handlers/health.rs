use crate::{
    types::{HealthResponse, Result, RetrievalSettings},
    utils::toml_config::ForumRagConfig,
    AppState,
};
use axum::{extract::State, Json};

/// Report index size, dimension, the models in use and the retrieval settings
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is ready", body = HealthResponse),
        (status = 503, description = "Index unreachable", body = crate::types::ErrorBody)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let mut health = state.service.health().await?;
    health.retrieval = Some(settings(&state.config));
    Ok(Json(health))
}

fn settings(config: &ForumRagConfig) -> RetrievalSettings {
    RetrievalSettings {
        retrieval_k: config.rag.retrieval_k,
        similarity_threshold: config.rag.similarity_threshold,
        context_token_budget: config.rag.context_token_budget,
        index_backend: config.index.backend_name().to_string(),
    }
}
