//! Question answering handlers.

use crate::{
    types::{InputParams, QueryRequest, QueryResponse, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    Json,
};

/// Answer a question from the indexed forum conversations
#[utoipa::path(
    post,
    path = "/api/query",
    request_body = QueryRequest,
    responses(
        (status = 200, description = "Answer with its sources", body = QueryResponse),
        (status = 400, description = "Empty query", body = crate::types::ErrorBody),
        (status = 502, description = "Retrieval or generation failed", body = crate::types::ErrorBody),
        (status = 503, description = "Upstream unavailable", body = crate::types::ErrorBody),
        (status = 504, description = "Generation timed out", body = crate::types::ErrorBody)
    ),
    tag = "query"
)]
pub async fn query(
    State(state): State<AppState>,
    Json(payload): Json<QueryRequest>,
) -> Result<Json<QueryResponse>> {
    let response = state.service.query(&payload.query).await?;
    Ok(Json(response))
}

/// Answer a question passed in the query string
#[utoipa::path(
    get,
    path = "/input",
    params(InputParams),
    responses(
        (status = 200, description = "Answer with its sources", body = QueryResponse),
        (status = 400, description = "Empty query", body = crate::types::ErrorBody)
    ),
    tag = "query"
)]
pub async fn input(
    State(state): State<AppState>,
    Query(params): Query<InputParams>,
) -> Result<Json<QueryResponse>> {
    let response = state.service.query(&params.input_string).await?;
    Ok(Json(response))
}
