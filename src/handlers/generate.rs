use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ApiError, GatewayError};
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{GenerateBody, GenerateResponse, GenerationRequest};
use crate::state::AppState;

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();
    let fail = |e: GatewayError| ApiError::new(e, state.expose_details);

    // malformed JSON gets the same error shape as any other bad input
    let Json(body) = payload.map_err(|e| fail(GatewayError::invalid(e.body_text())))?;
    let request = GenerationRequest::try_from(body).map_err(fail)?;

    let result = state.proxy.generate(request).await.map_err(fail);

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    result.map(Json)
}
