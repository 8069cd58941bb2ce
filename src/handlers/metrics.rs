use axum::response::IntoResponse;

use crate::error::GatewayError;

pub async fn metrics_handler() -> Result<impl IntoResponse, GatewayError> {
    crate::metrics::render()
}
