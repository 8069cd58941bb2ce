// Error taxonomy for the gateway and its HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

// Every failure the gateway can report.
//
// `Clone` because a single upstream result is fanned out to every request
// coalesced onto the same cache key.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    // Bad client input (empty, oversized, or non-string prompt, unparsable body).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // The server is missing something it needs, such as the upstream API key.
    #[error("Configuration error: {0}")]
    Configuration(String),

    // The upstream generation call failed or returned something unusable.
    #[error("Upstream error{}: {message}", status_suffix(.status))]
    Upstream {
        status: Option<u16>,
        message: String,
    },

    // Cache store failure. The proxy degrades instead of surfacing this.
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Cache(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    // Stable machine-readable code for the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Configuration(_) => "configuration_error",
            Self::Upstream { .. } => "upstream_error",
            Self::Cache(_) => "cache_error",
            Self::RateLimited => "rate_limited",
            Self::Internal(_) => "internal_error",
        }
    }

    // Client-facing sentence. Validation messages are safe to echo; the rest
    // stay generic and the inner text goes to `details` in dev mode only.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidRequest(msg) => msg.clone(),
            Self::Configuration(_) => "Server is not configured for generation".to_string(),
            Self::Upstream {
                status: Some(status),
                ..
            } => format!("Failed to generate chart text (upstream status {status})"),
            Self::Upstream { status: None, .. } => "Failed to generate chart text".to_string(),
            Self::Cache(_) => "Cache unavailable".to_string(),
            Self::RateLimited => "Too many requests, please try again later".to_string(),
            Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            Self::InvalidRequest(_) | Self::RateLimited => None,
            Self::Configuration(msg) | Self::Cache(msg) | Self::Internal(msg) => Some(msg.clone()),
            Self::Upstream { message, .. } => Some(message.clone()),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// A `GatewayError` on its way out of a handler, plus whether internal
// details may be shown.
pub struct ApiError {
    pub error: GatewayError,
    pub expose_details: bool,
}

impl ApiError {
    pub fn new(error: GatewayError, expose_details: bool) -> Self {
        Self {
            error,
            expose_details,
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        Self::new(error, false)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error.code(),
            message: self.error.public_message(),
            details: if self.expose_details {
                self.error.details()
            } else {
                None
            },
        };
        (self.error.status_code(), Json(body)).into_response()
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::invalid("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::Configuration("k".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            GatewayError::upstream(Some(503), "busy").status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_upstream_display_includes_status() {
        let err = GatewayError::upstream(Some(429), "quota");
        assert_eq!(err.to_string(), "Upstream error (429): quota");
        let err = GatewayError::upstream(None, "timeout");
        assert_eq!(err.to_string(), "Upstream error: timeout");
    }

    #[tokio::test]
    async fn test_details_hidden_outside_dev_mode() {
        let resp = ApiError::new(GatewayError::upstream(Some(500), "secret body"), false)
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "upstream_error");
        assert!(json["message"].as_str().unwrap().contains("500"));
        assert!(json.get("details").is_none());
    }

    #[tokio::test]
    async fn test_details_shown_in_dev_mode() {
        let resp = ApiError::new(GatewayError::Configuration("no key".into()), true)
            .into_response();
        let json = body_json(resp).await;
        assert_eq!(json["error"], "configuration_error");
        assert_eq!(json["details"], "no key");
    }
}
