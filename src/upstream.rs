// Upstream text generation.
//
// TextGenerator is the single network dependency of the proxy;
// GeminiClient implements it against the Gemini `generateContent` REST API.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::GatewayError;
use crate::models::{GeminiRequest, GeminiResponse};

// Turns a fully templated prompt into raw generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    // One attempt, no retries. Returns the raw (uncleaned) text.
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_key,
            // GEMINI_MODEL is often given as "models/<name>"
            model: model.trim().trim_start_matches("models/").to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GatewayError::Configuration(
                "GEMINI_API_KEY is not set".to_string(),
            ));
        };

        debug!(model = %self.model, "Calling Gemini");
        let res = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .timeout(self.timeout)
            .json(&GeminiRequest::user_text(prompt))
            .send()
            .await
            .map_err(|e| {
                warn!("Gemini request failed: {}", e);
                GatewayError::upstream(None, format!("request failed: {e}"))
            })?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GatewayError::upstream(Some(status.as_u16()), format!("body read failed: {e}")))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Gemini returned an error status");
            return Err(GatewayError::upstream(Some(status.as_u16()), body));
        }

        let parsed: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::upstream(Some(status.as_u16()), format!("parse error: {e}"))
        })?;

        parsed.joined_text().ok_or_else(|| {
            GatewayError::upstream(Some(status.as_u16()), "response contained no text")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: &str, key: Option<&str>) -> GeminiClient {
        GeminiClient::new(
            reqwest::Client::new(),
            key.map(String::from),
            "models/gemini-test",
            base_url,
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_model_prefix_is_stripped() {
        let c = client("http://localhost/v1beta/", Some("k"));
        assert_eq!(c.model(), "gemini-test");
        assert_eq!(
            c.endpoint(),
            "http://localhost/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn test_debug_redacts_key() {
        let c = client("http://localhost", Some("super-secret"));
        assert!(!format!("{c:?}").contains("super-secret"));
    }

    #[tokio::test]
    async fn test_generate_joins_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "Describe rain"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "**Rain**"}, {"text": "falls"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server.uri(), Some("test-key"))
            .generate("Describe rain")
            .await
            .unwrap();
        assert_eq!(text, "**Rain**\nfalls");
    }

    #[tokio::test]
    async fn test_missing_key_never_calls_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server.uri(), None).generate("x").await.unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_error_status_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("k")).generate("x").await.unwrap_err();
        assert_eq!(err, GatewayError::upstream(Some(429), "quota exhausted"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("k")).generate("x").await.unwrap_err();
        match err {
            GatewayError::Upstream { status, message } => {
                assert_eq!(status, Some(200));
                assert!(message.starts_with("parse error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client(&server.uri(), Some("k")).generate("x").await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_is_upstream_error() {
        // port 1 is unassigned, so the connect is refused
        let err = client("http://127.0.0.1:1", Some("k"))
            .generate("x")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Upstream { status: None, .. }));
    }
}
