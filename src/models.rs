use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;

pub const MAX_PROMPT_CHARS: usize = 5000;

// Inbound body for POST /api/generate. The prompt stays loosely typed so a
// non-string prompt gets a proper validation message.
#[derive(Deserialize, Debug, Default)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default, rename = "chartType")]
    pub chart_type: Option<String>,
}

// Validated request, lives only for the duration of one call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub chart_type: Option<String>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, chart_type: Option<&str>) -> Result<Self, GatewayError> {
        let prompt = prompt.into();
        if prompt.is_empty() {
            return Err(GatewayError::invalid(
                "Prompt is required and must be a string",
            ));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(GatewayError::invalid(format!(
                "Prompt is too long (max {MAX_PROMPT_CHARS} characters)"
            )));
        }
        // only "" means "no chart type"; any other label is kept byte-exact
        let chart_type = chart_type.filter(|t| !t.is_empty()).map(String::from);
        Ok(Self { prompt, chart_type })
    }
}

impl TryFrom<GenerateBody> for GenerationRequest {
    type Error = GatewayError;

    fn try_from(body: GenerateBody) -> Result<Self, Self::Error> {
        match body.prompt {
            Some(Value::String(prompt)) => Self::new(prompt, body.chart_type.as_deref()),
            _ => Err(GatewayError::invalid(
                "Prompt is required and must be a string",
            )),
        }
    }
}

// Canonical response shape
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GenerateResponse {
    pub text: String,
    pub cached: bool,
}

// Gemini generateContent request format
#[derive(Serialize, Debug)]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl GeminiRequest {
    pub fn user_text(text: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(text.to_string()),
                }],
            }],
        }
    }
}

// Gemini generateContent response format (only the fields we read)
#[derive(Deserialize, Debug, Default)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

impl GeminiResponse {
    // Text parts of the first candidate, in order, joined by newlines.
    // `None` when the candidate carries no text at all.
    pub fn joined_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> GenerateBody {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_legacy_body_without_chart_type() {
        let req = GenerationRequest::try_from(body(json!({"prompt": "Photosynthesis"}))).unwrap();
        assert_eq!(req.prompt, "Photosynthesis");
        assert_eq!(req.chart_type, None);
    }

    #[test]
    fn test_chart_type_is_kept_exact_and_empty_dropped() {
        let req = GenerationRequest::try_from(body(
            json!({"prompt": "Rain", "chartType": "cause"}),
        ))
        .unwrap();
        assert_eq!(req.chart_type.as_deref(), Some("cause"));

        let req =
            GenerationRequest::try_from(body(json!({"prompt": "Rain", "chartType": " cause "})))
                .unwrap();
        assert_eq!(req.chart_type.as_deref(), Some(" cause "));

        let req =
            GenerationRequest::try_from(body(json!({"prompt": "Rain", "chartType": ""}))).unwrap();
        assert_eq!(req.chart_type, None);
    }

    #[test]
    fn test_rejects_missing_empty_and_non_string_prompts() {
        for v in [
            json!({}),
            json!({"prompt": ""}),
            json!({"prompt": 42}),
            json!({"prompt": ["a"]}),
            json!({"prompt": null}),
        ] {
            let err = GenerationRequest::try_from(body(v)).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidRequest(_)));
        }
    }

    #[test]
    fn test_whitespace_prompt_is_accepted() {
        let req = GenerationRequest::new("   ", None).unwrap();
        assert_eq!(req.prompt, "   ");
    }

    #[test]
    fn test_length_limit_counts_chars() {
        assert!(GenerationRequest::new("a".repeat(MAX_PROMPT_CHARS), None).is_ok());
        assert!(GenerationRequest::new("é".repeat(MAX_PROMPT_CHARS), None).is_ok());
        let err = GenerationRequest::new("a".repeat(MAX_PROMPT_CHARS + 1), None).unwrap_err();
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_joined_text_uses_first_candidate_parts() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "one"}, {"text": "two"}]}},
                {"content": {"parts": [{"text": "ignored"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(resp.joined_text().as_deref(), Some("one\ntwo"));
    }

    #[test]
    fn test_joined_text_none_without_parts() {
        let resp: GeminiResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert_eq!(resp.joined_text(), None);
        let resp: GeminiResponse =
            serde_json::from_value(json!({"candidates": [{"finishReason": "SAFETY"}]})).unwrap();
        assert_eq!(resp.joined_text(), None);
    }

    #[test]
    fn test_user_text_request_shape() {
        let v = serde_json::to_value(GeminiRequest::user_text("hi")).unwrap();
        assert_eq!(
            v,
            json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]})
        );
    }
}
