use patchflow_core::GeneratorConfig;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde_json::{Value, json};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub prompt: String,
}

#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GeneratorError {
    /// HTTP 429 or 402: the upstream is rate limiting or out of quota.
    /// Callers must surface this immediately instead of retrying.
    #[error("rate limited (HTTP {status})")]
    RateLimited { status: u16 },
    #[error("generator request failed (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("generator transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generator returned an empty completion")]
    EmptyCompletion,
    #[error("api key missing: set {0}")]
    MissingApiKey(String),
}

impl GeneratorError {
    /// Quota exhaustion, outage, and timeouts are all "unavailable" to the
    /// pipeline; malformed output and auth problems are not.
    pub fn is_unavailable(&self) -> bool {
        match self {
            GeneratorError::RateLimited { .. } => true,
            GeneratorError::Transport(_) => true,
            _ => false,
        }
    }
}

/// One chat-completion call: system instruction plus user prompt in,
/// free text out. Implementations must map upstream rate-limit/quota
/// responses to `GeneratorError::RateLimited`.
pub trait Generator {
    fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, GeneratorError>;
}

#[derive(Debug, Clone)]
pub struct HttpGenerator {
    cfg: GeneratorConfig,
    client: Client,
}

impl HttpGenerator {
    pub fn new(cfg: GeneratorConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self { cfg, client })
    }

    fn build_payload(&self, req: &GenerateRequest) -> Value {
        json!({
            "model": self.cfg.model,
            "messages": [
                {"role": "system", "content": req.system},
                {"role": "user", "content": req.prompt},
            ],
            "max_tokens": self.cfg.max_tokens,
            "temperature": self.cfg.temperature,
            "stream": false,
        })
    }
}

impl Generator for HttpGenerator {
    fn generate(&self, req: &GenerateRequest) -> Result<GenerateResponse, GeneratorError> {
        let api_key = self
            .cfg
            .resolve_api_key()
            .ok_or_else(|| GeneratorError::MissingApiKey(self.cfg.api_key_env.clone()))?;

        let resp = self
            .client
            .post(&self.cfg.endpoint)
            .bearer_auth(api_key)
            .json(&self.build_payload(req))
            .send()?;

        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let text = parse_completion(&body)?;
        Ok(GenerateResponse { text })
    }
}

fn classify_status(status: StatusCode, body: &str) -> GeneratorError {
    // 402 is the upstream's quota-exhausted signal; treat it like 429.
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PAYMENT_REQUIRED {
        return GeneratorError::RateLimited {
            status: status.as_u16(),
        };
    }
    GeneratorError::Api {
        status: status.as_u16(),
        message: extract_error_message(body),
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error"))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| truncate(body, 200))
}

fn parse_completion(body: &str) -> Result<String, GeneratorError> {
    let value: Value = serde_json::from_str(body).map_err(|_| GeneratorError::EmptyCompletion)?;
    let content = value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(GeneratorError::EmptyCompletion);
    }
    Ok(content.to_string())
}

fn truncate(raw: &str, max: usize) -> String {
    if raw.len() <= max {
        return raw.to_string();
    }
    let mut end = max;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    raw[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_statuses_map_to_rate_limited() {
        for code in [429_u16, 402] {
            let err = classify_status(StatusCode::from_u16(code).expect("status"), "{}");
            assert!(matches!(err, GeneratorError::RateLimited { status } if status == code));
            assert!(err.is_unavailable());
        }
    }

    #[test]
    fn other_statuses_carry_the_upstream_message() {
        let err = classify_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error": {"message": "backend exploded"}}"#,
        );
        match err {
            GeneratorError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "backend exploded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parses_chat_completion_content() {
        let body = r#"{"choices": [{"message": {"content": "[patchflow] msg\n--- a/x"}}]}"#;
        assert_eq!(
            parse_completion(body).expect("content"),
            "[patchflow] msg\n--- a/x"
        );
    }

    #[test]
    fn blank_completion_is_an_error() {
        let body = r#"{"choices": [{"message": {"content": "  "}}]}"#;
        assert!(matches!(
            parse_completion(body),
            Err(GeneratorError::EmptyCompletion)
        ));
    }
}
