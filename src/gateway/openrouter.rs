//! OpenRouter adapter for chat completions.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::*;

// =============================================================================
// TRAIT
// =============================================================================

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError>;
}

// =============================================================================
// OPENROUTER ADAPTER
// =============================================================================

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Name proposals are a few dozen tokens; anything near this is garbage.
const MAX_RESPONSE_LEN: usize = 64 * 1_024;

const MAX_INPUT_CHARS: usize = 32_000;

#[derive(Debug, Clone)]
pub struct OpenRouterAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterAdapter {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(api_key, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, None)
    }

    /// Reads `OPENROUTER_API_KEY`, `OPENROUTER_BASE_URL`,
    /// `OPENROUTER_TIMEOUT_SECONDS` and `OPENROUTER_APP_TITLE`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ProviderError::config("OPENROUTER_API_KEY not set"))?;

        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let timeout = std::env::var("OPENROUTER_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let app_title = std::env::var("OPENROUTER_APP_TITLE").ok();

        Self::with_config(api_key, base_url, timeout, app_title)
    }

    pub fn with_config(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
        app_title: Option<String>,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ProviderError::config("Invalid API key format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        if let Some(title) = app_title.as_deref() {
            if let Ok(v) = HeaderValue::from_str(title) {
                headers.insert("X-Title", v);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn extract_request_id(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// First-line refusal phrasing from models that ignore the JSON contract.
    fn is_refusal(msg: &str) -> bool {
        let l = msg.trim_start().to_lowercase();
        let first_line = l.lines().next().unwrap_or("");

        const PREFIXES: &[&str] = &[
            "refus",
            "i cannot",
            "i can't",
            "i won't",
            "i will not",
            "i'm unable to",
            "i am unable to",
            "unable to comply",
        ];

        PREFIXES.iter().any(|p| first_line.starts_with(p))
    }
}

// =============================================================================
// API TYPES
// =============================================================================

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<JsonObjectFormat>,
}

#[derive(Serialize)]
struct JsonObjectFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Both success and error bodies share this envelope.
#[derive(Deserialize, Default)]
struct CompletionEnvelope {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<TokenUsage>,
    error: Option<EnvelopeError>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TokenUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct EnvelopeError {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

/// Completion text plus accounting, before latency is attached.
#[derive(Debug)]
struct Completion {
    content: String,
    finish_reason: FinishReason,
    usage: TokenUsage,
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

/// Map a non-2xx response to a provider error. 429 and 5xx are retryable.
fn status_error(status: u16, body: &str, mut ctx: ErrorContext) -> ProviderError {
    let envelope_error = serde_json::from_str::<CompletionEnvelope>(body)
        .ok()
        .and_then(|e| e.error);
    let message = match envelope_error {
        Some(error) => {
            if let Some(code) = error.code {
                let code = match code {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                ctx = ctx.with_code(code);
            }
            error.message.unwrap_or_default()
        }
        None => format!("HTTP {status}"),
    };

    if status == 429 {
        return ProviderError::rate_limited(Duration::from_secs(60), ctx);
    }
    ProviderError::provider_with_context("openrouter", message, status >= 500, ctx)
}

/// Parse a 2xx body. Refusals, in-band errors and empty choice lists are errors.
fn parse_completion(body: &str) -> Result<Completion, ProviderError> {
    let envelope: CompletionEnvelope = serde_json::from_str(body).map_err(|e| {
        ProviderError::provider("openrouter", format!("Invalid JSON: {e}"), false)
    })?;

    if let Some(error) = envelope.error {
        let message = error.message.unwrap_or_default();
        return Err(if OpenRouterAdapter::is_refusal(&message) {
            ProviderError::refused(message)
        } else {
            ProviderError::provider("openrouter", message, false)
        });
    }

    let Some(choice) = envelope.choices.into_iter().next() else {
        return Err(ProviderError::provider(
            "openrouter",
            "No choices in response",
            false,
        ));
    };

    let finish_reason = FinishReason::from(choice.finish_reason);
    let content = choice
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();

    if finish_reason == FinishReason::ContentFilter || OpenRouterAdapter::is_refusal(&content) {
        return Err(ProviderError::refused(content));
    }

    Ok(Completion {
        content,
        finish_reason,
        usage: envelope.usage.unwrap_or_default(),
    })
}

// =============================================================================
// CHAT PROVIDER IMPL
// =============================================================================

#[async_trait]
impl ChatProvider for OpenRouterAdapter {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let prompt_chars: usize = req.messages.iter().map(|m| m.content.len()).sum();
        if prompt_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "prompt has {prompt_chars} chars, limit is {MAX_INPUT_CHARS}"
            )));
        }

        let started = Instant::now();
        let body = CompletionBody {
            model: req.model.model_id(),
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: req.json_mode.then_some(JsonObjectFormat {
                kind: "json_object",
            }),
        };

        let mut response = self.client.post(self.chat_url()).json(&body).send().await?;
        let status = response.status().as_u16();
        let mut ctx = ErrorContext::new().with_status(status);
        if let Some(id) = Self::extract_request_id(response.headers()) {
            ctx = ctx.with_request_id(id);
        }

        let mut raw = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if raw.len() + chunk.len() > MAX_RESPONSE_LEN {
                return Err(ProviderError::provider_with_context(
                    "openrouter",
                    format!("response exceeds {MAX_RESPONSE_LEN} bytes"),
                    false,
                    ctx,
                ));
            }
            raw.extend_from_slice(&chunk);
        }
        let text = String::from_utf8_lossy(&raw);

        if !(200..300).contains(&status) {
            return Err(status_error(status, &text, ctx));
        }

        let completion = parse_completion(&text)?;
        Ok(ChatResponse {
            content: completion.content,
            input_tokens: completion.usage.prompt_tokens,
            output_tokens: completion.usage.completion_tokens,
            latency: started.elapsed(),
            finish_reason: completion.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_detection_reads_first_line() {
        assert!(OpenRouterAdapter::is_refusal("I cannot help with that."));
        assert!(OpenRouterAdapter::is_refusal("  Refusing: policy"));
        assert!(!OpenRouterAdapter::is_refusal("{\"name\": \"Pathfinder\"}"));
        assert!(!OpenRouterAdapter::is_refusal("ok\nI cannot"));
    }

    #[test]
    fn completion_defaults_missing_usage_to_zero() {
        let completion = parse_completion(
            r#"{"choices": [{"message": {"content": "{\"name\": \"Wayfinder\"}"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(completion.content, r#"{"name": "Wayfinder"}"#);
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.usage.prompt_tokens, 0);
    }

    #[test]
    fn in_band_errors_and_empty_choices_fail() {
        let err = parse_completion(r#"{"error": {"message": "I won't do that"}}"#).unwrap_err();
        assert_eq!(err.code(), "refused");

        let err = parse_completion(r#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.code(), "provider_error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_errors_carry_provider_code() {
        let err = status_error(
            503,
            r#"{"error": {"message": "overloaded", "code": 503}}"#,
            ErrorContext::new().with_status(503),
        );
        assert!(err.is_retryable());
        assert_eq!(err.context().and_then(|c| c.provider_code.as_deref()), Some("503"));

        let err = status_error(404, "not json", ErrorContext::new());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let adapter = OpenRouterAdapter::with_config(
            "k",
            "http://localhost:9999/api/v1/",
            Duration::from_secs(1),
            None,
        )
        .unwrap();
        assert_eq!(
            adapter.chat_url(),
            "http://localhost:9999/api/v1/chat/completions"
        );
    }
}
