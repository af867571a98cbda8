//! OpenAI-compatible Chat Completions generator
//!
//! Works against api.openai.com and any server exposing the same
//! `/chat/completions` shape (Ollama, LM Studio, vLLM). The API key is read
//! from the configured environment variable before each request, and is
//! optional so local servers work without one.

use super::Generator;
use crate::{ConvTreeConfig, ConvTreeError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RETRY_ATTEMPTS: u32 = 4;
const RETRY_BASE_DELAY_MS: u64 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_DETAIL_CHARS: usize = 300;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// One failed attempt, tagged with whether a retry may succeed
struct AttemptError {
    error: ConvTreeError,
    retryable: bool,
}

impl AttemptError {
    fn fatal(error: ConvTreeError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }

    fn retryable(error: ConvTreeError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }
}

/// Generator backed by a Chat Completions endpoint
#[derive(Debug)]
pub struct OpenAiGenerator {
    client: Client,
    model: String,
    base_url: String,
    api_key_env: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiGenerator {
    pub fn new(config: &ConvTreeConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(15))
            .user_agent(concat!("convtree/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConvTreeError::Generation(format!("failed to build HTTP client: {e}")))?;

        debug!(
            "OpenAI generator: model={}, base_url={}, key_env={}",
            config.model, config.base_url, config.api_key_env
        );

        Ok(Self {
            client,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key_env: config.api_key_env.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn retry_backoff(attempt: u32) -> Duration {
        let exp = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(RETRY_BASE_DELAY_MS.saturating_mul(exp))
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    async fn send_once(&self, prompt: &str) -> std::result::Result<String, AttemptError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let mut req_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(key) = self.api_key() {
            req_builder = req_builder.bearer_auth(key);
        }

        let response = req_builder
            .json(&request)
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = truncate_error_detail(&extract_error_detail(&body), MAX_ERROR_DETAIL_CHARS);
            let message = if detail.is_empty() {
                format!("API error {status}")
            } else {
                format!("API error {status}: {detail}")
            };
            let error = ConvTreeError::Generation(message);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                AttemptError::retryable(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::fatal(ConvTreeError::Generation(e.to_string())))?;

        Ok(chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default())
    }

    fn map_reqwest_error(e: reqwest::Error) -> AttemptError {
        if e.is_timeout() {
            AttemptError::retryable(ConvTreeError::Generation(format!("timeout: {e}")))
        } else if e.is_connect() {
            AttemptError::retryable(ConvTreeError::Generation(format!("network: {e}")))
        } else {
            AttemptError::fatal(ConvTreeError::Generation(e.to_string()))
        }
    }
}

impl Generator for OpenAiGenerator {
    /// Call the endpoint, retrying timeouts, connection failures, 429 and
    /// 5xx responses with exponential backoff.
    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("Calling {} with prompt length: {}", self.model, prompt.len());

        let mut attempt = 0;
        loop {
            match self.send_once(prompt).await {
                Ok(content) => {
                    debug!("Response length: {}", content.len());
                    return Ok(content);
                }
                Err(failed) if failed.retryable && attempt + 1 < MAX_RETRY_ATTEMPTS => {
                    attempt += 1;
                    let delay = Self::retry_backoff(attempt);
                    warn!(
                        "Generation failed (attempt {}/{}): {}, retrying in {:?}",
                        attempt, MAX_RETRY_ATTEMPTS, failed.error, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failed) => return Err(failed.error),
            }
        }
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Pull a human-readable message out of an error body
fn extract_error_detail(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(msg) = value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return msg.to_string();
        }
        if let Some(msg) = value.get("error").and_then(|e| e.as_str()) {
            return msg.to_string();
        }
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
    }

    trimmed.to_string()
}

fn truncate_error_detail(detail: &str, max_chars: usize) -> String {
    if detail.chars().count() <= max_chars {
        return detail.to_string();
    }

    let mut truncated = detail.chars().take(max_chars).collect::<String>();
    truncated.push_str("... [truncated]");
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            max_tokens: 64,
            temperature: 0.5,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_extract_error_detail() {
        assert_eq!(
            extract_error_detail(r#"{"error":{"message":"bad key"}}"#),
            "bad key"
        );
        assert_eq!(extract_error_detail(r#"{"error":"model not found"}"#), "model not found");
        assert_eq!(extract_error_detail(r#"{"message":"slow down"}"#), "slow down");
        assert_eq!(extract_error_detail("  plain text  "), "plain text");
        assert_eq!(extract_error_detail(""), "");
    }

    #[test]
    fn test_truncate_error_detail() {
        assert_eq!(truncate_error_detail("short", 10), "short");
        assert_eq!(truncate_error_detail("abcdef", 3), "abc... [truncated]");
    }

    #[test]
    fn test_backoff_grows() {
        assert_eq!(OpenAiGenerator::retry_backoff(1), Duration::from_millis(200));
        assert_eq!(OpenAiGenerator::retry_backoff(2), Duration::from_millis(400));
        assert_eq!(OpenAiGenerator::retry_backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ConvTreeConfig::default().with_base_url("http://localhost:1234/v1/");
        let generator = OpenAiGenerator::new(&config).unwrap();
        assert_eq!(generator.base_url, "http://localhost:1234/v1");
        assert_eq!(generator.model(), crate::DEFAULT_MODEL);
    }
}
