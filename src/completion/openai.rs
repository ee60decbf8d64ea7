//! Client for any service speaking the OpenAI `/chat/completions` format.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CompletionClient, CompletionRequest};
use crate::error::CompletionError;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_UPSTREAM_ERROR_CHARS: usize = 200;

pub struct OpenAiClient {
    /// Pre-computed completions URL (avoids `format!` per request).
    chat_url: String,
    /// Pre-computed `Authorization` value.
    auth_header: String,
    client: Client,
}

impl OpenAiClient {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Self {
        let base = base_url.trim_end_matches('/');
        let chat_url = if base.contains("chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        };
        Self {
            chat_url,
            auth_header: format!("Bearer {api_key}"),
            client: build_http_client(timeout_secs),
        }
    }

    fn chat_completions_url(&self) -> &str {
        &self.chat_url
    }
}

fn build_http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new())
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

fn wire_request(request: &CompletionRequest) -> ChatRequest {
    let capacity = if request.system.is_some() { 2 } else { 1 };
    let mut messages = Vec::with_capacity(capacity);
    if let Some(system) = &request.system {
        messages.push(Message {
            role: "system",
            content: system.clone(),
        });
    }
    messages.push(Message {
        role: "user",
        content: request.prompt.clone(),
    });
    ChatRequest {
        model: request.model.clone(),
        messages,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    }
}

fn classify_transport(err: &reqwest::Error) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout
    } else {
        CompletionError::Upstream(format!("transport: {err}"))
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        let wire = wire_request(request);
        let response = self
            .client
            .post(self.chat_completions_url())
            .header(AUTHORIZATION, &self.auth_header)
            .json(&wire)
            .send()
            .await
            .map_err(|err| classify_transport(&err))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            return Err(CompletionError::RateLimited { retry_after_secs });
        }
        if status == StatusCode::REQUEST_TIMEOUT {
            return Err(CompletionError::Timeout);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Upstream(format!(
                "HTTP {status}: {}",
                sanitize_upstream_error(&body)
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|err| CompletionError::InvalidResponse(format!("undecodable payload: {err}")))?;
        let text = payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(CompletionError::InvalidResponse(
                "completion text missing or empty".into(),
            ));
        }
        Ok(text)
    }
}

fn redact_after(text: &mut String, marker: &str) {
    fn is_secret_char(c: char) -> bool {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/' | '=')
    }

    let mut from = 0;
    while let Some(rel) = text[from..].find(marker) {
        let start = from + rel;
        let token_start = start + marker.len();
        let token_len = text[token_start..]
            .find(|c: char| !is_secret_char(c))
            .unwrap_or(text.len() - token_start);
        // A bare marker with no token value stays as-is.
        if token_len == 0 {
            from = token_start;
            continue;
        }
        text.replace_range(start..token_start + token_len, "[REDACTED]");
        from = start + "[REDACTED]".len();
    }
}

/// API keys show up verbatim in some upstream error bodies. Scrub the common
/// shapes and cap the length before the text lands in logs or outcomes.
fn sanitize_upstream_error(body: &str) -> String {
    const MARKERS: [&str; 5] = [
        "sk-",
        "api_key=",
        "\"api_key\":\"",
        "access_token=",
        "Authorization: Bearer ",
    ];

    let mut text = body.to_string();
    for marker in MARKERS {
        redact_after(&mut text, marker);
    }
    if text.chars().count() > MAX_UPSTREAM_ERROR_CHARS {
        let mut end = MAX_UPSTREAM_ERROR_CHARS;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
        text.push_str("...");
    }
    text
}
