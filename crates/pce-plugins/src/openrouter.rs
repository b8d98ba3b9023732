// crates/pce-plugins/src/openrouter.rs
// ============================================================================
// Module: OpenRouter Reply Provider
// Description: Time-boxed chat-completions client for assistant replies.
// Purpose: Produce replies under a hard deadline with sanitized failures.
// Dependencies: pce-core, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! The reply provider calls the OpenRouter chat-completions endpoint with a
//! hard per-request timeout. Failures map into a small sanitized taxonomy
//! (`auth`, `timeout`, `rate_limited`, `transport`): raw provider responses
//! and secrets never reach transcripts or explanation bags.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use pce_core::LlmError;
use pce_core::LlmReply;
use pce_core::ReplyProvider;
use pce_core::ReplyRequest;
use reqwest::Client;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Settings
// ============================================================================

/// OpenRouter provider settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct OpenRouterSettings {
    /// API key.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Chat completions base URL.
    pub base_url: String,
    /// Hard reply deadline.
    pub timeout: Duration,
    /// Optional HTTP referer header.
    pub http_referer: Option<String>,
    /// Optional X-Title header.
    pub x_title: Option<String>,
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    /// Model identifier.
    model: String,
    /// Conversation messages.
    messages: Vec<ChatMessage>,
}

/// One chat message.
#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    /// Message role.
    role: String,
    /// Message content.
    content: String,
}

/// Chat completion response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    /// Completion choices.
    choices: Vec<ChatChoice>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct ChatChoice {
    /// Choice message.
    message: ChatMessage,
}

// ============================================================================
// SECTION: Provider
// ============================================================================

/// OpenRouter-backed reply provider.
pub struct OpenRouterReplyProvider {
    /// HTTP client with default headers and the hard timeout applied.
    client: Client,
    /// Provider settings.
    settings: OpenRouterSettings,
}

impl OpenRouterReplyProvider {
    /// Builds a provider from settings.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Auth`] when the API key is not header-safe and
    /// [`LlmError::Transport`] when the client cannot be constructed.
    pub fn new(settings: OpenRouterSettings) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|_| LlmError::Auth)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(referer) = &settings.http_referer
            && let Ok(value) = HeaderValue::from_str(referer)
        {
            headers.insert("HTTP-Referer", value);
        }
        if let Some(title) = &settings.x_title
            && let Ok(value) = HeaderValue::from_str(title)
        {
            headers.insert("X-Title", value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|err| LlmError::Transport(format!("client build failed: {err}")))?;
        Ok(Self { client, settings })
    }

    /// Builds the system message from session hints.
    fn system_message(request: &ReplyRequest) -> String {
        let mut lines = vec!["You are a concise operations assistant.".to_string()];
        if !request.preferences.is_empty() {
            lines.push(format!("Prefer: {}.", request.preferences.join("; ")));
        }
        if !request.avoid.is_empty() {
            lines.push(format!("Avoid: {}.", request.avoid.join("; ")));
        }
        lines.join(" ")
    }
}

#[async_trait]
impl ReplyProvider for OpenRouterReplyProvider {
    async fn reply(&self, request: &ReplyRequest) -> Result<LlmReply, LlmError> {
        let body = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: Self::system_message(request) },
                ChatMessage { role: "user".to_string(), content: request.prompt.clone() },
            ],
        };
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));

        let response = self.client.post(url).json(&body).send().await.map_err(|err| {
            if err.is_timeout() {
                LlmError::Timeout
            } else {
                LlmError::Transport("request failed".to_string())
            }
        })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(LlmError::Auth),
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            status => return Err(LlmError::Transport(format!("http {}", status.as_u16()))),
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|_| LlmError::Transport("malformed completion".to_string()))?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::Transport("empty completion".to_string()))?;

        Ok(LlmReply { text, decoding: format!("model={}", self.settings.model) })
    }
}
