//! Remote OCR: build a chat-completions request for a batch and send it.
//!
//! The wire format is the OpenAI chat-completions schema, which Ollama,
//! vLLM, LM Studio, LiteLLM and most hosted gateways also accept:
//!
//! ```text
//! POST {api_base}/chat/completions
//! Authorization: Bearer {api_key}
//! { "model": …, "temperature": 0.0, "max_tokens": 8000,
//!   "messages": [ {"role":"system","content":"…"},
//!                 {"role":"user","content":[{"type":"text",…},{"type":"image_url",…}…]} ] }
//! ```
//!
//! Requests go through the [`ChatBackend`] trait so the batching loop can be
//! driven by an in-memory double in tests. There is no retry: any transport
//! error or non-success status is returned to the caller as-is.

use crate::config::{ConnectionConfig, ConversionConfig};
use crate::error::OcrError;
use crate::pipeline::batch::Batch;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Longest error body kept in an [`OcrError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

// ── Wire types ───────────────────────────────────────────────────────────────

/// A chat-completions request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    /// A user turn carrying `text` followed by one image part per data URI.
    pub fn user_with_images<'a>(
        text: impl Into<String>,
        image_urls: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut parts = vec![ContentPart::Text { text: text.into() }];
        parts.extend(image_urls.into_iter().map(|url| ContentPart::ImageUrl {
            image_url: ImageUrl {
                url: url.to_string(),
            },
        }));
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
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

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

/// The assistant text of one completion plus token usage (0 when unreported).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: String,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

impl ChatCompletion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

// ── Backend ──────────────────────────────────────────────────────────────────

/// Anything that can answer a chat-completions request.
pub trait ChatBackend {
    fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> impl Future<Output = Result<ChatCompletion, OcrError>> + Send;
}

/// HTTP client for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    /// Build a client for `connection`. `timeout_secs = None` never times out.
    pub fn new(connection: &ConnectionConfig, timeout_secs: Option<u64>) -> Result<Self, OcrError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| OcrError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            url: connection.completions_url(),
            api_key: connection.api_key.trim().to_string(),
        })
    }

    /// The chat-completions URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ChatBackend for OpenAiCompatibleClient {
    async fn complete(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, OcrError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OcrError::Network {
                url: self.url.clone(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(&self.url, status.as_u16(), retry_after, &body));
        }

        let body = response.text().await.map_err(|e| OcrError::Network {
            url: self.url.clone(),
            detail: e.to_string(),
        })?;
        parse_completion(&body)
    }
}

/// Build the request for one batch: system prompt, then a user turn with the
/// instruction text followed by every page image in page order.
pub fn build_request(batch: &Batch, config: &ConversionConfig) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.connection.model.clone(),
        messages: vec![
            ChatMessage::system(config.system_prompt()),
            ChatMessage::user_with_images(
                config.user_prompt(),
                batch.pages.iter().map(|p| p.data_uri.as_str()),
            ),
        ],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

/// Decode a chat-completions body. A null `content` reads as empty text.
pub fn parse_completion(body: &str) -> Result<ChatCompletion, OcrError> {
    let parsed: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| OcrError::MalformedResponse {
            detail: e.to_string(),
        })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OcrError::MalformedResponse {
            detail: "response has no choices".into(),
        })?;

    let usage = parsed.usage.unwrap_or_default();
    debug!(
        "Completion: {} input tokens, {} output tokens",
        usage.prompt_tokens, usage.completion_tokens
    );

    Ok(ChatCompletion {
        content: choice.message.content.unwrap_or_default(),
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
    })
}

/// Map a non-success HTTP status to the matching error.
pub fn status_error(url: &str, status: u16, retry_after_secs: Option<u64>, body: &str) -> OcrError {
    let body: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    match status {
        401 | 403 => OcrError::AuthError {
            url: url.to_string(),
            status,
            detail: body,
        },
        429 => OcrError::RateLimitExceeded {
            url: url.to_string(),
            retry_after_secs,
        },
        _ => OcrError::ApiError { status, body },
    }
}
