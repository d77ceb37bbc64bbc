//! Configuration types for invoice OCR.
//!
//! Two structs split the knobs by lifetime:
//!
//! * [`ConnectionConfig`]: where to send requests and as whom. Supplied by
//!   the caller for each invocation and validated before any work starts.
//! * [`ConversionConfig`]: the connection plus every pipeline option
//!   (batch size, render scale, sampling parameters, prompts, separator).
//!   Built via [`ConversionConfigBuilder`]; the defaults reproduce the fixed
//!   request contract (5 pages per batch, 2× render, temperature 0, 8000
//!   output tokens, horizontal-rule separator).

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Endpoint used when the caller does not name one.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Model used when the caller does not name one.
pub const DEFAULT_MODEL: &str = "qwen3-vl:32b";

/// Maximum number of page images sent in one request.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Render magnification applied to both page axes.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Output token cap per request.
pub const DEFAULT_MAX_TOKENS: usize = 8000;

/// Credentials and endpoint for an OpenAI-compatible chat-completions API.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL, e.g. `https://api.openai.com/v1` or `http://localhost:11434/v1`.
    pub api_base: String,
    pub api_key: String,
    /// Vision-capable model identifier.
    pub model: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

// The key never reaches logs.
impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "<redacted>" })
            .field("model", &self.model)
            .finish()
    }
}

impl ConnectionConfig {
    /// Build a connection from optional credential values.
    ///
    /// Values are trimmed. A missing endpoint or model falls back to
    /// [`DEFAULT_API_BASE`] / [`DEFAULT_MODEL`]; a missing key stays empty and
    /// is rejected later by [`ConnectionConfig::validate`].
    pub fn from_credentials(
        api_base: Option<&str>,
        api_key: Option<&str>,
        model: Option<&str>,
    ) -> Self {
        Self {
            api_base: api_base.unwrap_or(DEFAULT_API_BASE).trim().to_string(),
            api_key: api_key.unwrap_or_default().trim().to_string(),
            model: model.unwrap_or(DEFAULT_MODEL).trim().to_string(),
        }
    }

    /// Reject blank credentials. The key is checked before the endpoint.
    pub fn validate(&self) -> Result<(), OcrError> {
        if self.api_key.trim().is_empty() {
            return Err(OcrError::MissingApiKey);
        }
        if self.api_base.trim().is_empty() {
            return Err(OcrError::MissingApiBase);
        }
        if self.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("model name is empty".into()));
        }
        Ok(())
    }

    /// Full URL of the chat-completions route.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim().trim_end_matches('/'))
    }
}

/// Configuration for one PDF-to-Markdown OCR run.
///
/// # Example
/// ```rust
/// use invoice2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .api_base("http://localhost:11434/v1")
///     .api_key("sk-local")
///     .model("qwen2.5vl:7b")
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_size, 5);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    pub connection: ConnectionConfig,

    /// Pages per request. Default: 5.
    pub batch_size: usize,

    /// Render magnification in both axes. Default: 2.0.
    pub render_scale: f32,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Output token cap per request. Default: 8000.
    pub max_tokens: usize,

    /// Replaces [`crate::prompts::SYSTEM_PROMPT`] when set.
    pub system_prompt: Option<String>,

    /// Replaces [`crate::prompts::USER_INSTRUCTION`] when set.
    pub user_prompt: Option<String>,

    /// Joiner between chunk results. Default: horizontal rule.
    pub separator: ChunkSeparator,

    /// Explicit pdfium shared library. When `None` the working directory and
    /// then the system library path are tried.
    pub pdfium_library: Option<PathBuf>,

    /// Per-request HTTP timeout. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,

    /// Optional observer for batch events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            render_scale: DEFAULT_RENDER_SCALE,
            temperature: 0.0,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: None,
            user_prompt: None,
            separator: ChunkSeparator::default(),
            pdfium_library: None,
            request_timeout_secs: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("connection", &self.connection)
            .field("batch_size", &self.batch_size)
            .field("render_scale", &self.render_scale)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("system_prompt", &self.system_prompt.as_ref().map(|_| "<custom>"))
            .field("user_prompt", &self.user_prompt.as_ref().map(|_| "<custom>"))
            .field("separator", &self.separator)
            .field("pdfium_library", &self.pdfium_library)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check everything a conversion needs before it touches pdfium or the network.
    pub fn validate(&self) -> Result<(), OcrError> {
        self.connection.validate()?;
        if self.batch_size == 0 {
            return Err(OcrError::InvalidConfig("batch size must be ≥ 1".into()));
        }
        Ok(())
    }

    pub(crate) fn system_prompt(&self) -> &str {
        self.system_prompt
            .as_deref()
            .unwrap_or(crate::prompts::SYSTEM_PROMPT)
    }

    pub(crate) fn user_prompt(&self) -> &str {
        self.user_prompt
            .as_deref()
            .unwrap_or(crate::prompts::USER_INSTRUCTION)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn connection(mut self, connection: ConnectionConfig) -> Self {
        self.config.connection = connection;
        self
    }

    pub fn api_base(mut self, url: impl Into<String>) -> Self {
        self.config.connection.api_base = url.into().trim().to_string();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.connection.api_key = key.into().trim().to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.connection.model = model.into().trim().to_string();
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.user_prompt = Some(prompt.into());
        self
    }

    pub fn separator(mut self, sep: ChunkSeparator) -> Self {
        self.config.separator = sep;
        self
    }

    pub fn pdfium_library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library = Some(path.into());
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating option ranges.
    ///
    /// Credentials are not required here; they are checked by
    /// [`ConversionConfig::validate`] when a conversion starts.
    pub fn build(self) -> Result<ConversionConfig, OcrError> {
        let c = &self.config;
        if c.batch_size == 0 {
            return Err(OcrError::InvalidConfig("batch size must be ≥ 1".into()));
        }
        if c.max_tokens == 0 {
            return Err(OcrError::InvalidConfig("max tokens must be ≥ 1".into()));
        }
        if !c.render_scale.is_finite() {
            return Err(OcrError::InvalidConfig(format!(
                "render scale must be finite, got {}",
                c.render_scale
            )));
        }
        Ok(self.config)
    }
}

/// How consecutive chunk results are joined in the final document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkSeparator {
    /// Horizontal rule: "\n\n---\n\n" (default)
    #[default]
    HorizontalRule,
    /// HTML comment naming the batch that follows: "\n\n<!-- batch N -->\n\n"
    Comment,
    /// Custom string inserted between chunks, padded by blank lines.
    Custom(String),
}

impl ChunkSeparator {
    /// Render the separator placed before the chunk with 1-based `batch_num`.
    pub fn render(&self, batch_num: usize) -> String {
        match self {
            ChunkSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            ChunkSeparator::Comment => format!("\n\n<!-- batch {} -->\n\n", batch_num),
            ChunkSeparator::Custom(s) => format!("\n\n{}\n\n", s),
        }
    }
}
