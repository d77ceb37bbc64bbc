//! Error types for the invoice2md library.
//!
//! Every failure is fatal: the first error anywhere in the pipeline aborts
//! the whole conversion and no partial Markdown is returned. There is
//! therefore a single error enum, [`OcrError`], grouped by [`ErrorKind`] so
//! callers (and the CLI) can tell a missing credential from a broken PDF or
//! a rejected API call without matching on every variant.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of an [`OcrError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing credentials, endpoint, input file, or an out-of-range option.
    Configuration,
    /// The PDF could not be opened, rendered, or encoded.
    Document,
    /// The chat-completions endpoint failed or answered with garbage.
    Remote,
    /// Local environment: pdfium library, file system, runtime.
    Environment,
}

/// All errors returned by the invoice2md library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API key was supplied (or it was blank).
    #[error("API key is missing\nSet --api-key or INVOICE2MD_API_KEY.")]
    MissingApiKey,

    /// No endpoint base URL was supplied (or it was blank).
    #[error("API base URL is missing\nSet --api-base or INVOICE2MD_API_BASE.")]
    MissingApiBase,

    /// No PDF payload was supplied, or it was empty.
    #[error("PDF file is required")]
    MissingDocument,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document errors ───────────────────────────────────────────────────
    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// pdfium refused to open the byte blob.
    #[error("PDF could not be opened: {detail}")]
    CorruptPdf { detail: String },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The rendered bitmap could not be written as PNG.
    #[error("PNG encoding failed for page {page}: {detail}")]
    ImageEncodingFailed { page: usize, detail: String },

    // ── Remote errors ─────────────────────────────────────────────────────
    /// The request never produced an HTTP response (DNS, TLS, reset, timeout).
    #[error("Request to '{url}' failed: {detail}")]
    Network { url: String, detail: String },

    /// The endpoint answered 401 or 403.
    #[error("Authentication rejected by '{url}' (HTTP {status}): {detail}")]
    AuthError {
        url: String,
        status: u16,
        detail: String,
    },

    /// The endpoint answered 429.
    #[error("Rate limit exceeded at '{url}'{}", retry_hint(*retry_after_secs))]
    RateLimitExceeded {
        url: String,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success status.
    #[error("Chat completion failed with HTTP {status}: {body}")]
    ApiError { status: u16, body: String },

    /// The body was not a chat completion we can read.
    #[error("Malformed chat completion response: {detail}")]
    MalformedResponse { detail: String },

    // ── Environment errors ────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, place it in the working directory,\n\
or point PDFIUM_LIB_PATH at an existing copy."
    )]
    PdfiumBindingFailed(String),

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_hint(retry_after_secs: Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

impl OcrError {
    /// Which part of the taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OcrError::MissingApiKey
            | OcrError::MissingApiBase
            | OcrError::MissingDocument
            | OcrError::InvalidConfig(_) => ErrorKind::Configuration,

            OcrError::NotAPdf { .. }
            | OcrError::CorruptPdf { .. }
            | OcrError::RasterisationFailed { .. }
            | OcrError::ImageEncodingFailed { .. } => ErrorKind::Document,

            OcrError::Network { .. }
            | OcrError::AuthError { .. }
            | OcrError::RateLimitExceeded { .. }
            | OcrError::ApiError { .. }
            | OcrError::MalformedResponse { .. } => ErrorKind::Remote,

            OcrError::PdfiumBindingFailed(_)
            | OcrError::FileNotFound { .. }
            | OcrError::PermissionDenied { .. }
            | OcrError::OutputWriteFailed { .. }
            | OcrError::Internal(_) => ErrorKind::Environment,
        }
    }

    /// True for the missing-input errors raised before any work starts.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
