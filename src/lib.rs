//! # invoice2md
//!
//! OCR scanned invoice PDFs into Markdown with a vision-capable chat model.
//!
//! Each page is rasterised at 2× scale, pages are sent five at a time to an
//! OpenAI-compatible `/chat/completions` endpoint together with a fixed
//! invoice-OCR prompt, and the per-batch replies are joined with a horizontal
//! rule. The model does the reading; this crate only renders, batches,
//! relays, and stitches.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Validate  API key, endpoint, non-empty payload (before any work)
//!  ├─ 2. Render    pdfium, one page at a time, 2× scale → PNG data URI
//!  ├─ 3. Batch     flush every 5 pages or at the last page
//!  ├─ 4. OCR       one chat-completions call per batch, temperature 0
//!  ├─ 5. Unfence   strip a ```markdown … ``` wrapper from each reply
//!  └─ 6. Join      chunks separated by "\n\n---\n\n"
//! ```
//!
//! Any failure aborts the whole run. There are no retries and no partial
//! output.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .api_base("https://api.openai.com/v1")
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .model("gpt-4o")
//!         .build()?;
//!     let pdf = std::fs::read("invoice.pdf")?;
//!     let output = convert(&pdf, &config).await?;
//!     println!("{}", output.markdown);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! pdfium itself is loaded at runtime: from `ConversionConfig::pdfium_library`,
//! then the working directory, then the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChunkSeparator, ConnectionConfig, ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    assemble_document, convert, convert_file, convert_sync, convert_to_file, inspect, run_pipeline,
};
pub use error::{ErrorKind, OcrError};
pub use output::{ChunkResult, ConversionOutput, ConversionStats, DocumentMetadata};
pub use pipeline::encode::PageImage;
pub use pipeline::llm::{ChatBackend, ChatCompletion, ChatCompletionRequest, OpenAiCompatibleClient};
pub use pipeline::render::PageSource;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
