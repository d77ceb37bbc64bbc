//! Result types returned by a conversion.

use serde::{Deserialize, Serialize};

/// The finished document plus per-batch detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Chunk texts joined in page order with the configured separator.
    pub markdown: String,
    /// One entry per request, in submission order.
    pub chunks: Vec<ChunkResult>,
    pub stats: ConversionStats,
}

/// The normalised reply for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    /// 1-indexed batch number.
    pub batch_num: usize,
    /// 1-indexed, inclusive page span covered by this batch.
    pub first_page: usize,
    pub last_page: usize,
    /// Reply text after fence stripping.
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

/// Aggregate numbers for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_batches: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time spent inside pdfium and PNG encoding.
    pub render_duration_ms: u64,
    /// Time spent waiting on the chat-completions endpoint.
    pub llm_duration_ms: u64,
}

/// PDF metadata reported by `inspect`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}
