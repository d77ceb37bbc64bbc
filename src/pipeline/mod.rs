//! Pipeline stages for invoice OCR.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the pdfium and HTTP edges can be swapped for in-memory doubles.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ batch ──▶ llm ──▶ postprocess
//! (bytes)   (pdfium)   (PNG+b64)  (≤5)     (HTTP)   (fences)
//! ```
//!
//! 1. [`input`]: read a PDF from disk or stdin into memory
//! 2. [`render`]: open the bytes with pdfium and rasterise one page at a time
//! 3. [`encode`]: PNG-encode a bitmap and wrap it in a base64 data URI
//! 4. [`batch`]: accumulate page images and flush every `batch_size` pages
//!    or at the last page
//! 5. [`llm`]: the OpenAI-compatible chat-completions request, the only
//!    stage with network I/O
//! 6. [`postprocess`]: strip an enclosing code fence from each reply

pub mod batch;
pub mod encode;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod render;
