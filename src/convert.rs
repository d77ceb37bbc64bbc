//! Conversion entry points and the batch-map-join loop.
//!
//! Every entry point funnels into [`run_pipeline`], which walks the pages in
//! order, renders each one, flushes a batch every `batch_size` pages (or at
//! the last page), awaits the remote reply for that batch, strips a code
//! fence from it, and finally joins the chunk texts with the separator.
//!
//! The loop is strictly sequential. The first error from rendering, encoding,
//! or the endpoint aborts the run; nothing partial is returned.

use crate::config::{ChunkSeparator, ConversionConfig};
use crate::error::OcrError;
use crate::output::{ChunkResult, ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::batch::{batch_count, Batch, Batcher};
use crate::pipeline::llm::{self, ChatBackend, OpenAiCompatibleClient};
use crate::pipeline::render::{self, PageSource, PdfiumPages};
use crate::pipeline::{input, postprocess};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// OCR an in-memory PDF into Markdown.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// * configuration: missing API key, missing endpoint, empty `pdf`; raised
///   before pdfium is bound or any request is made
/// * document: pdfium cannot open the bytes or render a page
/// * remote: transport failure, 401/403, 429, other non-2xx, unreadable body
pub async fn convert(pdf: &[u8], config: &ConversionConfig) -> Result<ConversionOutput, OcrError> {
    config.validate()?;
    if pdf.is_empty() {
        return Err(OcrError::MissingDocument);
    }
    info!(
        "Starting conversion: {} bytes, model {}",
        pdf.len(),
        config.connection.model
    );

    let backend = OpenAiCompatibleClient::new(&config.connection, config.request_timeout_secs)?;
    let pages = PdfiumPages::open(
        pdf.to_vec(),
        config.pdfium_library.clone(),
        config.render_scale,
    )
    .await
    .inspect_err(|e| notify_failure(config, e))?;

    run_pipeline(&pages, &backend, config).await
}

/// OCR a PDF read from `path` (or stdin when `path` is `-`).
pub async fn convert_file(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, OcrError> {
    config.validate()?;
    let bytes = input::read_pdf(path).await?;
    convert(&bytes, config).await
}

/// OCR a PDF file and write the Markdown to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, OcrError> {
    let output = convert_file(input_path, config).await?;
    write_atomically(output_path.as_ref(), &output.markdown).await?;
    Ok(output.stats)
}

/// Write `contents` next to `path` under a `.md.tmp` name, then rename it into
/// place. The temp file is removed again when the rename fails.
pub(crate) async fn write_atomically(path: &Path, contents: &str) -> Result<(), OcrError> {
    let write_failed = |e: std::io::Error| OcrError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(write_failed)?;

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }
    Ok(())
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(pdf: &[u8], config: &ConversionConfig) -> Result<ConversionOutput, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(pdf, config))
}

/// Extract PDF metadata without converting content.
///
/// Needs no credentials and makes no network calls.
pub async fn inspect(
    path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, OcrError> {
    render::extract_metadata(path.as_ref(), config).await
}

/// Drive the batch-map-join loop over any page source and backend.
///
/// Issues exactly `ceil(pages / batch_size)` requests, in page order, each
/// awaited before the next page is rendered. Credentials are validated first.
/// The returned future is `Send` whenever the source and backend are `Sync`.
pub async fn run_pipeline<S, B>(
    source: &S,
    backend: &B,
    config: &ConversionConfig,
) -> Result<ConversionOutput, OcrError>
where
    S: PageSource,
    B: ChatBackend,
{
    config.validate()?;
    run_batches(source, backend, config)
        .await
        .inspect_err(|e| notify_failure(config, e))
}

async fn run_batches<S, B>(
    source: &S,
    backend: &B,
    config: &ConversionConfig,
) -> Result<ConversionOutput, OcrError>
where
    S: PageSource,
    B: ChatBackend,
{
    let total_start = Instant::now();
    let total_pages = source.page_count();
    let total_batches = batch_count(total_pages, config.batch_size);
    info!(
        "Processing {} pages in {} batches of up to {}",
        total_pages, total_batches, config.batch_size
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total_pages, total_batches);
    }

    let mut batcher = Batcher::new(config.batch_size);
    let mut chunks: Vec<ChunkResult> = Vec::with_capacity(total_batches);
    let mut render_duration_ms = 0u64;
    let mut llm_duration_ms = 0u64;

    for index in 0..total_pages {
        let render_start = Instant::now();
        let image = source.render_page(index).await?;
        render_duration_ms += render_start.elapsed().as_millis() as u64;

        if let Some(ref cb) = config.progress_callback {
            cb.on_page_rendered(image.page_num, total_pages);
        }

        let is_last = index + 1 == total_pages;
        if let Some(batch) = batcher.push(image, is_last) {
            let chunk = ocr_batch(backend, &batch, total_batches, config).await?;
            llm_duration_ms += chunk.duration_ms;
            chunks.push(chunk);
        }
    }

    let markdown = assemble_document(&chunks, &config.separator);

    let stats = ConversionStats {
        total_pages,
        total_batches: chunks.len(),
        total_input_tokens: chunks.iter().map(|c| c.input_tokens as u64).sum(),
        total_output_tokens: chunks.iter().map(|c| c.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Conversion complete: {} pages, {} batches, {}ms total",
        total_pages, stats.total_batches, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(stats.total_batches);
    }

    Ok(ConversionOutput {
        markdown,
        chunks,
        stats,
    })
}

/// Send one batch and normalise the reply.
async fn ocr_batch<B: ChatBackend>(
    backend: &B,
    batch: &Batch,
    total_batches: usize,
    config: &ConversionConfig,
) -> Result<ChunkResult, OcrError> {
    let (first_page, last_page) = (batch.first_page(), batch.last_page());
    info!(
        "Batch {}/{}: pages {}-{} ({} images)",
        batch.index,
        total_batches,
        first_page,
        last_page,
        batch.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(batch.index, first_page, last_page);
    }

    let request = llm::build_request(batch, config);
    let start = Instant::now();
    let completion = backend.complete(&request).await?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let markdown = postprocess::strip_code_fence(&completion.content);
    debug!(
        "Batch {}: {} chars raw, {} chars after fence strip, {}ms",
        batch.index,
        completion.content.len(),
        markdown.len(),
        duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(batch.index, total_batches, markdown.len());
    }

    Ok(ChunkResult {
        batch_num: batch.index,
        first_page,
        last_page,
        markdown,
        input_tokens: completion.prompt_tokens,
        output_tokens: completion.completion_tokens,
        duration_ms,
    })
}

/// Join chunk texts in submission order. No separator before the first chunk
/// or after the last; zero chunks give an empty string.
pub fn assemble_document(chunks: &[ChunkResult], separator: &ChunkSeparator) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i > 0 {
            out.push_str(&separator.render(chunk.batch_num));
        }
        out.push_str(&chunk.markdown);
    }
    out
}

fn notify_failure(config: &ConversionConfig, error: &OcrError) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_failed(&error.to_string());
    }
}
