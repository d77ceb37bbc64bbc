//! PDF rasterisation: render pages to PNG data URIs via pdfium.
//!
//! Pages are rendered lazily, one at a time, through the [`PageSource`]
//! trait. The conversion loop asks for page *i* only after every batch before
//! it has been answered, so at most one batch of images is alive at once and
//! a render failure on a late page happens after the earlier batches were
//! sent, matching document order.
//!
//! ## Render thread
//!
//! pdfium keeps thread-local state and a `PdfDocument` cannot leave the
//! thread that opened it. [`PdfiumPages::open`] therefore starts one worker
//! on tokio's blocking pool that binds the library, opens the document and
//! then serves page requests over a channel until the handle is dropped.
//! The async side only holds channel endpoints, so conversion futures stay
//! `Send` and the CPU-heavy render + PNG encode never runs on a runtime
//! worker.
//!
//! Each page is scaled by a fixed factor in both axes (2× by default) instead
//! of targeting a pixel size, so small print on invoices keeps its relative
//! resolution.

use crate::config::ConversionConfig;
use crate::error::OcrError;
use crate::output::DocumentMetadata;
use crate::pipeline::encode::{encode_page, PageImage};
use pdfium_render::prelude::*;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// A document whose pages can be rendered in order.
pub trait PageSource {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Render the page at 0-based `index` into a [`PageImage`].
    fn render_page(
        &self,
        index: usize,
    ) -> impl Future<Output = Result<PageImage, OcrError>> + Send;
}

/// Bind to a pdfium shared library.
///
/// Resolution order: `library` if set, otherwise a platform library in the
/// working directory, otherwise the system library path.
pub fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, OcrError> {
    let bindings = match library {
        Some(path) => Pdfium::bind_to_library(path).map_err(|e| {
            OcrError::PdfiumBindingFailed(format!("{}: {:?}", path.display(), e))
        })?,
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| OcrError::PdfiumBindingFailed(format!("{:?}", e)))?,
    };
    Ok(Pdfium::new(bindings))
}

struct RenderRequest {
    index: usize,
    reply: oneshot::Sender<Result<PageImage, OcrError>>,
}

/// Handle to a pdfium document living on its own blocking thread.
///
/// Dropping the handle closes the request channel and ends the thread.
#[derive(Debug)]
pub struct PdfiumPages {
    requests: mpsc::Sender<RenderRequest>,
    total_pages: usize,
}

impl PdfiumPages {
    /// Start the render thread and open `pdf` on it.
    ///
    /// Binding failures surface as [`OcrError::PdfiumBindingFailed`],
    /// malformed input as [`OcrError::CorruptPdf`].
    pub async fn open(
        pdf: Vec<u8>,
        pdfium_library: Option<PathBuf>,
        scale: f32,
    ) -> Result<Self, OcrError> {
        let (requests, inbox) = mpsc::channel(1);
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::task::spawn_blocking(move || {
            serve_pages(&pdf, pdfium_library.as_deref(), scale, ready_tx, inbox)
        });

        let total_pages = ready_rx.await.map_err(|_| render_thread_gone())??;
        Ok(Self {
            requests,
            total_pages,
        })
    }
}

impl PageSource for PdfiumPages {
    fn page_count(&self) -> usize {
        self.total_pages
    }

    async fn render_page(&self, index: usize) -> Result<PageImage, OcrError> {
        let (reply, answer) = oneshot::channel();
        self.requests
            .send(RenderRequest { index, reply })
            .await
            .map_err(|_| render_thread_gone())?;
        answer.await.map_err(|_| render_thread_gone())?
    }
}

fn render_thread_gone() -> OcrError {
    OcrError::Internal("pdfium render thread stopped unexpectedly".into())
}

/// Body of the render thread: open the document, report its page count,
/// then answer render requests until every sender is gone.
fn serve_pages(
    pdf: &[u8],
    library: Option<&Path>,
    scale: f32,
    ready: oneshot::Sender<Result<usize, OcrError>>,
    mut inbox: mpsc::Receiver<RenderRequest>,
) {
    let pdfium = match bind_pdfium(library) {
        Ok(pdfium) => pdfium,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let document = match pdfium.load_pdf_from_byte_slice(pdf, None) {
        Ok(document) => document,
        Err(e) => {
            let _ = ready.send(Err(OcrError::CorruptPdf {
                detail: format!("{:?}", e),
            }));
            return;
        }
    };

    let total_pages = document.pages().len() as usize;
    info!("PDF loaded: {} pages", total_pages);
    if ready.send(Ok(total_pages)).is_err() {
        return;
    }

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    while let Some(request) = inbox.blocking_recv() {
        let result = render_one(&document, &render_config, request.index);
        let _ = request.reply.send(result);
    }
    debug!("Render thread finished");
}

fn render_one(
    document: &PdfDocument<'_>,
    render_config: &PdfRenderConfig,
    index: usize,
) -> Result<PageImage, OcrError> {
    let page_num = index + 1;
    let page_index = PdfPageIndex::try_from(index).map_err(|_| OcrError::RasterisationFailed {
        page: page_num,
        detail: format!("page index {index} exceeds pdfium's range"),
    })?;

    let page = document
        .pages()
        .get(page_index)
        .map_err(|e| OcrError::RasterisationFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let bitmap = page
        .render_with_config(render_config)
        .map_err(|e| OcrError::RasterisationFailed {
            page: page_num,
            detail: format!("{:?}", e),
        })?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} → {}x{} px",
        page_num,
        image.width(),
        image.height()
    );

    encode_page(page_num, &image)
}

/// Extract document metadata from a PDF on disk without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    config: &ConversionConfig,
) -> Result<DocumentMetadata, OcrError> {
    let bytes = crate::pipeline::input::read_pdf(pdf_path).await?;
    if bytes.is_empty() {
        return Err(OcrError::MissingDocument);
    }
    let library = config.pdfium_library.clone();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium(library.as_deref())?;
        metadata_from_bytes(&pdfium, &bytes)
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn metadata_from_bytes(pdfium: &Pdfium, bytes: &[u8]) -> Result<DocumentMetadata, OcrError> {
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| OcrError::CorruptPdf {
            detail: format!("{:?}", e),
        })?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().trim().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}
