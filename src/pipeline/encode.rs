//! Image encoding: `DynamicImage` → PNG → base64 data URI.
//!
//! Chat-completions APIs accept images inline as `data:` URIs inside the
//! JSON body. PNG is lossless, so rendered glyph edges reach the model
//! exactly as pdfium drew them.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use serde::Serialize;
use std::io::Cursor;
use tracing::debug;

use crate::error::OcrError;

/// One rasterised page, ready to be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    /// `data:image/png;base64,…`
    pub data_uri: String,
}

impl PageImage {
    pub fn new(page_num: usize, data_uri: impl Into<String>) -> Self {
        Self {
            page_num,
            data_uri: data_uri.into(),
        }
    }

    /// Wrap already-encoded PNG bytes.
    pub fn from_png(page_num: usize, png: &[u8]) -> Self {
        Self::new(page_num, png_data_uri(png))
    }
}

/// Format PNG bytes as a base64 data URI.
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Encode a rasterised page as a base64 PNG data URI.
pub fn encode_page(page_num: usize, img: &DynamicImage) -> Result<PageImage, OcrError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageEncodingFailed {
            page: page_num,
            detail: e.to_string(),
        })?;

    let page = PageImage::from_png(page_num, &buf);
    debug!(
        "Encoded page {} → {} bytes PNG, {} bytes data URI",
        page_num,
        buf.len(),
        page.data_uri.len()
    );
    Ok(page)
}
