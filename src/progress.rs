//! Progress-callback trait for page and batch events.
//!
//! Pass an [`Arc<dyn ConversionProgressCallback>`] to
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to observe
//! the pipeline as it renders pages and sends batches. Events arrive in strict
//! order from the single conversion task.
//!
//! # Example
//!
//! ```rust
//! use invoice2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! struct BatchCounter {
//!     batches: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for BatchCounter {
//!     fn on_batch_complete(&self, batch_num: usize, total_batches: usize, markdown_len: usize) {
//!         self.batches.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("batch {}/{} done ({} bytes)", batch_num, total_batches, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(BatchCounter { batches: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it renders pages and sends batches.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after the document is opened and before the first page renders.
    fn on_conversion_start(&self, total_pages: usize, total_batches: usize) {
        let _ = (total_pages, total_batches);
    }

    /// Called after a page has been rasterised and encoded.
    ///
    /// # Arguments
    /// * `page_num`: 1-indexed page number
    /// * `total_pages`: pages in the document
    fn on_page_rendered(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called just before a batch request is sent.
    ///
    /// # Arguments
    /// * `batch_num`: 1-indexed batch number
    /// * `first_page` / `last_page`: 1-indexed, inclusive page span
    fn on_batch_start(&self, batch_num: usize, first_page: usize, last_page: usize) {
        let _ = (batch_num, first_page, last_page);
    }

    /// Called when a batch reply has been received and normalised.
    ///
    /// # Arguments
    /// * `markdown_len`: byte length of the normalised chunk text
    fn on_batch_complete(&self, batch_num: usize, total_batches: usize, markdown_len: usize) {
        let _ = (batch_num, total_batches, markdown_len);
    }

    /// Called once when the run aborts. No further events follow.
    fn on_conversion_failed(&self, error: &str) {
        let _ = error;
    }

    /// Called once after the last batch, before the document is returned.
    fn on_conversion_complete(&self, total_batches: usize) {
        let _ = total_batches;
    }
}

/// Ignores every event.
#[derive(Debug)]
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Shared handle stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
