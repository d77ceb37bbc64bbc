//! Batching: group page images into requests of at most `batch_size`.
//!
//! A batch is flushed when it reaches `batch_size` images or when the page
//! just pushed is the last one in the document. Batches are emitted in page
//! order and never split or reordered, so a document of N pages always
//! produces `ceil(N / batch_size)` batches.

use crate::pipeline::encode::PageImage;

/// An ordered, non-empty group of page images sent in one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-indexed batch number.
    pub index: usize,
    pub pages: Vec<PageImage>,
}

impl Batch {
    pub fn first_page(&self) -> usize {
        self.pages.first().map_or(0, |p| p.page_num)
    }

    pub fn last_page(&self) -> usize {
        self.pages.last().map_or(0, |p| p.page_num)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Accumulates page images and hands back a [`Batch`] on each flush.
#[derive(Debug)]
pub struct Batcher {
    batch_size: usize,
    pending: Vec<PageImage>,
    flushed: usize,
}

impl Batcher {
    /// `batch_size` is raised to 1 if zero.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            batch_size,
            pending: Vec::with_capacity(batch_size),
            flushed: 0,
        }
    }

    /// Add a page. Returns the completed batch when the list is full or
    /// `is_last` is set; the accumulator is cleared in either case.
    pub fn push(&mut self, image: PageImage, is_last: bool) -> Option<Batch> {
        self.pending.push(image);
        if self.pending.len() >= self.batch_size || is_last {
            self.flushed += 1;
            let pages = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
            Some(Batch {
                index: self.flushed,
                pages,
            })
        } else {
            None
        }
    }

    /// Number of batches flushed so far.
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    /// Images waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// How many batches a document of `total_pages` yields.
pub fn batch_count(total_pages: usize, batch_size: usize) -> usize {
    total_pages.div_ceil(batch_size.max(1))
}
