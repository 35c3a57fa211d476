//! Page sources: open a document and yield its pages lazily.
//!
//! A [`PageSource`] opens documents (handling decryption); the returned
//! [`DocumentHandle`] decodes one page at a time. Iteration is finite and
//! restartable: calling `pages` again, or reopening
//! the path, yields identical pages.

mod content;
pub mod memory;
mod pdf;
mod range;
mod scratch;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::model::Page;

pub use memory::{MemoryDocument, MemorySource};
pub use pdf::{LopdfSource, SourceOptions};
pub use range::PageRange;
pub use scratch::ScratchArea;

/// Opens documents.
pub trait PageSource: Send + Sync {
    /// Open the document at `path`, decrypting it with `credential` if needed.
    ///
    /// Fails with an authentication error when a credential is required but
    /// missing or wrong, and with a corrupt-input error when the structure
    /// cannot be read.
    fn open(&self, path: &Path, credential: Option<&str>) -> Result<Box<dyn DocumentHandle>>;
}

/// An open document.
///
/// Dropping the handle releases everything it owns, including staged
/// raster data in its scratch area.
pub trait DocumentHandle: Send {
    /// Total number of pages.
    fn page_count(&self) -> u32;

    /// Raw document information, read once per document.
    fn info(&self) -> DocumentInfo;

    /// Decode one page (1-indexed).
    fn load_page(&self, number: u32) -> Result<Page>;
}

impl dyn DocumentHandle {
    /// Lazily iterate pages in `range`, checking `cancel` before each page.
    pub fn pages<'a>(&'a self, range: PageRange, cancel: &'a CancelToken) -> Pages<'a> {
        let (next, end) = match range.clamp(self.page_count()) {
            Some(r) => (*r.start(), *r.end()),
            None => (1, 0),
        };
        Pages {
            doc: self,
            next,
            end,
            cancel,
            stopped: false,
        }
    }
}

/// Lazy page iterator returned by `<dyn DocumentHandle>::pages`.
///
/// Yields `(page_number, result)`. A cancellation is yielded once as an
/// error, after which the iterator is exhausted.
pub struct Pages<'a> {
    doc: &'a dyn DocumentHandle,
    next: u32,
    end: u32,
    cancel: &'a CancelToken,
    stopped: bool,
}

impl Iterator for Pages<'_> {
    type Item = (u32, Result<Page>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped || self.next > self.end {
            return None;
        }
        let number = self.next;
        if let Err(e) = self.cancel.check() {
            self.stopped = true;
            return Some((number, Err(e)));
        }
        self.next += 1;
        Some((number, self.doc.load_page(number)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.stopped || self.next > self.end {
            return (0, Some(0));
        }
        (0, Some((self.end - self.next + 1) as usize))
    }
}

/// Document-level attributes as stored in the file, before interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    /// Raw creation date (e.g., `D:20240131120000+09'00'`)
    pub creation_date: Option<String>,
    /// Raw modification date
    pub mod_date: Option<String>,
    pub page_count: u32,
    pub encrypted: bool,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

/// Cooperative cancellation signal with an optional deadline.
///
/// Clones share the same flag. Page sources check it between pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<(Instant, Duration)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some((Instant::now() + timeout, timeout)),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Return an error if cancelled or past the deadline.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if let Some((deadline, timeout)) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(timeout));
            }
        }
        Ok(())
    }
}
