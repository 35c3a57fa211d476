//! Bounded temporary storage for large raster payloads.
//!
//! Each open document owns one [`ScratchArea`]. The backing directory is
//! created on first use and removed when the area is dropped, on success
//! and on error paths alike.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tempfile::TempDir;

/// Scoped, size-limited scratch directory.
#[derive(Debug)]
pub struct ScratchArea {
    root: Option<PathBuf>,
    limit: u64,
    used: AtomicU64,
    counter: AtomicU64,
    dir: Mutex<Option<TempDir>>,
}

impl ScratchArea {
    /// A scratch area holding at most `limit` bytes, created under the
    /// system temp directory (or `root`, when given).
    pub fn new(root: Option<PathBuf>, limit: u64) -> Self {
        Self {
            root,
            limit,
            used: AtomicU64::new(0),
            counter: AtomicU64::new(0),
            dir: Mutex::new(None),
        }
    }

    /// Bytes currently staged.
    pub fn used(&self) -> u64 {
        self.used.load(Ordering::SeqCst)
    }

    /// Directory backing this area, if anything has been staged yet.
    pub fn location(&self) -> Option<PathBuf> {
        let guard = self.dir.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|d| d.path().to_path_buf())
    }

    /// Write `data` to a scratch file.
    ///
    /// Returns `Ok(None)` when the area's byte budget would be exceeded; the
    /// caller keeps the data in memory instead.
    pub fn stage(&self, data: &[u8]) -> io::Result<Option<PathBuf>> {
        let len = data.len() as u64;
        let reserved = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                used.checked_add(len).filter(|total| *total <= self.limit)
            })
            .is_ok();
        if !reserved {
            log::debug!(
                "ScratchArea: budget of {} bytes exhausted, keeping {} bytes in memory",
                self.limit,
                len
            );
            return Ok(None);
        }

        let result = self.write_blob(data);
        if result.is_err() {
            self.used.fetch_sub(len, Ordering::SeqCst);
        }
        result.map(Some)
    }

    fn write_blob(&self, data: &[u8]) -> io::Result<PathBuf> {
        let mut guard = self.dir.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_none() {
            let mut builder = tempfile::Builder::new();
            builder.prefix("pdfsheet-");
            let dir = match &self.root {
                Some(root) => builder.tempdir_in(root)?,
                None => builder.tempdir()?,
            };
            log::debug!("ScratchArea: created {}", dir.path().display());
            *guard = Some(dir);
        }
        let dir: &Path = match guard.as_ref() {
            Some(d) => d.path(),
            None => return Err(io::Error::other("scratch directory missing")),
        };
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let path = dir.join(format!("raster-{n:05}.bin"));
        fs::write(&path, data)?;
        Ok(path)
    }
}
