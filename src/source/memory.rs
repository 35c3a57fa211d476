//! In-memory page source for synthesized documents.
//!
//! Useful for embedding callers that already hold decoded geometry, and for
//! exercising the pipeline without real PDF files: documents can be marked
//! corrupt, password-protected, or given pages that fail to decode.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{DocumentHandle, DocumentInfo, PageSource};
use crate::error::{Error, Result};
use crate::model::Page;

/// A synthesized document.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    pages: Vec<Page>,
    info: DocumentInfo,
    password: Option<String>,
    corrupt: bool,
    broken_pages: BTreeSet<u32>,
}

impl MemoryDocument {
    /// A document with the given pages; page numbers are reassigned 1..=n.
    pub fn new(pages: Vec<Page>) -> Self {
        let pages: Vec<Page> = pages
            .into_iter()
            .enumerate()
            .map(|(i, mut p)| {
                p.number = i as u32 + 1;
                p
            })
            .collect();
        let info = DocumentInfo {
            page_count: pages.len() as u32,
            ..DocumentInfo::default()
        };
        Self {
            pages,
            info,
            ..Self::default()
        }
    }

    /// Set document information; `page_count` is kept in sync with the pages.
    pub fn with_info(mut self, info: DocumentInfo) -> Self {
        self.info = DocumentInfo {
            page_count: self.pages.len() as u32,
            encrypted: info.encrypted || self.password.is_some(),
            ..info
        };
        self
    }

    /// Require `password` to open.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self.info.encrypted = true;
        self
    }

    /// Make every open fail as unreadable.
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    /// Make loading page `number` fail.
    pub fn with_broken_page(mut self, number: u32) -> Self {
        self.broken_pages.insert(number);
        self
    }
}

/// Page source backed by documents registered under paths.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<PathBuf, Arc<MemoryDocument>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `document` under `path`.
    pub fn with_document(mut self, path: impl Into<PathBuf>, document: MemoryDocument) -> Self {
        self.insert(path, document);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, document: MemoryDocument) {
        self.documents.insert(path.into(), Arc::new(document));
    }
}

impl PageSource for MemorySource {
    fn open(&self, path: &Path, credential: Option<&str>) -> Result<Box<dyn DocumentHandle>> {
        let doc = self
            .documents
            .get(path)
            .ok_or_else(|| Error::input(path, "no such document"))?;

        if doc.corrupt {
            return Err(Error::Corrupted("unreadable document structure".to_string()));
        }

        match (&doc.password, credential) {
            (Some(_), None) => return Err(Error::PasswordRequired),
            (Some(expected), Some(given)) if expected != given => {
                return Err(Error::InvalidPassword)
            }
            _ => {}
        }

        let mut info = doc.info.clone();
        if info.file_name.is_none() {
            info.file_name = path.file_name().map(|n| n.to_string_lossy().to_string());
        }

        Ok(Box::new(MemoryHandle {
            doc: Arc::clone(doc),
            info,
        }))
    }
}

struct MemoryHandle {
    doc: Arc<MemoryDocument>,
    info: DocumentInfo,
}

impl DocumentHandle for MemoryHandle {
    fn page_count(&self) -> u32 {
        self.doc.pages.len() as u32
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn load_page(&self, number: u32) -> Result<Page> {
        if self.doc.broken_pages.contains(&number) {
            return Err(Error::Corrupted(format!("page {number} cannot be decoded")));
        }
        number
            .checked_sub(1)
            .and_then(|i| self.doc.pages.get(i as usize))
            .cloned()
            .ok_or_else(|| Error::Corrupted(format!("page {number} does not exist")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_open_unknown_path() {
        let source = MemorySource::new();
        let err = source.open(Path::new("nope.pdf"), None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_password_checks() {
        let doc = MemoryDocument::new(vec![Page::letter(1)]).with_password("s3cret");
        let source = MemorySource::new().with_document("locked.pdf", doc);
        let path = Path::new("locked.pdf");

        assert!(matches!(source.open(path, None), Err(Error::PasswordRequired)));
        assert!(matches!(source.open(path, Some("guess")), Err(Error::InvalidPassword)));
        let handle = source.open(path, Some("s3cret")).unwrap();
        assert!(handle.info().encrypted);
    }

    #[test]
    fn test_corrupt_document() {
        let source = MemorySource::new()
            .with_document("bad.pdf", MemoryDocument::new(vec![Page::letter(1)]).corrupt());
        let err = source.open(Path::new("bad.pdf"), None).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::CorruptInput);
    }

    #[test]
    fn test_pages_renumbered_and_broken_page() {
        let doc = MemoryDocument::new(vec![Page::letter(7), Page::letter(7)]).with_broken_page(2);
        let source = MemorySource::new().with_document("a.pdf", doc);
        let handle = source.open(Path::new("a.pdf"), None).unwrap();
        assert_eq!(handle.page_count(), 2);
        assert_eq!(handle.load_page(1).unwrap().number, 1);
        assert!(handle.load_page(2).is_err());
        assert!(handle.load_page(3).is_err());
        assert_eq!(handle.info().file_name.as_deref(), Some("a.pdf"));
    }
}
