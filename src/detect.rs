//! Input validation: is this path a readable PDF at all?
//!
//! Runs before any structural decoding so that a missing file, a directory,
//! or a renamed spreadsheet surface as input errors rather than corruption.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

/// Header information read from the first bytes of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker (non-zero when junk precedes it)
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3;
/// Readers tolerate up to 1 KiB of leading garbage before the header.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Validate that `path` names a readable file with a PDF header.
pub fn validate_input<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|e| Error::input(path, e.to_string()))?;
    if !meta.is_file() {
        return Err(Error::input(path, "not a regular file"));
    }

    let mut file = File::open(path).map_err(|e| Error::input(path, e.to_string()))?;
    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    file.by_ref()
        .take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)
        .map_err(|e| Error::input(path, e.to_string()))?;

    detect_header(&head)
}

/// Locate and parse the `%PDF-x.y` header in a byte prefix.
pub fn detect_header(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or(Error::UnknownFormat)?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfHeader { version, offset })
}

/// Check if bytes start like a PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_header(data).is_ok()
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3
        && matches!(bytes[0], b'1' | b'2')
        && bytes[1] == b'.'
        && bytes[2].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let header = detect_header(b"%PDF-1.7\n%\xe2\xe3\xcf\xd3").unwrap();
        assert_eq!(header.version, "1.7");
        assert_eq!(header.offset, 0);
    }

    #[test]
    fn test_detect_with_leading_garbage() {
        let header = detect_header(b"\r\n\x00junk%PDF-1.4\n").unwrap();
        assert_eq!(header.version, "1.4");
        assert_eq!(header.offset, 7);
    }

    #[test]
    fn test_detect_invalid_format() {
        let result = detect_header(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_detect_truncated_version() {
        assert!(matches!(detect_header(b"%PDF-1"), Err(Error::UnknownFormat)));
    }

    #[test]
    fn test_unsupported_version() {
        assert!(matches!(
            detect_header(b"%PDF-9.x"),
            Err(Error::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_validate_missing_file() {
        let err = validate_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_input(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Input { .. }));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.4\n"));
        assert!(!is_pdf_bytes(b"Not a PDF"));
    }
}
