//! Error types for pdfsheet library.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pdfsheet operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that end a document's conversion.
///
/// Section-level problems (a table that failed to reconstruct, an image that
/// would not decode, a malformed date) are not errors; they travel as
/// [`crate::model::Warning`] values inside the conversion result.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input path is missing or cannot be used as a document.
    #[error("Cannot read input {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The document is encrypted and no credential was supplied.
    #[error("Document is encrypted and requires a password")]
    PasswordRequired,

    /// The provided password is incorrect.
    #[error("Invalid password")]
    InvalidPassword,

    /// The PDF structure is corrupted or malformed.
    #[error("Corrupted PDF structure: {0}")]
    Corrupted(String),

    /// No page in the requested range could be read.
    #[error("No readable pages in the requested range")]
    NoPages,

    /// The per-document time limit elapsed.
    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    /// Conversion was cancelled by the caller.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Writing the workbook or an image file failed.
    #[error("Output error: {0}")]
    Output(String),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// An option value could not be parsed.
    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

/// Coarse classification of fatal document errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing path, unreadable file, or not a PDF.
    Input,
    /// Credential missing or wrong.
    Authentication,
    /// Document structure unreadable.
    CorruptInput,
    /// Workbook or image write failure.
    Output,
    /// Timed out or cancelled.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Input => "input",
            ErrorKind::Authentication => "authentication",
            ErrorKind::CorruptInput => "corrupt_input",
            ErrorKind::Output => "output",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::Input { .. }
            | Error::UnknownFormat
            | Error::UnsupportedVersion(_)
            | Error::InvalidPageRange(_)
            | Error::InvalidOption(_) => ErrorKind::Input,
            Error::PasswordRequired | Error::InvalidPassword => ErrorKind::Authentication,
            Error::Corrupted(_) | Error::NoPages => ErrorKind::CorruptInput,
            Error::Output(_) => ErrorKind::Output,
            Error::Timeout(_) | Error::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Build an input error for `path`.
    pub fn input(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Input {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) | lopdf::Error::InvalidPassword => Error::InvalidPassword,
            _ => Error::Corrupted(err.to_string()),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Output(err.to_string())
    }
}
