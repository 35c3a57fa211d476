//! # pdfsheet
//!
//! Convert PDF documents into multi-sheet workbooks.
//!
//! Each document becomes one `.xlsx` file with four sheets: page text,
//! detected tables, document metadata, and an index of extracted images
//! (written as sibling files).
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfsheet::convert_to_workbook;
//!
//! fn main() -> pdfsheet::Result<()> {
//!     let result = convert_to_workbook("report.pdf", "report.xlsx")?;
//!     println!("{} tables, {} warnings", result.tables.len(), result.warnings.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Table detection**: ruled-line grids with merged cells, and
//!   whitespace-aligned columns, tried as an ordered fallback chain
//! - **Reading-order text**: line and paragraph reconstruction, NFC
//!   normalization, CJK-aware spacing
//! - **Images**: JPEG/PNG payloads kept as-is, raw samples re-encoded to PNG
//! - **Soft failures**: per-section warnings instead of aborted documents
//! - **Batches**: bounded parallelism, per-document outcomes, `summary.json`

pub mod batch;
pub mod convert;
pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod source;
pub mod workbook;

// Re-export commonly used types
pub use batch::{
    discover_inputs, BatchEntry, BatchOptions, BatchResult, BatchRunner, BatchSummary,
    ConvertedDocument, Progress,
};
pub use convert::{ConversionPipeline, ConvertOptions};
pub use detect::{detect_header, is_pdf_bytes, validate_input, PdfHeader};
pub use error::{Error, ErrorKind, Result};
pub use extract::{
    DetectionStrategy, DetectorConfig, ImageConfig, TableDetector, TextConfig,
};
pub use model::{
    BBox, Cell, ConversionResult, ExtractedImage, ImageFormat, Metadata, MetadataKey, Page,
    PageText, Row, StrategyKind, Table, TableCandidate, TextRun, Warning, WarningSection,
};
pub use source::{CancelToken, LopdfSource, PageRange, PageSource};
pub use workbook::{AssembleOptions, AssembledOutput, WorkbookAssembler};

use std::path::Path;

/// Convert a PDF file with default options.
///
/// # Example
///
/// ```no_run
/// use pdfsheet::convert_file;
///
/// let result = convert_file("document.pdf").unwrap();
/// for page in &result.pages {
///     println!("page {}: {} words", page.page, page.word_count);
/// }
/// ```
pub fn convert_file<P: AsRef<Path>>(path: P) -> Result<ConversionResult> {
    convert_file_with_options(path, &ConvertOptions::default())
}

/// Convert a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfsheet::{convert_file_with_options, ConvertOptions, PageRange};
///
/// let options = ConvertOptions::new()
///     .with_page_range(PageRange::span(2, 3))
///     .with_images(false);
/// let result = convert_file_with_options("document.pdf", &options).unwrap();
/// ```
pub fn convert_file_with_options<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
) -> Result<ConversionResult> {
    ConversionPipeline::new().convert(path.as_ref(), options)
}

/// Convert a password-protected PDF file.
pub fn convert_file_with_password<P: AsRef<Path>>(
    path: P,
    password: &str,
) -> Result<ConversionResult> {
    let options = ConvertOptions::new().with_credential(password);
    convert_file_with_options(path, &options)
}

/// Convert a PDF file and write its workbook (and images) to `output`.
///
/// # Example
///
/// ```no_run
/// use pdfsheet::convert_to_workbook;
///
/// convert_to_workbook("document.pdf", "out/document.xlsx").unwrap();
/// ```
pub fn convert_to_workbook<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ConversionResult> {
    PdfSheet::new().convert(input, output)
}

/// Builder for converting documents to workbooks.
///
/// # Example
///
/// ```no_run
/// use pdfsheet::{PdfSheet, PageRange};
///
/// let result = PdfSheet::new()
///     .with_pages(PageRange::span(1, 5))
///     .with_password("secret")
///     .with_max_column_width(80.0)
///     .convert("document.pdf", "document.xlsx")?;
/// # Ok::<(), pdfsheet::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct PdfSheet {
    convert_options: ConvertOptions,
    assemble_options: AssembleOptions,
}

impl PdfSheet {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set page range.
    pub fn with_pages(mut self, range: PageRange) -> Self {
        self.convert_options = self.convert_options.with_page_range(range);
        self
    }

    /// Set document password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.convert_options = self.convert_options.with_credential(password);
        self
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.convert_options = self.convert_options.with_images(extract);
        self.assemble_options = self.assemble_options.with_images(extract);
        self
    }

    /// Set image output directory.
    pub fn with_image_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.assemble_options = self.assemble_options.with_image_dir(dir);
        self
    }

    /// Enable or disable table detection.
    pub fn with_tables(mut self, extract: bool) -> Self {
        self.convert_options = self.convert_options.with_tables(extract);
        self
    }

    /// Override the table detection strategy order.
    pub fn with_strategy_order(mut self, order: &[StrategyKind]) -> Result<Self> {
        self.convert_options = self.convert_options.with_strategy_order(order)?;
        Ok(self)
    }

    /// Set table detection tolerances.
    pub fn with_detector(mut self, config: DetectorConfig) -> Self {
        self.convert_options = self.convert_options.with_detector(config);
        self
    }

    /// Set a per-document time limit.
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.convert_options = self.convert_options.with_timeout(timeout);
        self
    }

    /// Disable parallel extraction within a page.
    pub fn sequential(mut self) -> Self {
        self.convert_options = self.convert_options.with_parallel(false);
        self
    }

    /// Clamp workbook column widths.
    pub fn with_max_column_width(mut self, width: f64) -> Self {
        self.assemble_options = self.assemble_options.with_max_column_width(width);
        self
    }

    pub fn convert_options(&self) -> &ConvertOptions {
        &self.convert_options
    }

    pub fn assemble_options(&self) -> &AssembleOptions {
        &self.assemble_options
    }

    /// Extract without writing anything.
    pub fn extract<P: AsRef<Path>>(&self, input: P) -> Result<ConversionResult> {
        ConversionPipeline::new().convert(input.as_ref(), &self.convert_options)
    }

    /// Convert `input` and write the workbook to `output`.
    pub fn convert<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<ConversionResult> {
        let result = self.extract(input)?;
        WorkbookAssembler::new(self.assemble_options.clone()).assemble(&result, output.as_ref())?;
        Ok(result)
    }

    /// Convert many inputs into `output_dir`, one workbook each.
    pub fn batch(
        &self,
        inputs: &[std::path::PathBuf],
        output_dir: impl AsRef<Path>,
        concurrency_limit: usize,
        on_progress: impl FnMut(&Progress),
    ) -> Result<BatchResult> {
        let options = BatchOptions::new()
            .with_convert(self.convert_options.clone())
            .with_assemble(self.assemble_options.clone())
            .with_concurrency_limit(concurrency_limit)?;
        Ok(BatchRunner::new().run(inputs, output_dir.as_ref(), &options, on_progress))
    }
}

/// Async wrappers that run conversions on tokio's blocking pool.
#[cfg(feature = "async")]
pub mod async_api {
    use std::path::PathBuf;

    use super::*;

    /// Convert a PDF file without blocking the async runtime.
    pub async fn convert_async(
        path: impl Into<PathBuf>,
        options: ConvertOptions,
    ) -> Result<ConversionResult> {
        let path = path.into();
        tokio::task::spawn_blocking(move || ConversionPipeline::new().convert(&path, &options))
            .await
            .map_err(|e| Error::Corrupted(format!("conversion task failed: {e}")))?
    }

    /// Run a batch without blocking the async runtime.
    pub async fn run_async(
        inputs: Vec<PathBuf>,
        output_dir: impl Into<PathBuf>,
        options: BatchOptions,
    ) -> Result<BatchResult> {
        let output_dir = output_dir.into();
        tokio::task::spawn_blocking(move || {
            BatchRunner::new().run(&inputs, &output_dir, &options, |_| {})
        })
        .await
        .map_err(|e| Error::Corrupted(format!("batch task failed: {e}")))
    }
}

#[cfg(feature = "async")]
pub use async_api::{convert_async, run_async};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let sheet = PdfSheet::new()
            .with_pages(PageRange::span(1, 2))
            .with_password("pw")
            .with_images(false)
            .with_max_column_width(80.0)
            .sequential();

        assert_eq!(sheet.convert_options().page_range, PageRange::span(1, 2));
        assert_eq!(sheet.convert_options().credential.as_deref(), Some("pw"));
        assert!(!sheet.convert_options().extract_images);
        assert!(!sheet.assemble_options().write_images);
        assert!(!sheet.convert_options().parallel);
        assert_eq!(sheet.assemble_options().max_column_width, 80.0);
    }

    #[test]
    fn test_strategy_order_validation() {
        assert!(PdfSheet::new().with_strategy_order(&[]).is_err());
        let sheet = PdfSheet::new()
            .with_strategy_order(&[StrategyKind::Whitespace])
            .unwrap();
        assert_eq!(
            sheet.convert_options().table_strategy_order,
            vec![StrategyKind::Whitespace]
        );
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = convert_file("definitely/not/here.pdf").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_non_pdf_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"just some text, not a document").unwrap();
        let err = convert_file(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[cfg(feature = "async")]
    #[tokio::test]
    async fn test_convert_async_reports_input_error() {
        let err = convert_async("definitely/not/here.pdf", ConvertOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}
