//! Document conversion pipeline.
//!
//! Opens a document through a [`PageSource`], walks the requested pages in
//! order, and runs the enabled extractors on each page. Extractor problems
//! are recorded as warnings; only an unopenable document, an empty page
//! range, or cancellation ends a conversion with an error.
//!
//! # Example
//!
//! ```no_run
//! use pdfsheet::convert::{ConversionPipeline, ConvertOptions};
//! use pdfsheet::source::PageRange;
//! use std::path::Path;
//!
//! fn main() -> pdfsheet::Result<()> {
//!     let options = ConvertOptions::new().with_page_range(PageRange::span(2, 3));
//!     let result = ConversionPipeline::new().convert(Path::new("report.pdf"), &options)?;
//!     println!("{} tables", result.tables.len());
//!     Ok(())
//! }
//! ```

mod options;

pub use options::ConvertOptions;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use crate::error::{Error, Result};
use crate::extract::{ImageExtractor, MetadataReader, TableDetector, TextExtractor};
use crate::model::{
    ConversionResult, ExtractedImage, Page, PageText, Table, TableCandidate, Warning,
    WarningSection,
};
use crate::source::{CancelToken, LopdfSource, PageSource};

/// Converts documents into [`ConversionResult`]s.
#[derive(Debug, Clone, Default)]
pub struct ConversionPipeline<S: PageSource = LopdfSource> {
    source: S,
}

impl ConversionPipeline<LopdfSource> {
    /// A pipeline reading PDF files from disk.
    pub fn new() -> Self {
        Self::with_source(LopdfSource::new())
    }
}

impl<S: PageSource> ConversionPipeline<S> {
    /// A pipeline reading documents from `source`.
    pub fn with_source(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Convert the document at `path`.
    ///
    /// When `options.timeout` is set, the deadline is checked between pages
    /// and an expired conversion fails with [`Error::Timeout`].
    pub fn convert(&self, path: &Path, options: &ConvertOptions) -> Result<ConversionResult> {
        let cancel = options
            .timeout
            .map(CancelToken::with_timeout)
            .unwrap_or_default();
        self.convert_with_cancel(path, options, &cancel)
    }

    /// Open the document and read its metadata without visiting any page.
    ///
    /// The returned result carries the page count, metadata and metadata
    /// warnings; its page, table and image lists are empty.
    pub fn inspect(&self, path: &Path, credential: Option<&str>) -> Result<ConversionResult> {
        let doc = self.source.open(path, credential)?;
        let mut result = ConversionResult::new(document_name(path), doc.page_count());
        let (metadata, warnings) = MetadataReader::new().read(&doc.info());
        result.metadata = metadata;
        result.warnings = warnings;
        Ok(result)
    }

    /// Convert the document at `path`, stopping at the next page boundary
    /// once `cancel` fires.
    pub fn convert_with_cancel(
        &self,
        path: &Path,
        options: &ConvertOptions,
        cancel: &CancelToken,
    ) -> Result<ConversionResult> {
        log::info!("ConversionPipeline: converting {}", path.display());

        let doc = self.source.open(path, options.credential.as_deref())?;
        cancel.check()?;

        let page_count = doc.page_count();
        let mut result = ConversionResult::new(document_name(path), page_count);

        let (metadata, metadata_warnings) = MetadataReader::new().read(&doc.info());
        result.metadata = metadata;
        result.warnings.extend(metadata_warnings);

        let Some(span) = options.page_range.clamp(page_count) else {
            log::debug!(
                "ConversionPipeline: range {} selects nothing from {} pages",
                options.page_range,
                page_count
            );
            return Err(Error::NoPages);
        };
        log::debug!(
            "ConversionPipeline: pages {}-{} of {}",
            span.start(),
            span.end(),
            page_count
        );

        let extractors = Extractors::new(options);
        let mut candidates: Vec<TableCandidate> = Vec::new();
        let mut pages_read = 0usize;

        for (number, page) in doc.pages(options.page_range, cancel) {
            let page = match page {
                Ok(page) => page,
                Err(e @ (Error::Cancelled | Error::Timeout(_))) => {
                    log::warn!(
                        "ConversionPipeline: {} stopped before page {}: {}",
                        result.document_name,
                        number,
                        e
                    );
                    return Err(e);
                }
                Err(e) => {
                    result
                        .warnings
                        .push(Warning::page(number, format!("page could not be read: {e}")));
                    continue;
                }
            };
            pages_read += 1;

            let outcome = extractors.run(&page, options.parallel);
            result.pages.push(outcome.text);
            candidates.extend(outcome.candidates);
            result.images.extend(outcome.images);
            result.warnings.extend(outcome.warnings);
        }

        if pages_read == 0 {
            return Err(Error::NoPages);
        }

        result.tables = promote(candidates, &mut result.warnings);
        // Keep warnings in page order, document-level ones first
        result.warnings.sort_by_key(|w| w.page.unwrap_or(0));

        for warning in &result.warnings {
            log::warn!("{}: {}", result.document_name, warning);
        }
        log::info!(
            "ConversionPipeline: {} done: {} pages, {} tables, {} images, {} warnings",
            result.document_name,
            result.pages.len(),
            result.tables.len(),
            result.images.len(),
            result.warnings.len()
        );
        Ok(result)
    }
}

/// Everything one page contributed.
struct PageOutcome {
    text: PageText,
    candidates: Vec<TableCandidate>,
    images: Vec<ExtractedImage>,
    warnings: Vec<Warning>,
}

/// The extractors enabled for one conversion.
struct Extractors {
    text: TextExtractor,
    tables: Option<TableDetector>,
    images: Option<ImageExtractor>,
}

impl Extractors {
    fn new(options: &ConvertOptions) -> Self {
        Self {
            text: TextExtractor::new(options.text.clone()),
            tables: options.extract_tables.then(|| {
                TableDetector::with_order(options.detector.clone(), &options.table_strategy_order)
            }),
            images: options
                .extract_images
                .then(|| ImageExtractor::new(options.image.clone())),
        }
    }

    /// Run every enabled extractor on `page`.
    ///
    /// Extractors share no mutable state, so with `parallel` they run
    /// concurrently. A panicking extractor costs only its own section.
    fn run(&self, page: &Page, parallel: bool) -> PageOutcome {
        let number = page.number;
        let text_job = || guarded(number, WarningSection::Text, || self.text.extract(page));
        let table_job = || {
            self.tables
                .as_ref()
                .map(|d| guarded(number, WarningSection::Table, || d.detect(page)))
        };
        let image_job = || {
            self.images
                .as_ref()
                .map(|e| guarded(number, WarningSection::Image, || e.extract(page)))
        };

        let (text, (tables, images)) = if parallel {
            rayon::join(text_job, || rayon::join(table_job, image_job))
        } else {
            (text_job(), (table_job(), image_job()))
        };

        let mut warnings = Vec::new();
        let text = text.unwrap_or_else(|w| {
            warnings.push(w);
            PageText::empty(number)
        });
        let candidates = match tables {
            Some(Ok(candidates)) => candidates,
            Some(Err(w)) => {
                warnings.push(w);
                Vec::new()
            }
            None => Vec::new(),
        };
        let images = match images {
            Some(Ok((images, image_warnings))) => {
                warnings.extend(image_warnings);
                images
            }
            Some(Err(w)) => {
                warnings.push(w);
                Vec::new()
            }
            None => Vec::new(),
        };

        PageOutcome {
            text,
            candidates,
            images,
            warnings,
        }
    }
}

/// Run `f`, turning a panic into a section warning.
fn guarded<T>(
    page: u32,
    section: WarningSection,
    f: impl FnOnce() -> T,
) -> std::result::Result<T, Warning> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        Warning::new(
            section,
            Some(page),
            format!("extractor failed: {}", panic_message(payload.as_ref())),
        )
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Validate candidates and number the survivors across the document.
fn promote(candidates: Vec<TableCandidate>, warnings: &mut Vec<Warning>) -> Vec<Table> {
    let mut tables = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let page = candidate.page;
        match Table::from_candidate(candidate, tables.len() + 1) {
            Ok(table) => tables.push(table),
            Err(reason) => warnings.push(Warning::table(page, format!("table discarded: {reason}"))),
        }
    }
    tables
}

/// File stem used to name outputs.
pub(crate) fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{BBox, ImageFilter, LineSegment, RasterImage, StrategyKind, TextRun};
    use crate::source::{MemoryDocument, MemorySource, PageRange};

    fn text_page(label: &str) -> Page {
        Page::letter(1).with_text_runs(vec![TextRun::new(
            label,
            BBox::new(72.0, 72.0, 72.0 + 6.0 * label.len() as f32, 84.0),
        )
        .with_font("Helvetica", 12.0)])
    }

    fn grid_page() -> Page {
        let ys = [100.0, 120.0, 140.0];
        let xs = [50.0, 150.0, 250.0];
        let mut lines: Vec<LineSegment> =
            ys.iter().map(|y| LineSegment::new(50.0, *y, 250.0, *y)).collect();
        lines.extend(xs.iter().map(|x| LineSegment::new(*x, 100.0, *x, 140.0)));
        let mut runs = Vec::new();
        for (r, y) in [104.0, 124.0].iter().enumerate() {
            for (c, x) in [60.0, 160.0].iter().enumerate() {
                runs.push(TextRun::new(
                    format!("{r}{c}"),
                    BBox::new(*x, *y, x + 12.0, y + 12.0),
                ));
            }
        }
        Page::letter(1).with_lines(lines).with_text_runs(runs)
    }

    fn pipeline(doc: MemoryDocument) -> ConversionPipeline<MemorySource> {
        ConversionPipeline::with_source(MemorySource::new().with_document("doc.pdf", doc))
    }

    fn convert(doc: MemoryDocument, options: &ConvertOptions) -> Result<ConversionResult> {
        pipeline(doc).convert(Path::new("doc.pdf"), options)
    }

    #[test]
    fn test_pages_in_order() {
        let doc = MemoryDocument::new(vec![text_page("one"), text_page("two"), text_page("three")]);
        let result = convert(doc, &ConvertOptions::default()).unwrap();
        assert_eq!(result.document_name, "doc");
        assert_eq!(result.page_numbers(), vec![1, 2, 3]);
        assert_eq!(result.pages[2].text, "three");
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let doc = MemoryDocument::new(vec![grid_page(), text_page("x")]);
        let parallel = convert(doc.clone(), &ConvertOptions::default()).unwrap();
        let sequential = convert(doc, &ConvertOptions::new().with_parallel(false)).unwrap();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn test_tables_numbered_across_pages() {
        let doc = MemoryDocument::new(vec![grid_page(), text_page("x"), grid_page()]);
        let result = convert(doc, &ConvertOptions::default()).unwrap();
        let placed: Vec<(usize, u32)> = result.tables.iter().map(|t| (t.ordinal, t.page)).collect();
        assert_eq!(placed, vec![(1, 1), (2, 3)]);
        assert_eq!(result.tables[0].strategy, StrategyKind::RuledLine);
        assert_eq!(result.tables[0].rows[1].cells[1].text, "11");
    }

    #[test]
    fn test_toggles() {
        let page = grid_page().with_images(vec![RasterImage::raw(2, 2, 1, vec![0; 4])]);
        let doc = MemoryDocument::new(vec![page]);
        let result = convert(doc.clone(), &ConvertOptions::default()).unwrap();
        assert_eq!(result.tables.len(), 1);
        assert_eq!(result.images.len(), 1);

        let result = convert(doc, &ConvertOptions::new().text_only()).unwrap();
        assert!(result.tables.is_empty());
        assert!(result.images.is_empty());
        assert_eq!(result.pages.len(), 1);
    }

    #[test]
    fn test_page_range() {
        let pages = (0..10).map(|i| text_page(&format!("page {}", i + 1))).collect();
        let options = ConvertOptions::new().with_page_range(PageRange::span(2, 3));
        let result = convert(MemoryDocument::new(pages), &options).unwrap();
        assert_eq!(result.page_numbers(), vec![2, 3]);
        assert_eq!(result.page_count, 10);
    }

    #[test]
    fn test_range_outside_document_is_fatal() {
        let doc = MemoryDocument::new(vec![text_page("only")]);
        let options = ConvertOptions::new().with_page_range(PageRange::span(5, 6));
        assert!(matches!(convert(doc, &options), Err(Error::NoPages)));
    }

    #[test]
    fn test_broken_page_becomes_warning() {
        let doc = MemoryDocument::new(vec![text_page("a"), text_page("b"), text_page("c")])
            .with_broken_page(2);
        let result = convert(doc, &ConvertOptions::default()).unwrap();
        assert_eq!(result.page_numbers(), vec![1, 3]);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].section, WarningSection::Page);
        assert_eq!(result.warnings[0].page, Some(2));
    }

    #[test]
    fn test_all_pages_broken_is_fatal() {
        let doc = MemoryDocument::new(vec![text_page("a")]).with_broken_page(1);
        let err = convert(doc, &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptInput);
    }

    #[test]
    fn test_bad_image_leaves_text_untouched() {
        let bad = RasterImage::new(8, 8, ImageFilter::Jpeg, b"garbage".to_vec());
        let with_image = MemoryDocument::new(vec![text_page("a"), text_page("b").with_images(vec![bad])]);
        let without = MemoryDocument::new(vec![text_page("a"), text_page("b")]);

        let a = convert(with_image, &ConvertOptions::default()).unwrap();
        let b = convert(without, &ConvertOptions::default()).unwrap();
        assert_eq!(a.pages, b.pages);
        assert_eq!(a.metadata, b.metadata);
        assert_eq!(a.warnings_for(WarningSection::Image).count(), 1);
        assert!(b.warnings.is_empty());
    }

    #[test]
    fn test_password_required() {
        let doc = MemoryDocument::new(vec![text_page("secret")]).with_password("pw");
        let err = convert(doc.clone(), &ConvertOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);

        let result = convert(doc, &ConvertOptions::new().with_credential("pw")).unwrap();
        assert_eq!(result.pages[0].text, "secret");
    }

    #[test]
    fn test_cancellation() {
        let doc = MemoryDocument::new(vec![text_page("a"), text_page("b")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = pipeline(doc)
            .convert_with_cancel(Path::new("doc.pdf"), &ConvertOptions::default(), &cancel)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }

    #[test]
    fn test_timeout() {
        let doc = MemoryDocument::new(vec![text_page("a")]);
        let options = ConvertOptions::new().with_timeout(std::time::Duration::ZERO);
        assert!(matches!(convert(doc, &options), Err(Error::Timeout(_))));
    }

    #[test]
    fn test_extractor_panic_is_contained() {
        let result = guarded(4, WarningSection::Table, || -> Vec<TableCandidate> {
            panic!("boom")
        });
        let warning = result.unwrap_err();
        assert_eq!(warning.section, WarningSection::Table);
        assert_eq!(warning.page, Some(4));
        assert!(warning.message.contains("boom"));
    }

    #[test]
    fn test_inspect_reads_metadata_only() {
        let info = crate::source::DocumentInfo {
            title: Some("Quarterly".into()),
            ..Default::default()
        };
        let doc = MemoryDocument::new(vec![text_page("a"), text_page("b")]).with_info(info);
        let result = pipeline(doc).inspect(Path::new("doc.pdf"), None).unwrap();
        assert_eq!(result.page_count, 2);
        assert!(result.pages.is_empty());
        assert_eq!(
            result.metadata.get(crate::model::MetadataKey::Title),
            Some("Quarterly")
        );
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name(Path::new("/tmp/Q3 report.pdf")), "Q3 report");
        assert_eq!(document_name(Path::new("")), "document");
    }
}
