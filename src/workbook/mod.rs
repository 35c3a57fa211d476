//! Workbook assembly.
//!
//! A conversion result becomes four sheets (`Text`, `Tables`, `Metadata`,
//! `Images_Info`). Image payloads are written as sibling files named
//! `{workbook stem}_{page}_{ordinal}.{ext}` and referenced from `Images_Info`,
//! so documents sharing a name but written to distinct workbooks never
//! share image files.
//!
//! # Example
//!
//! ```no_run
//! use pdfsheet::convert::{ConversionPipeline, ConvertOptions};
//! use pdfsheet::workbook::{AssembleOptions, WorkbookAssembler};
//! use std::path::Path;
//!
//! fn main() -> pdfsheet::Result<()> {
//!     let result = ConversionPipeline::new().convert(Path::new("report.pdf"), &ConvertOptions::default())?;
//!     let output = WorkbookAssembler::new(AssembleOptions::default())
//!         .assemble(&result, Path::new("report.xlsx"))?;
//!     println!("{} images written", output.images.len());
//!     Ok(())
//! }
//! ```

pub mod plan;
mod sink;

pub use plan::{plan, plan_with_image_prefix, CellStyle, CellValue, PlannedCell, SheetPlan, WorkbookPlan};
pub use sink::{WorkbookSink, XlsxSink};

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::model::ConversionResult;

/// Options for writing a workbook.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Upper bound on column width, in characters
    pub max_column_width: f64,

    /// Write image files next to the workbook
    pub write_images: bool,

    /// Directory for image files (defaults to the workbook's directory)
    pub image_dir: Option<PathBuf>,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            max_column_width: 50.0,
            write_images: true,
            image_dir: None,
        }
    }
}

impl AssembleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_column_width(mut self, width: f64) -> Self {
        self.max_column_width = width;
        self
    }

    pub fn with_images(mut self, write: bool) -> Self {
        self.write_images = write;
        self
    }

    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(dir.into());
        self
    }
}

/// Files produced for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledOutput {
    pub workbook: PathBuf,
    pub images: Vec<PathBuf>,
}

/// Writes conversion results as workbooks.
///
/// Holds no state between documents: each call is a function of the result
/// and the options.
#[derive(Debug, Clone)]
pub struct WorkbookAssembler<K: WorkbookSink = XlsxSink> {
    options: AssembleOptions,
    sink: K,
}

impl WorkbookAssembler<XlsxSink> {
    pub fn new(options: AssembleOptions) -> Self {
        Self::with_sink(options, XlsxSink::new())
    }
}

impl Default for WorkbookAssembler<XlsxSink> {
    fn default() -> Self {
        Self::new(AssembleOptions::default())
    }
}

impl<K: WorkbookSink> WorkbookAssembler<K> {
    pub fn with_sink(options: AssembleOptions, sink: K) -> Self {
        Self { options, sink }
    }

    pub fn options(&self) -> &AssembleOptions {
        &self.options
    }

    /// Plan the workbook for `result` without writing anything.
    pub fn plan(&self, result: &ConversionResult) -> WorkbookPlan {
        plan::plan(result, self.options.max_column_width)
    }

    /// Write the workbook to `path` and the images beside it.
    ///
    /// On failure nothing written by this call is left behind.
    pub fn assemble(&self, result: &ConversionResult, path: &Path) -> Result<AssembledOutput> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        create_dir(parent)?;

        let prefix = image_prefix(result, path);
        let layout = plan::plan_with_image_prefix(result, &prefix, self.options.max_column_width);
        self.sink.write(&layout, path)?;

        let images = if self.options.write_images {
            let dir = self.options.image_dir.as_deref().unwrap_or(parent);
            match write_images(result, &prefix, dir) {
                Ok(images) => images,
                Err(e) => {
                    remove_files([path]);
                    return Err(e);
                }
            }
        } else {
            Vec::new()
        };

        log::info!(
            "WorkbookAssembler: {} -> {} ({} images)",
            result.document_name,
            path.display(),
            images.len()
        );

        Ok(AssembledOutput {
            workbook: path.to_path_buf(),
            images,
        })
    }
}

/// Image files take the workbook's stem; the document name is the fallback.
fn image_prefix(result: &ConversionResult, workbook: &Path) -> String {
    workbook
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| result.document_name.clone())
}

fn write_images(result: &ConversionResult, prefix: &str, dir: &Path) -> Result<Vec<PathBuf>> {
    if result.images.is_empty() {
        return Ok(Vec::new());
    }
    create_dir(dir)?;

    let mut written = Vec::with_capacity(result.images.len());
    for image in &result.images {
        let path = dir.join(image.file_name(prefix));
        if let Err(e) = fs::write(&path, &image.data) {
            written.push(path.clone());
            remove_files(written.iter().map(PathBuf::as_path));
            return Err(Error::Output(format!("cannot write {}: {e}", path.display())));
        }
        written.push(path);
    }
    Ok(written)
}

fn remove_files<'a>(paths: impl IntoIterator<Item = &'a Path>) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            log::debug!("WorkbookAssembler: cannot remove {}: {}", path.display(), e);
        }
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Output(format!("cannot create {}: {e}", dir.display())))
}
