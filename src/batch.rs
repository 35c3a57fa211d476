//! Batch conversion over many documents.
//!
//! Documents are converted on a bounded rayon pool. Each worker sends its
//! outcome over a channel and the calling thread reports progress as
//! outcomes arrive, so the count rises by exactly one per input. A failure
//! on one input is recorded as that input's outcome and never stops the
//! others.

use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::convert::{document_name, ConversionPipeline, ConvertOptions};
use crate::error::{Error, ErrorKind, Result};
use crate::model::ConversionResult;
use crate::source::{LopdfSource, PageSource};
use crate::workbook::{AssembleOptions, AssembledOutput, WorkbookAssembler};

/// Name of the summary file written to the output directory.
pub const SUMMARY_FILE: &str = "summary.json";

/// Options applied uniformly to every document in a batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub convert: ConvertOptions,
    pub assemble: AssembleOptions,
    /// Maximum documents converted at once
    pub concurrency_limit: usize,
    /// Write `summary.json` to the output directory
    pub write_summary: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            convert: ConvertOptions::default(),
            assemble: AssembleOptions::default(),
            concurrency_limit: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            write_summary: true,
        }
    }
}

impl BatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_convert(mut self, options: ConvertOptions) -> Self {
        self.convert = options;
        self
    }

    pub fn with_assemble(mut self, options: AssembleOptions) -> Self {
        self.assemble = options;
        self
    }

    /// Set the worker limit; zero is rejected.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidOption(
                "concurrency limit must be positive".to_string(),
            ));
        }
        self.concurrency_limit = limit;
        Ok(self)
    }

    pub fn with_summary(mut self, write: bool) -> Self {
        self.write_summary = write;
        self
    }
}

/// Reported after each input completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    /// Inputs finished so far, including this one
    pub completed: usize,
    pub total: usize,
    pub input: PathBuf,
    pub ok: bool,
}

/// A successfully converted document.
#[derive(Debug, Clone)]
pub struct ConvertedDocument {
    pub result: ConversionResult,
    pub output: AssembledOutput,
}

/// One input and what became of it.
#[derive(Debug)]
pub struct BatchEntry {
    pub input: PathBuf,
    pub outcome: Result<ConvertedDocument>,
}

impl BatchEntry {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.outcome.as_ref().err().map(Error::kind)
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    /// Where the summary was written, if it was
    pub summary_path: Option<PathBuf>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| e.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&Path, &ConvertedDocument)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().ok().map(|d| (e.input.as_path(), d)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &Error)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().err().map(|err| (e.input.as_path(), err)))
    }

    /// Serializable summary of the batch.
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            documents: self.entries.iter().map(SummaryEntry::from_entry).collect(),
        }
    }
}

/// Contents of `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub documents: Vec<SummaryEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryEntry {
    pub input: PathBuf,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tables: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SummaryEntry {
    fn from_entry(entry: &BatchEntry) -> Self {
        match &entry.outcome {
            Ok(doc) => Self {
                input: entry.input.clone(),
                status: "ok",
                output: Some(doc.output.workbook.clone()),
                pages: Some(doc.result.pages.len()),
                tables: Some(doc.result.tables.len()),
                images: Some(doc.result.images.len()),
                warnings: doc.result.warnings.iter().map(ToString::to_string).collect(),
                error_kind: None,
                error: None,
            },
            Err(err) => Self {
                input: entry.input.clone(),
                status: "failed",
                output: None,
                pages: None,
                tables: None,
                images: None,
                warnings: Vec::new(),
                error_kind: Some(err.kind()),
                error: Some(err.to_string()),
            },
        }
    }
}

/// Converts many documents, each into its own workbook.
#[derive(Debug, Clone, Default)]
pub struct BatchRunner<S: PageSource = LopdfSource> {
    pipeline: ConversionPipeline<S>,
}

impl BatchRunner<LopdfSource> {
    pub fn new() -> Self {
        Self::with_pipeline(ConversionPipeline::new())
    }
}

impl<S: PageSource> BatchRunner<S> {
    pub fn with_pipeline(pipeline: ConversionPipeline<S>) -> Self {
        Self { pipeline }
    }

    /// Convert every input, writing `{stem}.xlsx` files into `output_dir`.
    ///
    /// `on_progress` is called on the calling thread once per input as it
    /// finishes. Always returns one entry per input, in input order.
    pub fn run(
        &self,
        inputs: &[PathBuf],
        output_dir: &Path,
        options: &BatchOptions,
        mut on_progress: impl FnMut(&Progress),
    ) -> BatchResult {
        let total = inputs.len();
        log::info!(
            "BatchRunner: {} inputs, up to {} at a time",
            total,
            options.concurrency_limit
        );

        let outputs = output_paths(inputs, output_dir);
        let mut outcomes: Vec<Option<Result<ConvertedDocument>>> =
            (0..total).map(|_| None).collect();
        let mut completed = 0usize;
        let mut record = |index: usize, outcome: Result<ConvertedDocument>| {
            completed += 1;
            let input = &inputs[index];
            if let Err(e) = &outcome {
                log::warn!("BatchRunner: {} failed: {}", input.display(), e);
            }
            on_progress(&Progress {
                completed,
                total,
                input: input.clone(),
                ok: outcome.is_ok(),
            });
            outcomes[index] = Some(outcome);
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.concurrency_limit.max(1))
            .build();
        match pool {
            Ok(pool) => {
                let (tx, rx) = crossbeam_channel::unbounded();
                pool.in_place_scope(|scope| {
                    for (index, (input, output)) in inputs.iter().zip(&outputs).enumerate() {
                        let tx = tx.clone();
                        scope.spawn(move |_| {
                            let outcome = self.convert_one(input, output, options);
                            // The receiver outlives every worker
                            let _ = tx.send((index, outcome));
                        });
                    }
                    drop(tx);
                    for (index, outcome) in rx.iter() {
                        record(index, outcome);
                    }
                });
            }
            Err(e) => {
                log::warn!("BatchRunner: thread pool unavailable ({e}), converting sequentially");
                for (index, (input, output)) in inputs.iter().zip(&outputs).enumerate() {
                    record(index, self.convert_one(input, output, options));
                }
            }
        }

        let entries: Vec<BatchEntry> = inputs
            .iter()
            .zip(outcomes)
            .map(|(input, outcome)| BatchEntry {
                input: input.clone(),
                outcome: outcome
                    .unwrap_or_else(|| Err(Error::Output("conversion did not report".to_string()))),
            })
            .collect();

        let mut result = BatchResult {
            entries,
            summary_path: None,
        };
        if options.write_summary {
            match write_summary(&result, output_dir) {
                Ok(path) => result.summary_path = Some(path),
                Err(e) => log::warn!("BatchRunner: summary not written: {e}"),
            }
        }
        log::info!(
            "BatchRunner: {} succeeded, {} failed",
            result.succeeded(),
            result.failed()
        );
        result
    }

    /// Convert and assemble one document, containing panics.
    fn convert_one(
        &self,
        input: &Path,
        output: &Path,
        options: &BatchOptions,
    ) -> Result<ConvertedDocument> {
        let job = || -> Result<ConvertedDocument> {
            let result = self.pipeline.convert(input, &options.convert)?;
            let output = WorkbookAssembler::new(options.assemble.clone()).assemble(&result, output)?;
            Ok(ConvertedDocument { result, output })
        };
        panic::catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(Error::Corrupted(format!("conversion panicked: {message}")))
        })
    }
}

/// Workbook path per input: `{stem}.xlsx`, with `_2`, `_3`, ... appended
/// when stems repeat.
pub fn output_paths(inputs: &[PathBuf], output_dir: &Path) -> Vec<PathBuf> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    inputs
        .iter()
        .map(|input| {
            let stem = document_name(input);
            let count = seen.entry(stem.to_lowercase()).or_insert(0);
            *count += 1;
            let name = if *count == 1 {
                format!("{stem}.xlsx")
            } else {
                format!("{stem}_{count}.xlsx")
            };
            output_dir.join(name)
        })
        .collect()
}

fn write_summary(result: &BatchResult, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .map_err(|e| Error::Output(format!("cannot create {}: {e}", output_dir.display())))?;
    let path = output_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&result.summary())
        .map_err(|e| Error::Output(e.to_string()))?;
    fs::write(&path, json)
        .map_err(|e| Error::Output(format!("cannot write {}: {e}", path.display())))?;
    Ok(path)
}

/// Expand inputs: files are kept as given, directories are searched
/// recursively for `.pdf` files (sorted).
pub fn discover_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();
    for path in paths {
        if !path.is_dir() {
            inputs.push(path.clone());
            continue;
        }
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
            })
            .collect();
        found.sort();
        log::debug!(
            "BatchRunner: found {} PDF files under {}",
            found.len(),
            path.display()
        );
        inputs.extend(found);
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_deduplicated() {
        let inputs = vec![
            PathBuf::from("a/report.pdf"),
            PathBuf::from("b/report.pdf"),
            PathBuf::from("b/Report.PDF"),
            PathBuf::from("c/other.pdf"),
        ];
        let outputs = output_paths(&inputs, Path::new("out"));
        assert_eq!(
            outputs,
            vec![
                PathBuf::from("out/report.xlsx"),
                PathBuf::from("out/report_2.xlsx"),
                PathBuf::from("out/Report_3.xlsx"),
                PathBuf::from("out/other.xlsx"),
            ]
        );
    }

    #[test]
    fn test_discover_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("b.pdf"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("sub").join("a.PDF"), b"%PDF-1.4").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let explicit = PathBuf::from("given.pdf");
        let found = discover_inputs(&[dir.path().to_path_buf(), explicit.clone()]);
        assert_eq!(
            found,
            vec![
                dir.path().join("b.pdf"),
                dir.path().join("sub").join("a.PDF"),
                explicit,
            ]
        );
    }

    #[test]
    fn test_concurrency_limit_must_be_positive() {
        assert!(BatchOptions::new().with_concurrency_limit(0).is_err());
        assert_eq!(
            BatchOptions::new()
                .with_concurrency_limit(3)
                .unwrap()
                .concurrency_limit,
            3
        );
    }
}
