//! Per-conversion options.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::extract::{DetectorConfig, ImageConfig, TextConfig};
use crate::model::StrategyKind;
use crate::source::PageRange;

/// Options for converting one document.
///
/// A single immutable value passed explicitly to every conversion; the
/// pipeline keeps no state between calls.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Pages to convert
    pub page_range: PageRange,

    /// Collect embedded images
    pub extract_images: bool,

    /// Run table detection
    pub extract_tables: bool,

    /// Detection strategies, tried in order
    pub table_strategy_order: Vec<StrategyKind>,

    /// Password for encrypted documents
    pub credential: Option<String>,

    /// Per-document time limit, checked between pages
    pub timeout: Option<Duration>,

    /// Run a page's extractors concurrently
    pub parallel: bool,

    /// Table detection tolerances and thresholds
    pub detector: DetectorConfig,

    /// Text linearization settings
    pub text: TextConfig,

    /// Image extraction settings
    pub image: ImageConfig,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page_range: PageRange::All,
            extract_images: true,
            extract_tables: true,
            table_strategy_order: StrategyKind::DEFAULT_ORDER.to_vec(),
            credential: None,
            timeout: None,
            parallel: true,
            detector: DetectorConfig::default(),
            text: TextConfig::default(),
            image: ImageConfig::default(),
        }
    }
}

impl ConvertOptions {
    /// Create new conversion options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit conversion to a page range.
    pub fn with_page_range(mut self, range: PageRange) -> Self {
        self.page_range = range;
        self
    }

    /// Enable or disable image extraction.
    pub fn with_images(mut self, extract: bool) -> Self {
        self.extract_images = extract;
        self
    }

    /// Enable or disable table detection.
    pub fn with_tables(mut self, extract: bool) -> Self {
        self.extract_tables = extract;
        self
    }

    /// Override the detection strategy order.
    ///
    /// Duplicates are dropped; an empty order is rejected.
    pub fn with_strategy_order(mut self, order: &[StrategyKind]) -> Result<Self> {
        let mut deduped: Vec<StrategyKind> = Vec::with_capacity(order.len());
        for kind in order {
            if !deduped.contains(kind) {
                deduped.push(*kind);
            }
        }
        if deduped.is_empty() {
            return Err(Error::InvalidOption(
                "table strategy order must name at least one strategy".to_string(),
            ));
        }
        self.table_strategy_order = deduped;
        Ok(self)
    }

    /// Set the document password.
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set a per-document time limit.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a page's extractors sequentially when `false`.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_detector(mut self, config: DetectorConfig) -> Self {
        self.detector = config;
        self
    }

    pub fn with_text(mut self, config: TextConfig) -> Self {
        self.text = config;
        self
    }

    pub fn with_image(mut self, config: ImageConfig) -> Self {
        self.image = config;
        self
    }

    /// Text only: no tables, no images.
    pub fn text_only(self) -> Self {
        self.with_tables(false).with_images(false)
    }
}
