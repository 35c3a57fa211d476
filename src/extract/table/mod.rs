//! Table detection.
//!
//! Each [`DetectionStrategy`] turns one page's geometry into scored
//! [`TableCandidate`]s. The [`TableDetector`] runs strategies in order per
//! page: the first whose best candidate reaches the acceptance threshold
//! wins; otherwise the strategy with the best mean confidence is kept.
//! Candidates under the confidence floor are discarded.

mod ruled;
mod whitespace;

pub use ruled::RuledLineStrategy;
pub use whitespace::WhitespaceStrategy;

use crate::model::{Page, StrategyKind, TableCandidate};

/// Tolerances and thresholds for table detection.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Runs whose vertical centers differ by at most this many points share
    /// a row (whitespace strategy)
    pub row_merge_tolerance: f32,
    /// Run start positions within this many points share a column
    pub column_alignment_tolerance: f32,
    /// Ruling lines within this many points are treated as one
    pub snap_tolerance: f32,
    /// Slack when testing whether two ruling lines cross
    pub intersection_tolerance: f32,
    /// A strategy whose best candidate reaches this confidence wins the page
    pub accept_threshold: f32,
    /// Candidates below this confidence are discarded
    pub min_confidence: f32,
    pub min_rows: usize,
    pub min_columns: usize,
    /// Above this, whitespace columns are likely word splits
    pub max_columns: usize,
    /// Minimum fraction of non-empty cells
    pub min_fill_ratio: f32,
    /// A vertical gap above this multiple of the median run height ends a
    /// whitespace table region
    pub max_row_gap_factor: f32,
    /// Runs in a row closer than this multiple of the median run height are
    /// one phrase, not separate columns
    pub word_gap_factor: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            row_merge_tolerance: 3.0,
            column_alignment_tolerance: 5.0,
            snap_tolerance: 3.0,
            intersection_tolerance: 3.0,
            accept_threshold: 0.75,
            min_confidence: 0.5,
            min_rows: 2,
            min_columns: 2,
            max_columns: 20,
            min_fill_ratio: 0.3,
            max_row_gap_factor: 2.5,
            word_gap_factor: 0.5,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_merge_tolerance(mut self, points: f32) -> Self {
        self.row_merge_tolerance = points;
        self
    }

    pub fn with_column_alignment_tolerance(mut self, points: f32) -> Self {
        self.column_alignment_tolerance = points;
        self
    }

    pub fn with_snap_tolerance(mut self, points: f32) -> Self {
        self.snap_tolerance = points;
        self
    }

    pub fn with_accept_threshold(mut self, threshold: f32) -> Self {
        self.accept_threshold = threshold;
        self
    }

    pub fn with_min_confidence(mut self, floor: f32) -> Self {
        self.min_confidence = floor;
        self
    }

    pub fn with_min_fill_ratio(mut self, ratio: f32) -> Self {
        self.min_fill_ratio = ratio;
        self
    }

    pub fn with_max_columns(mut self, columns: usize) -> Self {
        self.max_columns = columns;
        self
    }

    /// Weighted confidence: 0.3 for a grid of at least the minimum size,
    /// 0.4 for the fill ratio, 0.3 for the fraction of grid intersections
    /// present. Without intersection evidence the first two terms are
    /// rescaled to [0, 1].
    pub fn score(&self, rows: usize, columns: usize, fill: f32, intersections: Option<f32>) -> f32 {
        let structure = if rows >= self.min_rows && columns >= self.min_columns {
            1.0
        } else {
            0.0
        };
        let score = match intersections {
            Some(found) => 0.3 * structure + 0.4 * fill + 0.3 * found,
            None => (0.3 * structure + 0.4 * fill) / 0.7,
        };
        score.clamp(0.0, 1.0)
    }
}

/// One table detection algorithm.
pub trait DetectionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Candidates on `page`, ordered top to bottom then left to right.
    fn detect(&self, page: &Page, config: &DetectorConfig) -> Vec<TableCandidate>;
}

fn strategy_for(kind: StrategyKind) -> Box<dyn DetectionStrategy> {
    match kind {
        StrategyKind::RuledLine => Box::new(RuledLineStrategy),
        StrategyKind::Whitespace => Box::new(WhitespaceStrategy),
    }
}

/// Runs detection strategies as an ordered fallback chain.
pub struct TableDetector {
    config: DetectorConfig,
    strategies: Vec<Box<dyn DetectionStrategy>>,
}

impl TableDetector {
    /// A detector using the default chain (ruled lines, then whitespace).
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_order(config, &StrategyKind::DEFAULT_ORDER)
    }

    /// A detector trying `order` in sequence.
    pub fn with_order(config: DetectorConfig, order: &[StrategyKind]) -> Self {
        Self::with_strategies(config, order.iter().map(|k| strategy_for(*k)).collect())
    }

    /// A detector over custom strategies.
    pub fn with_strategies(
        config: DetectorConfig,
        strategies: Vec<Box<dyn DetectionStrategy>>,
    ) -> Self {
        Self { config, strategies }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Strategy order.
    pub fn order(&self) -> Vec<StrategyKind> {
        self.strategies.iter().map(|s| s.kind()).collect()
    }

    /// Detect tables on one page.
    pub fn detect(&self, page: &Page) -> Vec<TableCandidate> {
        let floor = self.config.min_confidence;
        let mut fallback: Option<(f32, Vec<TableCandidate>)> = None;

        for strategy in &self.strategies {
            let mut candidates = strategy.detect(page, &self.config);
            let found = candidates.len();
            candidates.retain(|c| c.confidence >= floor);
            log::debug!(
                "TableDetector: page {} {}: {} candidates, {} above floor {:.2}",
                page.number,
                strategy.kind(),
                found,
                candidates.len(),
                floor
            );
            if candidates.is_empty() {
                continue;
            }

            let best = candidates
                .iter()
                .map(|c| c.confidence)
                .fold(0.0f32, f32::max);
            if best >= self.config.accept_threshold {
                log::debug!(
                    "TableDetector: page {} accepted {} (best {:.2})",
                    page.number,
                    strategy.kind(),
                    best
                );
                return candidates;
            }

            let mean = candidates.iter().map(|c| c.confidence).sum::<f32>() / candidates.len() as f32;
            if fallback.as_ref().map_or(true, |(m, _)| mean > *m) {
                fallback = Some((mean, candidates));
            }
        }

        match fallback {
            Some((mean, candidates)) => {
                log::debug!(
                    "TableDetector: page {} no strategy reached {:.2}, keeping {} (mean {:.2})",
                    page.number,
                    self.config.accept_threshold,
                    candidates[0].strategy,
                    mean
                );
                candidates
            }
            None => Vec::new(),
        }
    }
}

impl Default for TableDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl std::fmt::Debug for TableDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableDetector")
            .field("config", &self.config)
            .field("order", &self.order())
            .finish()
    }
}

/// Sort candidates top to bottom, then left to right.
pub(crate) fn sort_candidates(candidates: &mut [TableCandidate]) {
    candidates.sort_by(|a, b| {
        a.bbox
            .y0
            .total_cmp(&b.bbox.y0)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });
}

/// Group sorted values into clusters whose members lie within `tolerance`
/// of the cluster's first value.
pub(crate) fn cluster(values: &[f32], tolerance: f32) -> Vec<Vec<f32>> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for v in sorted {
        match clusters.last_mut() {
            Some(c) if v - c[0] <= tolerance => c.push(v),
            _ => clusters.push(vec![v]),
        }
    }
    clusters
}

fn mean(values: &[f32]) -> f32 {
    values.iter().sum::<f32>() / values.len().max(1) as f32
}
