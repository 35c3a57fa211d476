//! Whitespace-alignment strategy (stream mode).
//!
//! Detects tables without ruling lines by looking for text that starts at
//! the same x positions across consecutive rows.

use super::{cluster, sort_candidates, DetectionStrategy, DetectorConfig};
use crate::extract::text::{cell_text, group_lines, median_height, TextLine};
use crate::model::{BBox, Cell, Page, Row, StrategyKind, TableCandidate, TextRun};

/// Neighbouring runs on one row that read as a single phrase.
#[derive(Debug)]
struct Chunk<'a> {
    runs: Vec<&'a TextRun>,
    bbox: BBox,
}

impl Chunk<'_> {
    fn text(&self) -> String {
        self.runs
            .iter()
            .map(|r| r.text.trim())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug)]
struct RowData<'a> {
    center: f32,
    chunks: Vec<Chunk<'a>>,
}

/// Tables inferred from column alignment of text.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceStrategy;

impl DetectionStrategy for WhitespaceStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Whitespace
    }

    fn detect(&self, page: &Page, config: &DetectorConfig) -> Vec<TableCandidate> {
        let runs: Vec<&TextRun> = page
            .text_runs
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .collect();
        if runs.len() < config.min_rows * config.min_columns {
            log::debug!(
                "WhitespaceStrategy: page {} has only {} runs",
                page.number,
                runs.len()
            );
            return Vec::new();
        }

        let height = median_height(&runs);
        let rows: Vec<RowData> = group_lines(&runs, config.row_merge_tolerance)
            .into_iter()
            .map(|line| to_row(line, height * config.word_gap_factor))
            .collect();
        log::debug!(
            "WhitespaceStrategy: page {} grouped {} runs into {} rows",
            page.number,
            runs.len(),
            rows.len()
        );

        let mut candidates: Vec<TableCandidate> = regions(&rows, height * config.max_row_gap_factor)
            .into_iter()
            .filter(|region| region.len() >= config.min_rows)
            .filter_map(|region| build_table(page, &region, config))
            .collect();
        sort_candidates(&mut candidates);
        candidates
    }
}

/// Split a line into chunks at gaps wider than `word_gap`.
fn to_row(line: TextLine<'_>, word_gap: f32) -> RowData<'_> {
    let mut chunks: Vec<Chunk> = Vec::new();
    for run in line.runs {
        match chunks.last_mut() {
            Some(chunk) if run.bbox.x0 - chunk.bbox.x1 < word_gap => {
                chunk.bbox = chunk.bbox.union(&run.bbox);
                chunk.runs.push(run);
            }
            _ => chunks.push(Chunk {
                runs: vec![run],
                bbox: run.bbox,
            }),
        }
    }
    RowData {
        center: line.center,
        chunks,
    }
}

/// Runs of consecutive multi-chunk rows. A single-chunk row or a vertical
/// gap wider than `max_gap` ends the region.
fn regions<'r, 'a>(rows: &'r [RowData<'a>], max_gap: f32) -> Vec<Vec<&'r RowData<'a>>> {
    let mut regions: Vec<Vec<&RowData>> = Vec::new();
    let mut current: Vec<&RowData> = Vec::new();

    for row in rows {
        let continues = row.chunks.len() >= 2
            && current
                .last()
                .map_or(true, |prev| row.center - prev.center <= max_gap);
        if !continues && !current.is_empty() {
            regions.push(std::mem::take(&mut current));
        }
        if row.chunks.len() >= 2 {
            current.push(row);
        }
    }
    if !current.is_empty() {
        regions.push(current);
    }
    regions
}

/// Start ranges `(lo, hi)` of the x clusters shared by a strict majority
/// of the region's rows, left to right.
fn column_bounds(region: &[&RowData], tolerance: f32) -> Vec<(f32, f32)> {
    let starts: Vec<f32> = region
        .iter()
        .flat_map(|row| row.chunks.iter().map(|c| c.bbox.x0))
        .collect();

    cluster(&starts, tolerance)
        .into_iter()
        .filter_map(|members| {
            let lo = members[0];
            let hi = members[members.len() - 1];
            let rows = region
                .iter()
                .filter(|row| row.chunks.iter().any(|c| c.bbox.x0 >= lo && c.bbox.x0 <= hi))
                .count();
            (rows * 2 > region.len()).then_some((lo, hi))
        })
        .collect()
}

/// The column whose cluster holds `x0`. Starts outside every kept cluster
/// go to the nearest column beginning at or before them.
fn column_of(x0: f32, columns: &[(f32, f32)], tolerance: f32) -> usize {
    columns
        .iter()
        .position(|&(lo, hi)| x0 >= lo && x0 <= hi)
        .or_else(|| columns.iter().rposition(|&(lo, _)| lo <= x0 + tolerance))
        .unwrap_or(0)
}

fn build_table(page: &Page, region: &[&RowData], config: &DetectorConfig) -> Option<TableCandidate> {
    let tol = config.column_alignment_tolerance;
    let columns = column_bounds(region, tol);
    let starts: Vec<f32> = columns.iter().map(|&(lo, _)| lo).collect();
    let cols = starts.len();
    if cols < config.min_columns || cols > config.max_columns {
        log::debug!(
            "WhitespaceStrategy: page {} region of {} rows has {} aligned columns, skipped",
            page.number,
            region.len(),
            cols
        );
        return None;
    }
    if is_list_pattern(region, cols) {
        log::debug!(
            "WhitespaceStrategy: page {} region skipped, detected as list pattern",
            page.number
        );
        return None;
    }

    let chunk_boxes = || region.iter().flat_map(|r| r.chunks.iter().map(|c| c.bbox));
    let right = chunk_boxes().map(|b| b.x1).fold(f32::MIN, f32::max);
    let top = chunk_boxes().map(|b| b.y0).fold(f32::MAX, f32::min);
    let bottom = chunk_boxes().map(|b| b.y1).fold(f32::MIN, f32::max);

    let row_tops: Vec<f32> = region
        .iter()
        .map(|r| r.chunks.iter().map(|c| c.bbox.y0).fold(f32::MAX, f32::min))
        .collect();
    let row_bottoms: Vec<f32> = region
        .iter()
        .map(|r| r.chunks.iter().map(|c| c.bbox.y1).fold(f32::MIN, f32::max))
        .collect();
    let mut y_edges = vec![top];
    for i in 1..region.len() {
        y_edges.push((row_bottoms[i - 1] + row_tops[i]) / 2.0);
    }
    y_edges.push(bottom);
    let mut x_edges = starts.clone();
    x_edges.push(right.max(starts[cols - 1]));

    let rows: Vec<Row> = region
        .iter()
        .enumerate()
        .map(|(r, row)| {
            let mut contents: Vec<Vec<&TextRun>> = vec![Vec::new(); cols];
            for chunk in &row.chunks {
                contents[column_of(chunk.bbox.x0, &columns, tol)].extend(chunk.runs.iter().copied());
            }
            let cells = contents
                .iter()
                .enumerate()
                .map(|(c, runs)| {
                    Cell::new(
                        cell_text(runs),
                        BBox::new(x_edges[c], y_edges[r], x_edges[c + 1], y_edges[r + 1]),
                    )
                })
                .collect();
            Row::new(cells)
        })
        .collect();

    let mut candidate = TableCandidate {
        page: page.number,
        bbox: BBox::new(starts[0], top, x_edges[cols], bottom),
        rows,
        column_count: cols,
        strategy: StrategyKind::Whitespace,
        confidence: 0.0,
    };
    let fill = candidate.fill_ratio();
    if fill < config.min_fill_ratio {
        log::debug!(
            "WhitespaceStrategy: page {} {}x{} region only {:.0}% filled, dropped",
            page.number,
            region.len(),
            cols,
            fill * 100.0
        );
        return None;
    }
    candidate.confidence = config.score(region.len(), cols, fill, None);
    log::debug!(
        "WhitespaceStrategy: page {} {}x{} table at x {:?}, confidence {:.2}",
        page.number,
        region.len(),
        cols,
        starts,
        candidate.confidence
    );
    Some(candidate)
}

/// Check if the region is a numbered or bulleted list.
///
/// The marker and item text of a list are separate runs at different x
/// positions, which looks like a two-column table.
fn is_list_pattern(region: &[&RowData], columns: usize) -> bool {
    let mut bullets = 0;
    let mut numbers = 0;
    for row in region {
        let Some(first) = row.chunks.first() else {
            continue;
        };
        let text = first.text();
        if is_bullet_marker(&text) {
            bullets += 1;
        } else if is_number_marker(&text) {
            numbers += 1;
        }
    }

    let bullet_ratio = bullets as f32 / region.len() as f32;
    let total_ratio = (bullets + numbers) as f32 / region.len() as f32;
    log::debug!(
        "WhitespaceStrategy: list markers: bullets={}, numbers={}, rows={}",
        bullets,
        numbers,
        region.len()
    );

    // Numbered first columns are common in real tables, so numbers only
    // count against two-column layouts
    bullet_ratio >= 0.5 || (columns == 2 && total_ratio >= 0.5)
}

/// Check if text is a bullet marker (•, -, etc.).
fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "▹" | "►" | "■" | "●" | "※" | "□" | "◆" | "◇" | "▶" | "▷" | "☞" | "➤" | "➜"
    )
}

/// Check if text is a number-style list marker (1., 2), a., etc.).
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (prefix, suffix) = cleaned.split_at(pos);
        if !prefix.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let mut chars = cleaned.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(letter), Some('.' | ')'), None) if letter.is_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextRun {
        let width = text.chars().count() as f32 * 6.0;
        TextRun::new(text, BBox::new(x, y, x + width, y + 12.0)).with_font("Helvetica", 12.0)
    }

    fn detect(runs: Vec<TextRun>) -> Vec<TableCandidate> {
        let page = Page::letter(1).with_text_runs(runs);
        WhitespaceStrategy.detect(&page, &DetectorConfig::default())
    }

    #[test]
    fn test_aligned_columns() {
        let mut runs = Vec::new();
        let data = [
            ["Name", "Age", "City"],
            ["Alice", "30", "Seoul"],
            ["Bob", "25", "Busan"],
            ["Carol", "41", "Incheon"],
        ];
        for (r, row) in data.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                runs.push(span(text, 50.0 + c as f32 * 120.0, 100.0 + r as f32 * 18.0));
            }
        }

        let tables = detect(runs);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.column_count, 3);
        assert_eq!(table.rows.len(), 4);
        assert_eq!(table.rows[2].cells[2].text, "Busan");
        assert_eq!(table.strategy, StrategyKind::Whitespace);
        assert!((table.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ragged_values_share_a_column() {
        // Values start within the alignment tolerance of each other
        let runs = vec![
            span("Item", 50.0, 100.0),
            span("Qty", 200.0, 100.0),
            span("Bolt", 51.0, 118.0),
            span("12", 203.0, 118.0),
            span("Nut", 49.5, 136.0),
            span("7", 201.0, 136.0),
        ];
        let tables = detect(runs);
        assert_eq!(tables[0].column_count, 2);
        assert_eq!(tables[0].rows[1].cells[1].text, "12");
    }

    #[test]
    fn test_ragged_start_keeps_its_own_column() {
        // "x" starts 6pt before the second column, inside the first cluster
        let runs = vec![
            span("a", 50.0, 100.0),
            span("b", 64.0, 100.0),
            span("c", 200.0, 100.0),
            span("a", 50.0, 118.0),
            span("b", 64.0, 118.0),
            span("c", 200.0, 118.0),
            span("x", 58.0, 136.0),
            span("c", 200.0, 136.0),
        ];
        let page = Page::letter(1).with_text_runs(runs);
        let config = DetectorConfig::default().with_column_alignment_tolerance(8.0);
        let tables = WhitespaceStrategy.detect(&page, &config);

        assert_eq!(tables[0].column_count, 3);
        assert_eq!(tables[0].rows[2].cells[0].text, "x");
        assert_eq!(tables[0].rows[2].cells[1].text, "");
    }

    #[test]
    fn test_phrase_stays_in_one_cell() {
        let runs = vec![
            span("Full", 50.0, 100.0),
            span("name", 77.0, 100.0),
            span("Age", 200.0, 100.0),
            span("Alice", 50.0, 118.0),
            span("Lee", 83.0, 118.0),
            span("30", 200.0, 118.0),
            span("Bob", 50.0, 136.0),
            span("25", 200.0, 136.0),
        ];
        let tables = detect(runs);
        assert_eq!(tables[0].column_count, 2);
        assert_eq!(tables[0].rows[0].cells[0].text, "Full name");
        assert_eq!(tables[0].rows[1].cells[0].text, "Alice Lee");
    }

    #[test]
    fn test_paragraph_text_is_not_a_table() {
        let runs = vec![
            span("Line one of a paragraph", 50.0, 100.0),
            span("Line two of a paragraph", 50.0, 114.0),
            span("Line three", 50.0, 128.0),
        ];
        assert!(detect(runs).is_empty());
    }

    #[test]
    fn test_single_run_row_splits_regions() {
        let mut runs = Vec::new();
        for r in 0..2 {
            runs.push(span("a", 50.0, 100.0 + r as f32 * 18.0));
            runs.push(span("b", 200.0, 100.0 + r as f32 * 18.0));
        }
        runs.push(span("A heading between tables", 50.0, 136.0));
        for r in 0..3 {
            runs.push(span("c", 50.0, 154.0 + r as f32 * 18.0));
            runs.push(span("d", 200.0, 154.0 + r as f32 * 18.0));
        }
        let tables = detect(runs);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[1].rows.len(), 3);
    }

    #[test]
    fn test_numbered_list_rejected() {
        let runs = vec![
            span("1.", 50.0, 100.0),
            span("Configure devices", 80.0, 100.0),
            span("2.", 50.0, 130.0),
            span("Manage objects", 80.0, 130.0),
            span("3.", 50.0, 160.0),
            span("Routing policy", 80.0, 160.0),
        ];
        assert!(detect(runs).is_empty());
    }

    #[test]
    fn test_bullet_list_rejected() {
        let runs = vec![
            span("-", 50.0, 100.0),
            span("Management", 80.0, 100.0),
            span("-", 50.0, 130.0),
            span("Interface/Service Option", 80.0, 130.0),
            span("-", 50.0, 160.0),
            span("Firmware", 80.0, 160.0),
        ];
        assert!(detect(runs).is_empty());
    }

    #[test]
    fn test_list_markers() {
        assert!(is_number_marker("1."));
        assert!(is_number_marker("12."));
        assert!(is_number_marker("1)"));
        assert!(is_number_marker("1 ."));
        assert!(is_number_marker("3"));
        assert!(is_number_marker("a."));
        assert!(is_number_marker("B)"));
        assert!(is_bullet_marker("•"));
        assert!(is_bullet_marker("–"));

        assert!(!is_number_marker("Name"));
        assert!(!is_bullet_marker("Hello World"));
        assert!(!is_number_marker(""));
    }
}
