//! Table types: detection candidates and validated output tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::BBox;
use crate::error::Error;

/// Which detection strategy produced a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Grid reconstructed from vector ruling lines
    RuledLine,
    /// Columns inferred from aligned text start positions
    Whitespace,
}

impl StrategyKind {
    /// The default fallback chain.
    pub const DEFAULT_ORDER: [StrategyKind; 2] = [StrategyKind::RuledLine, StrategyKind::Whitespace];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::RuledLine => "ruled_line",
            StrategyKind::Whitespace => "whitespace",
        }
    }

    /// Parse a comma-separated strategy order such as `"whitespace,ruled_line"`.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn parse_order(s: &str) -> Result<Vec<StrategyKind>, Error> {
        let mut order = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind: StrategyKind = part.parse()?;
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        if order.is_empty() {
            return Err(Error::InvalidOption(format!(
                "empty table strategy order: {s:?}"
            )));
        }
        Ok(order)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ruled_line" | "ruled" | "lattice" => Ok(StrategyKind::RuledLine),
            "whitespace" | "stream" => Ok(StrategyKind::Whitespace),
            other => Err(Error::InvalidOption(format!(
                "unknown table strategy: {other}"
            ))),
        }
    }
}

/// A table cell, possibly spanning several grid slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Cell text; lines are separated by `\n`
    pub text: String,
    /// Number of grid rows covered (>= 1)
    pub row_span: u32,
    /// Number of grid columns covered (>= 1)
    pub col_span: u32,
    /// Cell area on the page
    pub bbox: BBox,
}

impl Cell {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            row_span: 1,
            col_span: 1,
            bbox,
        }
    }

    pub fn with_span(mut self, row_span: u32, col_span: u32) -> Self {
        self.row_span = row_span.max(1);
        self.col_span = col_span.max(1);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One table row: the cells whose top-left slot lies in this row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }
}

/// An unconfirmed reconstruction produced by one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableCandidate {
    /// Page number (1-indexed)
    pub page: u32,
    /// Area covered by the table
    pub bbox: BBox,
    /// Rows in top-to-bottom order
    pub rows: Vec<Row>,
    /// Logical column count once spans are expanded
    pub column_count: usize,
    /// Strategy that produced this candidate
    pub strategy: StrategyKind,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl TableCandidate {
    /// Fraction of cells with non-empty text.
    pub fn fill_ratio(&self) -> f32 {
        let total: usize = self.rows.iter().map(|r| r.cells.len()).sum();
        if total == 0 {
            return 0.0;
        }
        let filled = self
            .rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .filter(|c| !c.is_empty())
            .count();
        filled as f32 / total as f32
    }
}

/// A cell placed on the expanded grid.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCell<'a> {
    pub row: usize,
    pub col: usize,
    pub cell: &'a Cell,
}

/// A validated table: spans tile a rectangular grid exactly and no two
/// cells overlap on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Document-wide table number (1-indexed, page order)
    pub ordinal: usize,
    /// Page number (1-indexed)
    pub page: u32,
    pub bbox: BBox,
    pub rows: Vec<Row>,
    pub column_count: usize,
    pub strategy: StrategyKind,
    pub confidence: f32,
}

impl Table {
    /// Promote a candidate, checking the grid invariants.
    pub fn from_candidate(candidate: TableCandidate, ordinal: usize) -> Result<Self, String> {
        layout(&candidate.rows, candidate.column_count)?;
        check_overlaps(&candidate.rows)?;
        Ok(Self {
            ordinal,
            page: candidate.page,
            bbox: candidate.bbox,
            rows: candidate.rows,
            column_count: candidate.column_count,
            strategy: candidate.strategy,
            confidence: candidate.confidence,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells with their grid positions, in row-major order.
    pub fn placed_cells(&self) -> Vec<PlacedCell<'_>> {
        // Validated at construction
        layout(&self.rows, self.column_count).unwrap_or_default()
    }

    /// The grid with spans expanded: the top-left slot of a spanning cell
    /// carries its text, covered slots are `None`.
    pub fn expanded_rows(&self) -> Vec<Vec<Option<&str>>> {
        let mut grid = vec![vec![None; self.column_count]; self.rows.len()];
        for placed in self.placed_cells() {
            grid[placed.row][placed.col] = Some(placed.cell.text.as_str());
        }
        grid
    }

    /// Check whether any cell spans more than one slot.
    pub fn has_merged_cells(&self) -> bool {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .any(|c| c.row_span > 1 || c.col_span > 1)
    }
}

/// Place cells on an occupancy grid, rejecting gaps, overlaps, and overhangs.
fn layout(rows: &[Row], columns: usize) -> Result<Vec<PlacedCell<'_>>, String> {
    if rows.is_empty() || columns == 0 {
        return Err("table has no rows or columns".to_string());
    }

    let mut occupied = vec![vec![false; columns]; rows.len()];
    let mut placed = Vec::new();

    for (r, row) in rows.iter().enumerate() {
        let mut col = 0;
        for cell in &row.cells {
            while col < columns && occupied[r][col] {
                col += 1;
            }
            let rs = cell.row_span.max(1) as usize;
            let cs = cell.col_span.max(1) as usize;
            if col + cs > columns {
                return Err(format!("row {} overflows {} columns", r + 1, columns));
            }
            if r + rs > rows.len() {
                return Err(format!("cell in row {} spans past the last row", r + 1));
            }
            for slot_row in occupied.iter_mut().skip(r).take(rs) {
                for slot in slot_row.iter_mut().skip(col).take(cs) {
                    if *slot {
                        return Err(format!("overlapping spans in row {}", r + 1));
                    }
                    *slot = true;
                }
            }
            placed.push(PlacedCell { row: r, col, cell });
            col += cs;
        }
    }

    if let Some(r) = occupied.iter().position(|row| row.iter().any(|s| !s)) {
        return Err(format!(
            "row {} does not cover all {} columns",
            r + 1,
            columns
        ));
    }

    Ok(placed)
}

fn check_overlaps(rows: &[Row]) -> Result<(), String> {
    let cells: Vec<&Cell> = rows.iter().flat_map(|r| r.cells.iter()).collect();
    for (i, a) in cells.iter().enumerate() {
        for b in &cells[i + 1..] {
            // Tolerate sub-point slivers from snapped coordinates
            if a.bbox.overlap_area(&b.bbox) > 0.5 {
                return Err("cell bounding boxes overlap".to_string());
            }
        }
    }
    Ok(())
}
