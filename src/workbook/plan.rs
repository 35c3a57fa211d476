//! Sheet planning.
//!
//! Turns a [`ConversionResult`] into a sheet-by-sheet list of cell writes,
//! merges, and column widths. Planning is a pure function of its inputs, so
//! the same result always produces the same workbook.

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{ConversionResult, Table};

/// Excel's per-cell character limit.
pub const MAX_CELL_CHARS: usize = 32_767;

pub const TEXT_SHEET: &str = "Text";
pub const TABLES_SHEET: &str = "Tables";
pub const METADATA_SHEET: &str = "Metadata";
pub const IMAGES_SHEET: &str = "Images_Info";

/// Value written to one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Display length used for column sizing.
    fn width(&self) -> usize {
        match self {
            CellValue::Text(s) => s.lines().map(|l| l.chars().count()).max().unwrap_or(0),
            CellValue::Number(n) => n.to_string().len(),
        }
    }
}

/// How a cell is formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    /// Sheet column headings
    Header,
    /// The `Table N (Page P)` line above each table
    TableTitle,
    /// First grid row of a table
    TableHeader,
    /// Long text that should wrap
    Wrapped,
}

/// One planned write.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub style: CellStyle,
    /// Bottom-right corner when the cell is merged over a range
    pub merge_to: Option<(u32, u16)>,
}

/// Everything written to one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetPlan {
    pub name: String,
    pub cells: Vec<PlannedCell>,
    /// Width per column, in characters
    pub column_widths: Vec<f64>,
    /// Freeze the first row
    pub freeze_header: bool,
}

impl SheetPlan {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: Vec::new(),
            column_widths: Vec::new(),
            freeze_header: false,
        }
    }

    fn put(&mut self, row: u32, col: u16, value: CellValue, style: CellStyle) {
        self.cells.push(PlannedCell {
            row,
            col,
            value,
            style,
            merge_to: None,
        });
    }

    fn text(&mut self, row: u32, col: u16, text: &str, style: CellStyle) {
        self.put(row, col, CellValue::Text(truncate(text)), style);
    }

    fn header(&mut self, headings: &[&str]) {
        for (col, heading) in headings.iter().enumerate() {
            self.text(0, col as u16, heading, CellStyle::Header);
        }
        self.freeze_header = true;
    }

    /// Size every column to its longest content, clamped to `max`.
    ///
    /// Table titles are left out: they are merged across the table and
    /// would otherwise widen the first column.
    fn fit_columns(&mut self, max: f64) {
        let columns = self.cells.iter().map(|c| c.col as usize + 1).max().unwrap_or(0);
        let mut longest = vec![0usize; columns];
        for cell in &self.cells {
            if cell.style == CellStyle::TableTitle {
                continue;
            }
            let slot = &mut longest[cell.col as usize];
            *slot = (*slot).max(cell.value.width());
        }
        self.column_widths = longest
            .into_iter()
            .map(|len| (len as f64 + 2.0).min(max))
            .collect();
    }
}

/// The full workbook layout, sheets in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookPlan {
    pub sheets: Vec<SheetPlan>,
}

impl WorkbookPlan {
    pub fn sheet(&self, name: &str) -> Option<&SheetPlan> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Lay out the four sheets for `result`.
pub fn plan(result: &ConversionResult, max_column_width: f64) -> WorkbookPlan {
    plan_with_image_prefix(result, &result.document_name, max_column_width)
}

/// Like [`plan`], with image files named `{image_prefix}_{page}_{ordinal}`.
pub fn plan_with_image_prefix(
    result: &ConversionResult,
    image_prefix: &str,
    max_column_width: f64,
) -> WorkbookPlan {
    let mut sheets = vec![
        text_sheet(result),
        tables_sheet(result),
        metadata_sheet(result),
        images_sheet(result, image_prefix),
    ];
    for sheet in &mut sheets {
        sheet.fit_columns(max_column_width);
    }
    WorkbookPlan { sheets }
}

fn text_sheet(result: &ConversionResult) -> SheetPlan {
    let mut sheet = SheetPlan::new(TEXT_SHEET);
    sheet.header(&[
        "Page",
        "Text",
        "Characters",
        "Words",
        "Primary Font",
        "Font Size",
    ]);

    for (i, page) in result.pages.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.put(row, 0, CellValue::Number(page.page as f64), CellStyle::Plain);
        sheet.text(row, 1, &page.text, CellStyle::Wrapped);
        sheet.put(row, 2, CellValue::Number(page.char_count as f64), CellStyle::Plain);
        sheet.put(row, 3, CellValue::Number(page.word_count as f64), CellStyle::Plain);
        if let Some(font) = &page.primary_font {
            sheet.text(row, 4, font, CellStyle::Plain);
        }
        if let Some(size) = page.primary_font_size {
            sheet.put(row, 5, CellValue::Number(size as f64), CellStyle::Plain);
        }
    }
    sheet
}

fn tables_sheet(result: &ConversionResult) -> SheetPlan {
    let mut sheet = SheetPlan::new(TABLES_SHEET);
    if result.tables.is_empty() {
        sheet.text(0, 0, "No tables detected", CellStyle::Plain);
        return sheet;
    }

    let mut row = 0u32;
    for table in &result.tables {
        row = write_table(&mut sheet, table, row);
        // Blank separator
        row += 1;
    }
    sheet
}

/// Write one table block starting at `start`; returns the next free row.
fn write_table(sheet: &mut SheetPlan, table: &Table, start: u32) -> u32 {
    let width = table.column_count.max(1) as u16;
    sheet.cells.push(PlannedCell {
        row: start,
        col: 0,
        value: CellValue::Text(table_title(table)),
        style: CellStyle::TableTitle,
        merge_to: (width > 1).then(|| (start, width - 1)),
    });

    let first = start + 1;
    for placed in table.placed_cells() {
        let row = first + placed.row as u32;
        let col = placed.col as u16;
        let style = if placed.row == 0 {
            CellStyle::TableHeader
        } else if placed.cell.text.contains('\n') {
            CellStyle::Wrapped
        } else {
            CellStyle::Plain
        };
        let rs = placed.cell.row_span.max(1);
        let cs = placed.cell.col_span.max(1) as u16;
        sheet.cells.push(PlannedCell {
            row,
            col,
            value: cell_value(&placed.cell.text),
            style,
            merge_to: (rs > 1 || cs > 1).then(|| (row + rs - 1, col + cs - 1)),
        });
    }
    first + table.row_count() as u32
}

/// `Table N (Page P): strategy, confidence C`
pub fn table_title(table: &Table) -> String {
    format!(
        "Table {} (Page {}): {}, confidence {:.2}",
        table.ordinal, table.page, table.strategy, table.confidence
    )
}

fn metadata_sheet(result: &ConversionResult) -> SheetPlan {
    let mut sheet = SheetPlan::new(METADATA_SHEET);
    sheet.header(&["Property", "Value"]);
    for (i, (key, value)) in result.metadata.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.text(row, 0, key.label(), CellStyle::Plain);
        sheet.text(row, 1, value, CellStyle::Plain);
    }
    sheet
}

fn images_sheet(result: &ConversionResult, image_prefix: &str) -> SheetPlan {
    let mut sheet = SheetPlan::new(IMAGES_SHEET);
    sheet.header(&[
        "Page",
        "Ordinal",
        "Width",
        "Height",
        "Format",
        "Color Space",
        "File",
    ]);
    for (i, image) in result.images.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.put(row, 0, CellValue::Number(image.page as f64), CellStyle::Plain);
        sheet.put(row, 1, CellValue::Number(image.ordinal as f64), CellStyle::Plain);
        sheet.put(row, 2, CellValue::Number(image.width as f64), CellStyle::Plain);
        sheet.put(row, 3, CellValue::Number(image.height as f64), CellStyle::Plain);
        sheet.text(row, 4, image.format.extension(), CellStyle::Plain);
        if let Some(cs) = &image.color_space {
            sheet.text(row, 5, cs, CellStyle::Plain);
        }
        sheet.text(row, 6, &image.file_name(image_prefix), CellStyle::Plain);
    }
    sheet
}

fn numeric_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // No leading zeros, no trailing fractional zeros
    PATTERN.get_or_init(|| {
        Regex::new(r"^-?(0|[1-9]\d*)(\.\d*[1-9])?$").expect("numeric pattern is valid")
    })
}

/// Digits a spreadsheet keeps exactly.
const MAX_SIGNIFICANT_DIGITS: usize = 15;

/// Table cell text as a number when the number displays back as the same
/// digits (thousands separators allowed), otherwise as text.
///
/// `007`, `1.50` and 20-digit identifiers stay text.
pub fn cell_value(text: &str) -> CellValue {
    let trimmed = text.trim();
    let plain = trimmed.replace(',', "");
    if numeric_pattern().is_match(&plain)
        && valid_grouping(trimmed)
        && significant_digits(&plain) <= MAX_SIGNIFICANT_DIGITS
    {
        if let Ok(n) = plain.parse::<f64>() {
            // "-0" would lose its sign
            if !(n == 0.0 && plain.starts_with('-')) {
                return CellValue::Number(n);
            }
        }
    }
    CellValue::Text(truncate(text))
}

fn significant_digits(plain: &str) -> usize {
    plain
        .chars()
        .filter(char::is_ascii_digit)
        .skip_while(|&c| c == '0')
        .count()
}

/// Commas, if any, must separate groups of three digits in the integer part.
fn valid_grouping(text: &str) -> bool {
    if !text.contains(',') {
        return true;
    }
    let int_part = text.trim_start_matches('-').split('.').next().unwrap_or("");
    let groups: Vec<&str> = int_part.split(',').collect();
    !groups[0].is_empty() && groups[0].len() <= 3 && groups[1..].iter().all(|g| g.len() == 3)
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
