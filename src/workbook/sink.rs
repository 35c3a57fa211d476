//! Workbook writers.

use std::path::Path;

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};

use super::plan::{CellStyle, CellValue, PlannedCell, SheetPlan, WorkbookPlan};
use crate::error::{Error, Result};

/// Persists a planned workbook.
pub trait WorkbookSink: Send + Sync {
    /// Write `plan` to `path`, replacing any existing file.
    fn write(&self, plan: &WorkbookPlan, path: &Path) -> Result<()>;
}

/// Writes `.xlsx` files.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxSink;

impl XlsxSink {
    pub fn new() -> Self {
        Self
    }

    /// Render `plan` into an in-memory `.xlsx` file.
    pub fn to_buffer(&self, plan: &WorkbookPlan) -> Result<Vec<u8>> {
        Ok(self.build(plan)?.save_to_buffer()?)
    }

    fn build(&self, plan: &WorkbookPlan) -> Result<Workbook> {
        let styles = Styles::new();
        let mut workbook = Workbook::new();
        for sheet in &plan.sheets {
            let worksheet = workbook.add_worksheet();
            write_sheet(worksheet, sheet, &styles)?;
        }
        Ok(workbook)
    }
}

impl WorkbookSink for XlsxSink {
    fn write(&self, plan: &WorkbookPlan, path: &Path) -> Result<()> {
        let mut workbook = self.build(plan)?;
        workbook
            .save(path)
            .map_err(|e| Error::Output(format!("cannot write {}: {e}", path.display())))?;
        log::debug!("XlsxSink: wrote {}", path.display());
        Ok(())
    }
}

/// Cell formats, one per [`CellStyle`].
struct Styles {
    plain: Format,
    header: Format,
    title: Format,
    table_header: Format,
    wrapped: Format,
}

impl Styles {
    fn new() -> Self {
        let navy = Color::RGB(0x1E3A8A);
        Self {
            plain: Format::new().set_align(FormatAlign::Top),
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(navy),
            title: Format::new()
                .set_bold()
                .set_font_color(Color::RGB(0x475569))
                .set_background_color(Color::RGB(0xF1F5F9)),
            table_header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(navy)
                .set_text_wrap()
                .set_align(FormatAlign::Top),
            wrapped: Format::new().set_text_wrap().set_align(FormatAlign::Top),
        }
    }

    fn get(&self, style: CellStyle) -> &Format {
        match style {
            CellStyle::Plain => &self.plain,
            CellStyle::Header => &self.header,
            CellStyle::TableTitle => &self.title,
            CellStyle::TableHeader => &self.table_header,
            CellStyle::Wrapped => &self.wrapped,
        }
    }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &SheetPlan, styles: &Styles) -> Result<()> {
    worksheet.set_name(&sheet.name)?;
    for cell in &sheet.cells {
        write_cell(worksheet, cell, styles)?;
    }
    for (col, width) in sheet.column_widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, *width)?;
    }
    if sheet.freeze_header {
        worksheet.set_freeze_panes(1, 0)?;
    }
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, cell: &PlannedCell, styles: &Styles) -> Result<()> {
    let format = styles.get(cell.style);
    if let Some((last_row, last_col)) = cell.merge_to {
        let text = match &cell.value {
            CellValue::Text(s) => s.as_str(),
            CellValue::Number(_) => "",
        };
        worksheet.merge_range(cell.row, cell.col, last_row, last_col, text, format)?;
        if let CellValue::Number(n) = cell.value {
            worksheet.write_number_with_format(cell.row, cell.col, n, format)?;
        }
        return Ok(());
    }

    match &cell.value {
        CellValue::Text(s) => {
            worksheet.write_string_with_format(cell.row, cell.col, s, format)?;
        }
        CellValue::Number(n) => {
            worksheet.write_number_with_format(cell.row, cell.col, *n, format)?;
        }
    }
    Ok(())
}
