//! Shared fixtures: synthetic pages for the in-memory source and small PDF
//! files built with lopdf.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream};
use pdfsheet::model::{BBox, LineSegment, Page, RasterImage, TextRun};

/// A page with one line of text.
pub fn text_page(label: &str) -> Page {
    Page::letter(1).with_text_runs(vec![TextRun::new(
        label,
        BBox::new(72.0, 72.0, 72.0 + 6.0 * label.len() as f32, 84.0),
    )
    .with_font("Helvetica", 12.0)])
}

/// A ruled grid of `rows` x `cols` cells, 100 x 20 points each, with the
/// text `r{row}c{col}` in every cell.
pub fn ruled_grid_page(rows: usize, cols: usize) -> Page {
    let (left, top, w, h) = (50.0, 100.0, 100.0, 20.0);
    let right = left + w * cols as f32;
    let bottom = top + h * rows as f32;

    let mut lines = Vec::new();
    for r in 0..=rows {
        let y = top + h * r as f32;
        lines.push(LineSegment::new(left, y, right, y));
    }
    for c in 0..=cols {
        let x = left + w * c as f32;
        lines.push(LineSegment::new(x, top, x, bottom));
    }

    let mut runs = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let x = left + w * c as f32 + 8.0;
            let y = top + h * r as f32 + 4.0;
            runs.push(
                TextRun::new(format!("r{r}c{c}"), BBox::new(x, y, x + 24.0, y + 12.0))
                    .with_font("Helvetica", 10.0),
            );
        }
    }
    Page::letter(1).with_lines(lines).with_text_runs(runs)
}

/// Rows of whitespace-separated columns starting at fixed x positions.
pub fn aligned_page(column_starts: &[f32], rows: &[&[&str]]) -> Page {
    let mut runs = Vec::new();
    for (r, row) in rows.iter().enumerate() {
        let y = 100.0 + 18.0 * r as f32;
        for (text, x) in row.iter().zip(column_starts) {
            let width = 6.0 * text.len() as f32;
            runs.push(TextRun::new(*text, BBox::new(*x, y, x + width, y + 12.0)).with_font("Helvetica", 10.0));
        }
    }
    Page::letter(1).with_text_runs(runs)
}

/// An 8x8 gray image that decodes cleanly.
pub fn gray_image() -> RasterImage {
    RasterImage::raw(8, 8, 1, vec![0x80; 64]).with_bbox(BBox::new(300.0, 300.0, 340.0, 340.0))
}

/// Builds small single-font PDF files.
#[derive(Default)]
pub struct PdfBuilder {
    pages: Vec<(String, bool)>,
    title: Option<String>,
    creation_date: Option<String>,
    user_password: Option<String>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn creation_date(mut self, date: &str) -> Self {
        self.creation_date = Some(date.to_string());
        self
    }

    /// Encrypt the file (RC4, 128-bit) with the given user password.
    pub fn user_password(mut self, password: &str) -> Self {
        self.user_password = Some(password.to_string());
        self
    }

    /// Add a page with the given content stream.
    pub fn page(mut self, content: impl Into<String>) -> Self {
        self.pages.push((content.into(), false));
        self
    }

    /// Add a page that also paints the shared 16x16 gray image as `/Im1`.
    pub fn page_with_image(mut self, content: impl Into<String>) -> Self {
        self.pages.push((content.into(), true));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 16,
                "Height" => 16,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x40; 256],
        ));

        let mut kids: Vec<Object> = Vec::new();
        for (content, with_image) in &self.pages {
            let mut resources = dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            };
            if *with_image {
                resources.set("XObject", dictionary! { "Im1" => image_id });
            }
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.clone().into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {};
        if let Some(ref title) = self.title {
            info.set("Title", Object::string_literal(title.as_str()));
        }
        if let Some(ref date) = self.creation_date {
            info.set("CreationDate", Object::string_literal(date.as_str()));
        }
        if !info.is_empty() {
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", info_id);
        }

        if let Some(ref password) = self.user_password {
            doc.trailer.set(
                "ID",
                vec![
                    Object::string_literal("pdfsheet-fixture1"),
                    Object::string_literal("pdfsheet-fixture2"),
                ],
            );
            let state = EncryptionState::try_from(EncryptionVersion::V2 {
                document: &doc,
                owner_password: "owner",
                user_password: password,
                key_length: 128,
                permissions: Permissions::all(),
            })
            .unwrap();
            doc.encrypt(&state).unwrap();
        }

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Content stream showing `text` with its baseline at (`x`, `y`) in PDF
/// user space.
pub fn show_text(x: f32, y: f32, text: &str) -> String {
    format!("BT /F1 10 Tf {x} {y} Td ({text}) Tj ET\n")
}

/// Content stream for a ruled grid with its top-left corner at (`left`,
/// `top`) in PDF user space; `cells[r][c]` is written inside each cell.
pub fn ruled_grid(left: f32, top: f32, col_width: f32, row_height: f32, cells: &[&[&str]]) -> String {
    let rows = cells.len();
    let cols = cells.first().map_or(0, |r| r.len());
    let right = left + col_width * cols as f32;
    let bottom = top - row_height * rows as f32;

    let mut content = String::from("0.5 w\n");
    for r in 0..=rows {
        let y = top - row_height * r as f32;
        content.push_str(&format!("{left} {y} m {right} {y} l S\n"));
    }
    for c in 0..=cols {
        let x = left + col_width * c as f32;
        content.push_str(&format!("{x} {top} m {x} {bottom} l S\n"));
    }
    for (r, row) in cells.iter().enumerate() {
        let baseline = top - row_height * (r + 1) as f32 + 6.0;
        for (c, text) in row.iter().enumerate() {
            content.push_str(&show_text(left + col_width * c as f32 + 5.0, baseline, text));
        }
    }
    content
}

/// Content stream placing `/Im1` at (`x`, `y`) with the given size.
pub fn paint_image(x: f32, y: f32, width: f32, height: f32) -> String {
    format!("q {width} 0 0 {height} {x} {y} cm /Im1 Do Q\n")
}
