//! Page-level primitives produced by a page source.

use std::borrow::Cow;
use std::io;
use std::path::PathBuf;

use super::{BBox, LineSegment};

/// A single decoded page: positioned text, ruling lines, and raster images.
///
/// Pages are immutable once produced by a [`crate::source::DocumentHandle`].
#[derive(Debug, Clone)]
pub struct Page {
    /// Page number (1-indexed)
    pub number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Text runs in content-stream order
    pub text_runs: Vec<TextRun>,

    /// Vector line segments (table rules, borders)
    pub lines: Vec<LineSegment>,

    /// Raster images in encounter order
    pub images: Vec<RasterImage>,
}

impl Page {
    /// Create an empty page with the given dimensions.
    pub fn new(number: u32, width: f32, height: f32) -> Self {
        Self {
            number,
            width,
            height,
            text_runs: Vec::new(),
            lines: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Create an empty US Letter page.
    pub fn letter(number: u32) -> Self {
        Self::new(number, 612.0, 792.0)
    }

    pub fn with_text_runs(mut self, runs: Vec<TextRun>) -> Self {
        self.text_runs = runs;
        self
    }

    pub fn with_lines(mut self, lines: Vec<LineSegment>) -> Self {
        self.lines = lines;
        self
    }

    pub fn with_images(mut self, images: Vec<RasterImage>) -> Self {
        self.images = images;
        self
    }

    /// Check if the page has no content at all.
    pub fn is_empty(&self) -> bool {
        self.text_runs.is_empty() && self.lines.is_empty() && self.images.is_empty()
    }
}

/// A run of text sharing one font, with its bounding box on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    /// The text content
    pub text: String,
    /// Bounding box (top-left origin)
    pub bbox: BBox,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: Option<String>,
    /// Font size in points
    pub font_size: Option<f32>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            font_name: None,
            font_size: None,
        }
    }

    pub fn with_font(mut self, name: impl Into<String>, size: f32) -> Self {
        self.font_name = Some(name.into());
        self.font_size = Some(size);
        self
    }
}

/// How an embedded image's bytes are encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageFilter {
    /// A complete JPEG file (DCTDecode)
    Jpeg,
    /// A complete JPEG 2000 codestream (JPXDecode)
    Jpeg2000,
    /// A complete PNG file
    Png,
    /// Uncompressed pixel samples, row-major, no padding beyond byte rows
    Raw,
    /// An encoding this crate does not decode (CCITTFax, JBIG2, ...)
    Other(String),
}

/// Image bytes, held in memory or staged in the document's scratch area.
#[derive(Debug, Clone)]
pub enum RasterData {
    Inline(Vec<u8>),
    Staged { path: PathBuf, len: u64 },
}

impl RasterData {
    /// Byte length of the payload.
    pub fn len(&self) -> u64 {
        match self {
            RasterData::Inline(data) => data.len() as u64,
            RasterData::Staged { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An embedded raster image as it appears on a page.
#[derive(Debug, Clone)]
pub struct RasterImage {
    /// Placement on the page, when known
    pub bbox: Option<BBox>,
    /// Declared pixel width
    pub width: u32,
    /// Declared pixel height
    pub height: u32,
    /// Payload encoding
    pub filter: ImageFilter,
    /// Color space name (e.g., "DeviceRGB")
    pub color_space: Option<String>,
    /// Color components per pixel, for raw samples
    pub components: Option<u8>,
    /// Bits per color component, for raw samples
    pub bits_per_component: Option<u8>,
    /// The payload itself
    pub data: RasterData,
}

impl RasterImage {
    /// An in-memory image with the given encoding.
    pub fn new(width: u32, height: u32, filter: ImageFilter, data: Vec<u8>) -> Self {
        Self {
            bbox: None,
            width,
            height,
            filter,
            color_space: None,
            components: None,
            bits_per_component: None,
            data: RasterData::Inline(data),
        }
    }

    /// Raw 8-bit samples with `components` channels.
    pub fn raw(width: u32, height: u32, components: u8, data: Vec<u8>) -> Self {
        let color_space = match components {
            1 => "DeviceGray",
            4 => "DeviceCMYK",
            _ => "DeviceRGB",
        };
        Self {
            color_space: Some(color_space.to_string()),
            components: Some(components),
            bits_per_component: Some(8),
            ..Self::new(width, height, ImageFilter::Raw, data)
        }
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Read the payload, loading it from scratch storage if staged.
    pub fn payload(&self) -> io::Result<Cow<'_, [u8]>> {
        match &self.data {
            RasterData::Inline(data) => Ok(Cow::Borrowed(data)),
            RasterData::Staged { path, .. } => std::fs::read(path).map(Cow::Owned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_builders() {
        let page = Page::letter(3)
            .with_text_runs(vec![TextRun::new("x", BBox::new(0.0, 0.0, 5.0, 10.0))]);
        assert_eq!(page.number, 3);
        assert_eq!(page.width, 612.0);
        assert_eq!(page.text_runs.len(), 1);
        assert!(!page.is_empty());
        assert!(Page::letter(1).is_empty());
    }

    #[test]
    fn test_raw_image_color_space() {
        let img = RasterImage::raw(2, 1, 1, vec![0, 255]);
        assert_eq!(img.color_space.as_deref(), Some("DeviceGray"));
        assert_eq!(img.filter, ImageFilter::Raw);
        assert_eq!(img.payload().unwrap().as_ref(), &[0, 255]);
    }

    #[test]
    fn test_staged_payload_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        std::fs::write(&path, b"abc").unwrap();
        let img = RasterImage {
            data: RasterData::Staged {
                path: path.clone(),
                len: 3,
            },
            ..RasterImage::new(1, 1, ImageFilter::Jpeg, Vec::new())
        };
        assert_eq!(img.data.len(), 3);
        assert_eq!(img.payload().unwrap().as_ref(), b"abc");
    }
}
