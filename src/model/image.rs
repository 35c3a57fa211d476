//! Extracted image types.

use serde::{Deserialize, Serialize};

use super::BBox;

/// Image file format, detected from the payload's magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Tiff,
    Bmp,
    Webp,
    Jpeg2000,
}

impl ImageFormat {
    /// Detect the format from the leading bytes of a payload.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.len() < 8 {
            return None;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }

        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }

        // TIFF: II*\0 or MM\0*
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
        {
            return Some(ImageFormat::Tiff);
        }

        if data.starts_with(b"BM") {
            return Some(ImageFormat::Bmp);
        }

        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::Webp);
        }

        // JPEG 2000: JP2 signature box, or a bare codestream (FF 4F FF 51)
        if data.starts_with(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20])
            || data.starts_with(&[0xFF, 0x4F, 0xFF, 0x51])
        {
            return Some(ImageFormat::Jpeg2000);
        }

        None
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Webp => "webp",
            ImageFormat::Jpeg2000 => "jp2",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Jpeg2000 => "image/jp2",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// An image recovered from a page, ready to be written out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Position among the page's images, in encounter order (1-indexed)
    pub ordinal: u32,
    /// Encoded image file bytes
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
    pub format: ImageFormat,
    /// Source color space, if declared
    pub color_space: Option<String>,
    /// Placement on the page, if known
    pub bbox: Option<BBox>,
}

impl ExtractedImage {
    /// Deterministic file name: `{prefix}_{page}_{ordinal}.{ext}`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!(
            "{}_{}_{}.{}",
            prefix,
            self.page,
            self.ordinal,
            self.format.extension()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::detect(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
            Some(ImageFormat::Png)
        );
        assert_eq!(ImageFormat::detect(b"GIF89a\0\0"), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::detect(&[0xFF, 0x4F, 0xFF, 0x51, 0, 0, 0, 0]),
            Some(ImageFormat::Jpeg2000)
        );
        assert_eq!(ImageFormat::detect(b"short"), None);
        assert_eq!(ImageFormat::detect(b"not an image"), None);
    }

    #[test]
    fn test_file_name() {
        let image = ExtractedImage {
            page: 2,
            ordinal: 3,
            data: Vec::new(),
            width: 10,
            height: 10,
            format: ImageFormat::Png,
            color_space: None,
            bbox: None,
        };
        assert_eq!(image.file_name("report"), "report_2_3.png");
    }
}
