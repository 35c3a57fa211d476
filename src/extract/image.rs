//! Embedded image collection.
//!
//! JPEG and PNG payloads are validated by decoding them and kept as-is. Raw
//! pixel samples are re-encoded to PNG. Anything that cannot be decoded is
//! reported as a warning and left out.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat as CodecFormat, RgbImage};

use crate::model::{ExtractedImage, ImageFilter, ImageFormat, Page, RasterImage, Warning};

/// Image extraction configuration.
#[derive(Debug, Clone, Default)]
pub struct ImageConfig {
    /// Images narrower or shorter than this many pixels are skipped
    /// silently (0 keeps everything)
    pub min_dimension: u32,
}

impl ImageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_dimension(mut self, pixels: u32) -> Self {
        self.min_dimension = pixels;
        self
    }
}

/// Collects a page's images in encounter order.
#[derive(Debug, Clone, Default)]
pub struct ImageExtractor {
    config: ImageConfig,
}

impl ImageExtractor {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    /// Extract every decodable image on `page`.
    ///
    /// Ordinals follow encounter order and are assigned before decoding, so
    /// an unreadable image leaves a gap rather than renumbering its
    /// neighbours.
    pub fn extract(&self, page: &Page) -> (Vec<ExtractedImage>, Vec<Warning>) {
        let mut images = Vec::new();
        let mut warnings = Vec::new();

        for (index, raster) in page.images.iter().enumerate() {
            let ordinal = index as u32 + 1;
            match decode(raster) {
                Ok((data, format, width, height)) => {
                    if width.min(height) < self.config.min_dimension {
                        log::debug!(
                            "ImageExtractor: page {} image {} below {}px, skipped",
                            page.number,
                            ordinal,
                            self.config.min_dimension
                        );
                        continue;
                    }
                    images.push(ExtractedImage {
                        page: page.number,
                        ordinal,
                        data,
                        width,
                        height,
                        format,
                        color_space: raster.color_space.clone(),
                        bbox: raster.bbox,
                    });
                }
                Err(reason) => {
                    log::debug!(
                        "ImageExtractor: page {} image {}: {}",
                        page.number,
                        ordinal,
                        reason
                    );
                    warnings.push(Warning::image(
                        page.number,
                        format!("image {ordinal}: {reason}"),
                    ));
                }
            }
        }

        (images, warnings)
    }
}

/// Decode one raster into file bytes, format, and pixel size.
fn decode(raster: &RasterImage) -> Result<(Vec<u8>, ImageFormat, u32, u32), String> {
    let payload = raster
        .payload()
        .map_err(|e| format!("cannot read payload: {e}"))?;
    if payload.is_empty() {
        return Err("empty payload".to_string());
    }

    match &raster.filter {
        ImageFilter::Jpeg => validate(&payload, CodecFormat::Jpeg, ImageFormat::Jpeg),
        ImageFilter::Png => validate(&payload, CodecFormat::Png, ImageFormat::Png),
        ImageFilter::Jpeg2000 => match ImageFormat::detect(&payload) {
            Some(ImageFormat::Jpeg2000) => Ok((
                payload.into_owned(),
                ImageFormat::Jpeg2000,
                raster.width,
                raster.height,
            )),
            _ => Err("invalid JPEG 2000 data".to_string()),
        },
        ImageFilter::Raw => {
            let png = encode_raw(raster, &payload)?;
            Ok((png, ImageFormat::Png, raster.width, raster.height))
        }
        ImageFilter::Other(name) => match ImageFormat::detect(&payload) {
            Some(format) => Ok((payload.into_owned(), format, raster.width, raster.height)),
            None => Err(format!("unsupported encoding {name}")),
        },
    }
}

fn validate(
    data: &[u8],
    codec: CodecFormat,
    format: ImageFormat,
) -> Result<(Vec<u8>, ImageFormat, u32, u32), String> {
    let decoded = image::load_from_memory_with_format(data, codec)
        .map_err(|e| format!("invalid {format} data: {e}"))?;
    Ok((data.to_vec(), format, decoded.width(), decoded.height()))
}

/// Re-encode raw samples as PNG.
fn encode_raw(raster: &RasterImage, data: &[u8]) -> Result<Vec<u8>, String> {
    let (width, height) = (raster.width, raster.height);
    if width == 0 || height == 0 {
        return Err("image has no pixels".to_string());
    }
    let components = raster.components.ok_or_else(|| match &raster.color_space {
        Some(cs) => format!("unsupported colour space {cs}"),
        None => "unknown colour space".to_string(),
    })?;
    let bits = raster.bits_per_component.unwrap_or(8);

    let pixels = width as usize * height as usize;
    let samples = |n: usize| -> Result<&[u8], String> {
        data.get(..n)
            .ok_or_else(|| format!("pixel data truncated ({} of {} bytes)", data.len(), n))
    };
    let truncated = || "pixel data does not match dimensions".to_string();

    let image = match (components, bits) {
        (1, 8) => DynamicImage::ImageLuma8(
            GrayImage::from_raw(width, height, samples(pixels)?.to_vec()).ok_or_else(truncated)?,
        ),
        (1, 1) => {
            let stride = (width as usize).div_ceil(8);
            let packed = samples(stride * height as usize)?;
            let mut gray = Vec::with_capacity(pixels);
            for row in packed.chunks(stride) {
                for x in 0..width as usize {
                    let bit = (row[x / 8] >> (7 - x % 8)) & 1;
                    gray.push(if bit == 1 { 255 } else { 0 });
                }
            }
            DynamicImage::ImageLuma8(
                GrayImage::from_raw(width, height, gray).ok_or_else(truncated)?,
            )
        }
        (3, 8) => DynamicImage::ImageRgb8(
            RgbImage::from_raw(width, height, samples(pixels * 3)?.to_vec())
                .ok_or_else(truncated)?,
        ),
        (4, 8) => {
            let rgb: Vec<u8> = samples(pixels * 4)?
                .chunks_exact(4)
                .flat_map(|p| {
                    let k = 255 - p[3] as u16;
                    [
                        ((255 - p[0] as u16) * k / 255) as u8,
                        ((255 - p[1] as u16) * k / 255) as u8,
                        ((255 - p[2] as u16) * k / 255) as u8,
                    ]
                })
                .collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, rgb).ok_or_else(truncated)?)
        }
        (c, b) => {
            return Err(format!(
                "unsupported sample layout ({c} components, {b} bits)"
            ))
        }
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, CodecFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;
    Ok(out.into_inner())
}
