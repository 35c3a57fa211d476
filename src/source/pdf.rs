//! PDF page source backed by `lopdf`.

use std::fs;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use super::content::Interpreter;
use super::scratch::ScratchArea;
use super::{DocumentHandle, DocumentInfo, PageSource};
use crate::detect;
use crate::error::{Error, Result};
use crate::model::{ImageFilter, Page, RasterData, RasterImage};

/// Maximum `Parent` hops when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;
/// Maximum chained indirect references followed when resolving an object.
const MAX_REFERENCE_DEPTH: usize = 16;

/// Options for [`LopdfSource`].
#[derive(Debug, Clone)]
pub struct SourceOptions {
    /// Raster payloads at least this large are moved to scratch storage
    pub stage_threshold: usize,
    /// Byte budget for one document's scratch area
    pub scratch_limit: u64,
    /// Parent directory for scratch areas (system temp dir when `None`)
    pub scratch_root: Option<PathBuf>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            stage_threshold: 4 * 1024 * 1024,
            scratch_limit: 512 * 1024 * 1024,
            scratch_root: None,
        }
    }
}

impl SourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage_threshold(mut self, bytes: usize) -> Self {
        self.stage_threshold = bytes;
        self
    }

    pub fn with_scratch_limit(mut self, bytes: u64) -> Self {
        self.scratch_limit = bytes;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }
}

/// Opens PDF files from disk.
#[derive(Debug, Clone, Default)]
pub struct LopdfSource {
    options: SourceOptions,
}

impl LopdfSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: SourceOptions) -> Self {
        Self { options }
    }
}

impl PageSource for LopdfSource {
    fn open(&self, path: &Path, credential: Option<&str>) -> Result<Box<dyn DocumentHandle>> {
        let header = detect::validate_input(path)?;
        let data = fs::read(path)?;
        log::debug!(
            "LopdfSource: {} (PDF {}, {} bytes)",
            path.display(),
            header.version,
            data.len()
        );

        // Loading tries the empty user password before the credential
        let doc = match credential {
            Some(password) => Document::load_mem_with_password(&data, password)?,
            None => Document::load_mem(&data)?,
        };
        if doc.is_encrypted() {
            return Err(match credential {
                Some(_) => Error::InvalidPassword,
                None => Error::PasswordRequired,
            });
        }

        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        if page_ids.is_empty() {
            return Err(Error::Corrupted("page tree is empty".to_string()));
        }

        let mut info = read_info(&doc);
        info.page_count = page_ids.len() as u32;
        info.encrypted = doc.was_encrypted();
        info.file_name = path.file_name().map(|n| n.to_string_lossy().to_string());
        info.file_size = Some(data.len() as u64);

        Ok(Box::new(LopdfHandle {
            doc,
            page_ids,
            info,
            stage_threshold: self.options.stage_threshold,
            scratch: ScratchArea::new(
                self.options.scratch_root.clone(),
                self.options.scratch_limit,
            ),
        }))
    }
}

struct LopdfHandle {
    doc: Document,
    page_ids: Vec<ObjectId>,
    info: DocumentInfo,
    stage_threshold: usize,
    scratch: ScratchArea,
}

impl DocumentHandle for LopdfHandle {
    fn page_count(&self) -> u32 {
        self.page_ids.len() as u32
    }

    fn info(&self) -> DocumentInfo {
        self.info.clone()
    }

    fn load_page(&self, number: u32) -> Result<Page> {
        let page_id = number
            .checked_sub(1)
            .and_then(|i| self.page_ids.get(i as usize))
            .copied()
            .ok_or_else(|| Error::Corrupted(format!("page {number} does not exist")))?;
        let page_dict = self.doc.get_dictionary(page_id)?;

        let media_box = inherited(&self.doc, page_dict, b"MediaBox")
            .and_then(|o| o.as_array().ok())
            .and_then(|a| rect(a))
            .unwrap_or([0.0, 0.0, 612.0, 792.0]);
        let resources =
            inherited(&self.doc, page_dict, b"Resources").and_then(|o| o.as_dict().ok());

        let content = page_content(&self.doc, page_dict);
        let parsed = Interpreter::new(&self.doc, media_box).run(&content, resources)?;

        let images = parsed
            .images
            .iter()
            .filter_map(|placement| match self.raster(placement.id) {
                Ok(image) => Some(image.with_bbox(placement.bbox)),
                Err(e) => {
                    log::debug!("LopdfHandle: skipping image {:?}: {}", placement.id, e);
                    None
                }
            })
            .collect();

        let width = (media_box[2] - media_box[0]).abs();
        let height = (media_box[3] - media_box[1]).abs();
        Ok(Page::new(number, width, height)
            .with_text_runs(parsed.runs)
            .with_lines(parsed.lines)
            .with_images(images))
    }
}

impl LopdfHandle {
    /// Read an image XObject into a raster.
    fn raster(&self, id: ObjectId) -> Result<RasterImage> {
        let stream = self.doc.get_object(id)?.as_stream()?;
        let dict = &stream.dict;

        let width = dict.get(b"Width").and_then(|w| w.as_i64()).unwrap_or(0).max(0) as u32;
        let height = dict.get(b"Height").and_then(|h| h.as_i64()).unwrap_or(0).max(0) as u32;
        let image_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
        let bits = if image_mask {
            Some(1)
        } else {
            dict.get(b"BitsPerComponent")
                .and_then(|b| b.as_i64())
                .ok()
                .map(|b| b as u8)
        };

        // The last filter in a chain determines the image encoding
        let filter = match dict.get(b"Filter") {
            Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).to_string()),
            Ok(Object::Array(arr)) => arr
                .last()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).to_string()),
            _ => None,
        };

        let (filter, data) = match filter.as_deref() {
            Some("DCTDecode") => (ImageFilter::Jpeg, stream.content.clone()),
            Some("JPXDecode") => (ImageFilter::Jpeg2000, stream.content.clone()),
            None
            | Some("FlateDecode")
            | Some("LZWDecode")
            | Some("ASCIIHexDecode")
            | Some("ASCII85Decode")
            | Some("RunLengthDecode") => {
                let decoded = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                (ImageFilter::Raw, decoded)
            }
            Some(other) => (ImageFilter::Other(other.to_string()), stream.content.clone()),
        };

        let (color_space, components) = if image_mask {
            (Some("DeviceGray".to_string()), Some(1))
        } else {
            color_space(&self.doc, dict)
        };

        Ok(RasterImage {
            bbox: None,
            width,
            height,
            filter,
            color_space,
            components,
            bits_per_component: bits,
            data: self.stage(data),
        })
    }

    fn stage(&self, data: Vec<u8>) -> RasterData {
        if data.len() < self.stage_threshold {
            return RasterData::Inline(data);
        }
        match self.scratch.stage(&data) {
            Ok(Some(path)) => RasterData::Staged {
                path,
                len: data.len() as u64,
            },
            Ok(None) => RasterData::Inline(data),
            Err(e) => {
                log::debug!("LopdfHandle: staging failed, keeping in memory: {}", e);
                RasterData::Inline(data)
            }
        }
    }
}

/// Color space name and component count of an image dictionary.
fn color_space(doc: &Document, dict: &Dictionary) -> (Option<String>, Option<u8>) {
    let Some(cs) = dict.get(b"ColorSpace").ok().and_then(|o| resolve(doc, o)) else {
        return (None, None);
    };
    let (name, param) = match cs {
        Object::Name(n) => (String::from_utf8_lossy(n).to_string(), None),
        Object::Array(arr) => match arr.first().and_then(|o| o.as_name().ok()) {
            Some(n) => (String::from_utf8_lossy(n).to_string(), arr.get(1)),
            None => return (None, None),
        },
        _ => return (None, None),
    };
    let components = match name.as_str() {
        "DeviceGray" | "CalGray" | "G" => Some(1),
        "DeviceRGB" | "CalRGB" | "RGB" | "Lab" => Some(3),
        "DeviceCMYK" | "CMYK" => Some(4),
        "ICCBased" => param
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_stream().ok())
            .and_then(|s| s.dict.get(b"N").and_then(|n| n.as_i64()).ok())
            .map(|n| n as u8),
        _ => None,
    };
    (Some(name), components)
}

/// Follow indirect references to the underlying object.
pub(crate) fn resolve<'a>(doc: &'a Document, mut obj: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match obj {
            Object::Reference(id) => obj = doc.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

/// Resolve to a dictionary (a stream's dictionary counts).
pub(crate) fn resolve_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree for inherited values.
fn inherited<'a>(doc: &'a Document, mut dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return resolve(doc, value);
        }
        dict = dict.get(b"Parent").ok().and_then(|p| resolve_dict(doc, p))?;
    }
    None
}

fn rect(array: &[Object]) -> Option<[f32; 4]> {
    if array.len() < 4 {
        return None;
    }
    Some([
        array[0].as_float().ok()?,
        array[1].as_float().ok()?,
        array[2].as_float().ok()?,
        array[3].as_float().ok()?,
    ])
}

/// Concatenated, decompressed content streams of a page.
fn page_content(doc: &Document, page_dict: &Dictionary) -> Vec<u8> {
    let decode = |obj: &Object| -> Option<Vec<u8>> {
        let stream = resolve(doc, obj)?.as_stream().ok()?;
        Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        )
    };

    let mut content = Vec::new();
    match page_dict.get(b"Contents").ok().and_then(|o| resolve(doc, o)) {
        Some(Object::Array(parts)) => {
            for part in parts {
                if let Some(data) = decode(part) {
                    content.extend_from_slice(&data);
                    content.push(b' ');
                }
            }
        }
        Some(obj) => {
            if let Some(data) = decode(obj) {
                content = data;
            }
        }
        None => {}
    }
    content
}

/// Read the trailer's document information dictionary.
fn read_info(doc: &Document) -> DocumentInfo {
    let Some(info) = doc
        .trailer
        .get(b"Info")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    else {
        return DocumentInfo::default();
    };
    DocumentInfo {
        title: get_string_from_dict(info, b"Title"),
        author: get_string_from_dict(info, b"Author"),
        subject: get_string_from_dict(info, b"Subject"),
        creator: get_string_from_dict(info, b"Creator"),
        producer: get_string_from_dict(info, b"Producer"),
        creation_date: get_string_from_dict(info, b"CreationDate"),
        mod_date: get_string_from_dict(info, b"ModDate"),
        ..DocumentInfo::default()
    }
}

/// Helper to get a string from a PDF dictionary.
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_text_simple(bytes)),
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Simple text decoding fallback when no encoding is available.
pub(crate) fn decode_text_simple(bytes: &[u8]) -> String {
    // Try UTF-16BE first (BOM marker)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    // Try UTF-8
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Fallback: Latin-1
    bytes.iter().map(|&b| b as char).collect()
}
