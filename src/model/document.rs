//! Document-level types: metadata, per-page text, warnings, and the
//! conversion result that ties them together.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ExtractedImage, Table};

/// Well-known document metadata keys, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKey {
    Title,
    Author,
    Subject,
    Creator,
    Producer,
    Created,
    Modified,
    PageCount,
    Encrypted,
    FileName,
    FileSize,
}

impl MetadataKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKey::Title => "title",
            MetadataKey::Author => "author",
            MetadataKey::Subject => "subject",
            MetadataKey::Creator => "creator",
            MetadataKey::Producer => "producer",
            MetadataKey::Created => "created",
            MetadataKey::Modified => "modified",
            MetadataKey::PageCount => "page_count",
            MetadataKey::Encrypted => "encrypted",
            MetadataKey::FileName => "file_name",
            MetadataKey::FileSize => "file_size",
        }
    }

    /// Human-readable label for the Metadata sheet.
    pub fn label(&self) -> &'static str {
        match self {
            MetadataKey::Title => "Title",
            MetadataKey::Author => "Author",
            MetadataKey::Subject => "Subject",
            MetadataKey::Creator => "Creator",
            MetadataKey::Producer => "Producer",
            MetadataKey::Created => "Created",
            MetadataKey::Modified => "Modified",
            MetadataKey::PageCount => "Page Count",
            MetadataKey::Encrypted => "Encrypted",
            MetadataKey::FileName => "File Name",
            MetadataKey::FileSize => "File Size (bytes)",
        }
    }
}

/// Document metadata. Only present, non-empty values are stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    entries: BTreeMap<MetadataKey, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value; blank values are ignored.
    pub fn insert(&mut self, key: MetadataKey, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.entries.insert(key, trimmed.to_string());
        }
    }

    /// Insert a value if present.
    pub fn insert_opt(&mut self, key: MetadataKey, value: Option<String>) {
        if let Some(v) = value {
            self.insert(key, v);
        }
    }

    pub fn get(&self, key: MetadataKey) -> Option<&str> {
        self.entries.get(&key).map(String::as_str)
    }

    pub fn contains(&self, key: MetadataKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (MetadataKey, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Linearized text of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageText {
    /// Page number (1-indexed)
    pub page: u32,
    /// Paragraph-joined text
    pub text: String,
    /// Number of non-whitespace characters in `text`
    pub char_count: usize,
    /// Number of whitespace-separated words
    pub word_count: usize,
    /// Font covering the most characters
    pub primary_font: Option<String>,
    /// Most common size of the primary font
    pub primary_font_size: Option<f32>,
}

impl PageText {
    /// Text of a page with no runs.
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            text: String::new(),
            char_count: 0,
            word_count: 0,
            primary_font: None,
            primary_font_size: None,
        }
    }
}

/// Which part of a conversion a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningSection {
    Page,
    Text,
    Table,
    Image,
    Metadata,
}

impl fmt::Display for WarningSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WarningSection::Page => "page",
            WarningSection::Text => "text",
            WarningSection::Table => "table",
            WarningSection::Image => "image",
            WarningSection::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// A recovered, non-fatal problem in one section of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub section: WarningSection,
    /// Page the warning relates to, if any
    pub page: Option<u32>,
    pub message: String,
}

impl Warning {
    pub fn new(section: WarningSection, page: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            section,
            page,
            message: message.into(),
        }
    }

    pub fn page(page: u32, message: impl Into<String>) -> Self {
        Self::new(WarningSection::Page, Some(page), message)
    }

    pub fn table(page: u32, message: impl Into<String>) -> Self {
        Self::new(WarningSection::Table, Some(page), message)
    }

    pub fn image(page: u32, message: impl Into<String>) -> Self {
        Self::new(WarningSection::Image, Some(page), message)
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::new(WarningSection::Metadata, None, message)
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "[{} p.{}] {}", self.section, page, self.message),
            None => write!(f, "[{}] {}", self.section, self.message),
        }
    }
}

/// Everything recovered from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Document name used for output naming (file stem)
    pub document_name: String,
    /// Total pages in the document, regardless of the requested range
    pub page_count: u32,
    /// Text per converted page, in page order
    pub pages: Vec<PageText>,
    /// Tables in page order
    pub tables: Vec<Table>,
    /// Images in page, then ordinal, order
    pub images: Vec<ExtractedImage>,
    pub metadata: Metadata,
    pub warnings: Vec<Warning>,
}

impl ConversionResult {
    pub fn new(document_name: impl Into<String>, page_count: u32) -> Self {
        Self {
            document_name: document_name.into(),
            page_count,
            pages: Vec::new(),
            tables: Vec::new(),
            images: Vec::new(),
            metadata: Metadata::new(),
            warnings: Vec::new(),
        }
    }

    /// Page numbers that were converted.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.page).collect()
    }

    /// Warnings from one section.
    pub fn warnings_for(&self, section: WarningSection) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().filter(move |w| w.section == section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_skips_blank_values() {
        let mut meta = Metadata::new();
        meta.insert(MetadataKey::Title, "  Report ");
        meta.insert(MetadataKey::Author, "   ");
        meta.insert_opt(MetadataKey::Subject, None);
        assert_eq!(meta.get(MetadataKey::Title), Some("Report"));
        assert!(!meta.contains(MetadataKey::Author));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn test_metadata_iterates_in_key_order() {
        let mut meta = Metadata::new();
        meta.insert(MetadataKey::PageCount, "3");
        meta.insert(MetadataKey::Title, "T");
        let keys: Vec<_> = meta.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![MetadataKey::Title, MetadataKey::PageCount]);
    }

    #[test]
    fn test_metadata_serializes_as_map() {
        let mut meta = Metadata::new();
        meta.insert(MetadataKey::PageCount, "3");
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"page_count":"3"}"#);
    }

    #[test]
    fn test_warning_display() {
        assert_eq!(
            Warning::image(2, "bad payload").to_string(),
            "[image p.2] bad payload"
        );
        assert_eq!(
            Warning::metadata("bad date").to_string(),
            "[metadata] bad date"
        );
    }
}
