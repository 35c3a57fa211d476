//! Data model shared by the page sources, extractors, and the workbook
//! assembler.
//!
//! Geometry uses PDF points with a top-left origin throughout.

mod document;
mod geometry;
mod image;
mod page;
mod table;

pub use document::{ConversionResult, Metadata, MetadataKey, PageText, Warning, WarningSection};
pub use geometry::{BBox, LineSegment, Orientation};
pub use self::image::{ExtractedImage, ImageFormat};
pub use page::{ImageFilter, Page, RasterData, RasterImage, TextRun};
pub use table::{Cell, PlacedCell, Row, StrategyKind, Table, TableCandidate};
