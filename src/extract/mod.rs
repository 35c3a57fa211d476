//! Per-page extractors: text, tables, images, and document metadata.
//!
//! Extractors are pure functions of a decoded [`Page`](crate::model::Page)
//! and never fail outright. Problems with individual items are returned as
//! warnings alongside whatever could be extracted.

mod image;
mod metadata;
pub mod table;
mod text;

pub use self::image::{ImageConfig, ImageExtractor};
pub use metadata::{parse_pdf_date, MetadataReader};
pub use table::{
    DetectionStrategy, DetectorConfig, RuledLineStrategy, TableDetector, WhitespaceStrategy,
};
pub use text::{TextConfig, TextExtractor};

/// Median of `values`, reordering them in place.
pub(crate) fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
