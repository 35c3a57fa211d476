//! Integration tests for the conversion pipeline over synthesized documents.

mod common;

use std::path::Path;

use common::{aligned_page, gray_image, ruled_grid, ruled_grid_page, text_page, PdfBuilder};
use pdfsheet::convert::{ConversionPipeline, ConvertOptions};
use pdfsheet::extract::{DetectionStrategy, DetectorConfig, RuledLineStrategy, TableDetector, WhitespaceStrategy};
use pdfsheet::model::{ImageFilter, MetadataKey, Page, RasterImage, StrategyKind, WarningSection};
use pdfsheet::source::{DocumentInfo, MemoryDocument, MemorySource, PageRange};
use pdfsheet::workbook::plan::{plan, METADATA_SHEET, TEXT_SHEET};
use pdfsheet::ErrorKind;

fn pipeline(doc: MemoryDocument) -> ConversionPipeline<MemorySource> {
    ConversionPipeline::with_source(MemorySource::new().with_document("doc.pdf", doc))
}

fn convert(doc: MemoryDocument, options: &ConvertOptions) -> pdfsheet::Result<pdfsheet::ConversionResult> {
    pipeline(doc).convert(Path::new("doc.pdf"), options)
}

#[test]
fn test_detection_is_deterministic() {
    let pages = [
        ruled_grid_page(3, 4),
        aligned_page(&[72.0, 200.0, 330.0], &[&["Item", "Qty", "Price"], &["Apple", "3", "1.50"], &["Pear", "12", "0.75"]]),
        text_page("plain prose"),
    ];
    let detector = TableDetector::new(DetectorConfig::default());
    for page in &pages {
        assert_eq!(detector.detect(page), detector.detect(page));
    }
}

#[test]
fn test_ruled_grid_three_by_four() {
    let page = ruled_grid_page(3, 4);
    let candidates = RuledLineStrategy.detect(&page, &DetectorConfig::default());
    assert_eq!(candidates.len(), 1);

    let table = &candidates[0];
    assert_eq!(table.strategy, StrategyKind::RuledLine);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.column_count, 4);
    for (r, row) in table.rows.iter().enumerate() {
        assert_eq!(row.cells.len(), 4);
        for (c, cell) in row.cells.iter().enumerate() {
            assert_eq!(cell.text, format!("r{r}c{c}"));
        }
    }
}

#[test]
fn test_whitespace_columns_match_aligned_starts() {
    let page = aligned_page(
        &[72.0, 200.0, 330.0, 420.0],
        &[
            &["Region", "Units", "Revenue", "Margin"],
            &["North", "120", "4,500", "12%"],
            &["South", "98", "3,900", "10%"],
            &["West", "143", "5,210", "15%"],
        ],
    );
    let candidates = WhitespaceStrategy.detect(&page, &DetectorConfig::default());
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].column_count, 4);
    assert_eq!(candidates[0].rows.len(), 4);
    assert_eq!(candidates[0].rows[2].cells[0].text, "South");
}

#[test]
fn test_whitespace_is_fallback_for_unruled_pages() {
    let page = aligned_page(
        &[72.0, 200.0, 330.0],
        &[&["Item", "Qty", "Price"], &["Apple", "3", "1.50"], &["Pear", "12", "0.75"]],
    );
    let tables = TableDetector::new(DetectorConfig::default()).detect(&page);
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].strategy, StrategyKind::Whitespace);

    let ruled_only = TableDetector::with_order(DetectorConfig::default(), &[StrategyKind::RuledLine]);
    assert!(ruled_only.detect(&page).is_empty());
}

#[test]
fn test_unreadable_image_only_changes_images() {
    let bad = RasterImage::new(8, 8, ImageFilter::Jpeg, b"not a jpeg".to_vec());
    let info = DocumentInfo {
        title: Some("Inventory".into()),
        author: Some("Ops".into()),
        ..Default::default()
    };
    let with_bad = MemoryDocument::new(vec![
        text_page("first"),
        text_page("second").with_images(vec![gray_image(), bad]),
    ])
    .with_info(info.clone());
    let without = MemoryDocument::new(vec![
        text_page("first"),
        text_page("second").with_images(vec![gray_image()]),
    ])
    .with_info(info);

    let a = convert(with_bad, &ConvertOptions::default()).unwrap();
    let b = convert(without, &ConvertOptions::default()).unwrap();

    let (plan_a, plan_b) = (plan(&a, 50.0), plan(&b, 50.0));
    assert_eq!(plan_a.sheet(TEXT_SHEET), plan_b.sheet(TEXT_SHEET));
    assert_eq!(plan_a.sheet(METADATA_SHEET), plan_b.sheet(METADATA_SHEET));

    assert_eq!(a.images.len(), 1);
    assert_eq!(b.images.len(), 1);
    let image_warnings: Vec<_> = a.warnings_for(WarningSection::Image).collect();
    assert_eq!(image_warnings.len(), 1);
    assert_eq!(image_warnings[0].page, Some(2));
    assert!(b.warnings.is_empty());
}

#[test]
fn test_password_protected_without_credential() {
    let doc = MemoryDocument::new(vec![ruled_grid_page(2, 2)]).with_password("s3cret");
    let source = MemorySource::new().with_document("doc.pdf", doc);
    let pipeline = ConversionPipeline::with_source(source);

    let err = pipeline
        .convert(Path::new("doc.pdf"), &ConvertOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    let err = pipeline
        .convert(Path::new("doc.pdf"), &ConvertOptions::new().with_credential("wrong"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    let result = pipeline
        .convert(Path::new("doc.pdf"), &ConvertOptions::new().with_credential("s3cret"))
        .unwrap();
    assert_eq!(result.tables.len(), 1);
}

#[test]
fn test_encrypted_pdf_with_and_without_credential() {
    let dir = tempfile::tempdir().unwrap();
    let path = PdfBuilder::new()
        .title("Locked")
        .user_password("s3cret")
        .page(ruled_grid(72.0, 700.0, 80.0, 20.0, &[&["Item", "Qty"], &["Bolts", "40"]]))
        .write(dir.path(), "locked.pdf");
    let pipeline = ConversionPipeline::new();

    let err = pipeline.convert(&path, &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    let err = pipeline
        .convert(&path, &ConvertOptions::new().with_credential("wrong"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);

    let result = pipeline
        .convert(&path, &ConvertOptions::new().with_credential("s3cret"))
        .unwrap();
    assert_eq!(result.page_count, 1);
    assert_eq!(result.metadata.get(MetadataKey::Title), Some("Locked"));
    assert_eq!(result.metadata.get(MetadataKey::Encrypted), Some("Yes"));
    assert_eq!(result.tables.len(), 1);
    let rows = result.tables[0].expanded_rows();
    assert_eq!(rows[1], vec![Some("Bolts"), Some("40")]);
}

#[test]
fn test_page_range_on_ten_pages() {
    let pages: Vec<Page> = (1..=10)
        .map(|n| {
            if n % 2 == 0 {
                ruled_grid_page(2, 3).with_images(vec![gray_image()])
            } else {
                text_page(&format!("page {n}")).with_images(vec![gray_image()])
            }
        })
        .collect();
    let options = ConvertOptions::new().with_page_range(PageRange::span(2, 3));
    let result = convert(MemoryDocument::new(pages), &options).unwrap();

    assert_eq!(result.page_count, 10);
    assert_eq!(result.page_numbers(), vec![2, 3]);
    assert!(result.tables.iter().all(|t| (2..=3).contains(&t.page)));
    assert!(result.images.iter().all(|i| (2..=3).contains(&i.page)));
    assert_eq!(result.tables.len(), 1);
    assert_eq!(result.images.len(), 2);
}

#[test]
fn test_toggles_skip_sections() {
    let doc = || MemoryDocument::new(vec![ruled_grid_page(2, 2).with_images(vec![gray_image()])]);

    let result = convert(doc(), &ConvertOptions::new().with_tables(false)).unwrap();
    assert!(result.tables.is_empty());
    assert_eq!(result.images.len(), 1);

    let result = convert(doc(), &ConvertOptions::new().with_images(false)).unwrap();
    assert_eq!(result.tables.len(), 1);
    assert!(result.images.is_empty());

    let result = convert(doc(), &ConvertOptions::new().text_only()).unwrap();
    assert!(result.tables.is_empty() && result.images.is_empty());
    assert!(result.pages[0].text.contains("r0c0"));
}

#[test]
fn test_image_ordinals_per_page() {
    let doc = MemoryDocument::new(vec![
        text_page("a").with_images(vec![gray_image(), gray_image()]),
        text_page("b").with_images(vec![gray_image()]),
    ]);
    let result = convert(doc, &ConvertOptions::default()).unwrap();
    let ids: Vec<(u32, u32)> = result.images.iter().map(|i| (i.page, i.ordinal)).collect();
    assert_eq!(ids, vec![(1, 1), (1, 2), (2, 1)]);
    assert_eq!(result.images[2].file_name("doc"), "doc_2_1.png");
}

#[test]
fn test_corrupt_document_is_fatal() {
    let doc = MemoryDocument::new(vec![text_page("a")]).corrupt();
    let err = convert(doc, &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptInput);
}

#[test]
fn test_strategy_order_override() {
    let page = ruled_grid_page(3, 3);
    let options = ConvertOptions::new()
        .with_strategy_order(&[StrategyKind::Whitespace, StrategyKind::RuledLine])
        .unwrap();
    let result = convert(MemoryDocument::new(vec![page]), &options).unwrap();
    assert_eq!(result.tables.len(), 1);
}
