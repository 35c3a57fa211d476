//! Document metadata.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};

use crate::model::{Metadata, MetadataKey, Warning};
use crate::source::DocumentInfo;

/// Reads document-level attributes once per document.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataReader;

impl MetadataReader {
    pub fn new() -> Self {
        Self
    }

    /// Interpret raw document information.
    ///
    /// Missing or blank attributes are omitted. A malformed date yields a
    /// warning and is left out.
    pub fn read(&self, info: &DocumentInfo) -> (Metadata, Vec<Warning>) {
        let mut metadata = Metadata::new();
        let mut warnings = Vec::new();

        metadata.insert_opt(MetadataKey::Title, info.title.clone());
        metadata.insert_opt(MetadataKey::Author, info.author.clone());
        metadata.insert_opt(MetadataKey::Subject, info.subject.clone());
        metadata.insert_opt(MetadataKey::Creator, info.creator.clone());
        metadata.insert_opt(MetadataKey::Producer, info.producer.clone());

        for (key, raw) in [
            (MetadataKey::Created, &info.creation_date),
            (MetadataKey::Modified, &info.mod_date),
        ] {
            let Some(raw) = raw.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            match parse_pdf_date(raw) {
                Some(date) => metadata.insert(key, date.to_rfc3339()),
                None => {
                    log::debug!("MetadataReader: malformed {} date {:?}", key.as_str(), raw);
                    warnings.push(Warning::metadata(format!(
                        "malformed {} date {:?}",
                        key.as_str(),
                        raw
                    )));
                }
            }
        }

        metadata.insert(MetadataKey::PageCount, info.page_count.to_string());
        metadata.insert(
            MetadataKey::Encrypted,
            if info.encrypted { "Yes" } else { "No" },
        );
        metadata.insert_opt(MetadataKey::FileName, info.file_name.clone());
        metadata.insert_opt(MetadataKey::FileSize, info.file_size.map(|s| s.to_string()));

        (metadata, warnings)
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`).
///
/// Trailing fields may be omitted; fields that are present must be valid.
/// A missing time zone is read as UTC.
pub fn parse_pdf_date(s: &str) -> Option<DateTime<FixedOffset>> {
    let s = s.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);

    let digits_end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, zone) = s.split_at(digits_end);
    if digits.len() < 4 || digits.len() > 14 || digits.len() % 2 != 0 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match digits.get(range) {
            Some(v) => v.parse().ok(),
            None => Some(default),
        }
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;

    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;
    let offset = parse_zone(zone)?;
    offset.from_local_datetime(&naive).single()
}

/// Parse the `Z`, `+HH'mm'`, or `-HH'mm'` suffix.
fn parse_zone(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    let sign = match zone.chars().next() {
        None | Some('Z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };

    let rest: Vec<&str> = zone[1..].split('\'').filter(|p| !p.is_empty()).collect();
    let hours: i32 = match rest.first() {
        Some(h) if h.len() == 2 => h.parse().ok()?,
        _ => return None,
    };
    let minutes: i32 = match rest.get(1) {
        Some(m) if m.len() == 2 => m.parse().ok()?,
        Some(_) => return None,
        None => 0,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_pdf_date() {
        let date = parse_pdf_date("D:20240115103045").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 15);
        assert_eq!(date.hour(), 10);
        assert_eq!(date.to_rfc3339(), "2024-01-15T10:30:45+00:00");
    }

    #[test]
    fn test_parse_pdf_date_minimal() {
        let date = parse_pdf_date("D:2024").unwrap();
        assert_eq!(date.year(), 2024);
        assert_eq!(date.month(), 1);
        assert_eq!(date.day(), 1);
    }

    #[test]
    fn test_parse_pdf_date_with_zone() {
        let date = parse_pdf_date("D:20240131120000+09'00'").unwrap();
        assert_eq!(date.to_rfc3339(), "2024-01-31T12:00:00+09:00");
        let date = parse_pdf_date("D:20240131120000-05'30").unwrap();
        assert_eq!(date.offset().local_minus_utc(), -(5 * 3600 + 30 * 60));
        assert!(parse_pdf_date("D:20240131120000Z").is_some());
    }

    #[test]
    fn test_parse_pdf_date_malformed() {
        assert!(parse_pdf_date("yesterday").is_none());
        assert!(parse_pdf_date("D:20241340").is_none());
        assert!(parse_pdf_date("D:202").is_none());
        assert!(parse_pdf_date("D:20240101+99'00'").is_none());
    }

    #[test]
    fn test_read_omits_missing_and_warns_on_bad_dates() {
        let info = DocumentInfo {
            title: Some("Annual Report".to_string()),
            author: Some("   ".to_string()),
            creation_date: Some("D:20230301".to_string()),
            mod_date: Some("not a date".to_string()),
            page_count: 12,
            file_name: Some("annual.pdf".to_string()),
            file_size: Some(2048),
            ..DocumentInfo::default()
        };
        let (metadata, warnings) = MetadataReader::new().read(&info);

        assert_eq!(metadata.get(MetadataKey::Title), Some("Annual Report"));
        assert!(!metadata.contains(MetadataKey::Author));
        assert!(!metadata.contains(MetadataKey::Subject));
        assert_eq!(
            metadata.get(MetadataKey::Created),
            Some("2023-03-01T00:00:00+00:00")
        );
        assert!(!metadata.contains(MetadataKey::Modified));
        assert_eq!(metadata.get(MetadataKey::PageCount), Some("12"));
        assert_eq!(metadata.get(MetadataKey::Encrypted), Some("No"));
        assert_eq!(metadata.get(MetadataKey::FileSize), Some("2048"));

        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("modified"));
    }
}
