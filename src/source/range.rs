//! Page range selection.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Which pages to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRange {
    /// Every page
    #[default]
    All,
    /// An inclusive, 1-indexed page interval
    Span { start: u32, end: u32 },
}

impl PageRange {
    pub fn span(start: u32, end: u32) -> Self {
        PageRange::Span { start, end }
    }

    /// Check if a page number is selected (before clamping).
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageRange::All => page >= 1,
            PageRange::Span { start, end } => page >= *start && page <= *end,
        }
    }

    /// Clamp to a document of `page_count` pages.
    ///
    /// Out-of-range bounds are pulled in rather than rejected; `None` means
    /// no page of the document falls inside the range.
    pub fn clamp(&self, page_count: u32) -> Option<RangeInclusive<u32>> {
        if page_count == 0 {
            return None;
        }
        let (start, end) = match *self {
            PageRange::All => (1, page_count),
            PageRange::Span { start, end } => (start.max(1), end.min(page_count)),
        };
        (start <= end).then_some(start..=end)
    }

    /// Parse a range string: `"all"`, `"5"`, `"2-7"`, or `"3-"` (to the end).
    pub fn parse(s: &str) -> Result<Self, Error> {
        let s = s.trim();

        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        let invalid = || Error::InvalidPageRange(s.to_string());

        if let Some((start, end)) = s.split_once('-') {
            let start: u32 = start.trim().parse().map_err(|_| invalid())?;
            let end: u32 = match end.trim() {
                "" => u32::MAX,
                end => end.parse().map_err(|_| invalid())?,
            };
            if start == 0 || start > end {
                return Err(invalid());
            }
            return Ok(PageRange::Span { start, end });
        }

        let page: u32 = s.parse().map_err(|_| invalid())?;
        if page == 0 {
            return Err(invalid());
        }
        Ok(PageRange::Span {
            start: page,
            end: page,
        })
    }
}

impl FromStr for PageRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PageRange::parse(s)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => f.write_str("all"),
            PageRange::Span { start, end } if *end == u32::MAX => write!(f, "{start}-"),
            PageRange::Span { start, end } => write!(f, "{start}-{end}"),
        }
    }
}
