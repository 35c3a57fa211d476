//! Reading-order text linearization.

use std::collections::BTreeMap;

use unicode_normalization::UnicodeNormalization;

use super::median;
use crate::model::{Page, PageText, TextRun};

/// Text extraction configuration.
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Runs whose vertical centers differ by at most this fraction of the
    /// median run height share a line
    pub line_tolerance_factor: f32,
    /// A baseline gap above this multiple of the median line height starts
    /// a new paragraph
    pub paragraph_gap_factor: f32,
    /// Apply Unicode NFC normalization
    pub normalize: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            line_tolerance_factor: 0.5,
            paragraph_gap_factor: 1.5,
            normalize: true,
        }
    }
}

impl TextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line_tolerance_factor(mut self, factor: f32) -> Self {
        self.line_tolerance_factor = factor;
        self
    }

    pub fn with_paragraph_gap_factor(mut self, factor: f32) -> Self {
        self.paragraph_gap_factor = factor;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

/// A line of runs sorted left to right.
#[derive(Debug)]
pub(crate) struct TextLine<'a> {
    pub runs: Vec<&'a TextRun>,
    /// Mean vertical center
    pub center: f32,
    /// Lowest run bottom, used as the baseline proxy
    pub bottom: f32,
}

impl TextLine<'_> {
    /// Combined text with spaces inserted at visible gaps.
    ///
    /// For CJK characters, no space is inserted between adjacent characters.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, run) in self.runs.iter().enumerate() {
            if i == 0 {
                result.push_str(&run.text);
                continue;
            }
            let prev = self.runs[i - 1];
            let gap = run.bbox.x0 - prev.bbox.x1;

            let char_count = run.text.chars().count();
            let avg_char_width = if char_count > 0 && run.bbox.width() > 0.0 {
                run.bbox.width() / char_count as f32
            } else {
                run.bbox.height() * 0.5
            };

            let should_insert_space = gap > avg_char_width * 0.2 && {
                let prev_is_cjk = prev
                    .text
                    .chars()
                    .last()
                    .map(is_spaceless_script_char)
                    .unwrap_or(false);
                let curr_is_cjk = run
                    .text
                    .chars()
                    .next()
                    .map(is_spaceless_script_char)
                    .unwrap_or(false);
                !(prev_is_cjk && curr_is_cjk)
            };

            let prev_ends_with_space = result.ends_with(' ') || result.ends_with('\u{00A0}');
            let curr_starts_with_space =
                run.text.starts_with(' ') || run.text.starts_with('\u{00A0}');

            if should_insert_space && !prev_ends_with_space && !curr_starts_with_space {
                result.push(' ');
            }
            result.push_str(&run.text);
        }

        result.trim().to_string()
    }
}

/// Group runs into lines, top to bottom.
///
/// A run joins the current line when its vertical center is within
/// `tolerance` of the line's mean center.
pub(crate) fn group_lines<'a>(runs: &[&'a TextRun], tolerance: f32) -> Vec<TextLine<'a>> {
    let mut sorted: Vec<&TextRun> = runs.to_vec();
    sorted.sort_by(|a, b| {
        a.bbox
            .center()
            .1
            .total_cmp(&b.bbox.center().1)
            .then(a.bbox.x0.total_cmp(&b.bbox.x0))
    });

    let mut lines: Vec<TextLine> = Vec::new();
    for run in sorted {
        let cy = run.bbox.center().1;
        match lines.last_mut() {
            Some(line) if (cy - line.center).abs() <= tolerance => {
                let n = line.runs.len() as f32;
                line.center = (line.center * n + cy) / (n + 1.0);
                line.bottom = line.bottom.max(run.bbox.y1);
                line.runs.push(run);
            }
            _ => lines.push(TextLine {
                runs: vec![run],
                center: cy,
                bottom: run.bbox.y1,
            }),
        }
    }

    for line in &mut lines {
        line.runs
            .sort_by(|a, b| a.bbox.x0.total_cmp(&b.bbox.x0).then(a.bbox.y0.total_cmp(&b.bbox.y0)));
    }
    lines
}

/// Median run height, falling back to a 12pt body size.
pub(crate) fn median_height(runs: &[&TextRun]) -> f32 {
    let mut heights: Vec<f32> = runs
        .iter()
        .map(|r| r.bbox.height())
        .filter(|h| *h > 0.0)
        .collect();
    median(&mut heights).unwrap_or(12.0)
}

/// Text of a table cell: lines top to bottom, separated by `\n`.
pub(crate) fn cell_text(runs: &[&TextRun]) -> String {
    if runs.is_empty() {
        return String::new();
    }
    let tolerance = median_height(runs) * 0.5;
    let text = group_lines(runs, tolerance)
        .iter()
        .map(TextLine::text)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    text.nfc().collect()
}

/// Linearizes a page's runs into paragraph-joined text.
#[derive(Debug, Clone, Default)]
pub struct TextExtractor {
    config: TextConfig,
}

impl TextExtractor {
    pub fn new(config: TextConfig) -> Self {
        Self { config }
    }

    /// Extract reading-order text and font statistics for one page.
    pub fn extract(&self, page: &Page) -> PageText {
        let runs: Vec<&TextRun> = page
            .text_runs
            .iter()
            .filter(|r| !r.text.trim().is_empty())
            .collect();
        if runs.is_empty() {
            return PageText::empty(page.number);
        }

        let line_height = median_height(&runs);
        let lines = group_lines(&runs, line_height * self.config.line_tolerance_factor);
        let paragraph_gap = line_height * self.config.paragraph_gap_factor;

        let mut text = String::new();
        let mut prev_bottom: Option<f32> = None;
        for line in &lines {
            let line_text = line.text();
            if line_text.is_empty() {
                continue;
            }
            if let Some(bottom) = prev_bottom {
                if line.bottom - bottom > paragraph_gap {
                    text.push_str("\n\n");
                } else {
                    text.push('\n');
                }
            }
            text.push_str(&line_text);
            prev_bottom = Some(line.bottom);
        }

        let text: String = if self.config.normalize {
            text.nfc().collect()
        } else {
            text
        };
        let (primary_font, primary_font_size) = primary_font(&runs);

        PageText {
            page: page.number,
            char_count: text.chars().filter(|c| !c.is_whitespace()).count(),
            word_count: text.split_whitespace().count(),
            text,
            primary_font,
            primary_font_size,
        }
    }
}

/// The font covering the most characters, with its most common size.
fn primary_font(runs: &[&TextRun]) -> (Option<String>, Option<f32>) {
    // font name -> (chars, size in tenths of a point -> chars)
    let mut fonts: BTreeMap<&str, (usize, BTreeMap<i32, usize>)> = BTreeMap::new();
    for run in runs {
        let Some(name) = run.font_name.as_deref() else {
            continue;
        };
        let chars = run.text.chars().filter(|c| !c.is_whitespace()).count();
        let entry = fonts.entry(name).or_default();
        entry.0 += chars;
        if let Some(size) = run.font_size {
            *entry.1.entry((size * 10.0).round() as i32).or_default() += chars;
        }
    }

    let Some((name, (_, sizes))) = fonts.iter().max_by_key(|(_, (count, _))| *count) else {
        return (None, None);
    };
    let size = sizes
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(tenths, _)| *tenths as f32 / 10.0);
    (Some(name.to_string()), size)
}

/// Check if character is from a script that doesn't use word spaces.
/// Chinese and Japanese don't use spaces between words, but Korean does.
fn is_spaceless_script_char(c: char) -> bool {
    let code = c as u32;

    // CJK Unified Ideographs
    (0x4E00..=0x9FFF).contains(&code)
    // Extension A
    || (0x3400..=0x4DBF).contains(&code)
    // Extensions B-F
    || (0x20000..=0x2EBEF).contains(&code)
    // Hiragana and Katakana
    || (0x3040..=0x30FF).contains(&code)
    // CJK Symbols and Punctuation
    || (0x3000..=0x303F).contains(&code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;

    fn run(text: &str, x: f32, y: f32) -> TextRun {
        let width = text.chars().count() as f32 * 6.0;
        TextRun::new(text, BBox::new(x, y, x + width, y + 12.0)).with_font("Helvetica", 12.0)
    }

    fn page(runs: Vec<TextRun>) -> Page {
        Page::letter(1).with_text_runs(runs)
    }

    #[test]
    fn test_empty_page() {
        let text = TextExtractor::default().extract(&Page::letter(4));
        assert_eq!(text, PageText::empty(4));
    }

    #[test]
    fn test_reading_order() {
        let page = page(vec![
            run("world", 60.0, 100.0),
            run("Second", 10.0, 114.0),
            run("Hello", 10.0, 100.5),
        ]);
        let text = TextExtractor::default().extract(&page);
        assert_eq!(text.text, "Hello world\nSecond");
        assert_eq!(text.word_count, 3);
        assert_eq!(text.char_count, 16);
    }

    #[test]
    fn test_paragraph_break_on_large_gap() {
        let page = page(vec![
            run("First", 10.0, 100.0),
            run("line", 10.0, 114.0),
            run("Next", 10.0, 160.0),
        ]);
        let text = TextExtractor::default().extract(&page);
        assert_eq!(text.text, "First\nline\n\nNext");
    }

    #[test]
    fn test_adjacent_runs_not_spaced() {
        let page = page(vec![run("Hel", 10.0, 100.0), run("lo", 28.0, 100.0)]);
        assert_eq!(TextExtractor::default().extract(&page).text, "Hello");
    }

    #[test]
    fn test_cjk_gap_has_no_space() {
        let page = page(vec![run("日本", 10.0, 100.0), run("語", 40.0, 100.0)]);
        assert_eq!(TextExtractor::default().extract(&page).text, "日本語");
    }

    #[test]
    fn test_nfc_normalization() {
        let page = page(vec![run("Cafe\u{0301}", 10.0, 100.0)]);
        let text = TextExtractor::default().extract(&page);
        assert_eq!(text.text, "Caf\u{e9}");

        let raw = TextExtractor::new(TextConfig::new().with_normalize(false)).extract(&page);
        assert_eq!(raw.text, "Cafe\u{0301}");
    }

    #[test]
    fn test_primary_font() {
        let page = page(vec![
            run("Heading", 10.0, 80.0).with_font("Helvetica-Bold", 18.0),
            run("body text that is longer", 10.0, 100.0).with_font("Times", 10.0),
            run("more body", 10.0, 114.0).with_font("Times", 10.0),
        ]);
        let text = TextExtractor::default().extract(&page);
        assert_eq!(text.primary_font.as_deref(), Some("Times"));
        assert_eq!(text.primary_font_size, Some(10.0));
    }

    #[test]
    fn test_cell_text_lines() {
        let a = run("Net", 10.0, 100.0);
        let b = run("income", 10.0, 113.0);
        let c = run("(USD)", 50.0, 113.0);
        assert_eq!(cell_text(&[&c, &a, &b]), "Net\nincome (USD)");
        assert_eq!(cell_text(&[]), "");
    }
}
