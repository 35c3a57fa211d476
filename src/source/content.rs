//! Content stream interpretation.
//!
//! Walks a page's operators and collects positioned text runs, ruling lines
//! (stroked paths and hairline rectangles), and image placements. Output
//! coordinates are page points with a top-left origin.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};

use super::pdf::{decode_text_simple, resolve, resolve_dict};
use crate::error::{Error, Result};
use crate::model::{BBox, LineSegment, TextRun};

/// TJ adjustments larger than this (thousandths of an em) read as a word space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;
/// Filled rectangles no thicker than this are drawn rules, not shading.
const HAIRLINE_MAX_THICKNESS: f32 = 2.0;
/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 8;
/// Approximate ascender/descender as a fraction of the font size.
const ASCENT: f32 = 0.8;
const DESCENT: f32 = -0.2;

type Matrix = [f32; 6];
type Point = (f32, f32);

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` then `n`.
fn multiply(m: &Matrix, n: &Matrix) -> Matrix {
    [
        m[0] * n[0] + m[1] * n[2],
        m[0] * n[1] + m[1] * n[3],
        m[2] * n[0] + m[3] * n[2],
        m[2] * n[1] + m[3] * n[3],
        m[4] * n[0] + m[5] * n[2] + n[4],
        m[4] * n[1] + m[5] * n[3] + n[5],
    ]
}

fn translate(tx: f32, ty: f32) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn apply(m: &Matrix, (x, y): Point) -> Point {
    (x * m[0] + y * m[2] + m[4], x * m[1] + y * m[3] + m[5])
}

/// Helper to extract number from PDF object.
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, obj) in out.iter_mut().zip(operands) {
        *slot = get_number(obj)?;
    }
    Some(out)
}

/// Everything collected from one page.
#[derive(Debug, Default)]
pub(crate) struct PageContent {
    pub runs: Vec<TextRun>,
    pub lines: Vec<LineSegment>,
    pub images: Vec<ImagePlacement>,
}

/// Where an image XObject was painted.
#[derive(Debug, Clone)]
pub(crate) struct ImagePlacement {
    pub id: ObjectId,
    pub bbox: BBox,
}

/// Glyph metrics for one font resource.
#[derive(Debug)]
struct FontInfo<'a> {
    dict: &'a Dictionary,
    base_font: String,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    cid_widths: HashMap<u32, f32>,
    default_width: f32,
}

impl<'a> FontInfo<'a> {
    fn load(doc: &'a Document, dict: &'a Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let two_byte = matches!(dict.get(b"Subtype").and_then(|s| s.as_name()), Ok(b"Type0"));

        let mut info = Self {
            dict,
            base_font,
            two_byte,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 500.0,
        };

        if two_byte {
            info.default_width = 1000.0;
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|a| a.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(cid) = descendant {
                if let Some(dw) = cid.get(b"DW").ok().and_then(get_number) {
                    info.default_width = dw;
                }
                if let Some(w) = cid.get(b"W").ok().and_then(|o| resolve(doc, o)) {
                    info.cid_widths = parse_cid_widths(doc, w);
                }
            }
        } else {
            info.first_char = dict
                .get(b"FirstChar")
                .ok()
                .and_then(get_number)
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0);
            if let Some(widths) = dict
                .get(b"Widths")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
            {
                info.widths = widths
                    .iter()
                    .map(|w| resolve(doc, w).and_then(get_number).unwrap_or(0.0))
                    .collect();
            }
            if let Some(missing) = dict
                .get(b"FontDescriptor")
                .ok()
                .and_then(|o| resolve_dict(doc, o))
                .and_then(|fd| fd.get(b"MissingWidth").ok().and_then(get_number))
            {
                info.default_width = missing;
            }
        }
        info
    }

    /// Advance width of a character code in thousandths of an em.
    fn glyph_width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|i| self.widths.get(i as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }
}

/// Parse a CIDFont `W` array: `c [w1 w2 ...]` and `c_first c_last w` forms.
fn parse_cid_widths(doc: &Document, w: &Object) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let Ok(items) = w.as_array() else {
        return widths;
    };
    let mut i = 0;
    while i < items.len() {
        let Some(first) = get_number(&items[i]) else {
            break;
        };
        let first = first.max(0.0) as u32;
        match items.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, w) in list.iter().enumerate() {
                    if let Some(w) = get_number(w) {
                        widths.insert(first + offset as u32, w);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(w)) = (get_number(last), items.get(i + 2).and_then(get_number))
                else {
                    break;
                };
                for code in first..=(last.max(0.0) as u32).min(first + 0xFFFF) {
                    widths.insert(code, w);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[derive(Debug, Clone)]
struct GraphicsState<'a> {
    ctm: Matrix,
    font: Option<Rc<FontInfo<'a>>>,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    rise: f32,
}

impl Default for GraphicsState<'_> {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
        }
    }
}

/// Current path, in user space after the CTM.
#[derive(Debug, Default)]
struct PathBuilder {
    segments: Vec<(Point, Point)>,
    rects: Vec<[Point; 4]>,
    start: Option<Point>,
    current: Option<Point>,
}

impl PathBuilder {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Operator interpreter for one page.
pub(crate) struct Interpreter<'a> {
    doc: &'a Document,
    /// Media box left edge and top edge, for flipping to top-left origin
    origin: Point,
    state: GraphicsState<'a>,
    stack: Vec<GraphicsState<'a>>,
    tm: Matrix,
    tlm: Matrix,
    path: PathBuilder,
    forms: Vec<ObjectId>,
    out: PageContent,
}

impl<'a> Interpreter<'a> {
    /// `media_box` is `[x0, y0, x1, y1]` in PDF user space.
    pub fn new(doc: &'a Document, media_box: [f32; 4]) -> Self {
        Self {
            doc,
            origin: (media_box[0].min(media_box[2]), media_box[1].max(media_box[3])),
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: IDENTITY,
            tlm: IDENTITY,
            path: PathBuilder::default(),
            forms: Vec::new(),
            out: PageContent::default(),
        }
    }

    /// Interpret a decoded content stream against `resources`.
    pub fn run(mut self, content: &[u8], resources: Option<&'a Dictionary>) -> Result<PageContent> {
        let ops = Content::decode(content)
            .map_err(|e| Error::Corrupted(format!("content stream: {e}")))?
            .operations;
        self.execute(&ops, resources, 0);
        Ok(self.out)
    }

    fn execute(&mut self, ops: &[Operation], resources: Option<&'a Dictionary>, depth: usize) {
        for op in ops {
            let operands = op.operands.as_slice();
            match op.operator.as_str() {
                "q" => self.stack.push(self.state.clone()),
                "Q" => {
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                }
                "cm" => {
                    if let Some(m) = numbers::<6>(operands) {
                        self.state.ctm = multiply(&m, &self.state.ctm);
                    }
                }

                // Text objects and state
                "BT" => {
                    self.tm = IDENTITY;
                    self.tlm = IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let (Some(Object::Name(name)), Some(size)) =
                        (operands.first(), operands.get(1).and_then(get_number))
                    {
                        self.state.font = self.load_font(resources, name).map(Rc::new);
                        self.state.font_size = size;
                    }
                }
                "TL" => {
                    if let Some([tl]) = numbers::<1>(operands) {
                        self.state.leading = tl;
                    }
                }
                "Tc" => {
                    if let Some([tc]) = numbers::<1>(operands) {
                        self.state.char_spacing = tc;
                    }
                }
                "Tw" => {
                    if let Some([tw]) = numbers::<1>(operands) {
                        self.state.word_spacing = tw;
                    }
                }
                "Tz" => {
                    if let Some([tz]) = numbers::<1>(operands) {
                        self.state.horizontal_scale = tz / 100.0;
                    }
                }
                "Ts" => {
                    if let Some([ts]) = numbers::<1>(operands) {
                        self.state.rise = ts;
                    }
                }
                "Td" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.move_line(tx, ty);
                    }
                }
                "TD" => {
                    if let Some([tx, ty]) = numbers::<2>(operands) {
                        self.state.leading = -ty;
                        self.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    if let Some(m) = numbers::<6>(operands) {
                        self.tm = m;
                        self.tlm = m;
                    }
                }
                "T*" => self.next_line(),

                // Text showing
                "Tj" => {
                    if let Some(s @ Object::String(..)) = operands.first() {
                        self.show(std::slice::from_ref(s));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(parts)) = operands.first() {
                        self.show(parts);
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(s @ Object::String(..)) = operands.first() {
                        self.show(std::slice::from_ref(s));
                    }
                }
                "\"" => {
                    if let Some([tw, tc]) = numbers::<2>(operands) {
                        self.state.word_spacing = tw;
                        self.state.char_spacing = tc;
                    }
                    self.next_line();
                    if let Some(s @ Object::String(..)) = operands.get(2) {
                        self.show(std::slice::from_ref(s));
                    }
                }

                // Path construction
                "m" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        let p = apply(&self.state.ctm, (x, y));
                        self.path.start = Some(p);
                        self.path.current = Some(p);
                    }
                }
                "l" => {
                    if let Some([x, y]) = numbers::<2>(operands) {
                        let p = apply(&self.state.ctm, (x, y));
                        if let Some(from) = self.path.current {
                            self.path.segments.push((from, p));
                        }
                        self.path.current = Some(p);
                    }
                }
                "c" => self.curve_to(operands, 4),
                "v" | "y" => self.curve_to(operands, 2),
                "h" => {
                    if let (Some(from), Some(to)) = (self.path.current, self.path.start) {
                        if from != to {
                            self.path.segments.push((from, to));
                        }
                        self.path.current = Some(to);
                    }
                }
                "re" => {
                    if let Some([x, y, w, h]) = numbers::<4>(operands) {
                        let ctm = self.state.ctm;
                        let corners = [
                            apply(&ctm, (x, y)),
                            apply(&ctm, (x + w, y)),
                            apply(&ctm, (x + w, y + h)),
                            apply(&ctm, (x, y + h)),
                        ];
                        self.path.rects.push(corners);
                        self.path.start = Some(corners[0]);
                        self.path.current = Some(corners[0]);
                    }
                }

                // Path painting
                "S" => self.paint(true, false, false),
                "s" => self.paint(true, false, true),
                "f" | "F" | "f*" => self.paint(false, true, false),
                "B" | "B*" => self.paint(true, true, false),
                "b" | "b*" => self.paint(true, true, true),
                "n" => self.path.clear(),

                "Do" => {
                    if let Some(Object::Name(name)) = operands.first() {
                        self.draw_xobject(resources, name, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = multiply(&translate(tx, ty), &self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        // A zero leading would stack lines on top of each other
        let leading = if self.state.leading != 0.0 {
            self.state.leading
        } else {
            self.state.font_size * 1.2
        };
        self.move_line(0.0, -leading);
    }

    fn curve_to(&mut self, operands: &[Object], end_index: usize) {
        if let (Some(x), Some(y)) = (
            operands.get(end_index).and_then(get_number),
            operands.get(end_index + 1).and_then(get_number),
        ) {
            self.path.current = Some(apply(&self.state.ctm, (x, y)));
        }
    }

    fn load_font(&self, resources: Option<&'a Dictionary>, name: &[u8]) -> Option<FontInfo<'a>> {
        let fonts = resources?
            .get(b"Font")
            .ok()
            .and_then(|o| resolve_dict(self.doc, o))?;
        let dict = fonts.get(name).ok().and_then(|o| resolve_dict(self.doc, o))?;
        Some(FontInfo::load(self.doc, dict))
    }

    fn decode(&self, bytes: &[u8]) -> String {
        if let Some(font) = &self.state.font {
            if let Ok(enc) = font.dict.get_font_encoding(self.doc) {
                if let Ok(text) = Document::decode_text(&enc, bytes) {
                    return text;
                }
            }
        }
        decode_text_simple(bytes)
    }

    /// Width of a string in unscaled text space, including spacing.
    fn measure(&self, bytes: &[u8]) -> f32 {
        let s = &self.state;
        let size = s.font_size;
        let mut width = 0.0;
        match &s.font {
            Some(font) if font.two_byte => {
                for pair in bytes.chunks(2) {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    width += font.glyph_width(code) / 1000.0 * size + s.char_spacing;
                }
            }
            font => {
                for &b in bytes {
                    let w = font.as_ref().map_or(500.0, |f| f.glyph_width(b as u32));
                    width += w / 1000.0 * size + s.char_spacing;
                    if b == b' ' {
                        width += s.word_spacing;
                    }
                }
            }
        }
        width * s.horizontal_scale
    }

    /// Show strings and TJ adjustments as a single run.
    fn show(&mut self, parts: &[Object]) {
        let size = self.state.font_size;
        let mut text = String::new();
        let mut advance = 0.0;

        for part in parts {
            match part {
                Object::String(bytes, _) => {
                    text.push_str(&self.decode(bytes));
                    advance += self.measure(bytes);
                }
                other => {
                    if let Some(n) = get_number(other) {
                        if -n > TJ_SPACE_THRESHOLD
                            && !text.is_empty()
                            && !text.ends_with(' ')
                            && !text.ends_with('\u{00A0}')
                        {
                            text.push(' ');
                        }
                        advance -= n / 1000.0 * size * self.state.horizontal_scale;
                    }
                }
            }
        }

        self.emit_run(text, advance);
        self.tm = multiply(&translate(advance, 0.0), &self.tm);
    }

    fn emit_run(&mut self, text: String, advance: f32) {
        if text.trim().is_empty() {
            return;
        }
        let s = &self.state;
        let trm = multiply(&self.tm, &s.ctm);
        let bottom = s.rise + DESCENT * s.font_size;
        let top = s.rise + ASCENT * s.font_size;
        let corners = [(0.0, bottom), (advance, bottom), (advance, top), (0.0, top)];
        let bbox = self.page_bbox(corners.iter().map(|p| apply(&trm, *p)));
        let effective_size = s.font_size * (trm[2] * trm[2] + trm[3] * trm[3]).sqrt();

        let mut run = TextRun::new(text, bbox);
        if let Some(font) = &s.font {
            run = run.with_font(font.base_font.clone(), effective_size);
        } else {
            run.font_size = Some(effective_size);
        }
        self.out.runs.push(run);
    }

    fn to_page(&self, (x, y): Point) -> Point {
        (x - self.origin.0, self.origin.1 - y)
    }

    fn page_bbox(&self, points: impl Iterator<Item = Point>) -> BBox {
        let mut bbox: Option<BBox> = None;
        for p in points {
            let (x, y) = self.to_page(p);
            let pt = BBox::new(x, y, x, y);
            bbox = Some(bbox.map_or(pt, |b| b.union(&pt)));
        }
        bbox.unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0))
    }

    fn push_line(&mut self, a: Point, b: Point) {
        let (x0, y0) = self.to_page(a);
        let (x1, y1) = self.to_page(b);
        self.out.lines.push(LineSegment::new(x0, y0, x1, y1));
    }

    fn paint(&mut self, stroke: bool, fill: bool, close: bool) {
        let path = std::mem::take(&mut self.path);

        if stroke {
            for (a, b) in &path.segments {
                self.push_line(*a, *b);
            }
            if close {
                if let (Some(from), Some(to)) = (path.current, path.start) {
                    if from != to {
                        self.push_line(from, to);
                    }
                }
            }
            for rect in &path.rects {
                for i in 0..4 {
                    self.push_line(rect[i], rect[(i + 1) % 4]);
                }
            }
        } else if fill {
            for rect in &path.rects {
                let bbox = self.page_bbox(rect.iter().copied());
                let (w, h) = (bbox.width(), bbox.height());
                if h <= HAIRLINE_MAX_THICKNESS && w > h {
                    let y = (bbox.y0 + bbox.y1) / 2.0;
                    self.out.lines.push(LineSegment::new(bbox.x0, y, bbox.x1, y));
                } else if w <= HAIRLINE_MAX_THICKNESS && h > w {
                    let x = (bbox.x0 + bbox.x1) / 2.0;
                    self.out.lines.push(LineSegment::new(x, bbox.y0, x, bbox.y1));
                }
            }
        }
    }

    fn draw_xobject(&mut self, resources: Option<&'a Dictionary>, name: &[u8], depth: usize) {
        let doc = self.doc;
        let Some(xobjects) = resources
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|o| resolve_dict(doc, o))
        else {
            return;
        };
        let Ok(id) = xobjects.get(name).and_then(|o| o.as_reference()) else {
            return;
        };
        let Ok(stream) = doc.get_object(id).and_then(|o| o.as_stream()) else {
            return;
        };

        match stream.dict.get(b"Subtype").and_then(|s| s.as_name()) {
            Ok(b"Image") => {
                let ctm = self.state.ctm;
                let corners = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
                let bbox = self.page_bbox(corners.iter().map(|p| apply(&ctm, *p)));
                self.out.images.push(ImagePlacement { id, bbox });
            }
            Ok(b"Form") => {
                if depth >= MAX_FORM_DEPTH || self.forms.contains(&id) {
                    log::debug!("Interpreter: skipping nested form {:?}", id);
                    return;
                }
                let content = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                let ops = match Content::decode(&content) {
                    Ok(c) => c.operations,
                    Err(e) => {
                        log::debug!("Interpreter: undecodable form {:?}: {}", id, e);
                        return;
                    }
                };
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|o| resolve_dict(doc, o))
                    .or(resources);
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|o| o.as_array().ok())
                    .and_then(|a| numbers::<6>(a))
                    .unwrap_or(IDENTITY);

                self.stack.push(self.state.clone());
                self.state.ctm = multiply(&matrix, &self.state.ctm);
                self.forms.push(id);
                self.execute(&ops, form_resources, depth + 1);
                self.forms.pop();
                if let Some(state) = self.stack.pop() {
                    self.state = state;
                }
            }
            _ => {}
        }
    }
}
