//! Ruled-line strategy: reconstruct grids from vector ruling lines.

use std::collections::BTreeMap;

use super::{cluster, mean, sort_candidates, DetectionStrategy, DetectorConfig};
use crate::extract::text::cell_text;
use crate::model::{
    BBox, Cell, Orientation, Page, Row, StrategyKind, TableCandidate, TextRun,
};

/// Segments shorter than this are ticks, not rules.
const MIN_RULE_LENGTH: f32 = 2.0;

/// An axis-aligned rule: `pos` is y for horizontal rules and x for vertical
/// ones; `start..end` is the extent along the other axis.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Rule {
    pos: f32,
    start: f32,
    end: f32,
}

/// Grids formed by connected horizontal and vertical rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuledLineStrategy;

impl DetectionStrategy for RuledLineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RuledLine
    }

    fn detect(&self, page: &Page, config: &DetectorConfig) -> Vec<TableCandidate> {
        let (horizontal, vertical) = collect_rules(page, config.snap_tolerance);
        if horizontal.len() < config.min_rows + 1 || vertical.len() < config.min_columns + 1 {
            log::debug!(
                "RuledLineStrategy: page {} has {} horizontal / {} vertical rules, not enough",
                page.number,
                horizontal.len(),
                vertical.len()
            );
            return Vec::new();
        }

        let mut candidates: Vec<TableCandidate> = components(&horizontal, &vertical, config)
            .into_iter()
            .filter_map(|(h, v)| build_grid(page, &h, &v, config))
            .collect();
        sort_candidates(&mut candidates);
        candidates
    }
}

/// Classify, snap, and merge the page's line segments.
fn collect_rules(page: &Page, tolerance: f32) -> (Vec<Rule>, Vec<Rule>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for seg in &page.lines {
        if seg.length() < MIN_RULE_LENGTH {
            continue;
        }
        match seg.orientation(tolerance) {
            Orientation::Horizontal => horizontal.push(Rule {
                pos: (seg.y0 + seg.y1) / 2.0,
                start: seg.x0.min(seg.x1),
                end: seg.x0.max(seg.x1),
            }),
            Orientation::Vertical => vertical.push(Rule {
                pos: (seg.x0 + seg.x1) / 2.0,
                start: seg.y0.min(seg.y1),
                end: seg.y0.max(seg.y1),
            }),
            Orientation::Oblique => {}
        }
    }

    (
        merge_collinear(snap(horizontal, tolerance), tolerance),
        merge_collinear(snap(vertical, tolerance), tolerance),
    )
}

/// Move rules at nearly the same position onto their mean position.
fn snap(mut rules: Vec<Rule>, tolerance: f32) -> Vec<Rule> {
    rules.sort_by(|a, b| a.pos.total_cmp(&b.pos));
    let mut start = 0;
    while start < rules.len() {
        let first = rules[start].pos;
        let end = rules[start..]
            .iter()
            .position(|r| r.pos - first > tolerance)
            .map_or(rules.len(), |n| start + n);
        let positions: Vec<f32> = rules[start..end].iter().map(|r| r.pos).collect();
        let pos = mean(&positions);
        for rule in &mut rules[start..end] {
            rule.pos = pos;
        }
        start = end;
    }
    rules
}

/// Join overlapping or touching rules at the same position.
fn merge_collinear(mut rules: Vec<Rule>, tolerance: f32) -> Vec<Rule> {
    rules.sort_by(|a, b| a.pos.total_cmp(&b.pos).then(a.start.total_cmp(&b.start)));
    let mut merged: Vec<Rule> = Vec::with_capacity(rules.len());
    for rule in rules {
        match merged.last_mut() {
            Some(last) if last.pos == rule.pos && rule.start <= last.end + tolerance => {
                last.end = last.end.max(rule.end);
            }
            _ => merged.push(rule),
        }
    }
    merged
}

fn crosses(h: &Rule, v: &Rule, tolerance: f32) -> bool {
    v.pos >= h.start - tolerance
        && v.pos <= h.end + tolerance
        && h.pos >= v.start - tolerance
        && h.pos <= v.end + tolerance
}

/// Check whether some rule at `pos` covers `from..to`.
fn covered(rules: &[Rule], pos: f32, from: f32, to: f32, tolerance: f32) -> bool {
    rules.iter().any(|r| {
        (r.pos - pos).abs() <= tolerance && r.start <= from + tolerance && r.end >= to - tolerance
    })
}

/// Check whether some rule at `pos` reaches `at`.
fn touches(rules: &[Rule], pos: f32, at: f32, tolerance: f32) -> bool {
    covered(rules, pos, at, at, tolerance)
}

/// Disjoint-set forest over grid slots and rule indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // The smaller index becomes the root so grouping is deterministic
            let (root, child) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[child] = root;
        }
    }
}

/// Split rules into connected groups of crossing horizontals and verticals.
fn components(
    horizontal: &[Rule],
    vertical: &[Rule],
    config: &DetectorConfig,
) -> Vec<(Vec<Rule>, Vec<Rule>)> {
    let nh = horizontal.len();
    let mut sets = UnionFind::new(nh + vertical.len());
    for (i, h) in horizontal.iter().enumerate() {
        for (j, v) in vertical.iter().enumerate() {
            if crosses(h, v, config.intersection_tolerance) {
                sets.union(i, nh + j);
            }
        }
    }

    let mut groups: BTreeMap<usize, (Vec<Rule>, Vec<Rule>)> = BTreeMap::new();
    for (i, h) in horizontal.iter().enumerate() {
        groups.entry(sets.find(i)).or_default().0.push(*h);
    }
    for (j, v) in vertical.iter().enumerate() {
        groups.entry(sets.find(nh + j)).or_default().1.push(*v);
    }
    groups
        .into_values()
        .filter(|(h, v)| !h.is_empty() && !v.is_empty())
        .collect()
}

/// Distinct snapped positions.
fn positions(rules: &[Rule], tolerance: f32) -> Vec<f32> {
    let values: Vec<f32> = rules.iter().map(|r| r.pos).collect();
    cluster(&values, tolerance).iter().map(|c| mean(c)).collect()
}

/// Index of the band containing `v`; the last band includes its far edge.
fn band(bounds: &[f32], v: f32) -> Option<usize> {
    let last = bounds.len().checked_sub(1)?;
    (0..last).find(|&i| v >= bounds[i] && (v < bounds[i + 1] || (i + 1 == last && v <= bounds[last])))
}

/// Reconstruct one grid from a connected group of rules.
fn build_grid(
    page: &Page,
    horizontal: &[Rule],
    vertical: &[Rule],
    config: &DetectorConfig,
) -> Option<TableCandidate> {
    let tol = config.intersection_tolerance;
    let ys = positions(horizontal, config.snap_tolerance);
    let xs = positions(vertical, config.snap_tolerance);
    if ys.len() < config.min_rows + 1 || xs.len() < config.min_columns + 1 {
        log::debug!(
            "RuledLineStrategy: page {} component with {}x{} boundaries too small",
            page.number,
            ys.len(),
            xs.len()
        );
        return None;
    }
    let (rows, cols) = (ys.len() - 1, xs.len() - 1);

    // Merge neighbouring slots that no rule separates
    let slot = |r: usize, c: usize| r * cols + c;
    let mut sets = UnionFind::new(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            if c + 1 < cols && !covered(vertical, xs[c + 1], ys[r], ys[r + 1], tol) {
                sets.union(slot(r, c), slot(r, c + 1));
            }
            if r + 1 < rows && !covered(horizontal, ys[r + 1], xs[c], xs[c + 1], tol) {
                sets.union(slot(r, c), slot(r + 1, c));
            }
        }
    }

    // Group slots; non-rectangular groups fall back to single slots
    let mut groups: BTreeMap<usize, Vec<(usize, usize)>> = BTreeMap::new();
    for r in 0..rows {
        for c in 0..cols {
            groups.entry(sets.find(slot(r, c))).or_default().push((r, c));
        }
    }
    let mut owner = vec![0usize; rows * cols];
    let mut spans: Vec<(usize, usize, usize, usize)> = Vec::new();
    for members in groups.values() {
        let r0 = members.iter().map(|m| m.0).min().unwrap_or(0);
        let r1 = members.iter().map(|m| m.0).max().unwrap_or(0);
        let c0 = members.iter().map(|m| m.1).min().unwrap_or(0);
        let c1 = members.iter().map(|m| m.1).max().unwrap_or(0);
        if members.len() == (r1 - r0 + 1) * (c1 - c0 + 1) {
            for &(r, c) in members {
                owner[slot(r, c)] = spans.len();
            }
            spans.push((r0, c0, r1, c1));
        } else {
            for &(r, c) in members {
                owner[slot(r, c)] = spans.len();
                spans.push((r, c, r, c));
            }
        }
    }

    // Assign runs by center
    let mut contents: Vec<Vec<&TextRun>> = vec![Vec::new(); spans.len()];
    for run in &page.text_runs {
        if run.text.trim().is_empty() {
            continue;
        }
        let (cx, cy) = run.bbox.center();
        if let (Some(r), Some(c)) = (band(&ys, cy), band(&xs, cx)) {
            contents[owner[slot(r, c)]].push(run);
        }
    }

    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&i| (spans[i].0, spans[i].1));
    let mut grid_rows: Vec<Row> = (0..rows).map(|_| Row::new(Vec::new())).collect();
    for i in order {
        let (r0, c0, r1, c1) = spans[i];
        let bbox = BBox::new(xs[c0], ys[r0], xs[c1 + 1], ys[r1 + 1]);
        let cell = Cell::new(cell_text(&contents[i]), bbox)
            .with_span((r1 - r0 + 1) as u32, (c1 - c0 + 1) as u32);
        grid_rows[r0].cells.push(cell);
    }

    let expected = (rows + 1) * (cols + 1);
    let present = ys
        .iter()
        .flat_map(|y| xs.iter().map(move |x| (*x, *y)))
        .filter(|(x, y)| touches(horizontal, *y, *x, tol) && touches(vertical, *x, *y, tol))
        .count();
    let intersections = present as f32 / expected as f32;

    let mut candidate = TableCandidate {
        page: page.number,
        bbox: BBox::new(xs[0], ys[0], xs[cols], ys[rows]),
        rows: grid_rows,
        column_count: cols,
        strategy: StrategyKind::RuledLine,
        confidence: 0.0,
    };
    let fill = candidate.fill_ratio();
    if fill < config.min_fill_ratio {
        log::debug!(
            "RuledLineStrategy: page {} {}x{} grid only {:.0}% filled, dropped",
            page.number,
            rows,
            cols,
            fill * 100.0
        );
        return None;
    }
    candidate.confidence = config.score(rows, cols, fill, Some(intersections));
    log::debug!(
        "RuledLineStrategy: page {} {}x{} grid, fill {:.2}, intersections {:.2}, confidence {:.2}",
        page.number,
        rows,
        cols,
        fill,
        intersections,
        candidate.confidence
    );
    Some(candidate)
}
