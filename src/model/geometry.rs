//! Page geometry primitives.
//!
//! All coordinates are in PDF points with a top-left origin: `y` grows
//! downward, so `y0` is the top edge of a box and `y1` its bottom edge.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box `(x0, y0)`–`(x1, y1)` with `x0 <= x1`, `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    /// Create a box from two corners, normalizing their order.
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Center point `(x, y)`.
    pub fn center(&self) -> (f32, f32) {
        ((self.x0 + self.x1) / 2.0, (self.y0 + self.y1) / 2.0)
    }

    /// Half-open containment: left/top edges are inside, right/bottom are not.
    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }

    /// Area of the intersection with `other` (zero when they only touch).
    pub fn overlap_area(&self, other: &BBox) -> f32 {
        let w = self.x1.min(other.x1) - self.x0.max(other.x0);
        let h = self.y1.min(other.y1) - self.y0.max(other.y0);
        if w > 0.0 && h > 0.0 {
            w * h
        } else {
            0.0
        }
    }

    /// Smallest box covering both.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Union of all boxes, or `None` for an empty iterator.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<BBox> {
        boxes.into_iter().fold(None, |acc: Option<BBox>, b| {
            Some(match acc {
                Some(a) => a.union(b),
                None => *b,
            })
        })
    }
}

/// Orientation of a ruling line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
    Oblique,
}

/// A straight vector line segment drawn on the page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl LineSegment {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Classify the segment, allowing `tolerance` points of skew.
    pub fn orientation(&self, tolerance: f32) -> Orientation {
        let dx = (self.x1 - self.x0).abs();
        let dy = (self.y1 - self.y0).abs();
        if dy <= tolerance && dx > dy {
            Orientation::Horizontal
        } else if dx <= tolerance && dy > dx {
            Orientation::Vertical
        } else {
            Orientation::Oblique
        }
    }

    pub fn length(&self) -> f32 {
        let dx = self.x1 - self.x0;
        let dy = self.y1 - self.y0;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_normalizes_corners() {
        let b = BBox::new(10.0, 20.0, 0.0, 5.0);
        assert_eq!(b, BBox { x0: 0.0, y0: 5.0, x1: 10.0, y1: 20.0 });
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_contains_point_half_open() {
        let b = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(b.contains_point(0.0, 0.0));
        assert!(b.contains_point(9.9, 9.9));
        assert!(!b.contains_point(10.0, 5.0));
        assert!(!b.contains_point(5.0, 10.0));
    }

    #[test]
    fn test_touching_boxes_do_not_overlap() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(a.overlap_area(&b), 0.0);
        let c = BBox::new(5.0, 5.0, 15.0, 15.0);
        assert_eq!(a.overlap_area(&c), 25.0);
    }

    #[test]
    fn test_union_all() {
        let boxes = [BBox::new(0.0, 0.0, 1.0, 1.0), BBox::new(5.0, -2.0, 6.0, 3.0)];
        assert_eq!(
            BBox::union_all(boxes.iter()),
            Some(BBox::new(0.0, -2.0, 6.0, 3.0))
        );
        assert_eq!(BBox::union_all(std::iter::empty()), None);
    }

    #[test]
    fn test_segment_orientation() {
        assert_eq!(
            LineSegment::new(0.0, 10.0, 100.0, 10.5).orientation(1.0),
            Orientation::Horizontal
        );
        assert_eq!(
            LineSegment::new(50.0, 0.0, 50.0, 80.0).orientation(1.0),
            Orientation::Vertical
        );
        assert_eq!(
            LineSegment::new(0.0, 0.0, 30.0, 40.0).orientation(1.0),
            Orientation::Oblique
        );
    }
}
