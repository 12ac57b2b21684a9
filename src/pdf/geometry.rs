//! Coordinate conversion between the structural reader and the layout backend
//!
//! The structural reader reports geometry in PDF user space (origin
//! bottom-left, Y up). The layout backend uses origin top-left, Y down.
//! [`to_layout_y`] is the only place that crosses between the two.

use serde::Serialize;

/// Axis-aligned box in layout space: `[x0, top, x1, bottom]`.
///
/// Constructors normalize so that `x0 <= x1` and `top <= bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f32; 4]")]
pub struct BoundingBox {
    pub x0: f32,
    pub top: f32,
    pub x1: f32,
    pub bottom: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, top: f32, x1: f32, bottom: f32) -> Self {
        Self {
            x0: x0.min(x1),
            top: top.min(bottom),
            x1: x0.max(x1),
            bottom: top.max(bottom),
        }
    }

    /// Convert a PDF `/Rect` (`[llx, lly, urx, ury]`, corners in any order).
    pub fn from_pdf_rect(page_height: f32, rect: [f32; 4]) -> Self {
        let x0 = rect[0].min(rect[2]);
        let x1 = rect[0].max(rect[2]);
        let y0 = rect[1].min(rect[3]);
        let y1 = rect[1].max(rect[3]);
        Self {
            x0,
            top: to_layout_y(page_height, y1),
            x1,
            bottom: to_layout_y(page_height, y0),
        }
    }

    /// Convert one quadrilateral (8 floats: four x/y pairs) from `/QuadPoints`.
    ///
    /// Returns `None` when fewer than 8 values are supplied.
    pub fn from_quad(page_height: f32, quad: &[f32]) -> Option<Self> {
        if quad.len() < 8 {
            return None;
        }
        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]].map(|y| to_layout_y(page_height, y));
        Some(Self {
            x0: xs.iter().copied().fold(f32::INFINITY, f32::min),
            top: ys.iter().copied().fold(f32::INFINITY, f32::min),
            x1: xs.iter().copied().fold(f32::NEG_INFINITY, f32::max),
            bottom: ys.iter().copied().fold(f32::NEG_INFINITY, f32::max),
        })
    }

    /// Grow the box by `pad` on every side, never past the page origin.
    pub fn padded(&self, pad: f32) -> Self {
        Self {
            x0: (self.x0 - pad).max(0.0),
            top: (self.top - pad).max(0.0),
            x1: self.x1 + pad,
            bottom: self.bottom + pad,
        }
    }

    /// Open overlap test: boxes that merely touch along an edge do not overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        !(other.x1 <= self.x0
            || other.x0 >= self.x1
            || other.bottom <= self.top
            || other.top >= self.bottom)
    }

    /// Closed containment test.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x0 >= self.x0
            && other.x1 <= self.x1
            && other.top >= self.top
            && other.bottom <= self.bottom
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            top: self.top.min(other.top),
            x1: self.x1.max(other.x1),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x0, b.top, b.x1, b.bottom]
    }
}

/// Map a PDF user-space Y coordinate to layout space.
pub fn to_layout_y(page_height: f32, y_pdf: f32) -> f32 {
    page_height - y_pdf
}

/// Smallest box enclosing all of `boxes`, or `None` for an empty slice.
pub fn union_boxes(boxes: &[BoundingBox]) -> Option<BoundingBox> {
    let (first, rest) = boxes.split_first()?;
    Some(rest.iter().fold(*first, |acc, b| acc.union(b)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_layout_y() {
        assert_eq!(to_layout_y(800.0, 100.0), 700.0);
        assert_eq!(to_layout_y(792.0, 792.0), 0.0);
    }

    #[test]
    fn test_union_boxes() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            BoundingBox::new(5.0, 5.0, 20.0, 20.0),
        ];
        assert_eq!(
            union_boxes(&boxes),
            Some(BoundingBox::new(0.0, 0.0, 20.0, 20.0))
        );
        assert_eq!(union_boxes(&[]), None);
    }

    #[test]
    fn test_from_pdf_rect_normalizes_corners() {
        // Corners given upper-right first
        let b = BoundingBox::from_pdf_rect(800.0, [200.0, 700.0, 100.0, 680.0]);
        assert_eq!(b, BoundingBox::new(100.0, 100.0, 200.0, 120.0));
    }

    #[test]
    fn test_from_quad() {
        // Acrobat order: upper-left, upper-right, lower-left, lower-right
        let quad = [72.0, 720.0, 300.0, 720.0, 72.0, 708.0, 300.0, 708.0];
        let b = BoundingBox::from_quad(792.0, &quad).unwrap();
        assert_eq!(b, BoundingBox::new(72.0, 72.0, 300.0, 84.0));
        assert!(BoundingBox::from_quad(792.0, &quad[..6]).is_none());
    }

    #[test]
    fn test_overlap_is_open() {
        let target = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        let touching = BoundingBox::new(20.0, 10.0, 30.0, 20.0);
        let inside = BoundingBox::new(12.0, 12.0, 14.0, 14.0);
        let straddling = BoundingBox::new(18.0, 5.0, 25.0, 12.0);
        assert!(!target.overlaps(&touching));
        assert!(target.overlaps(&inside));
        assert!(target.overlaps(&straddling));
    }

    #[test]
    fn test_padded_clamps_at_origin() {
        let b = BoundingBox::new(0.5, 3.0, 10.0, 10.0).padded(1.0);
        assert_eq!(b, BoundingBox::new(0.0, 2.0, 11.0, 11.0));
    }

    #[test]
    fn test_serializes_as_array() {
        let json = serde_json::to_string(&BoundingBox::new(1.0, 2.0, 3.0, 4.0)).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
    }
}
