//! Axis-aligned rectangles in model space and normalized layout space.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle stored as origin plus extent.
///
/// `x`/`y` is the minimum corner. Used both for model-space bounds of masked
/// drawables and for normalized `[0, 1]` layout cells inside a mask buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// The full `[0, 1]²` layout space.
    pub const UNIT: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from its minimum and maximum corners.
    pub fn from_min_max(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f32 {
        self.x + 0.5 * self.width
    }

    pub fn center_y(&self) -> f32 {
        self.y + 0.5 * self.height
    }

    /// Grows the rectangle by `dx` on the left and right and `dy` on the
    /// top and bottom, keeping the center fixed.
    pub fn expanded(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.x - dx,
            self.y - dy,
            self.width + 2.0 * dx,
            self.height + 2.0 * dy,
        )
    }

    /// Returns true if the interiors of the two rectangles intersect.
    ///
    /// Rectangles that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Maps the edges from `[0, 1]` layout space to `[-1, 1]` clip space,
    /// returned as `[min_x, min_y, max_x, max_y]`.
    pub fn to_clip_edges(&self) -> [f32; 4] {
        [
            self.x * 2.0 - 1.0,
            self.y * 2.0 - 1.0,
            self.right() * 2.0 - 1.0,
            self.bottom() * 2.0 - 1.0,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expanded_keeps_center_and_grows_both_sides() {
        let r = Rect::new(10.0, 20.0, 100.0, 50.0);
        let e = r.expanded(5.0, 2.5);
        assert_eq!(e.width, 110.0);
        assert_eq!(e.height, 55.0);
        assert!((e.center_x() - r.center_x()).abs() < 1e-4);
        assert!((e.center_y() - r.center_y()).abs() < 1e-4);
    }

    #[test]
    fn from_min_max_computes_extent() {
        let r = Rect::from_min_max(-1.0, -2.0, 3.0, 4.0);
        assert_eq!(r, Rect::new(-1.0, -2.0, 4.0, 6.0));
        assert_eq!(r.right(), 3.0);
        assert_eq!(r.bottom(), 4.0);
    }

    #[test]
    fn touching_rects_do_not_overlap() {
        let a = Rect::new(0.0, 0.0, 0.5, 0.5);
        let b = Rect::new(0.5, 0.0, 0.5, 0.5);
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn nested_rects_overlap() {
        let a = Rect::UNIT;
        let b = Rect::new(0.25, 0.25, 0.1, 0.1);
        assert!(a.overlaps(&b));
    }

    #[test]
    fn unit_rect_maps_to_full_clip_space() {
        assert_eq!(Rect::UNIT.to_clip_edges(), [-1.0, -1.0, 1.0, 1.0]);
    }

    #[test]
    fn quarter_cell_maps_to_clip_quadrant() {
        let r = Rect::new(0.5, 0.0, 0.5, 0.5);
        assert_eq!(r.to_clip_edges(), [0.0, -1.0, 1.0, 0.0]);
    }
}
