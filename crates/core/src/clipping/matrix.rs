//! Matrices that map model space into a mask cell.
//!
//! The draw matrix takes a model-space position to its `[0, 1]²` texture
//! coordinate inside the mask buffer; the mask matrix additionally maps
//! that into `[-1, 1]` clip space so the clip shapes can be rasterized
//! into the cell.

use glam::{Mat4, Vec3};

use crate::rect::Rect;

/// Fraction of the width (and height) added on each side of the masked
/// bounds before they are fitted into a cell.
pub const MARGIN: f32 = 0.05;

/// The pair of matrices a clipping context uses each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskMatrices {
    /// Model space to mask clip space, used while generating the mask.
    pub for_mask: Mat4,
    /// Model space to mask texture space, used while sampling the mask.
    pub for_draw: Mat4,
}

impl Default for MaskMatrices {
    fn default() -> Self {
        Self {
            for_mask: Mat4::IDENTITY,
            for_draw: Mat4::IDENTITY,
        }
    }
}

/// Grows `bounds` by [`MARGIN`] of its size on every side.
pub fn expand_with_margin(bounds: &Rect) -> Rect {
    bounds.expanded(bounds.width * MARGIN, bounds.height * MARGIN)
}

/// Matrices for the batch pass: the margin-expanded bounds are fitted
/// exactly into `layout`.
pub fn fit_to_layout(bounds: &Rect, layout: &Rect) -> MaskMatrices {
    let expanded = expand_with_margin(bounds);
    let scale_x = layout.width / expanded.width.max(f32::EPSILON);
    let scale_y = layout.height / expanded.height.max(f32::EPSILON);
    build(layout, scale_x, scale_y, expanded.x, expanded.y)
}

/// Matrices for high-precision masking over the full buffer.
///
/// Per axis: if the bounds at `pixels_per_unit` would not fit in the mask
/// buffer they are expanded by the margin and fitted, otherwise one model
/// unit maps to `pixels_per_unit` mask pixels.
pub fn fit_high_precision(
    bounds: &Rect,
    layout: &Rect,
    mask_size: [u32; 2],
    pixels_per_unit: f32,
) -> MaskMatrices {
    let (origin_x, scale_x) = fit_axis(
        bounds.x,
        bounds.width,
        layout.width,
        mask_size[0] as f32,
        pixels_per_unit,
    );
    let (origin_y, scale_y) = fit_axis(
        bounds.y,
        bounds.height,
        layout.height,
        mask_size[1] as f32,
        pixels_per_unit,
    );
    build(layout, scale_x, scale_y, origin_x, origin_y)
}

fn fit_axis(min: f32, extent: f32, cell: f32, mask_pixels: f32, ppu: f32) -> (f32, f32) {
    let cell_pixels = cell * mask_pixels;
    if extent * ppu > cell_pixels {
        let margin = extent * MARGIN;
        let expanded = extent + 2.0 * margin;
        (min - margin, cell / expanded.max(f32::EPSILON))
    } else {
        (min, ppu / cell_pixels.max(f32::EPSILON))
    }
}

fn build(layout: &Rect, scale_x: f32, scale_y: f32, origin_x: f32, origin_y: f32) -> MaskMatrices {
    let for_draw = Mat4::from_translation(Vec3::new(layout.x, layout.y, 0.0))
        * Mat4::from_scale(Vec3::new(scale_x, scale_y, 1.0))
        * Mat4::from_translation(Vec3::new(-origin_x, -origin_y, 0.0));
    let to_clip = Mat4::from_translation(Vec3::new(-1.0, -1.0, 0.0))
        * Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0));
    MaskMatrices {
        for_mask: to_clip * for_draw,
        for_draw,
    }
}
