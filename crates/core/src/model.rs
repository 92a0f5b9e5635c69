//! The drawable data this subsystem consumes from its model collaborator.
//!
//! [`Model`] is the read-only, per-frame view of a deformed avatar: one
//! entry per drawable (mesh fragment) plus a few model-level properties.
//! Evaluating parameters, motions and physics is the model's business; the
//! renderer only reads the results. [`ModelSnapshot`] is a plain owned
//! implementation for hosts that assemble drawable data themselves.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::color::TextureColor;

/// Color blend effect applied when a drawable is composited.
///
/// All three share the same shader programs; they differ only in the
/// blend-function factors set at draw time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiplicative,
}

impl BlendMode {
    pub const ALL: [BlendMode; 3] = [
        BlendMode::Normal,
        BlendMode::Additive,
        BlendMode::Multiplicative,
    ];
}

/// Read-only access to the per-frame state of a deformable model.
///
/// Indices passed to the per-drawable accessors are always in
/// `0..drawable_count()`.
pub trait Model {
    fn drawable_count(&self) -> usize;

    /// Deformed vertex positions in model space.
    fn vertex_positions(&self, index: usize) -> &[Vec2];

    /// Texture coordinates, one per vertex.
    fn vertex_uvs(&self, index: usize) -> &[Vec2];

    /// Triangle-list indices into the vertex arrays.
    fn vertex_indices(&self, index: usize) -> &[u16];

    /// Draw-order slot of this drawable. Across all drawables the values
    /// must form a permutation of `0..drawable_count()`.
    fn render_order(&self, index: usize) -> i32;

    fn is_visible(&self, index: usize) -> bool;

    /// Whether back faces of this drawable are culled.
    fn is_culling(&self, index: usize) -> bool;

    fn blend_mode(&self, index: usize) -> BlendMode;

    fn opacity(&self, index: usize) -> f32;

    fn multiply_color(&self, index: usize) -> TextureColor;

    fn screen_color(&self, index: usize) -> TextureColor;

    /// Model texture slot sampled by this drawable.
    fn texture_index(&self, index: usize) -> u32;

    /// Ids of the drawables whose shapes form this drawable's clipping mask.
    fn masks(&self, index: usize) -> &[usize];

    /// If true the mask is applied inverted: the drawable shows outside it.
    fn is_inverted_mask(&self, index: usize) -> bool;

    /// Whether the vertex positions changed during the last model update.
    fn vertex_positions_did_change(&self, index: usize) -> bool;

    /// Canvas size in model units.
    fn canvas_size(&self) -> Vec2;

    /// Mask pixels per model unit used by high-precision masking.
    fn pixels_per_unit(&self) -> f32 {
        1.0
    }

    /// True if any drawable is clipped by a mask.
    fn is_using_masking(&self) -> bool {
        (0..self.drawable_count()).any(|i| !self.masks(i).is_empty())
    }
}

/// One drawable's state in a [`ModelSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Drawable {
    pub positions: Vec<Vec2>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    pub visible: bool,
    pub culling: bool,
    pub blend_mode: BlendMode,
    pub opacity: f32,
    pub multiply_color: TextureColor,
    pub screen_color: TextureColor,
    pub texture_index: u32,
    pub masks: Vec<usize>,
    pub inverted_mask: bool,
    pub render_order: i32,
    pub vertex_positions_changed: bool,
}

impl Default for Drawable {
    fn default() -> Self {
        Self {
            positions: Vec::new(),
            uvs: Vec::new(),
            indices: Vec::new(),
            visible: true,
            culling: false,
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            multiply_color: TextureColor::WHITE,
            screen_color: TextureColor::CLEAR,
            texture_index: 0,
            masks: Vec::new(),
            inverted_mask: false,
            render_order: 0,
            vertex_positions_changed: true,
        }
    }
}

impl Drawable {
    /// An axis-aligned quad (two triangles) covering the given rectangle.
    pub fn quad(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            positions: vec![
                Vec2::new(x, y),
                Vec2::new(x + width, y),
                Vec2::new(x + width, y + height),
                Vec2::new(x, y + height),
            ],
            uvs: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(0.0, 1.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
            ..Self::default()
        }
    }

    pub fn with_masks(mut self, masks: impl Into<Vec<usize>>) -> Self {
        self.masks = masks.into();
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn with_render_order(mut self, order: i32) -> Self {
        self.render_order = order;
        self
    }

    pub fn with_blend_mode(mut self, mode: BlendMode) -> Self {
        self.blend_mode = mode;
        self
    }

    pub fn with_inverted_mask(mut self, inverted: bool) -> Self {
        self.inverted_mask = inverted;
        self
    }

    pub fn with_vertex_positions_changed(mut self, changed: bool) -> Self {
        self.vertex_positions_changed = changed;
        self
    }

    pub fn with_culling(mut self, culling: bool) -> Self {
        self.culling = culling;
        self
    }

    pub fn with_texture_index(mut self, slot: u32) -> Self {
        self.texture_index = slot;
        self
    }
}

/// An owned model state: a list of drawables plus model-level properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    #[serde(default = "default_canvas_size")]
    pub canvas_size: Vec2,
    #[serde(default = "default_pixels_per_unit")]
    pub pixels_per_unit: f32,
    pub drawables: Vec<Drawable>,
}

fn default_canvas_size() -> Vec2 {
    Vec2::ONE
}

fn default_pixels_per_unit() -> f32 {
    1.0
}

impl ModelSnapshot {
    /// Builds a snapshot whose render order is the list order.
    pub fn new(drawables: Vec<Drawable>) -> Self {
        let drawables = drawables
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.with_render_order(i as i32))
            .collect();
        Self {
            canvas_size: default_canvas_size(),
            pixels_per_unit: default_pixels_per_unit(),
            drawables,
        }
    }

    /// Builds a snapshot keeping each drawable's own `render_order`.
    pub fn with_explicit_order(drawables: Vec<Drawable>) -> Self {
        Self {
            canvas_size: default_canvas_size(),
            pixels_per_unit: default_pixels_per_unit(),
            drawables,
        }
    }
}

impl Model for ModelSnapshot {
    fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    fn vertex_positions(&self, index: usize) -> &[Vec2] {
        &self.drawables[index].positions
    }

    fn vertex_uvs(&self, index: usize) -> &[Vec2] {
        &self.drawables[index].uvs
    }

    fn vertex_indices(&self, index: usize) -> &[u16] {
        &self.drawables[index].indices
    }

    fn render_order(&self, index: usize) -> i32 {
        self.drawables[index].render_order
    }

    fn is_visible(&self, index: usize) -> bool {
        self.drawables[index].visible
    }

    fn is_culling(&self, index: usize) -> bool {
        self.drawables[index].culling
    }

    fn blend_mode(&self, index: usize) -> BlendMode {
        self.drawables[index].blend_mode
    }

    fn opacity(&self, index: usize) -> f32 {
        self.drawables[index].opacity
    }

    fn multiply_color(&self, index: usize) -> TextureColor {
        self.drawables[index].multiply_color
    }

    fn screen_color(&self, index: usize) -> TextureColor {
        self.drawables[index].screen_color
    }

    fn texture_index(&self, index: usize) -> u32 {
        self.drawables[index].texture_index
    }

    fn masks(&self, index: usize) -> &[usize] {
        &self.drawables[index].masks
    }

    fn is_inverted_mask(&self, index: usize) -> bool {
        self.drawables[index].inverted_mask
    }

    fn vertex_positions_did_change(&self, index: usize) -> bool {
        self.drawables[index].vertex_positions_changed
    }

    fn canvas_size(&self) -> Vec2 {
        self.canvas_size
    }

    fn pixels_per_unit(&self) -> f32 {
        self.pixels_per_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_has_four_vertices_and_two_triangles() {
        let d = Drawable::quad(0.0, 0.0, 2.0, 1.0);
        assert_eq!(d.positions.len(), 4);
        assert_eq!(d.uvs.len(), 4);
        assert_eq!(d.indices.len(), 6);
        assert_eq!(d.positions[2], Vec2::new(2.0, 1.0));
    }

    #[test]
    fn new_snapshot_assigns_list_order() {
        let m = ModelSnapshot::new(vec![
            Drawable::quad(0.0, 0.0, 1.0, 1.0).with_render_order(7),
            Drawable::quad(0.0, 0.0, 1.0, 1.0),
        ]);
        assert_eq!(m.render_order(0), 0);
        assert_eq!(m.render_order(1), 1);
    }

    #[test]
    fn is_using_masking_detects_any_masked_drawable() {
        let plain = ModelSnapshot::new(vec![Drawable::quad(0.0, 0.0, 1.0, 1.0)]);
        assert!(!plain.is_using_masking());

        let masked = ModelSnapshot::new(vec![
            Drawable::quad(0.0, 0.0, 1.0, 1.0),
            Drawable::quad(0.0, 0.0, 1.0, 1.0).with_masks([0]),
        ]);
        assert!(masked.is_using_masking());
    }

    #[test]
    fn drawable_defaults_are_visible_and_changed() {
        let d = Drawable::default();
        assert!(d.visible);
        assert!(d.vertex_positions_changed);
        assert_eq!(d.opacity, 1.0);
        assert_eq!(d.blend_mode, BlendMode::Normal);
    }

    #[test]
    fn snapshot_deserializes_with_defaults() {
        let json = r#"{
            "drawables": [
                { "positions": [[0,0],[1,0],[1,1]], "indices": [0,1,2], "masks": [1] },
                { "blend_mode": "additive", "visible": false, "render_order": 1 }
            ]
        }"#;
        let m: ModelSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(m.drawable_count(), 2);
        assert_eq!(m.masks(0), &[1]);
        assert_eq!(m.blend_mode(1), BlendMode::Additive);
        assert!(!m.is_visible(1));
        assert_eq!(m.canvas_size(), Vec2::ONE);
        assert_eq!(m.pixels_per_unit(), 1.0);
    }

    #[test]
    fn blend_mode_serializes_snake_case() {
        let s = serde_json::to_string(&BlendMode::Multiplicative).unwrap();
        assert_eq!(s, "\"multiplicative\"");
    }
}
