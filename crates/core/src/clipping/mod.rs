//! Clipping-mask management.
//!
//! Drawables that are clipped by the same set of drawables share one
//! [`ClippingContext`]. Each frame the manager measures the visible
//! clipped geometry of every context, packs the in-use contexts into the
//! mask buffers ([`layout`]), derives the generation and sampling matrices
//! ([`matrix`]) and emits the mask-generation commands for the frame plan.

pub mod layout;
pub mod matrix;

use std::collections::HashMap;

use glam::Vec2;
use serde::Serialize;

use crate::frame::FrameCommand;
use crate::model::Model;
use crate::rect::Rect;

pub use layout::{layout_contexts, LayoutSlot, CHANNELS_PER_BUFFER};
pub use matrix::{expand_with_margin, MaskMatrices, MARGIN};

/// Index of a context in its manager's arena.
///
/// Only meaningful for the manager that issued it; rebuilding the manager
/// invalidates every id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ContextId(pub usize);

/// One unique set of clip drawables and the drawables it masks.
#[derive(Debug, Clone)]
pub struct ClippingContext {
    clip_ids: Vec<usize>,
    clipped_drawables: Vec<usize>,
    bounds: Rect,
    slot: LayoutSlot,
    matrices: MaskMatrices,
    is_using: bool,
    generated: Option<Generation>,
}

/// Where and with which matrix a context's mask was last drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Generation {
    slot: LayoutSlot,
    for_mask: glam::Mat4,
}

impl ClippingContext {
    fn new(clip_ids: Vec<usize>) -> Self {
        Self {
            clip_ids,
            clipped_drawables: Vec::new(),
            bounds: Rect::default(),
            slot: LayoutSlot {
                buffer: 0,
                channel: 0,
                bounds: Rect::UNIT,
            },
            matrices: MaskMatrices::default(),
            is_using: false,
            generated: None,
        }
    }

    /// Drawables whose shapes form the mask, deduplicated.
    pub fn clip_ids(&self) -> &[usize] {
        &self.clip_ids
    }

    /// Drawables sampling this mask.
    pub fn clipped_drawables(&self) -> &[usize] {
        &self.clipped_drawables
    }

    /// Model-space rectangle enclosing the visible clipped drawables.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn buffer_index(&self) -> usize {
        self.slot.buffer
    }

    pub fn channel(&self) -> usize {
        self.slot.channel
    }

    /// Cell of the mask buffer this context occupies, in `[0, 1]²`.
    pub fn layout_bounds(&self) -> Rect {
        self.slot.bounds
    }

    pub fn matrix_for_mask(&self) -> glam::Mat4 {
        self.matrices.for_mask
    }

    pub fn matrix_for_draw(&self) -> glam::Mat4 {
        self.matrices.for_draw
    }

    /// True if at least one clipped drawable is visible with geometry this
    /// frame.
    pub fn is_using(&self) -> bool {
        self.is_using
    }

    fn current_generation(&self) -> Generation {
        Generation {
            slot: self.slot,
            for_mask: self.matrices.for_mask,
        }
    }
}

/// Owns the clipping contexts of one model and lays them out each frame.
#[derive(Debug, Clone)]
pub struct ClippingManager {
    contexts: Vec<ClippingContext>,
    context_for_drawable: Vec<Option<ContextId>>,
    buffer_count: usize,
    mask_size: [u32; 2],
    cleared: Vec<bool>,
}

impl ClippingManager {
    /// Groups the model's masked drawables by their clip-id set.
    ///
    /// Sets compare order-independently. Clip ids outside the model are
    /// dropped with a warning; a drawable left with no valid clip id is
    /// drawn unmasked.
    pub fn new<M: Model>(model: &M, buffer_count: usize, mask_size: [u32; 2]) -> Self {
        let drawable_count = model.drawable_count();
        let mut contexts: Vec<ClippingContext> = Vec::new();
        let mut context_for_drawable = vec![None; drawable_count];
        let mut by_key: HashMap<Vec<usize>, ContextId> = HashMap::new();

        for drawable in 0..drawable_count {
            let masks = model.masks(drawable);
            if masks.is_empty() {
                continue;
            }

            let mut clip_ids: Vec<usize> = Vec::with_capacity(masks.len());
            for &clip in masks {
                if clip >= drawable_count {
                    tracing::warn!(drawable, clip, drawable_count, "clip id out of range, ignoring");
                    continue;
                }
                if !clip_ids.contains(&clip) {
                    clip_ids.push(clip);
                }
            }
            if clip_ids.is_empty() {
                continue;
            }

            let mut key = clip_ids.clone();
            key.sort_unstable();
            let id = *by_key.entry(key).or_insert_with(|| {
                contexts.push(ClippingContext::new(clip_ids));
                ContextId(contexts.len() - 1)
            });
            contexts[id.0].clipped_drawables.push(drawable);
            context_for_drawable[drawable] = Some(id);
        }

        tracing::debug!(
            contexts = contexts.len(),
            buffers = buffer_count,
            "clipping manager initialized"
        );

        Self {
            contexts,
            context_for_drawable,
            buffer_count: buffer_count.max(1),
            mask_size,
            cleared: Vec::new(),
        }
    }

    pub fn contexts(&self) -> &[ClippingContext] {
        &self.contexts
    }

    pub fn context(&self, id: ContextId) -> Option<&ClippingContext> {
        self.contexts.get(id.0)
    }

    /// The context masking `drawable`, if any.
    pub fn context_for_drawable(&self, drawable: usize) -> Option<ContextId> {
        self.context_for_drawable.get(drawable).copied().flatten()
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_count
    }

    /// Pixel size of every mask buffer.
    pub fn mask_size(&self) -> [u32; 2] {
        self.mask_size
    }

    /// Forgets which masks are already generated, forcing regeneration on
    /// the next frame. Call after the mask buffers are recreated.
    pub fn invalidate(&mut self) {
        for context in &mut self.contexts {
            context.generated = None;
        }
    }

    /// Prepares the batch mask pass and appends its commands.
    ///
    /// Emits nothing when no context is in use. Otherwise the mask
    /// viewport is set, each dirty buffer is cleared once and its clip
    /// drawables are drawn, and the caller's viewport is restored. A
    /// buffer is dirty when any context on it was not generated at its
    /// current slot with its current mask matrix, or any of its clip
    /// drawables moved.
    pub fn setup_clipping_context<M: Model>(&mut self, model: &M, commands: &mut Vec<FrameCommand>) {
        let using = self.update_bounds(model);
        if using == 0 {
            return;
        }

        commands.push(FrameCommand::SetMaskViewport);
        commands.push(FrameCommand::BeginMask { buffer: 0 });
        commands.push(FrameCommand::PreDraw);

        let in_use: Vec<usize> = (0..self.contexts.len())
            .filter(|&i| self.contexts[i].is_using)
            .collect();
        let slots = layout_contexts(in_use.len(), self.buffer_count);
        for (&index, slot) in in_use.iter().zip(slots) {
            let context = &mut self.contexts[index];
            context.slot = slot;
            context.matrices = matrix::fit_to_layout(&context.bounds, &slot.bounds);
        }

        self.cleared.clear();
        self.cleared.resize(self.buffer_count, false);
        let mut dirty = vec![false; self.buffer_count];
        for &index in &in_use {
            let context = &self.contexts[index];
            let moved = context
                .clip_ids
                .iter()
                .any(|&clip| model.vertex_positions_did_change(clip));
            if moved || context.generated != Some(context.current_generation()) {
                dirty[context.slot.buffer] = true;
            }
        }

        let mut current = 0;
        for &index in &in_use {
            let context = &mut self.contexts[index];
            let buffer = context.slot.buffer;
            if buffer != current {
                commands.push(FrameCommand::EndMask { buffer: current });
                commands.push(FrameCommand::BeginMask { buffer });
                commands.push(FrameCommand::PreDraw);
                current = buffer;
            }

            if !dirty[buffer] {
                continue;
            }
            for &clip in &context.clip_ids {
                if !self.cleared[buffer] {
                    commands.push(FrameCommand::ClearMask { buffer });
                    self.cleared[buffer] = true;
                }
                commands.push(FrameCommand::DrawMask {
                    drawable: clip,
                    context: ContextId(index),
                    culling: model.is_culling(clip),
                });
            }
            context.generated = Some(context.current_generation());
        }

        commands.push(FrameCommand::EndMask { buffer: current });
        commands.push(FrameCommand::RestoreViewport);
    }

    /// Prepares high-precision masking: every in-use context gets the
    /// whole of buffer 0, channel 0, and is regenerated right before the
    /// drawable that samples it.
    pub fn setup_matrix_for_high_precision<M: Model>(&mut self, model: &M) {
        self.update_bounds(model);
        let pixels_per_unit = model.pixels_per_unit();
        let full = LayoutSlot {
            buffer: 0,
            channel: 0,
            bounds: Rect::UNIT,
        };
        for context in self.contexts.iter_mut().filter(|c| c.is_using) {
            context.slot = full;
            context.matrices = matrix::fit_high_precision(
                &context.bounds,
                &full.bounds,
                self.mask_size,
                pixels_per_unit,
            );
            context.generated = None;
        }
    }

    /// Recomputes every context's bounds over its visible clipped
    /// drawables and returns how many contexts are in use.
    fn update_bounds<M: Model>(&mut self, model: &M) -> usize {
        let mut using = 0;
        for context in &mut self.contexts {
            let mut min = Vec2::splat(f32::MAX);
            let mut max = Vec2::splat(f32::MIN);
            let mut found = false;
            for &drawable in &context.clipped_drawables {
                if !model.is_visible(drawable) {
                    continue;
                }
                for &p in model.vertex_positions(drawable) {
                    min = min.min(p);
                    max = max.max(p);
                    found = true;
                }
            }

            context.is_using = found;
            if found {
                context.bounds = Rect::from_min_max(min.x, min.y, max.x, max.y);
                using += 1;
            } else {
                context.bounds = Rect::default();
                context.generated = None;
            }
        }
        using
    }
}
