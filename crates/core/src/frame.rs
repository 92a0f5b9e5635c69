//! Frame planning.
//!
//! A frame is first planned as an ordered list of [`FrameCommand`]s
//! without touching GL, then executed by the renderer. Ordering, skipping
//! and mask-generation decisions all live here.

use serde::Serialize;

use crate::clipping::{ClippingManager, ContextId};
use crate::error::RenderError;
use crate::model::Model;

/// One step of a planned frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FrameCommand {
    /// Reset the per-pass GL state (toggles, color mask, buffer bindings).
    PreDraw,
    /// Set the viewport to the mask-buffer size.
    SetMaskViewport,
    /// Restore the caller's viewport captured at frame start.
    RestoreViewport,
    /// Bind a mask buffer as the render target.
    BeginMask { buffer: usize },
    /// Rebind the caller's framebuffer.
    EndMask { buffer: usize },
    /// Clear a mask buffer to opaque white.
    ClearMask { buffer: usize },
    /// Draw a clip drawable into its context's mask cell.
    DrawMask {
        drawable: usize,
        context: ContextId,
        culling: bool,
    },
    /// Draw a drawable to the caller's target, sampling its mask if any.
    Draw {
        drawable: usize,
        context: Option<ContextId>,
        culling: bool,
    },
    PostDraw,
}

/// Fills `sorted` so that `sorted[order[i]] == i`.
///
/// # Errors
///
/// Returns `RenderError::InvalidRenderOrder` unless the model's render
/// orders form a permutation of `0..drawable_count`.
pub fn sort_by_render_order<M: Model>(model: &M, sorted: &mut Vec<usize>) -> Result<(), RenderError> {
    let count = model.drawable_count();
    sorted.clear();
    sorted.resize(count, usize::MAX);
    for drawable in 0..count {
        let order = model.render_order(drawable);
        let slot = usize::try_from(order)
            .ok()
            .filter(|&slot| slot < count)
            .ok_or_else(|| {
                RenderError::InvalidRenderOrder(format!(
                    "drawable {drawable} has render order {order}, expected 0..{count}"
                ))
            })?;
        if sorted[slot] != usize::MAX {
            return Err(RenderError::InvalidRenderOrder(format!(
                "drawables {} and {drawable} share render order {order}",
                sorted[slot]
            )));
        }
        sorted[slot] = drawable;
    }
    Ok(())
}

/// Plans frames, reusing its scratch buffers between calls.
#[derive(Debug, Default, Clone)]
pub struct FramePlanner {
    sorted: Vec<usize>,
    commands: Vec<FrameCommand>,
}

impl FramePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plans one frame of `model`.
    ///
    /// With a clipping manager the masks are prepared first: one batch pass
    /// up front, or with `high_precision` a regeneration right before each
    /// masked draw. An invalid render order drops the main pass and logs the
    /// error; the plan stays well-formed.
    pub fn plan<M: Model>(
        &mut self,
        model: &M,
        mut clipping: Option<&mut ClippingManager>,
        high_precision: bool,
    ) -> &[FrameCommand] {
        self.commands.clear();

        if let Some(manager) = clipping.as_deref_mut() {
            if high_precision {
                manager.setup_matrix_for_high_precision(model);
            } else {
                manager.setup_clipping_context(model, &mut self.commands);
            }
        }

        self.commands.push(FrameCommand::PreDraw);

        if let Err(err) = sort_by_render_order(model, &mut self.sorted) {
            tracing::error!(error = %err, "skipping main pass");
            self.commands.push(FrameCommand::PostDraw);
            return &self.commands;
        }

        let clipping = clipping.as_deref();
        for &drawable in &self.sorted {
            if !model.is_visible(drawable) {
                continue;
            }

            let context = clipping.and_then(|m| m.context_for_drawable(drawable));
            if high_precision {
                if let (Some(manager), Some(id)) = (clipping, context) {
                    push_high_precision_mask(&mut self.commands, model, manager, id);
                }
            }

            self.commands.push(FrameCommand::Draw {
                drawable,
                context,
                culling: model.is_culling(drawable),
            });
        }

        self.commands.push(FrameCommand::PostDraw);
        &self.commands
    }

    /// The most recent plan.
    pub fn commands(&self) -> &[FrameCommand] {
        &self.commands
    }
}

fn push_high_precision_mask<M: Model>(
    commands: &mut Vec<FrameCommand>,
    model: &M,
    manager: &ClippingManager,
    id: ContextId,
) {
    let Some(context) = manager.context(id) else {
        return;
    };
    if !context.is_using() {
        return;
    }

    let buffer = context.buffer_index();
    commands.push(FrameCommand::SetMaskViewport);
    commands.push(FrameCommand::PreDraw);
    commands.push(FrameCommand::BeginMask { buffer });
    commands.push(FrameCommand::ClearMask { buffer });
    for &clip in context.clip_ids() {
        commands.push(FrameCommand::DrawMask {
            drawable: clip,
            context: id,
            culling: model.is_culling(clip),
        });
    }
    commands.push(FrameCommand::EndMask { buffer });
    commands.push(FrameCommand::RestoreViewport);
    commands.push(FrameCommand::PreDraw);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Drawable, ModelSnapshot};

    fn quad() -> Drawable {
        Drawable::quad(0.0, 0.0, 1.0, 1.0)
    }

    fn drawn(commands: &[FrameCommand]) -> Vec<usize> {
        commands
            .iter()
            .filter_map(|c| match c {
                FrameCommand::Draw { drawable, .. } => Some(*drawable),
                _ => None,
            })
            .collect()
    }

    fn mentions(commands: &[FrameCommand], index: usize) -> bool {
        commands.iter().any(|c| match c {
            FrameCommand::Draw { drawable, .. } | FrameCommand::DrawMask { drawable, .. } => {
                *drawable == index
            }
            _ => false,
        })
    }

    #[test]
    fn scatter_inverts_render_order() {
        let model = ModelSnapshot::with_explicit_order(vec![
            quad().with_render_order(2),
            quad().with_render_order(0),
            quad().with_render_order(1),
        ]);
        let mut sorted = Vec::new();
        sort_by_render_order(&model, &mut sorted).unwrap();
        assert_eq!(sorted, vec![1, 2, 0]);
    }

    #[test]
    fn duplicate_render_order_is_rejected() {
        let model = ModelSnapshot::with_explicit_order(vec![
            quad().with_render_order(0),
            quad().with_render_order(0),
        ]);
        let err = sort_by_render_order(&model, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, RenderError::InvalidRenderOrder(_)), "got {err:?}");
    }

    #[test]
    fn out_of_range_render_order_is_rejected() {
        for bad in [-1, 2, i32::MAX] {
            let model = ModelSnapshot::with_explicit_order(vec![
                quad().with_render_order(0),
                quad().with_render_order(bad),
            ]);
            let err = sort_by_render_order(&model, &mut Vec::new()).unwrap_err();
            assert!(matches!(err, RenderError::InvalidRenderOrder(_)), "order {bad}: {err:?}");
        }
    }

    #[test]
    fn unmasked_frame_is_predraw_draws_postdraw() {
        let model = ModelSnapshot::new(vec![quad(), quad()]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, None, false);
        assert_eq!(
            plan,
            &[
                FrameCommand::PreDraw,
                FrameCommand::Draw { drawable: 0, context: None, culling: false },
                FrameCommand::Draw { drawable: 1, context: None, culling: false },
                FrameCommand::PostDraw,
            ]
        );
    }

    #[test]
    fn draws_follow_render_order() {
        let model = ModelSnapshot::with_explicit_order(vec![
            quad().with_render_order(1),
            quad().with_render_order(2),
            quad().with_render_order(0),
        ]);
        let mut planner = FramePlanner::new();
        assert_eq!(drawn(planner.plan(&model, None, false)), vec![2, 0, 1]);
    }

    #[test]
    fn invalid_order_skips_main_pass() {
        let model = ModelSnapshot::with_explicit_order(vec![
            quad().with_render_order(1),
            quad().with_render_order(1),
        ]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, None, false);
        assert_eq!(plan, &[FrameCommand::PreDraw, FrameCommand::PostDraw]);
    }

    #[test]
    fn invisible_drawables_are_skipped() {
        let model = ModelSnapshot::new(vec![quad(), quad().with_visible(false), quad()]);
        let mut planner = FramePlanner::new();
        assert_eq!(drawn(planner.plan(&model, None, false)), vec![0, 2]);
    }

    #[test]
    fn masked_draw_references_its_context() {
        let model = ModelSnapshot::new(vec![quad(), quad().with_masks([0])]);
        let mut manager = ClippingManager::new(&model, 1, [256, 256]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, Some(&mut manager), false);
        assert!(plan.contains(&FrameCommand::Draw {
            drawable: 1,
            context: Some(ContextId(0)),
            culling: false,
        }));
        assert_eq!(plan.first(), Some(&FrameCommand::SetMaskViewport));
    }

    #[test]
    fn high_precision_regenerates_before_each_masked_draw() {
        let model = ModelSnapshot::new(vec![
            quad(),
            quad().with_masks([0]),
            quad().with_masks([0]),
        ]);
        let mut manager = ClippingManager::new(&model, 1, [256, 256]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, Some(&mut manager), true).to_vec();

        let clears = plan
            .iter()
            .filter(|c| matches!(c, FrameCommand::ClearMask { .. }))
            .count();
        assert_eq!(clears, 2);

        let draw_1 = plan
            .iter()
            .position(|c| matches!(c, FrameCommand::Draw { drawable: 1, .. }))
            .unwrap();
        assert_eq!(plan[draw_1 - 1], FrameCommand::PreDraw);
        assert_eq!(plan[draw_1 - 2], FrameCommand::RestoreViewport);
        assert_eq!(plan[draw_1 - 3], FrameCommand::EndMask { buffer: 0 });
        assert_eq!(
            plan[draw_1 - 4],
            FrameCommand::DrawMask { drawable: 0, context: ContextId(0), culling: false }
        );
    }

    #[test]
    fn high_precision_skips_unused_contexts() {
        let model = ModelSnapshot::new(vec![quad(), quad().with_masks([0]).with_visible(false)]);
        let mut manager = ClippingManager::new(&model, 1, [256, 256]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, Some(&mut manager), true);
        assert!(!plan.iter().any(|c| matches!(c, FrameCommand::BeginMask { .. })));
    }

    #[test]
    fn frame_without_masks_has_no_mask_commands() {
        let model = ModelSnapshot::new(vec![quad(), quad().with_masks([0]).with_visible(false)]);
        let mut manager = ClippingManager::new(&model, 1, [256, 256]);
        let mut planner = FramePlanner::new();
        let plan = planner.plan(&model, Some(&mut manager), false);
        assert!(!plan.iter().any(|c| matches!(
            c,
            FrameCommand::SetMaskViewport
                | FrameCommand::BeginMask { .. }
                | FrameCommand::ClearMask { .. }
        )));
    }

    #[test]
    fn planned_commands_serialize_with_op_tag() {
        let json = serde_json::to_string(&FrameCommand::BeginMask { buffer: 2 }).unwrap();
        assert_eq!(json, r#"{"op":"begin_mask","buffer":2}"#);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Strategy for a drawable: visibility, plus an optional clip id
        /// that is reduced modulo the drawable count.
        fn drawable_strategy() -> impl Strategy<Value = (bool, Option<usize>)> {
            (any::<bool>(), prop::option::of(0_usize..64))
        }

        fn build(shapes: &[(bool, Option<usize>)], order: &[usize]) -> ModelSnapshot {
            let n = shapes.len();
            let drawables = shapes
                .iter()
                .zip(order)
                .map(|(&(visible, clip), &slot)| {
                    let mut d = quad().with_visible(visible).with_render_order(slot as i32);
                    if let Some(clip) = clip {
                        d = d.with_masks([clip % n]);
                    }
                    d
                })
                .collect();
            ModelSnapshot::with_explicit_order(drawables)
        }

        proptest! {
            #[test]
            fn scatter_satisfies_inverse_permutation(
                order in (1_usize..64).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
            ) {
                let drawables = order
                    .iter()
                    .map(|&o| quad().with_render_order(o as i32))
                    .collect();
                let model = ModelSnapshot::with_explicit_order(drawables);
                let mut sorted = Vec::new();
                sort_by_render_order(&model, &mut sorted).unwrap();
                for (i, &o) in order.iter().enumerate() {
                    prop_assert_eq!(sorted[o], i);
                }
            }

            #[test]
            fn invisible_drawables_never_draw(
                (shapes, order) in prop::collection::vec(drawable_strategy(), 1..24)
                    .prop_flat_map(|shapes| {
                        let n = shapes.len();
                        (Just(shapes), Just((0..n).collect::<Vec<_>>()).prop_shuffle())
                    }),
                high_precision in any::<bool>(),
            ) {
                let model = build(&shapes, &order);
                let mut manager = ClippingManager::new(&model, 2, [256, 256]);
                let mut planner = FramePlanner::new();
                let plan = planner.plan(&model, Some(&mut manager), high_precision);

                let drawn = drawn(plan);
                for (index, &(visible, _)) in shapes.iter().enumerate() {
                    prop_assert_eq!(drawn.contains(&index), visible, "drawable {}", index);

                    let is_clip_source = model
                        .drawables
                        .iter()
                        .any(|d| d.masks.contains(&index));
                    if !visible && !is_clip_source {
                        prop_assert!(!mentions(plan, index), "drawable {} in {:?}", index, plan);
                    }
                }
            }
        }
    }
}
