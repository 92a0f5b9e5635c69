//! Per-model renderer: owns the mask buffers and clipping manager of one
//! model and draws it in a single call.
//!
//! [`Renderer::draw_model`] plans the frame with a [`FramePlanner`], saves
//! the caller's GL state, executes each [`FrameCommand`] against glow and
//! restores the saved state.

use std::collections::BTreeMap;

use glam::Mat4;

use super::catalog::{
    DrawSetup, MaskSampling, MaskSetup, ShaderCatalog, VertexStreams, PER_DRAW_USAGE,
};
use super::context::GpuCapabilities;
use super::profile::{
    framebuffer_from_name, GlStateAccess, RenderStateProfile, RenderStateSnapshot,
};
use super::target::{MaskBuffer, MaskPool, MaskTarget};
use super::texture::apply_anisotropy;
use crate::clipping::{ClippingManager, ContextId};
use crate::color::TextureColor;
use crate::config::{coerce_mask_buffer_count, validate_mask_buffer_size, RendererConfig};
use crate::error::RenderError;
use crate::frame::{FrameCommand, FramePlanner};
use crate::model::Model;

/// Draws one model with clipping masks and blend-mode shaders.
pub struct Renderer {
    vao: glow::VertexArray,
    streams: VertexStreams,
    index_buffer: glow::Buffer,
    capabilities: GpuCapabilities,
    textures: BTreeMap<u32, glow::Texture>,
    clipping: Option<ClippingManager>,
    masks: MaskPool<MaskBuffer>,
    premultiplied_alpha: bool,
    anisotropy: f32,
    high_precision_mask: bool,
    model_color: TextureColor,
    mvp: Mat4,
    planner: FramePlanner,
}

impl Renderer {
    /// Creates the shared vertex array and streaming buffers.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Gl` if any GL object cannot be created.
    #[allow(unsafe_code)]
    pub fn new(gl: &glow::Context) -> Result<Self, RenderError> {
        use glow::HasContext;

        // SAFETY: object creation only; nothing is bound.
        let (vao, positions, uvs, index_buffer) = unsafe {
            (
                gl.create_vertex_array().map_err(RenderError::Gl)?,
                gl.create_buffer().map_err(RenderError::Gl)?,
                gl.create_buffer().map_err(RenderError::Gl)?,
                gl.create_buffer().map_err(RenderError::Gl)?,
            )
        };

        let defaults = RendererConfig::default();
        Ok(Self {
            vao,
            streams: VertexStreams { positions, uvs },
            index_buffer,
            capabilities: GpuCapabilities::detect(gl),
            textures: BTreeMap::new(),
            clipping: None,
            masks: MaskPool::new(
                defaults.effective_mask_buffer_count(),
                defaults.mask_buffer_size,
            ),
            premultiplied_alpha: defaults.premultiplied_alpha,
            anisotropy: defaults.anisotropy,
            high_precision_mask: defaults.high_precision_mask,
            model_color: TextureColor::WHITE,
            mvp: Mat4::IDENTITY,
            planner: FramePlanner::new(),
        })
    }

    /// Creates a renderer, applies `config` and initializes it for `model`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidConfiguration` for a zero mask size and
    /// `RenderError::Gl` if GL objects cannot be created.
    pub fn with_config<M: Model>(
        gl: &glow::Context,
        model: &M,
        config: &RendererConfig,
    ) -> Result<Self, RenderError> {
        let mut renderer = Self::new(gl)?;
        validate_mask_buffer_size(config.mask_buffer_size[0], config.mask_buffer_size[1])?;
        renderer.masks.set_size(config.mask_buffer_size);
        renderer.premultiplied_alpha = config.premultiplied_alpha;
        renderer.high_precision_mask = config.high_precision_mask;
        renderer.set_anisotropy(config.anisotropy);
        renderer.initialize(gl, model, config.mask_buffer_count)?;
        Ok(renderer)
    }

    /// Builds the clipping manager and mask buffers for `model`.
    ///
    /// `mask_buffer_count` below 1 is coerced to 1 with a warning. Models
    /// without masked drawables get neither.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Gl` if a mask buffer cannot be created.
    pub fn initialize<M: Model>(
        &mut self,
        gl: &glow::Context,
        model: &M,
        mask_buffer_count: i32,
    ) -> Result<(), RenderError> {
        self.masks.set_count(coerce_mask_buffer_count(mask_buffer_count));
        self.masks.release(|buffer| buffer.destroy(gl));

        if !model.is_using_masking() {
            self.clipping = None;
            return Ok(());
        }

        self.clipping = Some(ClippingManager::new(
            model,
            self.masks.count(),
            self.masks.size(),
        ));
        self.rebuild_mask_buffers(gl)
    }

    /// Changes the pixel size of the mask buffers and rebuilds the clipping
    /// manager. The buffers themselves are recreated on the next draw.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::InvalidConfiguration` if either side is zero.
    pub fn set_clipping_mask_buffer_size<M: Model>(
        &mut self,
        model: &M,
        width: u32,
        height: u32,
    ) -> Result<(), RenderError> {
        validate_mask_buffer_size(width, height)?;
        self.masks.set_size([width, height]);
        if self.clipping.is_some() {
            self.clipping = Some(ClippingManager::new(
                model,
                self.masks.count(),
                self.masks.size(),
            ));
        }
        Ok(())
    }

    pub fn clipping_mask_buffer_size(&self) -> [u32; 2] {
        self.masks.size()
    }

    pub fn mask_buffer_count(&self) -> usize {
        self.masks.count()
    }

    /// Associates a host texture with a model texture slot.
    pub fn bind_texture(&mut self, slot: u32, texture: glow::Texture) {
        self.textures.insert(slot, texture);
    }

    pub fn unbind_texture(&mut self, slot: u32) -> Option<glow::Texture> {
        self.textures.remove(&slot)
    }

    pub fn set_premultiplied_alpha(&mut self, premultiplied: bool) {
        self.premultiplied_alpha = premultiplied;
    }

    pub fn is_premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    /// Sets the anisotropic filtering level applied to bound textures,
    /// clamped to what the driver supports. 0 disables it.
    pub fn set_anisotropy(&mut self, level: f32) {
        self.anisotropy = self.capabilities.clamp_anisotropy(level);
    }

    pub fn anisotropy(&self) -> f32 {
        self.anisotropy
    }

    pub fn set_high_precision_mask(&mut self, enabled: bool) {
        self.high_precision_mask = enabled;
    }

    pub fn is_high_precision_mask(&self) -> bool {
        self.high_precision_mask
    }

    /// RGBA multiplier applied to every drawable.
    pub fn set_model_color(&mut self, color: TextureColor) {
        self.model_color = color;
    }

    pub fn model_color(&self) -> TextureColor {
        self.model_color
    }

    pub fn set_mvp_matrix(&mut self, mvp: Mat4) {
        self.mvp = mvp;
    }

    pub fn mvp_matrix(&self) -> Mat4 {
        self.mvp
    }

    pub fn clipping_manager(&self) -> Option<&ClippingManager> {
        self.clipping.as_ref()
    }

    /// Draws `model` into the currently bound framebuffer.
    ///
    /// Never fails: per-draw problems skip the affected drawable and are
    /// logged, and the caller's GL state is restored in every case.
    pub fn draw_model<M: Model>(&mut self, gl: &glow::Context, catalog: &mut ShaderCatalog, model: &M) {
        self.refresh_mask_buffers(gl);
        self.planner
            .plan(model, self.clipping.as_mut(), self.high_precision_mask);

        let this = &*self;
        let mut profile = RenderStateProfile::new();
        play_frame(gl, &mut profile, this.planner.commands(), |command, saved| {
            this.execute(gl, catalog, model, command, saved);
        });
    }

    /// Deletes every GL object this renderer created. Bound textures
    /// belong to the host and are left alone.
    #[allow(unsafe_code)]
    pub fn destroy(&mut self, gl: &glow::Context) {
        use glow::HasContext;

        self.masks.release(|buffer| buffer.destroy(gl));
        // SAFETY: handles were created in new() and are deleted once here.
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.streams.positions);
            gl.delete_buffer(self.streams.uvs);
            gl.delete_buffer(self.index_buffer);
        }
    }

    /// Creates the mask buffers at the requested count and size. Every
    /// mask is regenerated afterwards since the new buffers start empty.
    fn rebuild_mask_buffers(&mut self, gl: &glow::Context) -> Result<(), RenderError> {
        self.masks.rebuild(
            |[width, height]| MaskBuffer::new(gl, width, height),
            |buffer| buffer.destroy(gl),
        )?;
        if let Some(clipping) = self.clipping.as_mut() {
            clipping.invalidate();
        }
        Ok(())
    }

    /// Recreates the mask buffers if their count or size no longer matches
    /// the configuration.
    fn refresh_mask_buffers(&mut self, gl: &glow::Context) {
        if self.clipping.is_none() || !self.masks.needs_rebuild() {
            return;
        }

        let [width, height] = self.masks.size();
        tracing::debug!(count = self.masks.count(), width, height, "recreating mask buffers");
        if let Err(err) = self.rebuild_mask_buffers(gl) {
            tracing::error!(error = %err, "failed to recreate mask buffers, masked drawables will be skipped");
        }
    }

    #[allow(unsafe_code)]
    fn execute<M: Model>(
        &self,
        gl: &glow::Context,
        catalog: &mut ShaderCatalog,
        model: &M,
        command: FrameCommand,
        saved: &RenderStateSnapshot,
    ) {
        use glow::HasContext;

        match command {
            FrameCommand::PreDraw => self.pre_draw(gl),
            FrameCommand::SetMaskViewport => {
                let [w, h] = self.masks.size();
                // SAFETY: plain state change.
                unsafe { gl.viewport(0, 0, w as i32, h as i32) };
            }
            FrameCommand::RestoreViewport => {
                let [x, y, w, h] = saved.viewport;
                // SAFETY: plain state change.
                unsafe { gl.viewport(x, y, w, h) };
            }
            FrameCommand::BeginMask { buffer } => {
                if let Some(target) = self.masks.get(buffer) {
                    target.begin_draw(gl);
                }
            }
            FrameCommand::EndMask { buffer } => {
                if let Some(target) = self.masks.get(buffer) {
                    target.end_draw(gl, framebuffer_from_name(saved.framebuffer));
                }
            }
            FrameCommand::ClearMask { buffer } => {
                if let Some(target) = self.masks.get(buffer) {
                    target.clear(gl);
                }
            }
            FrameCommand::DrawMask {
                drawable,
                context,
                culling,
            } => self.draw_mask(gl, catalog, model, drawable, context, culling),
            FrameCommand::Draw {
                drawable,
                context,
                culling,
            } => self.draw_drawable(gl, catalog, model, drawable, context, culling),
            FrameCommand::PostDraw => unbind_mesh(gl),
        }
    }

    fn pre_draw(&self, gl: &glow::Context) {
        reset_pass_state(gl);
        if self.anisotropy > 0.0 {
            for &texture in self.textures.values() {
                apply_anisotropy(gl, texture, self.anisotropy);
            }
        }
    }

    fn draw_mask<M: Model>(
        &self,
        gl: &glow::Context,
        catalog: &mut ShaderCatalog,
        model: &M,
        drawable: usize,
        context: ContextId,
        culling: bool,
    ) {
        let inputs = draw_inputs(
            &self.textures,
            model.texture_index(drawable),
            Some(context),
            |id| self.clipping.as_ref().and_then(|c| c.context(id)),
        );
        let Some((texture, Some(ctx))) = usable(drawable, inputs) else {
            return;
        };

        self.bind_mesh(gl, model, drawable, culling);
        let setup = MaskSetup {
            texture,
            positions: model.vertex_positions(drawable),
            uvs: model.vertex_uvs(drawable),
            matrix_for_mask: ctx.matrix_for_mask(),
            channel: ctx.channel(),
            layout_bounds: ctx.layout_bounds(),
        };
        if catalog.setup_for_mask(gl, self.streams, &setup) {
            draw_elements(gl, model.vertex_indices(drawable).len());
        }
        unbind_mesh(gl);
    }

    fn draw_drawable<M: Model>(
        &self,
        gl: &glow::Context,
        catalog: &mut ShaderCatalog,
        model: &M,
        drawable: usize,
        context: Option<ContextId>,
        culling: bool,
    ) {
        let inputs = draw_inputs(&self.textures, model.texture_index(drawable), context, |id| {
            let ctx = self.clipping.as_ref()?.context(id)?;
            let buffer = self.masks.get(ctx.buffer_index())?;
            Some(MaskSampling {
                texture: buffer.color_buffer(),
                matrix_for_draw: ctx.matrix_for_draw(),
                channel: ctx.channel(),
                inverted: model.is_inverted_mask(drawable),
            })
        });
        let Some((texture, mask)) = usable(drawable, inputs) else {
            return;
        };

        self.bind_mesh(gl, model, drawable, culling);
        let setup = DrawSetup {
            texture,
            positions: model.vertex_positions(drawable),
            uvs: model.vertex_uvs(drawable),
            blend_mode: model.blend_mode(drawable),
            premultiplied: self.premultiplied_alpha,
            mvp: self.mvp,
            base_color: self
                .model_color
                .with_opacity(model.opacity(drawable), self.premultiplied_alpha),
            multiply_color: model.multiply_color(drawable),
            screen_color: model.screen_color(drawable),
            mask,
        };
        if catalog.setup_for_draw(gl, self.streams, &setup) {
            draw_elements(gl, model.vertex_indices(drawable).len());
        }
        unbind_mesh(gl);
    }

    /// Sets culling, binds the shared vertex array and streams the index
    /// data of `drawable`.
    #[allow(unsafe_code)]
    fn bind_mesh<M: Model>(&self, gl: &glow::Context, model: &M, drawable: usize, culling: bool) {
        use glow::HasContext;

        set_culling(gl, culling);
        // SAFETY: vao and index_buffer are live objects created in new().
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.index_buffer));
            gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                bytemuck::cast_slice(model.vertex_indices(drawable)),
                PER_DRAW_USAGE,
            );
        }
    }
}

/// Runs `commands` between a save and a restore of the caller's GL state.
///
/// `execute` also receives the saved snapshot, which holds the framebuffer
/// and viewport the mask pass returns to.
fn play_frame<G: GlStateAccess + ?Sized>(
    gl: &G,
    profile: &mut RenderStateProfile,
    commands: &[FrameCommand],
    mut execute: impl FnMut(FrameCommand, &RenderStateSnapshot),
) {
    profile.save(gl);
    if let Some(saved) = profile.saved().copied() {
        for &command in commands {
            execute(command, &saved);
        }
    }
    profile.restore(gl);
}

/// Puts the pipeline into the state every pass draws with.
fn reset_pass_state<G: GlStateAccess + ?Sized>(gl: &G) {
    gl.write_enabled(glow::SCISSOR_TEST, false);
    gl.write_enabled(glow::STENCIL_TEST, false);
    gl.write_enabled(glow::DEPTH_TEST, false);
    gl.write_enabled(glow::BLEND, true);
    gl.write_color_mask([true; 4]);
    gl.write_buffer(glow::ELEMENT_ARRAY_BUFFER, 0);
    gl.write_buffer(glow::ARRAY_BUFFER, 0);
}

fn set_culling<G: GlStateAccess + ?Sized>(gl: &G, culling: bool) {
    gl.write_enabled(glow::CULL_FACE, culling);
    gl.write_front_face(glow::CCW);
}

fn unbind_mesh<G: GlStateAccess + ?Sized>(gl: &G) {
    gl.write_vertex_array(0);
    gl.write_program(0);
}

/// Why a draw command drew nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    UnboundTexture { slot: u32 },
    MaskUnavailable { context: ContextId },
}

/// Resolves the texture bound to `slot` and, for a masked draw, the mask
/// `mask_for` finds for the context. The texture is checked first.
fn draw_inputs<T: Copy, S>(
    textures: &BTreeMap<u32, T>,
    slot: u32,
    context: Option<ContextId>,
    mask_for: impl FnOnce(ContextId) -> Option<S>,
) -> Result<(T, Option<S>), Skip> {
    let texture = textures
        .get(&slot)
        .copied()
        .ok_or(Skip::UnboundTexture { slot })?;
    let mask = match context {
        None => None,
        Some(id) => Some(mask_for(id).ok_or(Skip::MaskUnavailable { context: id })?),
    };
    Ok((texture, mask))
}

fn usable<T>(drawable: usize, inputs: Result<T, Skip>) -> Option<T> {
    match inputs {
        Ok(inputs) => Some(inputs),
        Err(skip) => {
            tracing::debug!(drawable, reason = ?skip, "skipping draw");
            None
        }
    }
}

#[allow(unsafe_code)]
fn draw_elements(gl: &glow::Context, count: usize) {
    use glow::HasContext;

    // SAFETY: the element buffer bound by bind_mesh holds `count` indices.
    unsafe { gl.draw_elements(glow::TRIANGLES, count as i32, glow::UNSIGNED_SHORT, 0) };
}
