//! The shader catalog: lazy compilation and per-draw parameterization.
//!
//! A [`ShaderCatalog`] is created by the host, shared by reference across
//! renderers, and destroyed explicitly. The first setup call compiles all
//! seven programs; the 19 catalog variants map onto them through
//! [`variant::program_slot`](crate::variant::program_slot).

use glam::{Mat4, Vec2};

use super::shader::{check_program, load_program};
use crate::color::TextureColor;
use crate::model::BlendMode;
use crate::variant::{self, BlendFactor, BlendFunc, MaskState, ProgramKind, PROGRAM_COUNT};

/// Attribute and uniform locations of one linked program.
#[derive(Debug, Clone)]
struct ProgramEntry {
    program: glow::Program,
    a_position: Option<u32>,
    a_tex_coord: Option<u32>,
    s_texture0: Option<glow::UniformLocation>,
    s_texture1: Option<glow::UniformLocation>,
    u_matrix: Option<glow::UniformLocation>,
    u_clip_matrix: Option<glow::UniformLocation>,
    u_channel_flag: Option<glow::UniformLocation>,
    u_base_color: Option<glow::UniformLocation>,
    u_multiply_color: Option<glow::UniformLocation>,
    u_screen_color: Option<glow::UniformLocation>,
}

impl ProgramEntry {
    #[allow(unsafe_code)]
    fn new(gl: &glow::Context, program: glow::Program) -> Self {
        use glow::HasContext;

        // SAFETY: program is a freshly linked handle; location queries
        // return None for names the program does not use.
        unsafe {
            let uniform = |name: &str| gl.get_uniform_location(program, name);
            Self {
                program,
                a_position: gl.get_attrib_location(program, "a_position"),
                a_tex_coord: gl.get_attrib_location(program, "a_texCoord"),
                s_texture0: uniform("s_texture0"),
                s_texture1: uniform("s_texture1"),
                u_matrix: uniform("u_matrix"),
                u_clip_matrix: uniform("u_clipMatrix"),
                u_channel_flag: uniform("u_channelFlag"),
                u_base_color: uniform("u_baseColor"),
                u_multiply_color: uniform("u_multiplyColor"),
                u_screen_color: uniform("u_screenColor"),
            }
        }
    }
}

/// Usage hint for vertex and index data re-uploaded on every draw.
pub(crate) const PER_DRAW_USAGE: u32 = glow::STREAM_DRAW;

/// The vertex buffers a renderer streams positions and UVs through.
#[derive(Debug, Clone, Copy)]
pub struct VertexStreams {
    pub positions: glow::Buffer,
    pub uvs: glow::Buffer,
}

/// The mask a regular draw samples.
#[derive(Debug, Clone, Copy)]
pub struct MaskSampling {
    pub texture: glow::Texture,
    pub matrix_for_draw: Mat4,
    pub channel: usize,
    pub inverted: bool,
}

/// Everything [`ShaderCatalog::setup_for_draw`] binds for one draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawSetup<'a> {
    pub texture: glow::Texture,
    pub positions: &'a [Vec2],
    pub uvs: &'a [Vec2],
    pub blend_mode: BlendMode,
    pub premultiplied: bool,
    pub mvp: Mat4,
    /// Model color already scaled by the drawable's opacity.
    pub base_color: TextureColor,
    pub multiply_color: TextureColor,
    pub screen_color: TextureColor,
    pub mask: Option<MaskSampling>,
}

/// Everything [`ShaderCatalog::setup_for_mask`] binds for one clip draw.
#[derive(Debug, Clone, Copy)]
pub struct MaskSetup<'a> {
    pub texture: glow::Texture,
    pub positions: &'a [Vec2],
    pub uvs: &'a [Vec2],
    pub matrix_for_mask: Mat4,
    pub channel: usize,
    /// Cell of the mask buffer in `[0, 1]²`.
    pub layout_bounds: crate::rect::Rect,
}

/// One value per program slot, built together on first use.
#[derive(Debug)]
struct ProgramCache<T> {
    /// `None` until built; a `None` slot inside failed to build.
    slots: Option<Vec<Option<T>>>,
}

impl<T> Default for ProgramCache<T> {
    fn default() -> Self {
        Self { slots: None }
    }
}

impl<T> ProgramCache<T> {
    fn is_built(&self) -> bool {
        self.slots.is_some()
    }

    fn built_count(&self) -> usize {
        self.slots
            .as_ref()
            .map_or(0, |s| s.iter().filter(|e| e.is_some()).count())
    }

    /// Calls `build` once per program kind unless already built. Failed
    /// slots stay empty and are not retried.
    fn ensure(&mut self, build: impl FnMut(ProgramKind) -> Option<T>) {
        if self.slots.is_none() {
            self.slots = Some(ProgramKind::ALL.iter().copied().map(build).collect());
        }
    }

    /// The program serving catalog variant `variant_index`.
    fn for_variant(&self, variant_index: usize) -> Option<&T> {
        let slot = variant::program_slot(variant_index);
        self.slots.as_ref()?.get(slot)?.as_ref()
    }

    fn built(&self) -> impl Iterator<Item = (ProgramKind, &T)> {
        ProgramKind::ALL
            .iter()
            .copied()
            .zip(self.slots.iter().flatten())
            .filter_map(|(kind, slot)| slot.as_ref().map(|t| (kind, t)))
    }

    /// Empties the cache, returning every built value exactly once.
    fn take_all(&mut self) -> Vec<T> {
        self.slots.take().into_iter().flatten().flatten().collect()
    }
}

/// Lazily compiled programs for all 19 shader variants.
#[derive(Debug, Default)]
pub struct ShaderCatalog {
    programs: ProgramCache<ProgramEntry>,
}

impl ShaderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_compiled(&self) -> bool {
        self.programs.is_built()
    }

    /// Number of programs that built successfully.
    pub fn program_count(&self) -> usize {
        self.programs.built_count()
    }

    /// Compiles every program on first use; later calls do nothing.
    pub fn ensure_compiled(&mut self, gl: &glow::Context) {
        if self.programs.is_built() {
            return;
        }
        self.programs
            .ensure(|kind| load_program(gl, kind).map(|p| ProgramEntry::new(gl, p)));
        tracing::debug!(
            built = self.programs.built_count(),
            total = PROGRAM_COUNT,
            "shader catalog compiled"
        );
    }

    /// Validates every built program against the current GL state and
    /// logs the ones that fail. Returns true if all passed.
    ///
    /// A diagnostic for hosts; drawing never calls it.
    pub fn validate(&self, gl: &glow::Context) -> bool {
        self.programs
            .built()
            .fold(true, |ok, (kind, entry)| check_program(gl, kind, entry.program) && ok)
    }

    fn entry(&mut self, gl: &glow::Context, variant_index: usize) -> Option<ProgramEntry> {
        self.ensure_compiled(gl);
        self.programs.for_variant(variant_index).cloned()
    }

    /// Binds and parameterizes the variant for a regular draw.
    ///
    /// Returns false, binding nothing, if that variant's program failed to
    /// build; the caller skips the draw.
    #[allow(unsafe_code)]
    pub fn setup_for_draw(
        &mut self,
        gl: &glow::Context,
        streams: VertexStreams,
        setup: &DrawSetup<'_>,
    ) -> bool {
        use glow::HasContext;

        let mask_state = MaskState::new(
            setup.mask.is_some(),
            setup.mask.is_some_and(|m| m.inverted),
        );
        let index = variant::select_for_draw(setup.blend_mode, mask_state, setup.premultiplied);
        let Some(entry) = self.entry(gl, index) else {
            tracing::debug!(variant = index, "shader variant unavailable, skipping draw");
            return false;
        };

        // SAFETY: all handles are live objects of this context; uniform
        // locations belong to entry.program, which is bound first.
        unsafe {
            gl.use_program(Some(entry.program));
            stream_attributes(gl, &entry, streams, setup.positions, setup.uvs);

            if let Some(mask) = setup.mask {
                gl.active_texture(glow::TEXTURE1);
                gl.bind_texture(glow::TEXTURE_2D, Some(mask.texture));
                gl.uniform_1_i32(entry.s_texture1.as_ref(), 1);
                gl.uniform_matrix_4_f32_slice(
                    entry.u_clip_matrix.as_ref(),
                    false,
                    &mask.matrix_for_draw.to_cols_array(),
                );
                set_color(gl, entry.u_channel_flag.as_ref(), TextureColor::channel_flag(mask.channel));
            }

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(setup.texture));
            gl.uniform_1_i32(entry.s_texture0.as_ref(), 0);

            gl.uniform_matrix_4_f32_slice(entry.u_matrix.as_ref(), false, &setup.mvp.to_cols_array());
            set_color(gl, entry.u_base_color.as_ref(), setup.base_color);
            set_color(gl, entry.u_multiply_color.as_ref(), setup.multiply_color);
            set_color(gl, entry.u_screen_color.as_ref(), setup.screen_color);

            set_blend(gl, BlendFunc::for_blend_mode(setup.blend_mode));
        }
        true
    }

    /// Binds and parameterizes the mask-generation variant.
    ///
    /// Returns false if the mask program failed to build.
    #[allow(unsafe_code)]
    pub fn setup_for_mask(
        &mut self,
        gl: &glow::Context,
        streams: VertexStreams,
        setup: &MaskSetup<'_>,
    ) -> bool {
        use glow::HasContext;

        let Some(entry) = self.entry(gl, variant::MASK_VARIANT) else {
            tracing::debug!("mask shader unavailable, skipping mask draw");
            return false;
        };

        let edges = setup.layout_bounds.to_clip_edges();
        // SAFETY: see setup_for_draw.
        unsafe {
            gl.use_program(Some(entry.program));

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(setup.texture));
            gl.uniform_1_i32(entry.s_texture0.as_ref(), 0);

            stream_attributes(gl, &entry, streams, setup.positions, setup.uvs);

            set_color(gl, entry.u_channel_flag.as_ref(), TextureColor::channel_flag(setup.channel));
            gl.uniform_matrix_4_f32_slice(
                entry.u_clip_matrix.as_ref(),
                false,
                &setup.matrix_for_mask.to_cols_array(),
            );
            gl.uniform_4_f32(entry.u_base_color.as_ref(), edges[0], edges[1], edges[2], edges[3]);

            set_blend(gl, BlendFunc::MASK);
        }
        true
    }

    /// Deletes every compiled program. Safe to call more than once; a
    /// later setup call compiles again.
    #[allow(unsafe_code)]
    pub fn destroy(&mut self, gl: &glow::Context) {
        use glow::HasContext;

        if !self.programs.is_built() {
            return;
        }
        for entry in self.programs.take_all() {
            // SAFETY: each program handle is distinct and deleted once,
            // since the list was just taken out of the catalog.
            unsafe { gl.delete_program(entry.program) };
        }
        tracing::debug!("shader catalog destroyed");
    }
}

#[allow(unsafe_code)]
unsafe fn stream_attributes(
    gl: &glow::Context,
    entry: &ProgramEntry,
    streams: VertexStreams,
    positions: &[Vec2],
    uvs: &[Vec2],
) {
    use glow::HasContext;

    let pairs = [
        (entry.a_position, streams.positions, positions),
        (entry.a_tex_coord, streams.uvs, uvs),
    ];
    for (location, buffer, data) in pairs {
        let Some(location) = location else {
            continue;
        };
        gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
        gl.buffer_data_u8_slice(
            glow::ARRAY_BUFFER,
            bytemuck::cast_slice(data),
            PER_DRAW_USAGE,
        );
        gl.enable_vertex_attrib_array(location);
        gl.vertex_attrib_pointer_f32(location, 2, glow::FLOAT, false, 0, 0);
    }
}

#[allow(unsafe_code)]
unsafe fn set_color(gl: &glow::Context, location: Option<&glow::UniformLocation>, c: TextureColor) {
    use glow::HasContext;
    gl.uniform_4_f32(location, c.r, c.g, c.b, c.a);
}

#[allow(unsafe_code)]
unsafe fn set_blend(gl: &glow::Context, func: BlendFunc) {
    use glow::HasContext;
    gl.blend_func_separate(
        gl_blend_factor(func.src_rgb),
        gl_blend_factor(func.dst_rgb),
        gl_blend_factor(func.src_alpha),
        gl_blend_factor(func.dst_alpha),
    );
}

/// GL enum for a symbolic blend factor.
pub fn gl_blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_catalog_compiles_nothing() {
        let catalog = ShaderCatalog::new();
        assert!(!catalog.is_compiled());
        assert_eq!(catalog.program_count(), 0);
    }

    #[test]
    fn blend_factors_map_to_gl_enums() {
        let normal = BlendFunc::for_blend_mode(BlendMode::Normal);
        assert_eq!(gl_blend_factor(normal.src_rgb), glow::ONE);
        assert_eq!(gl_blend_factor(normal.dst_rgb), glow::ONE_MINUS_SRC_ALPHA);

        let mult = BlendFunc::for_blend_mode(BlendMode::Multiplicative);
        assert_eq!(gl_blend_factor(mult.src_rgb), glow::DST_COLOR);

        assert_eq!(gl_blend_factor(BlendFunc::MASK.dst_rgb), glow::ONE_MINUS_SRC_COLOR);
        assert_eq!(gl_blend_factor(BlendFunc::MASK.src_alpha), glow::ZERO);
    }

    #[test]
    fn per_draw_uploads_are_stream_draw() {
        assert_eq!(PER_DRAW_USAGE, glow::STREAM_DRAW);
    }

    #[test]
    fn all_variants_share_seven_builds() {
        let mut cache = ProgramCache::default();
        let mut builds = Vec::new();
        for _ in 0..2 {
            for index in 0..variant::SHADER_COUNT {
                cache.ensure(|kind| {
                    builds.push(kind);
                    Some(kind)
                });
                let kind = cache.for_variant(index).copied();
                assert_eq!(kind, Some(ProgramKind::for_slot(variant::program_slot(index))));
            }
        }
        assert_eq!(builds, ProgramKind::ALL.to_vec());
        assert_eq!(cache.built_count(), PROGRAM_COUNT);
    }

    #[test]
    fn failed_program_disables_its_variants_only() {
        let mut cache = ProgramCache::default();
        let mut attempts = 0;
        for _ in 0..2 {
            cache.ensure(|kind| {
                attempts += 1;
                (kind != ProgramKind::Masked).then_some(kind)
            });
        }
        assert_eq!(attempts, PROGRAM_COUNT);
        assert_eq!(cache.built_count(), PROGRAM_COUNT - 1);

        for info in variant::catalog() {
            let available = cache.for_variant(info.index).is_some();
            let kind = ProgramKind::for_slot(info.program_slot);
            assert_eq!(available, kind != ProgramKind::Masked, "variant {}", info.index);
        }
    }

    #[test]
    fn take_all_releases_each_program_once() {
        let mut cache = ProgramCache::default();
        cache.ensure(|kind| (kind != ProgramKind::SetupMask).then_some(kind));

        let released = cache.take_all();
        assert_eq!(released.len(), PROGRAM_COUNT - 1);
        assert!(!cache.is_built());
        assert!(cache.take_all().is_empty());
        assert!(cache.for_variant(variant::MASK_VARIANT).is_none());
    }

    #[test]
    fn built_pairs_each_program_with_its_kind() {
        let mut cache = ProgramCache::default();
        cache.ensure(|kind| (kind != ProgramKind::Plain).then_some(kind));
        for (kind, &value) in cache.built() {
            assert_eq!(kind, value);
        }
        assert_eq!(cache.built().count(), PROGRAM_COUNT - 1);
    }
}
