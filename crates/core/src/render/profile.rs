//! Capture and restore of the caller's GL state around a model draw.
//!
//! The renderer changes a fair amount of global GL state: program, vertex
//! array, capability toggles, blend factors and texture bindings.
//! [`RenderStateProfile`] records that state before the frame and writes
//! it back afterwards so the host's own rendering is unaffected.
//!
//! GL object names are tracked as raw `u32`s (0 = none), the form
//! `glGetIntegerv` reports them in. State is accessed through
//! [`GlStateAccess`] so the save/restore logic can be tested without a
//! context.

use std::num::NonZeroU32;

/// Read and write access to the GL state the profile touches.
///
/// Implemented for `glow::Context`; tests implement it with an in-memory
/// fake.
pub trait GlStateAccess {
    fn read_i32(&self, pname: u32) -> i32;
    fn read_i32_v(&self, pname: u32, out: &mut [i32]);
    fn read_enabled(&self, cap: u32) -> bool;

    fn write_enabled(&self, cap: u32, enabled: bool);
    fn write_program(&self, program: u32);
    fn write_vertex_array(&self, vao: u32);
    fn write_buffer(&self, target: u32, buffer: u32);
    fn write_active_texture(&self, unit: u32);
    fn write_texture_2d(&self, texture: u32);
    fn write_front_face(&self, mode: u32);
    fn write_color_mask(&self, mask: [bool; 4]);
    fn write_blend_func(&self, func: [u32; 4]);
}

/// The capabilities saved and restored, in restore order.
const TOGGLES: [u32; 5] = [
    glow::SCISSOR_TEST,
    glow::STENCIL_TEST,
    glow::DEPTH_TEST,
    glow::CULL_FACE,
    glow::BLEND,
];

/// GL state captured by [`RenderStateProfile::save`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStateSnapshot {
    pub array_buffer: u32,
    pub element_array_buffer: u32,
    pub program: u32,
    pub active_texture: u32,
    pub texture_unit0: u32,
    pub texture_unit1: u32,
    pub vertex_array: u32,
    /// Scissor, stencil, depth, cull-face and blend enables.
    pub toggles: [bool; 5],
    pub front_face: u32,
    pub color_mask: [bool; 4],
    /// Source RGB, destination RGB, source alpha, destination alpha.
    pub blend_func: [u32; 4],
    pub framebuffer: u32,
    pub viewport: [i32; 4],
}

impl RenderStateSnapshot {
    /// Reads the current state.
    ///
    /// Leaves the active texture unit at whatever it was on entry.
    pub fn capture<G: GlStateAccess + ?Sized>(gl: &G) -> Self {
        let name = |pname| gl.read_i32(pname) as u32;

        let array_buffer = name(glow::ARRAY_BUFFER_BINDING);
        let element_array_buffer = name(glow::ELEMENT_ARRAY_BUFFER_BINDING);
        let program = name(glow::CURRENT_PROGRAM);

        let active_texture = name(glow::ACTIVE_TEXTURE);
        gl.write_active_texture(glow::TEXTURE1);
        let texture_unit1 = name(glow::TEXTURE_BINDING_2D);
        gl.write_active_texture(glow::TEXTURE0);
        let texture_unit0 = name(glow::TEXTURE_BINDING_2D);
        gl.write_active_texture(active_texture);

        let vertex_array = name(glow::VERTEX_ARRAY_BINDING);
        let toggles = TOGGLES.map(|cap| gl.read_enabled(cap));
        let front_face = name(glow::FRONT_FACE);

        let mut mask = [0_i32; 4];
        gl.read_i32_v(glow::COLOR_WRITEMASK, &mut mask);

        let blend_func = [
            name(glow::BLEND_SRC_RGB),
            name(glow::BLEND_DST_RGB),
            name(glow::BLEND_SRC_ALPHA),
            name(glow::BLEND_DST_ALPHA),
        ];

        let framebuffer = name(glow::FRAMEBUFFER_BINDING);
        let mut viewport = [0_i32; 4];
        gl.read_i32_v(glow::VIEWPORT, &mut viewport);

        Self {
            array_buffer,
            element_array_buffer,
            program,
            active_texture,
            texture_unit0,
            texture_unit1,
            vertex_array,
            toggles,
            front_face,
            color_mask: mask.map(|v| v != 0),
            blend_func,
            framebuffer,
            viewport,
        }
    }

    /// Writes the state back. Framebuffer and viewport are left alone.
    pub fn apply<G: GlStateAccess + ?Sized>(&self, gl: &G) {
        gl.write_program(self.program);
        gl.write_vertex_array(self.vertex_array);

        for (cap, enabled) in TOGGLES.into_iter().zip(self.toggles) {
            gl.write_enabled(cap, enabled);
        }
        gl.write_front_face(self.front_face);
        gl.write_color_mask(self.color_mask);

        gl.write_buffer(glow::ARRAY_BUFFER, self.array_buffer);
        gl.write_buffer(glow::ELEMENT_ARRAY_BUFFER, self.element_array_buffer);

        gl.write_active_texture(glow::TEXTURE1);
        gl.write_texture_2d(self.texture_unit1);
        gl.write_active_texture(glow::TEXTURE0);
        gl.write_texture_2d(self.texture_unit0);
        gl.write_active_texture(self.active_texture);

        gl.write_blend_func(self.blend_func);
    }
}

/// Save/restore bracket for one frame. Not reentrant.
#[derive(Debug, Default)]
pub struct RenderStateProfile {
    saved: Option<RenderStateSnapshot>,
}

impl RenderStateProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save<G: GlStateAccess + ?Sized>(&mut self, gl: &G) {
        if self.saved.is_some() {
            tracing::warn!("render state saved twice without a restore, overwriting");
        }
        self.saved = Some(RenderStateSnapshot::capture(gl));
    }

    /// Restores the last saved state and consumes it. Returns false if
    /// nothing was saved.
    pub fn restore<G: GlStateAccess + ?Sized>(&mut self, gl: &G) -> bool {
        match self.saved.take() {
            Some(snapshot) => {
                snapshot.apply(gl);
                true
            }
            None => {
                tracing::warn!("render state restore without a matching save");
                false
            }
        }
    }

    /// The snapshot held between `save` and `restore`.
    pub fn saved(&self) -> Option<&RenderStateSnapshot> {
        self.saved.as_ref()
    }

    /// The framebuffer bound when the state was saved.
    pub fn last_framebuffer(&self) -> u32 {
        self.saved.map_or(0, |s| s.framebuffer)
    }

    /// The viewport when the state was saved.
    pub fn last_viewport(&self) -> [i32; 4] {
        self.saved.map_or([0; 4], |s| s.viewport)
    }
}

pub(crate) fn framebuffer_from_name(name: u32) -> Option<glow::Framebuffer> {
    NonZeroU32::new(name).map(glow::NativeFramebuffer)
}

#[allow(unsafe_code)]
impl GlStateAccess for glow::Context {
    // SAFETY (all methods): plain state queries and binds on the current
    // context. Names come from earlier queries of the same context, so
    // they are either 0 or live objects.

    fn read_i32(&self, pname: u32) -> i32 {
        use glow::HasContext;
        unsafe { self.get_parameter_i32(pname) }
    }

    fn read_i32_v(&self, pname: u32, out: &mut [i32]) {
        use glow::HasContext;
        unsafe { self.get_parameter_i32_slice(pname, out) }
    }

    fn read_enabled(&self, cap: u32) -> bool {
        use glow::HasContext;
        unsafe { self.is_enabled(cap) }
    }

    fn write_enabled(&self, cap: u32, enabled: bool) {
        use glow::HasContext;
        unsafe {
            if enabled {
                self.enable(cap);
            } else {
                self.disable(cap);
            }
        }
    }

    fn write_program(&self, program: u32) {
        use glow::HasContext;
        unsafe { self.use_program(NonZeroU32::new(program).map(glow::NativeProgram)) }
    }

    fn write_vertex_array(&self, vao: u32) {
        use glow::HasContext;
        unsafe { self.bind_vertex_array(NonZeroU32::new(vao).map(glow::NativeVertexArray)) }
    }

    fn write_buffer(&self, target: u32, buffer: u32) {
        use glow::HasContext;
        unsafe { self.bind_buffer(target, NonZeroU32::new(buffer).map(glow::NativeBuffer)) }
    }

    fn write_active_texture(&self, unit: u32) {
        use glow::HasContext;
        unsafe { self.active_texture(unit) }
    }

    fn write_texture_2d(&self, texture: u32) {
        use glow::HasContext;
        unsafe {
            self.bind_texture(
                glow::TEXTURE_2D,
                NonZeroU32::new(texture).map(glow::NativeTexture),
            )
        }
    }

    fn write_front_face(&self, mode: u32) {
        use glow::HasContext;
        unsafe { self.front_face(mode) }
    }

    fn write_color_mask(&self, mask: [bool; 4]) {
        use glow::HasContext;
        unsafe { self.color_mask(mask[0], mask[1], mask[2], mask[3]) }
    }

    fn write_blend_func(&self, func: [u32; 4]) {
        use glow::HasContext;
        unsafe { self.blend_func_separate(func[0], func[1], func[2], func[3]) }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};

    use super::GlStateAccess;

    /// In-memory GL state for profile tests.
    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct FakeGl {
        pub state: RefCell<FakeState>,
    }

    #[derive(Debug, Default, Clone, PartialEq)]
    pub struct FakeState {
        pub ints: BTreeMap<u32, i32>,
        pub enabled: BTreeSet<u32>,
        pub textures: BTreeMap<u32, u32>,
        pub color_mask: [bool; 4],
        pub viewport: [i32; 4],
    }

    impl FakeGl {
        pub fn set(&self, pname: u32, value: i32) {
            self.state.borrow_mut().ints.insert(pname, value);
        }

        fn active_unit(&self) -> u32 {
            let state = self.state.borrow();
            state
                .ints
                .get(&glow::ACTIVE_TEXTURE)
                .copied()
                .unwrap_or(glow::TEXTURE0 as i32) as u32
        }
    }

    impl GlStateAccess for FakeGl {
        fn read_i32(&self, pname: u32) -> i32 {
            if pname == glow::TEXTURE_BINDING_2D {
                let unit = self.active_unit();
                return self.state.borrow().textures.get(&unit).copied().unwrap_or(0) as i32;
            }
            self.state.borrow().ints.get(&pname).copied().unwrap_or(0)
        }

        fn read_i32_v(&self, pname: u32, out: &mut [i32]) {
            let state = self.state.borrow();
            match pname {
                glow::VIEWPORT => out.copy_from_slice(&state.viewport),
                glow::COLOR_WRITEMASK => {
                    for (o, m) in out.iter_mut().zip(state.color_mask) {
                        *o = i32::from(m);
                    }
                }
                _ => out.fill(0),
            }
        }

        fn read_enabled(&self, cap: u32) -> bool {
            self.state.borrow().enabled.contains(&cap)
        }

        fn write_enabled(&self, cap: u32, enabled: bool) {
            let mut state = self.state.borrow_mut();
            if enabled {
                state.enabled.insert(cap);
            } else {
                state.enabled.remove(&cap);
            }
        }

        fn write_program(&self, program: u32) {
            self.set(glow::CURRENT_PROGRAM, program as i32);
        }

        fn write_vertex_array(&self, vao: u32) {
            self.set(glow::VERTEX_ARRAY_BINDING, vao as i32);
        }

        fn write_buffer(&self, target: u32, buffer: u32) {
            let pname = match target {
                glow::ARRAY_BUFFER => glow::ARRAY_BUFFER_BINDING,
                _ => glow::ELEMENT_ARRAY_BUFFER_BINDING,
            };
            self.set(pname, buffer as i32);
        }

        fn write_active_texture(&self, unit: u32) {
            self.set(glow::ACTIVE_TEXTURE, unit as i32);
        }

        fn write_texture_2d(&self, texture: u32) {
            let unit = self.active_unit();
            self.state.borrow_mut().textures.insert(unit, texture);
        }

        fn write_front_face(&self, mode: u32) {
            self.set(glow::FRONT_FACE, mode as i32);
        }

        fn write_color_mask(&self, mask: [bool; 4]) {
            self.state.borrow_mut().color_mask = mask;
        }

        fn write_blend_func(&self, func: [u32; 4]) {
            self.set(glow::BLEND_SRC_RGB, func[0] as i32);
            self.set(glow::BLEND_DST_RGB, func[1] as i32);
            self.set(glow::BLEND_SRC_ALPHA, func[2] as i32);
            self.set(glow::BLEND_DST_ALPHA, func[3] as i32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeGl;
    use super::*;

    fn host_state() -> FakeGl {
        let gl = FakeGl::default();
        gl.write_program(7);
        gl.write_vertex_array(3);
        gl.write_buffer(glow::ARRAY_BUFFER, 11);
        gl.write_buffer(glow::ELEMENT_ARRAY_BUFFER, 12);
        gl.write_active_texture(glow::TEXTURE1);
        gl.write_texture_2d(21);
        gl.write_active_texture(glow::TEXTURE0);
        gl.write_texture_2d(20);
        gl.write_active_texture(glow::TEXTURE2);
        gl.write_enabled(glow::DEPTH_TEST, true);
        gl.write_enabled(glow::SCISSOR_TEST, true);
        gl.write_front_face(glow::CW);
        gl.write_color_mask([true, false, true, false]);
        gl.write_blend_func([glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA, glow::ONE, glow::ZERO]);
        gl.set(glow::FRAMEBUFFER_BINDING, 5);
        gl.state.borrow_mut().viewport = [0, 0, 800, 600];
        gl
    }

    /// Clobbers everything the renderer touches.
    fn draw_something(gl: &FakeGl) {
        gl.write_program(99);
        gl.write_vertex_array(98);
        for cap in TOGGLES {
            gl.write_enabled(cap, cap == glow::BLEND || cap == glow::CULL_FACE);
        }
        gl.write_front_face(glow::CCW);
        gl.write_color_mask([true; 4]);
        gl.write_buffer(glow::ARRAY_BUFFER, 0);
        gl.write_buffer(glow::ELEMENT_ARRAY_BUFFER, 0);
        gl.write_active_texture(glow::TEXTURE1);
        gl.write_texture_2d(77);
        gl.write_active_texture(glow::TEXTURE0);
        gl.write_texture_2d(76);
        gl.write_blend_func([glow::ONE, glow::ONE, glow::ZERO, glow::ONE]);
    }

    #[test]
    fn capture_reads_every_field() {
        let gl = host_state();
        let s = RenderStateSnapshot::capture(&gl);
        assert_eq!(s.program, 7);
        assert_eq!(s.vertex_array, 3);
        assert_eq!(s.array_buffer, 11);
        assert_eq!(s.element_array_buffer, 12);
        assert_eq!(s.texture_unit0, 20);
        assert_eq!(s.texture_unit1, 21);
        assert_eq!(s.active_texture, glow::TEXTURE2);
        assert_eq!(s.toggles, [true, false, true, false, false]);
        assert_eq!(s.front_face, glow::CW);
        assert_eq!(s.color_mask, [true, false, true, false]);
        assert_eq!(s.blend_func[0], glow::SRC_ALPHA);
        assert_eq!(s.framebuffer, 5);
        assert_eq!(s.viewport, [0, 0, 800, 600]);
    }

    #[test]
    fn capture_preserves_active_unit() {
        let gl = host_state();
        RenderStateSnapshot::capture(&gl);
        assert_eq!(gl.read_i32(glow::ACTIVE_TEXTURE) as u32, glow::TEXTURE2);
    }

    #[test]
    fn restore_after_save_reproduces_state() {
        let gl = host_state();
        let before = gl.state.borrow().clone();

        let mut profile = RenderStateProfile::new();
        profile.save(&gl);
        draw_something(&gl);
        assert!(profile.restore(&gl));

        assert_eq!(*gl.state.borrow(), before);
    }

    #[test]
    fn viewport_and_framebuffer_are_not_restored() {
        let gl = host_state();
        let mut profile = RenderStateProfile::new();
        profile.save(&gl);
        gl.set(glow::FRAMEBUFFER_BINDING, 9);
        gl.state.borrow_mut().viewport = [0, 0, 256, 256];
        profile.restore(&gl);
        assert_eq!(gl.read_i32(glow::FRAMEBUFFER_BINDING), 9);
        assert_eq!(gl.state.borrow().viewport, [0, 0, 256, 256]);
    }

    #[test]
    fn restore_consumes_the_snapshot() {
        let gl = host_state();
        let mut profile = RenderStateProfile::new();
        profile.save(&gl);
        assert_eq!(profile.last_framebuffer(), 5);
        assert_eq!(profile.last_viewport(), [0, 0, 800, 600]);
        assert!(profile.restore(&gl));
        assert!(profile.saved().is_none());
        assert!(!profile.restore(&gl));
    }

    #[test]
    fn framebuffer_name_zero_is_default() {
        assert!(framebuffer_from_name(0).is_none());
        assert!(framebuffer_from_name(4).is_some());
    }
}
