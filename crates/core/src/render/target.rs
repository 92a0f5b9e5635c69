//! Offscreen mask buffers.
//!
//! A [`MaskBuffer`] pairs a framebuffer object with an RGBA8 color
//! attachment; each channel of the texture holds independent masks. The
//! renderer talks to buffers through [`MaskTarget`] so the frame executor
//! does not depend on how a target is backed, and keeps them in a
//! [`MaskPool`] that rebuilds them when the requested count or size changes.

use super::profile::framebuffer_from_name;
use super::texture::{create_texture, TextureConfig};
use crate::error::RenderError;

/// An offscreen surface clip shapes can be rendered into and then sampled.
pub trait MaskTarget {
    /// Makes this surface the current draw target.
    fn begin_draw(&self, gl: &glow::Context);

    /// Rebinds `previous`, the framebuffer that was current before
    /// [`begin_draw`](Self::begin_draw). `None` is the default framebuffer.
    fn end_draw(&self, gl: &glow::Context, previous: Option<glow::Framebuffer>);

    /// Texture holding the rendered masks.
    fn color_buffer(&self) -> glow::Texture;

    /// Width and height in pixels.
    fn size(&self) -> [u32; 2];
}

/// Framebuffer plus RGBA8 texture used as a mask atlas.
#[derive(Debug)]
pub struct MaskBuffer {
    fbo: glow::Framebuffer,
    texture: glow::Texture,
    width: u32,
    height: u32,
}

impl MaskBuffer {
    /// Creates a mask buffer and verifies framebuffer completeness.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Gl` if the texture or framebuffer cannot be
    /// created, or the framebuffer is incomplete.
    #[allow(unsafe_code)]
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self, RenderError> {
        use glow::HasContext;

        let config = TextureConfig::rgba8(width, height);
        let texture = create_texture(gl, &config).map_err(RenderError::Gl)?;

        // SAFETY: glow wraps raw GL calls as unsafe. We create, configure,
        // and verify a framebuffer using valid texture handles.
        let fbo = match unsafe { gl.create_framebuffer() } {
            Ok(fbo) => fbo,
            Err(e) => {
                unsafe { gl.delete_texture(texture) };
                return Err(RenderError::Gl(e));
            }
        };

        unsafe {
            let previous =
                framebuffer_from_name(gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING) as u32);
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, previous);

            if status != glow::FRAMEBUFFER_COMPLETE {
                gl.delete_framebuffer(fbo);
                gl.delete_texture(texture);
                return Err(RenderError::Gl(format!(
                    "mask framebuffer incomplete: status 0x{status:04X}"
                )));
            }
        }

        tracing::debug!(width, height, "created mask buffer");
        Ok(Self {
            fbo,
            texture,
            width,
            height,
        })
    }

    /// Clears the whole buffer to opaque white, meaning "nothing masked".
    #[allow(unsafe_code)]
    pub fn clear(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: clears whichever framebuffer is bound; callers invoke
        // this between begin_draw and end_draw.
        unsafe {
            gl.clear_color(1.0, 1.0, 1.0, 1.0);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Deletes the framebuffer and texture.
    ///
    /// The GL context does not track ownership, so this must be called
    /// before the buffer is dropped to release GPU memory.
    #[allow(unsafe_code)]
    pub fn destroy(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.fbo and self.texture are valid handles from new().
        unsafe {
            gl.delete_framebuffer(self.fbo);
            gl.delete_texture(self.texture);
        }
    }
}

impl MaskTarget for MaskBuffer {
    #[allow(unsafe_code)]
    fn begin_draw(&self, gl: &glow::Context) {
        use glow::HasContext;

        // SAFETY: self.fbo is a valid framebuffer handle created in new().
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo)) };
    }

    #[allow(unsafe_code)]
    fn end_draw(&self, gl: &glow::Context, previous: Option<glow::Framebuffer>) {
        use glow::HasContext;

        // SAFETY: previous was read from this context at frame start.
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, previous) };
    }

    fn color_buffer(&self) -> glow::Texture {
        self.texture
    }

    fn size(&self) -> [u32; 2] {
        [self.width, self.height]
    }
}

/// Equally sized mask buffers, rebuilt on demand.
///
/// Setters only record the requested count and size; the caller rebuilds
/// before the next frame when [`needs_rebuild`](Self::needs_rebuild) says
/// so. A failed rebuild leaves the pool empty and is not retried until the
/// request changes.
#[derive(Debug)]
pub struct MaskPool<B> {
    buffers: Vec<B>,
    built_size: [u32; 2],
    count: usize,
    size: [u32; 2],
    failed: bool,
}

impl<B> MaskPool<B> {
    pub fn new(count: usize, size: [u32; 2]) -> Self {
        Self {
            buffers: Vec::new(),
            built_size: [0, 0],
            count,
            size,
            failed: false,
        }
    }

    /// Requested number of buffers.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Requested pixel size.
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn set_count(&mut self, count: usize) {
        if count != self.count {
            self.count = count;
            self.failed = false;
        }
    }

    pub fn set_size(&mut self, size: [u32; 2]) {
        if size != self.size {
            self.size = size;
            self.failed = false;
        }
    }

    pub fn needs_rebuild(&self) -> bool {
        !self.failed && (self.buffers.len() != self.count || self.built_size != self.size)
    }

    pub fn get(&self, index: usize) -> Option<&B> {
        self.buffers.get(index)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Releases the current buffers and creates `count` new ones at the
    /// requested size.
    ///
    /// # Errors
    ///
    /// Returns the first error from `create`, after releasing every buffer
    /// built so far.
    pub fn rebuild<E>(
        &mut self,
        mut create: impl FnMut([u32; 2]) -> Result<B, E>,
        mut destroy: impl FnMut(B),
    ) -> Result<(), E> {
        self.release(&mut destroy);
        for _ in 0..self.count {
            match create(self.size) {
                Ok(buffer) => self.buffers.push(buffer),
                Err(err) => {
                    self.release(&mut destroy);
                    self.failed = true;
                    return Err(err);
                }
            }
        }
        self.built_size = self.size;
        self.failed = false;
        Ok(())
    }

    /// Hands every buffer to `destroy`, leaving the pool empty.
    pub fn release(&mut self, mut destroy: impl FnMut(B)) {
        for buffer in self.buffers.drain(..) {
            destroy(buffer);
        }
    }
}
