//! OpenGL execution of planned frames.
//!
//! This module is only available when the `render` feature is enabled.
//! Everything here talks to glow; the planning it executes lives in
//! [`crate::frame`] and [`crate::clipping`].
//!
//! # Module overview
//!
//! - [`glsl`] -- GLSL sources for the seven shader programs.
//! - [`shader`] -- Shader compilation, linking, and error formatting.
//! - [`catalog`] -- Lazily compiled programs and per-draw parameter binding.
//! - [`texture`] -- Texture creation and anisotropic filtering.
//! - [`target`] -- Framebuffer-backed mask buffers and their pool.
//! - [`context`] -- GPU capability detection.
//! - [`profile`] -- Save and restore of the caller's GL state.
//! - [`renderer`] -- Per-model orchestration of a frame.

pub mod catalog;
pub mod context;
pub mod glsl;
pub mod profile;
pub mod renderer;
pub mod shader;
pub mod target;
pub mod texture;

pub use catalog::{DrawSetup, MaskSampling, MaskSetup, ShaderCatalog, VertexStreams};
pub use context::GpuCapabilities;
pub use profile::{GlStateAccess, RenderStateProfile, RenderStateSnapshot};
pub use renderer::Renderer;
pub use shader::{
    compile_program, compile_shader, format_shader_error, link_program, validate_program, ShaderError,
};
pub use target::{MaskBuffer, MaskPool, MaskTarget};
pub use texture::{create_texture, TextureConfig};
