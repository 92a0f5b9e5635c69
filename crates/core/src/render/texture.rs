//! Texture helpers: mask-buffer storage and anisotropic filtering of the
//! model textures.

use std::num::NonZeroU32;

/// `GL_TEXTURE_MAX_ANISOTROPY_EXT`, from `EXT_texture_filter_anisotropic`.
pub const TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FE;

/// `GL_MAX_TEXTURE_MAX_ANISOTROPY_EXT`.
pub const MAX_TEXTURE_MAX_ANISOTROPY_EXT: u32 = 0x84FF;

/// Size and filtering of an RGBA8 texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureConfig {
    pub width: u32,
    pub height: u32,
    /// GL filter used for both minification and magnification.
    pub filter: u32,
}

impl TextureConfig {
    /// An RGBA8 texture with LINEAR filtering, the mask-buffer format.
    ///
    /// Each of the four channels holds an independent mask.
    pub fn rgba8(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            filter: glow::LINEAR,
        }
    }
}

/// Creates an RGBA8 texture from the given configuration.
///
/// Wrap mode is `CLAMP_TO_EDGE` on both axes and storage is allocated
/// without initial data. The active unit's previous binding is restored.
///
/// # Errors
///
/// Returns the driver's message if the texture cannot be created.
#[allow(unsafe_code)]
pub fn create_texture(gl: &glow::Context, config: &TextureConfig) -> Result<glow::Texture, String> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. We create, configure,
    // and allocate a texture using valid parameters derived from TextureConfig.
    let texture = unsafe { gl.create_texture()? };

    unsafe {
        let previous = gl.get_parameter_i32(glow::TEXTURE_BINDING_2D) as u32;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));

        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_S,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_T,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MIN_FILTER,
            config.filter as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MAG_FILTER,
            config.filter as i32,
        );

        gl.tex_image_2d(
            glow::TEXTURE_2D,
            0,
            glow::RGBA8 as i32,
            config.width as i32,
            config.height as i32,
            0,
            glow::RGBA,
            glow::UNSIGNED_BYTE,
            glow::PixelUnpackData::Slice(None),
        );

        gl.bind_texture(
            glow::TEXTURE_2D,
            NonZeroU32::new(previous).map(glow::NativeTexture),
        );
    }

    Ok(texture)
}

/// Sets the anisotropic filtering level of `texture`.
///
/// Binds the texture on the active unit and leaves it bound. The caller
/// clamps `level` to what the driver supports.
#[allow(unsafe_code)]
pub fn apply_anisotropy(gl: &glow::Context, texture: glow::Texture, level: f32) {
    use glow::HasContext;

    // SAFETY: texture is a live handle owned by the host; the parameter
    // is only set when the extension was detected.
    unsafe {
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_parameter_f32(glow::TEXTURE_2D, TEXTURE_MAX_ANISOTROPY_EXT, level);
    }
}
