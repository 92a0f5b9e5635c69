//! GPU capability detection.
//!
//! The renderer only needs one optional extension: anisotropic texture
//! filtering. `GpuCapabilities` records whether it is present and the
//! driver's maximum level so requested levels can be clamped.

use super::texture::MAX_TEXTURE_MAX_ANISOTROPY_EXT;

/// Extension names that provide `TEXTURE_MAX_ANISOTROPY_EXT`.
const ANISOTROPY_EXTENSIONS: [&str; 3] = [
    "GL_EXT_texture_filter_anisotropic",
    "GL_ARB_texture_filter_anisotropic",
    "EXT_texture_filter_anisotropic",
];

/// Capabilities of the current GL context that affect rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuCapabilities {
    supports_anisotropy: bool,
    max_anisotropy: f32,
}

impl GpuCapabilities {
    pub fn new(supports_anisotropy: bool, max_anisotropy: f32) -> Self {
        Self {
            supports_anisotropy,
            max_anisotropy,
        }
    }

    /// Queries the context's extensions and limits.
    #[allow(unsafe_code)]
    pub fn detect(gl: &glow::Context) -> Self {
        use glow::HasContext;

        let extensions = gl.supported_extensions();
        let supports_anisotropy = ANISOTROPY_EXTENSIONS
            .iter()
            .any(|name| extensions.contains(*name));

        let max_anisotropy = if supports_anisotropy {
            // SAFETY: a plain limit query, valid once the extension is present.
            unsafe { gl.get_parameter_f32(MAX_TEXTURE_MAX_ANISOTROPY_EXT) }
        } else {
            0.0
        };

        tracing::debug!(supports_anisotropy, max_anisotropy, "detected GPU capabilities");
        Self::new(supports_anisotropy, max_anisotropy)
    }

    pub fn supports_anisotropy(&self) -> bool {
        self.supports_anisotropy
    }

    pub fn max_anisotropy(&self) -> f32 {
        self.max_anisotropy
    }

    /// Clamps a requested anisotropy level to `[0, max]`.
    ///
    /// Returns 0 (disabled) without the extension or for non-finite input.
    pub fn clamp_anisotropy(&self, requested: f32) -> f32 {
        if !self.supports_anisotropy || !requested.is_finite() {
            if requested > 0.0 {
                tracing::warn!(requested, "anisotropic filtering unavailable, disabling");
            }
            return 0.0;
        }
        requested.clamp(0.0, self.max_anisotropy)
    }
}

impl Default for GpuCapabilities {
    fn default() -> Self {
        Self::new(false, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anisotropy_clamps_to_driver_limit() {
        let caps = GpuCapabilities::new(true, 16.0);
        assert_eq!(caps.clamp_anisotropy(4.0), 4.0);
        assert_eq!(caps.clamp_anisotropy(64.0), 16.0);
        assert_eq!(caps.clamp_anisotropy(-1.0), 0.0);
    }

    #[test]
    fn anisotropy_is_disabled_without_extension() {
        let caps = GpuCapabilities::default();
        assert!(!caps.supports_anisotropy());
        assert_eq!(caps.clamp_anisotropy(8.0), 0.0);
    }

    #[test]
    fn non_finite_anisotropy_is_disabled() {
        let caps = GpuCapabilities::new(true, 16.0);
        assert_eq!(caps.clamp_anisotropy(f32::NAN), 0.0);
        assert_eq!(caps.clamp_anisotropy(f32::INFINITY), 0.0);
    }
}
