//! Renderer configuration: mask-buffer pool shape, alpha mode and filtering.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Default edge length in pixels of each mask buffer.
pub const DEFAULT_MASK_BUFFER_SIZE: u32 = 256;

/// Host-facing renderer settings.
///
/// Every field has a default, so a JSON object with any subset of keys is
/// a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of mask buffers. Values below 1 are coerced to 1.
    pub mask_buffer_count: i32,
    /// Width and height in pixels of every mask buffer.
    pub mask_buffer_size: [u32; 2],
    /// Whether textures store premultiplied alpha.
    pub premultiplied_alpha: bool,
    /// Anisotropic filtering level applied to bound textures; 0 disables it.
    pub anisotropy: f32,
    /// Regenerate each mask right before the drawable that samples it.
    pub high_precision_mask: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            mask_buffer_count: 1,
            mask_buffer_size: [DEFAULT_MASK_BUFFER_SIZE, DEFAULT_MASK_BUFFER_SIZE],
            premultiplied_alpha: false,
            anisotropy: 0.0,
            high_precision_mask: false,
        }
    }
}

impl RendererConfig {
    /// Parses a configuration from JSON, filling omitted keys with defaults.
    ///
    /// # Errors
    ///
    /// Returns `RenderError::Json` on malformed JSON and
    /// `RenderError::InvalidConfiguration` if the mask size is zero.
    pub fn from_json(json: &str) -> Result<Self, RenderError> {
        let config: RendererConfig = serde_json::from_str(json)?;
        validate_mask_buffer_size(config.mask_buffer_size[0], config.mask_buffer_size[1])?;
        Ok(config)
    }

    /// The mask-buffer count after coercion to at least one.
    pub fn effective_mask_buffer_count(&self) -> usize {
        coerce_mask_buffer_count(self.mask_buffer_count)
    }
}

/// Coerces a requested mask-buffer count to at least one, warning when the
/// request was out of range.
pub fn coerce_mask_buffer_count(requested: i32) -> usize {
    if requested < 1 {
        tracing::warn!(
            requested,
            "mask buffer count must be at least 1, using 1"
        );
        1
    } else {
        requested as usize
    }
}

/// Rejects mask buffers with a zero dimension.
///
/// # Errors
///
/// Returns `RenderError::InvalidConfiguration` if either side is zero.
pub fn validate_mask_buffer_size(width: u32, height: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidConfiguration(format!(
            "mask buffer size must be non-zero, got {width}x{height}"
        )));
    }
    Ok(())
}
