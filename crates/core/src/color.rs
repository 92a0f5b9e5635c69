//! RGBA color values passed to shader uniforms.

use serde::{Deserialize, Serialize};

/// A linear RGBA color with components nominally in `[0, 1]`.
///
/// Used for the model color, per-drawable multiply/screen colors, and the
/// one-hot channel selectors of mask buffers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl TextureColor {
    pub const WHITE: TextureColor = TextureColor::new(1.0, 1.0, 1.0, 1.0);
    /// Identity for the screen blend: adds nothing.
    pub const CLEAR: TextureColor = TextureColor::new(0.0, 0.0, 0.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Scales alpha by `opacity`; with premultiplied alpha the RGB channels
    /// are multiplied by the resulting alpha as well.
    pub fn with_opacity(self, opacity: f32, premultiplied: bool) -> Self {
        let a = self.a * opacity;
        if premultiplied {
            Self::new(self.r * a, self.g * a, self.b * a, a)
        } else {
            Self::new(self.r, self.g, self.b, a)
        }
    }

    /// One-hot selector for a mask-buffer channel (0 = R, 1 = G, 2 = B, 3 = A).
    ///
    /// Channels past 3 select nothing.
    pub fn channel_flag(channel: usize) -> Self {
        match channel {
            0 => Self::new(1.0, 0.0, 0.0, 0.0),
            1 => Self::new(0.0, 1.0, 0.0, 0.0),
            2 => Self::new(0.0, 0.0, 1.0, 0.0),
            3 => Self::new(0.0, 0.0, 0.0, 1.0),
            _ => Self::new(0.0, 0.0, 0.0, 0.0),
        }
    }
}

impl Default for TextureColor {
    fn default() -> Self {
        Self::WHITE
    }
}
