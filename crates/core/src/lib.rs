#![deny(unsafe_code)]
//! Clipping-mask pipeline and shader dispatch for layered 2D puppet models.
//!
//! The crate splits a frame into a pure plan and its execution. [`clipping`]
//! groups masked drawables into contexts and lays their masks out in
//! channels of a few offscreen buffers, [`frame`] sorts drawables and emits
//! the [`FrameCommand`] sequence, and [`variant`] maps each draw to one of
//! the 19 shader variants. With the `render` feature, [`render`] executes
//! the plan with OpenGL through glow.

pub mod clipping;
pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod model;
pub mod rect;
pub mod variant;

#[cfg(feature = "render")]
pub mod render;

pub use clipping::{ClippingContext, ClippingManager, ContextId};
pub use color::TextureColor;
pub use config::RendererConfig;
pub use error::RenderError;
pub use frame::{FrameCommand, FramePlanner};
pub use model::{BlendMode, Drawable, Model, ModelSnapshot};
pub use rect::Rect;
pub use variant::{MaskState, ProgramKind, VariantInfo};
