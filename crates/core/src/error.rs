//! Error types for the avatar-gl core.

use thiserror::Error;

/// Errors produced while configuring or driving the renderer.
///
/// Per-draw problems (an unbound texture, a program that failed to link) are
/// not represented here: they skip the affected draw and are logged.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A configuration value was rejected (e.g. a zero-sized mask buffer).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The model's render-order array is not a permutation of `0..count`.
    #[error("invalid render order: {0}")]
    InvalidRenderOrder(String),

    /// A GL resource (buffer, texture, framebuffer) could not be created.
    #[error("gl error: {0}")]
    Gl(String),

    /// Configuration JSON could not be parsed.
    #[error("invalid config json: {0}")]
    Json(String),
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Json(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_configuration_includes_message() {
        let err = RenderError::InvalidConfiguration("mask size 0x0".into());
        let msg = format!("{err}");
        assert!(msg.contains("mask size 0x0"), "missing detail in: {msg}");
    }

    #[test]
    fn invalid_render_order_includes_message() {
        let err = RenderError::InvalidRenderOrder("slot 3 assigned twice".into());
        let msg = format!("{err}");
        assert!(msg.contains("slot 3"), "missing detail in: {msg}");
    }

    #[test]
    fn from_serde_json_error_routes_to_json() {
        let bad = serde_json::from_str::<serde_json::Value>("{nope");
        let err = RenderError::from(bad.unwrap_err());
        assert!(matches!(err, RenderError::Json(_)));
    }

    #[test]
    fn render_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RenderError>();
    }
}
