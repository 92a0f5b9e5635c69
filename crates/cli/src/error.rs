//! CLI errors and their exit codes.
//!
//! - 0:  success
//! - 2:  clap arg parse error (automatic, before our code runs)
//! - 10: the scene file is not a valid model snapshot
//! - 11: the renderer config file is malformed or holds rejected values
//! - 12: the scene's render order is not a permutation of its drawables
//! - 13: an input file could not be read
//! - 14: JSON output could not be produced

use std::path::PathBuf;

use avatar_gl_core::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid scene {}: {source}", path.display())]
    Scene {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid renderer config {}: {source}", path.display())]
    Config { path: PathBuf, source: RenderError },

    #[error("scene cannot be drawn: {0}")]
    RenderOrder(RenderError),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Scene { .. } => 10,
            CliError::Config { .. } => 11,
            CliError::RenderOrder(_) => 12,
            CliError::Read { .. } => 13,
            CliError::Output(_) => 14,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json_error() -> serde_json::Error {
        serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err()
    }

    #[test]
    fn scene_error_names_the_file() {
        let err = CliError::Scene {
            path: "rig/scene.json".into(),
            source: json_error(),
        };
        assert_eq!(err.exit_code(), 10);
        assert!(err.to_string().starts_with("invalid scene rig/scene.json: "));
    }

    #[test]
    fn config_error_carries_rejected_value() {
        let err = CliError::Config {
            path: "renderer.json".into(),
            source: RenderError::InvalidConfiguration("mask buffer size 0x256".into()),
        };
        assert_eq!(err.exit_code(), 11);
        assert!(err.to_string().contains("0x256"));
    }

    #[test]
    fn render_order_error_exit_code_is_12() {
        let err = CliError::RenderOrder(RenderError::InvalidRenderOrder("index 3 repeated".into()));
        assert_eq!(err.exit_code(), 12);
        assert!(err.to_string().contains("index 3 repeated"));
    }

    #[test]
    fn read_error_exit_code_is_13() {
        let err = CliError::Read {
            path: "missing.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.exit_code(), 13);
        assert!(err.to_string().contains("missing.json"));
    }

    #[test]
    fn output_errors_convert_with_question_mark() {
        fn encode() -> Result<serde_json::Value, CliError> {
            Ok(serde_json::from_str("{invalid")?)
        }
        assert_eq!(encode().unwrap_err().exit_code(), 14);
    }
}
