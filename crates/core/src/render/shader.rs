//! Shader compilation and linking.
//!
//! Compile, link and validation failures carry the driver's info log;
//! compile logs are prefixed with a line-numbered copy of the source.
//! [`load_program`] builds one catalog program and logs instead of failing,
//! since a missing program only disables the draws that need it.

use std::fmt;

use thiserror::Error;

use super::glsl;
use crate::variant::ProgramKind;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Errors that can occur during shader compilation or program linking.
#[derive(Debug, Clone, Error)]
pub enum ShaderError {
    /// A shader stage failed to compile.
    #[error("shader compile error ({stage}):\n{log}")]
    Compile {
        stage: ShaderStage,
        /// Numbered source followed by the driver's info log.
        log: String,
    },
    /// A program failed to link.
    #[error("shader link error:\n{0}")]
    Link(String),
    /// A linked program cannot run against the current GL state.
    #[error("shader validation error:\n{log}")]
    Validate { log: String },
}

/// Prepends right-aligned line numbers to `source` and appends `log`, so
/// driver messages that cite line numbers can be matched to the GLSL.
pub fn format_shader_error(source: &str, log: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let width = lines.len().max(1).to_string().len();

    let numbered = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    match (numbered.is_empty(), log.is_empty()) {
        (true, _) => log.to_string(),
        (false, true) => numbered,
        (false, false) => format!("{numbered}\n\n{log}"),
    }
}

/// Compiles a single shader stage.
///
/// # Errors
///
/// Returns `ShaderError::Compile` if the GLSL source fails to compile.
#[allow(unsafe_code)]
pub fn compile_shader(
    gl: &glow::Context,
    stage: ShaderStage,
    source: &str,
) -> Result<glow::Shader, ShaderError> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. The stage enum is valid and
    // the shader is deleted on the failure path.
    let shader = unsafe {
        gl.create_shader(stage.gl_enum())
            .map_err(|log| ShaderError::Compile { stage, log })?
    };

    unsafe {
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if gl.get_shader_compile_status(shader) {
            return Ok(shader);
        }

        let info_log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        Err(ShaderError::Compile {
            stage,
            log: format_shader_error(source, &info_log),
        })
    }
}

/// Links a vertex and fragment shader into a program.
///
/// Both shaders are detached afterwards; the program keeps its own copies.
///
/// # Errors
///
/// Returns `ShaderError::Link` if linking fails.
#[allow(unsafe_code)]
pub fn link_program(
    gl: &glow::Context,
    vertex: glow::Shader,
    fragment: glow::Shader,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    // SAFETY: glow wraps raw GL calls as unsafe. Shader handles come from
    // compile_shader; the program is deleted on the failure path.
    unsafe {
        let program = gl.create_program().map_err(ShaderError::Link)?;
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        gl.detach_shader(program, vertex);
        gl.detach_shader(program, fragment);

        if gl.get_program_link_status(program) {
            return Ok(program);
        }

        let info_log = gl.get_program_info_log(program);
        gl.delete_program(program);
        Err(ShaderError::Link(info_log))
    }
}

/// Compiles vertex and fragment sources and links them into a program.
///
/// Shader objects are deleted whether or not linking succeeds.
///
/// # Errors
///
/// Returns `ShaderError::Compile` if either stage fails to compile, or
/// `ShaderError::Link` if linking fails.
#[allow(unsafe_code)]
pub fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program, ShaderError> {
    use glow::HasContext;

    let vert = compile_shader(gl, ShaderStage::Vertex, vertex_src)?;
    let frag = match compile_shader(gl, ShaderStage::Fragment, fragment_src) {
        Ok(f) => f,
        Err(e) => {
            // SAFETY: vert is a valid shader handle from compile_shader.
            unsafe { gl.delete_shader(vert) };
            return Err(e);
        }
    };

    let result = link_program(gl, vert, frag);

    // SAFETY: both handles are valid and no longer needed once linked.
    unsafe {
        gl.delete_shader(vert);
        gl.delete_shader(frag);
    }

    result
}

/// Builds the program for `kind`, logging and returning `None` on failure.
pub fn load_program(gl: &glow::Context, kind: ProgramKind) -> Option<glow::Program> {
    let (vertex, fragment) = glsl::sources(kind);
    match compile_program(gl, vertex, fragment) {
        Ok(program) => {
            tracing::trace!(?kind, "compiled shader program");
            Some(program)
        }
        Err(err) => {
            tracing::error!(?kind, error = %err, "failed to build shader program");
            None
        }
    }
}

/// Checks whether `program` can execute given the current GL state.
///
/// The result depends on what is bound, so call it with the state a draw
/// would use.
///
/// # Errors
///
/// Returns `ShaderError::Validate` with the driver's log if validation
/// fails.
#[allow(unsafe_code)]
pub fn validate_program(gl: &glow::Context, program: glow::Program) -> Result<(), ShaderError> {
    use glow::HasContext;

    // SAFETY: program is a live, linked handle of this context.
    let (valid, log) = unsafe {
        gl.validate_program(program);
        (
            gl.get_program_validate_status(program),
            gl.get_program_info_log(program),
        )
    };
    validation_outcome(valid, log)
}

fn validation_outcome(valid: bool, log: String) -> Result<(), ShaderError> {
    if valid {
        if !log.trim().is_empty() {
            tracing::debug!(log = %log.trim(), "shader validation log");
        }
        return Ok(());
    }
    Err(ShaderError::Validate { log })
}

/// Validates `program`, logging and returning false on failure.
pub fn check_program(gl: &glow::Context, kind: ProgramKind, program: glow::Program) -> bool {
    match validate_program(gl, program) {
        Ok(()) => true,
        Err(err) => {
            tracing::error!(?kind, error = %err, "shader program failed validation");
            false
        }
    }
}
