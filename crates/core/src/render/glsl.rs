//! GLSL sources for the seven programs behind the shader catalog.
//!
//! All stages target `#version 150 core`. Attribute and uniform names
//! are shared across programs so the catalog can cache locations by name:
//! `a_position`, `a_texCoord`, `s_texture0` (drawable texture),
//! `s_texture1` (mask buffer), `u_matrix`, `u_clipMatrix`,
//! `u_channelFlag`, `u_baseColor`, `u_multiplyColor`, `u_screenColor`.
//!
//! Mask buffers are cleared to white and clip shapes multiply the selected
//! channel toward zero, so masked programs sample `1 - mask`.

use crate::variant::ProgramKind;

/// Rasterizes clip shapes into one channel of a mask cell.
///
/// `u_baseColor` carries the cell edges in clip space
/// (`min_x, min_y, max_x, max_y`); fragments outside the cell write zero.
pub const SETUP_MASK_VERTEX: &str = r#"#version 150 core
in vec4 a_position;
in vec2 a_texCoord;
out vec2 v_texCoord;
out vec4 v_myPos;
uniform mat4 u_clipMatrix;
void main() {
    gl_Position = u_clipMatrix * a_position;
    v_myPos = u_clipMatrix * a_position;
    v_texCoord = a_texCoord;
    v_texCoord.y = 1.0 - v_texCoord.y;
}
"#;

pub const SETUP_MASK_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
in vec4 v_myPos;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform vec4 u_channelFlag;
uniform vec4 u_baseColor;
void main() {
    float isInside =
        step(u_baseColor.x, v_myPos.x / v_myPos.w)
        * step(u_baseColor.y, v_myPos.y / v_myPos.w)
        * step(v_myPos.x / v_myPos.w, u_baseColor.z)
        * step(v_myPos.y / v_myPos.w, u_baseColor.w);
    fragColor = u_channelFlag * texture(s_texture0, v_texCoord).a * isInside;
}
"#;

pub const NORMAL_VERTEX: &str = r#"#version 150 core
in vec4 a_position;
in vec2 a_texCoord;
out vec2 v_texCoord;
uniform mat4 u_matrix;
void main() {
    gl_Position = u_matrix * a_position;
    v_texCoord = a_texCoord;
    v_texCoord.y = 1.0 - v_texCoord.y;
}
"#;

/// Like [`NORMAL_VERTEX`], plus the position in mask texture space.
pub const MASKED_VERTEX: &str = r#"#version 150 core
in vec4 a_position;
in vec2 a_texCoord;
out vec2 v_texCoord;
out vec4 v_clipPos;
uniform mat4 u_matrix;
uniform mat4 u_clipMatrix;
void main() {
    gl_Position = u_matrix * a_position;
    v_clipPos = u_clipMatrix * a_position;
    v_texCoord = a_texCoord;
    v_texCoord.y = 1.0 - v_texCoord.y;
}
"#;

/// Straight-alpha texture; output is premultiplied for the blend stage.
pub const NORMAL_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = texColor.rgb + u_screenColor.rgb - (texColor.rgb * u_screenColor.rgb);
    vec4 color = texColor * u_baseColor;
    fragColor = vec4(color.rgb * color.a, color.a);
}
"#;

pub const NORMAL_PREMULTIPLIED_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = (texColor.rgb + u_screenColor.rgb * texColor.a) - (texColor.rgb * u_screenColor.rgb);
    fragColor = texColor * u_baseColor;
}
"#;

pub const MASKED_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
in vec4 v_clipPos;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform sampler2D s_texture1;
uniform vec4 u_channelFlag;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = texColor.rgb + u_screenColor.rgb - (texColor.rgb * u_screenColor.rgb);
    vec4 col_formask = texColor * u_baseColor;
    col_formask.rgb = col_formask.rgb * col_formask.a;
    vec4 clipMask = (1.0 - texture(s_texture1, v_clipPos.xy / v_clipPos.w)) * u_channelFlag;
    float maskVal = clipMask.r + clipMask.g + clipMask.b + clipMask.a;
    fragColor = col_formask * maskVal;
}
"#;

pub const MASKED_INVERTED_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
in vec4 v_clipPos;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform sampler2D s_texture1;
uniform vec4 u_channelFlag;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = texColor.rgb + u_screenColor.rgb - (texColor.rgb * u_screenColor.rgb);
    vec4 col_formask = texColor * u_baseColor;
    col_formask.rgb = col_formask.rgb * col_formask.a;
    vec4 clipMask = (1.0 - texture(s_texture1, v_clipPos.xy / v_clipPos.w)) * u_channelFlag;
    float maskVal = clipMask.r + clipMask.g + clipMask.b + clipMask.a;
    fragColor = col_formask * (1.0 - maskVal);
}
"#;

pub const MASKED_PREMULTIPLIED_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
in vec4 v_clipPos;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform sampler2D s_texture1;
uniform vec4 u_channelFlag;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = (texColor.rgb + u_screenColor.rgb * texColor.a) - (texColor.rgb * u_screenColor.rgb);
    vec4 col_formask = texColor * u_baseColor;
    vec4 clipMask = (1.0 - texture(s_texture1, v_clipPos.xy / v_clipPos.w)) * u_channelFlag;
    float maskVal = clipMask.r + clipMask.g + clipMask.b + clipMask.a;
    fragColor = col_formask * maskVal;
}
"#;

pub const MASKED_INVERTED_PREMULTIPLIED_FRAGMENT: &str = r#"#version 150 core
in vec2 v_texCoord;
in vec4 v_clipPos;
out vec4 fragColor;
uniform sampler2D s_texture0;
uniform sampler2D s_texture1;
uniform vec4 u_channelFlag;
uniform vec4 u_baseColor;
uniform vec4 u_multiplyColor;
uniform vec4 u_screenColor;
void main() {
    vec4 texColor = texture(s_texture0, v_texCoord);
    texColor.rgb = texColor.rgb * u_multiplyColor.rgb;
    texColor.rgb = (texColor.rgb + u_screenColor.rgb * texColor.a) - (texColor.rgb * u_screenColor.rgb);
    vec4 col_formask = texColor * u_baseColor;
    vec4 clipMask = (1.0 - texture(s_texture1, v_clipPos.xy / v_clipPos.w)) * u_channelFlag;
    float maskVal = clipMask.r + clipMask.g + clipMask.b + clipMask.a;
    fragColor = col_formask * (1.0 - maskVal);
}
"#;

/// Vertex and fragment source for a program kind.
pub fn sources(kind: ProgramKind) -> (&'static str, &'static str) {
    match kind {
        ProgramKind::SetupMask => (SETUP_MASK_VERTEX, SETUP_MASK_FRAGMENT),
        ProgramKind::Plain => (NORMAL_VERTEX, NORMAL_FRAGMENT),
        ProgramKind::Masked => (MASKED_VERTEX, MASKED_FRAGMENT),
        ProgramKind::MaskedInverted => (MASKED_VERTEX, MASKED_INVERTED_FRAGMENT),
        ProgramKind::PlainPremultiplied => (NORMAL_VERTEX, NORMAL_PREMULTIPLIED_FRAGMENT),
        ProgramKind::MaskedPremultiplied => (MASKED_VERTEX, MASKED_PREMULTIPLIED_FRAGMENT),
        ProgramKind::MaskedInvertedPremultiplied => {
            (MASKED_VERTEX, MASKED_INVERTED_PREMULTIPLIED_FRAGMENT)
        }
    }
}
