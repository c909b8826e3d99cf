use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use wgpu::naga;
use wgpu::naga::front::glsl;
use wgpu::naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};

/// Pipeline stage a source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn naga(self) -> naga::ShaderStage {
        match self {
            ShaderStage::Vertex => naga::ShaderStage::Vertex,
            ShaderStage::Fragment => naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failure to turn shader source into a usable program.
///
/// `Compile` and `Link` carry the diagnostic text exactly as the compiler
/// produced it.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("could not open shader source {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader compile error:\n{diagnostic}")]
    Compile {
        stage: ShaderStage,
        diagnostic: String,
    },
    #[error("shader link error:\n{diagnostic}")]
    Link { diagnostic: String },
}

impl ShaderError {
    /// Compiler or linker output, or the I/O error for unreadable files.
    pub fn diagnostic(&self) -> String {
        match self {
            ShaderError::Read { source, .. } => source.to_string(),
            ShaderError::Compile { diagnostic, .. } | ShaderError::Link { diagnostic } => {
                diagnostic.clone()
            }
        }
    }
}

/// Reads a shader file from disk in one go.
pub fn read_source(path: &Path) -> Result<String, ShaderError> {
    std::fs::read_to_string(path).map_err(|source| ShaderError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// One piece of a stage's source, labelled with where it came from.
///
/// The label is what diagnostics print in front of line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment<'a> {
    origin: Cow<'a, str>,
    text: Cow<'a, str>,
}

impl<'a> SourceFragment<'a> {
    pub fn new(origin: impl Into<Cow<'a, str>>, text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

const PREAMBLE_ORIGIN: &str = "<preamble>";
const EPILOGUE_ORIGIN: &str = "<epilogue>";

/// Source of the fixed vertex stage.
pub fn vertex_sources() -> [SourceFragment<'static>; 1] {
    [SourceFragment::new("<vertex>", VERTEX_SHADER)]
}

/// Source fragments for the fragment stage, in compilation order.
///
/// `origin` names the user's file in diagnostics. A `#version` directive
/// ahead of any code is blanked out so the preamble's directive stays the
/// only one; its line is kept so the user's line numbers are unchanged.
pub fn fragment_sources<'a>(user_source: &'a str, origin: &'a str) -> [SourceFragment<'a>; 3] {
    [
        SourceFragment::new(PREAMBLE_ORIGIN, FRAGMENT_PREAMBLE),
        SourceFragment::new(origin, strip_version_directive(user_source)),
        SourceFragment::new(EPILOGUE_ORIGIN, FRAGMENT_EPILOGUE),
    ]
}

fn strip_version_directive(source: &str) -> Cow<'_, str> {
    let mut offset = 0;
    let mut in_block_comment = false;
    for line in source.split_inclusive('\n') {
        let start = offset;
        offset += line.len();

        let mut code = line.trim();
        if in_block_comment {
            match code.find("*/") {
                Some(end) => {
                    in_block_comment = false;
                    code = code[end + 2..].trim_start();
                }
                None => continue,
            }
        }
        while let Some(rest) = code.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => code = rest[end + 2..].trim_start(),
                None => {
                    in_block_comment = true;
                    code = "";
                }
            }
        }
        if code.is_empty() || code.starts_with("//") {
            continue;
        }
        if !code.starts_with("#version") {
            break;
        }

        let directive = line.trim_end_matches(['\n', '\r']);
        let mut stripped = String::with_capacity(source.len());
        stripped.push_str(&source[..start]);
        stripped.push_str(&source[start + directive.len()..]);
        return Cow::Owned(stripped);
    }
    Cow::Borrowed(source)
}

/// Maps byte offsets in the joined source back to the fragment they came from.
struct SourceMap<'f, 'a> {
    fragments: &'f [SourceFragment<'a>],
    starts: Vec<usize>,
}

struct Position<'f> {
    origin: &'f str,
    line: usize,
    column: usize,
    text: &'f str,
}

impl<'f, 'a> SourceMap<'f, 'a> {
    fn new(fragments: &'f [SourceFragment<'a>]) -> Self {
        let mut starts = Vec::with_capacity(fragments.len());
        let mut offset = 0;
        for fragment in fragments {
            starts.push(offset);
            offset += fragment.text().len();
        }
        Self { fragments, starts }
    }

    fn locate(&self, offset: usize) -> Option<Position<'f>> {
        let index = self
            .starts
            .partition_point(|start| *start <= offset)
            .checked_sub(1)?;
        let fragments: &'f [SourceFragment<'a>] = self.fragments;
        let fragment = &fragments[index];
        let text = fragment.text();

        let mut local = (offset - self.starts[index]).min(text.len());
        while !text.is_char_boundary(local) {
            local -= 1;
        }
        let before = &text[..local];
        let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);
        let line_end = text[line_start..]
            .find('\n')
            .map_or(text.len(), |newline| line_start + newline);

        Some(Position {
            origin: fragment.origin(),
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            text: text[line_start..line_end].trim_end_matches('\r'),
        })
    }

    /// `origin:line:column: message` plus the offending line, or the bare
    /// message when the span is unknown.
    fn describe(&self, span: naga::Span, message: &str) -> String {
        match span.to_range().and_then(|range| self.locate(range.start)) {
            Some(position) => format!(
                "{}:{}:{}: {message}\n{:>5} | {}",
                position.origin, position.line, position.column, position.line, position.text
            ),
            None => message.to_string(),
        }
    }
}

/// A stage that passed the GLSL frontend and naga validation.
///
/// Keeps the IR around so the binder can reflect on names and usage without
/// touching the GPU.
pub struct ParsedStage {
    stage: ShaderStage,
    source: String,
    module: naga::Module,
    info: ModuleInfo,
}

impl ParsedStage {
    /// Concatenates `fragments` in order and parses them as one translation unit.
    ///
    /// Diagnostics carry line numbers relative to the fragment the error
    /// falls in.
    pub fn parse(stage: ShaderStage, fragments: &[SourceFragment<'_>]) -> Result<Self, ShaderError> {
        let source: String = fragments.iter().map(SourceFragment::text).collect();
        let map = SourceMap::new(fragments);

        let mut frontend = glsl::Frontend::default();
        let module = frontend
            .parse(&glsl::Options::from(stage.naga()), &source)
            .map_err(|errors| {
                let described: Vec<String> = errors
                    .errors
                    .iter()
                    .map(|error| map.describe(error.meta, &error.kind.to_string()))
                    .collect();
                ShaderError::Compile {
                    stage,
                    diagnostic: non_empty(described.join("\n"), || format!("{errors:?}")),
                }
            })?;

        let info = Validator::new(ValidationFlags::all(), Capabilities::all())
            .validate(&module)
            .map_err(|error| {
                let mut diagnostic = error.as_inner().to_string();
                for (span, label) in error.spans() {
                    diagnostic.push('\n');
                    diagnostic.push_str(&map.describe(*span, label));
                }
                ShaderError::Compile { stage, diagnostic }
            })?;

        Ok(Self {
            stage,
            source,
            module,
            info,
        })
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// `location` of a named entry-point input.
    pub(crate) fn input_location(&self, name: &str) -> Option<u32> {
        let entry = self.module.entry_points.first()?;
        entry.function.arguments.iter().find_map(|argument| {
            match (argument.name.as_deref(), argument.binding.as_ref()) {
                (Some(arg_name), Some(naga::Binding::Location { location, .. }))
                    if arg_name == name =>
                {
                    Some(*location)
                }
                _ => None,
            }
        })
    }

    /// Binding of the resource that declares `symbol`, if the entry point reads it.
    ///
    /// `symbol` is matched against global names and against members of
    /// anonymous uniform blocks.
    pub(crate) fn used_binding(&self, symbol: &str) -> Option<naga::ResourceBinding> {
        if self.module.entry_points.is_empty() {
            return None;
        }
        let usage = self.info.get_entry_point(0);
        self.module
            .global_variables
            .iter()
            .find(|(_, global)| self.declares(global, symbol))
            .filter(|(handle, _)| !usage[*handle].is_empty())
            .and_then(|(_, global)| global.binding.clone())
    }

    fn declares(&self, global: &naga::GlobalVariable, symbol: &str) -> bool {
        if global.name.as_deref() == Some(symbol) {
            return true;
        }
        match &self.module.types[global.ty].inner {
            naga::TypeInner::Struct { members, .. } if global.space == naga::AddressSpace::Uniform => {
                members
                    .iter()
                    .any(|member| member.name.as_deref() == Some(symbol))
            }
            _ => false,
        }
    }
}

fn non_empty(primary: String, fallback: impl FnOnce() -> String) -> String {
    if primary.trim().is_empty() {
        fallback()
    } else {
        primary
    }
}

/// A parsed stage together with its GPU shader module.
pub(crate) struct CompiledStage {
    pub parsed: ParsedStage,
    pub module: wgpu::ShaderModule,
}

/// Parses `fragments` and uploads the result as a shader module.
pub(crate) fn compile_stage(
    device: &wgpu::Device,
    stage: ShaderStage,
    fragments: &[SourceFragment<'_>],
) -> Result<CompiledStage, ShaderError> {
    let parsed = ParsedStage::parse(stage, fragments)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "shadeview vertex",
            ShaderStage::Fragment => "shadeview fragment",
        }),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(parsed.source.clone()),
            stage: stage.naga(),
            defines: &[],
        },
    });
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        return Err(ShaderError::Compile {
            stage,
            diagnostic: error.to_string(),
        });
    }

    Ok(CompiledStage { parsed, module })
}

/// Fixed vertex stage: positions the quad in pixel space and forwards texcoords.
pub const VERTEX_SHADER: &str = r"#version 450
layout(std140, set = 0, binding = 0) uniform ShadeviewProjection {
    mat4 u_pvm;
};

layout(location = 0) in vec2 in_vtx_pos;
layout(location = 1) in vec2 in_vtx_tex0;
layout(location = 0) out vec2 tex_coord;

void main() {
    tex_coord = in_vtx_tex0;
    gl_Position = u_pvm * vec4(in_vtx_pos, 0.0, 1.0);
}
";

/// Declarations placed ahead of the user's fragment body.
///
/// Each uniform lives in its own block so the binder can tell which ones the
/// linked program actually reads. Binding numbers must match
/// [`crate::gpu::uniforms::UniformSlot`] and the channel layout.
pub const FRAGMENT_PREAMBLE: &str = r"#version 450
layout(std140, set = 0, binding = 1) uniform ShadeviewTextureResolution {
    vec4 u_tex_res[4];
};
layout(std140, set = 0, binding = 2) uniform ShadeviewResolution {
    vec2 u_res;
};
layout(std140, set = 0, binding = 3) uniform ShadeviewTime {
    float u_time;
};
layout(std140, set = 0, binding = 4) uniform ShadeviewScale {
    float u_scale;
};

layout(set = 1, binding = 0) uniform texture2D u_tex0_image;
layout(set = 1, binding = 1) uniform texture2D u_tex1_image;
layout(set = 1, binding = 2) uniform texture2D u_tex2_image;
layout(set = 1, binding = 3) uniform texture2D u_tex3_image;
layout(set = 1, binding = 4) uniform sampler u_sampler;

#define u_tex0 sampler2D(u_tex0_image, u_sampler)
#define u_tex1 sampler2D(u_tex1_image, u_sampler)
#define u_tex2 sampler2D(u_tex2_image, u_sampler)
#define u_tex3 sampler2D(u_tex3_image, u_sampler)

layout(location = 0) in vec2 tex_coord;
layout(location = 0) out vec4 out_color;

";

/// Entry point appended after the user's fragment body.
///
/// Remaps the framebuffer's top-left origin to a bottom-left one, applies
/// the zoom, and hands the coordinate to `main_image`.
pub const FRAGMENT_EPILOGUE: &str = r"
void main() {
    vec2 coord = vec2(gl_FragCoord.x, u_res.y - gl_FragCoord.y) / u_scale;
    out_color = main_image(coord);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const GRADIENT: &str = r"
vec4 main_image(vec2 coord) {
    return vec4(coord / u_res, 0.5 + 0.5 * sin(u_time), 1.0);
}
";

    fn parse_body(body: &str) -> Result<ParsedStage, ShaderError> {
        ParsedStage::parse(ShaderStage::Fragment, &fragment_sources(body, "wave.glsl"))
    }

    #[test]
    fn fragments_are_concatenated_in_order() {
        let sources = fragment_sources(GRADIENT, "wave.glsl");
        assert_eq!(sources[0].text(), FRAGMENT_PREAMBLE);
        assert_eq!(sources[1].text(), GRADIENT);
        assert_eq!(sources[1].origin(), "wave.glsl");
        assert_eq!(sources[2].text(), FRAGMENT_EPILOGUE);

        let parsed = ParsedStage::parse(ShaderStage::Fragment, &sources).unwrap();
        let preamble_at = parsed.source().find("u_tex_res[4]").unwrap();
        let body_at = parsed.source().find("vec4 main_image").unwrap();
        let epilogue_at = parsed.source().find("void main()").unwrap();
        assert!(preamble_at < body_at && body_at < epilogue_at);
    }

    #[test]
    fn version_directive_in_user_source_is_blanked() {
        let source = "#version 330 core\nvec4 main_image(vec2 coord) { return vec4(1.0); }\n";
        let sources = fragment_sources(source, "wave.glsl");
        assert!(!sources[1].text().contains("#version"));
        assert_eq!(sources[1].text().lines().count(), source.lines().count());
        assert!(ParsedStage::parse(ShaderStage::Fragment, &sources).is_ok());
    }

    #[test]
    fn version_directive_after_comments_is_blanked() {
        let source = "// wave.glsl: uses #version 330 features\n/* header\n   block */\n\n#version 330 core\nvec4 main_image(vec2 coord) { return vec4(1.0); }\n";
        let sources = fragment_sources(source, "wave.glsl");
        let body = sources[1].text();
        assert!(!body.contains("#version 330 core"));
        assert!(body.starts_with("// wave.glsl: uses #version 330 features\n"));
        assert_eq!(body.lines().count(), source.lines().count());
        assert!(ParsedStage::parse(ShaderStage::Fragment, &sources).is_ok());
    }

    #[test]
    fn version_after_code_is_left_alone() {
        let source = "float k = 1.0;\n#version 330\n";
        assert!(matches!(strip_version_directive(source), Cow::Borrowed(_)));
        assert!(matches!(strip_version_directive(""), Cow::Borrowed(_)));
    }

    #[test]
    fn fixed_vertex_stage_parses() {
        let parsed = ParsedStage::parse(ShaderStage::Vertex, &vertex_sources()).unwrap();
        assert_eq!(parsed.stage(), ShaderStage::Vertex);
        assert_eq!(parsed.input_location("in_vtx_pos"), Some(0));
        assert_eq!(parsed.input_location("in_vtx_tex0"), Some(1));
        assert_eq!(parsed.input_location("in_missing"), None);
    }

    #[test]
    fn syntax_error_yields_diagnostic() {
        let broken = "vec4 main_image(vec2 coord) { return vec4(coord, 0.0 1.0); }\n";
        let error = parse_body(broken).err().expect("syntax error must fail");
        assert!(matches!(
            error,
            ShaderError::Compile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert!(!error.diagnostic().trim().is_empty());
    }

    #[test]
    fn diagnostics_use_the_user_file_line_numbers() {
        let broken = "vec4 main_image(vec2 coord) {\n    return vec4(coord, 0.0 1.0);\n}\n";
        let error = parse_body(broken).err().expect("syntax error must fail");
        let diagnostic = error.diagnostic();
        assert!(diagnostic.contains("wave.glsl:2:"), "{diagnostic}");
        assert!(diagnostic.contains("return vec4(coord, 0.0 1.0);"), "{diagnostic}");

        let preamble_lines = FRAGMENT_PREAMBLE.lines().count();
        assert!(
            !diagnostic.contains(&format!("wave.glsl:{}:", preamble_lines + 2)),
            "{diagnostic}"
        );
    }

    #[test]
    fn blanked_version_keeps_error_lines() {
        let broken = "#version 330\nvec4 main_image(vec2 coord) {\n    return vec4(coord 1.0);\n}\n";
        let error = parse_body(broken).err().expect("syntax error must fail");
        assert!(error.diagnostic().contains("wave.glsl:3:"), "{}", error.diagnostic());
    }

    #[test]
    fn source_map_locates_fragment_offsets() {
        let fragments = [
            SourceFragment::new("a", "one\ntwo\n"),
            SourceFragment::new("b", ""),
            SourceFragment::new("c", "x\n  yz"),
        ];
        let map = SourceMap::new(&fragments);

        let position = map.locate(4).unwrap();
        assert_eq!((position.origin, position.line, position.column), ("a", 2, 1));
        assert_eq!(position.text, "two");

        let position = map.locate(8 + 4).unwrap();
        assert_eq!((position.origin, position.line, position.column), ("c", 2, 3));
        assert_eq!(position.text, "  yz");

        assert_eq!(map.describe(naga::Span::UNDEFINED, "bare"), "bare");
    }

    #[test]
    fn missing_entry_function_fails() {
        let body = "vec4 helper(vec2 coord) { return vec4(coord, 0.0, 1.0); }\n";
        let error = parse_body(body).err().expect("main_image is required");
        assert!(!error.diagnostic().is_empty());
    }

    #[test]
    fn used_binding_tracks_entry_point_usage() {
        let parsed = parse_body(GRADIENT).unwrap();
        let time = parsed.used_binding("u_time").expect("u_time is read");
        assert_eq!((time.group, time.binding), (0, 3));
        assert!(parsed.used_binding("u_scale").is_some());
        assert!(parsed.used_binding("u_tex_res").is_none());
        assert!(parsed.used_binding("u_tex0_image").is_none());
    }

    #[test]
    fn texture_macros_resolve_to_images() {
        let body = r"
vec4 main_image(vec2 coord) {
    return texture(u_tex2, coord / u_tex_res[2].xy);
}
";
        let parsed = parse_body(body).unwrap();
        let image = parsed.used_binding("u_tex2_image").expect("channel 2 sampled");
        assert_eq!((image.group, image.binding), (1, 2));
        assert!(parsed.used_binding("u_sampler").is_some());
        assert!(parsed.used_binding("u_tex_res").is_some());
        assert!(parsed.used_binding("u_tex0_image").is_none());
    }

    #[test]
    fn read_source_reports_missing_file() {
        let error = read_source(Path::new("/definitely/not/here.glsl")).unwrap_err();
        assert!(matches!(error, ShaderError::Read { .. }));
        assert!(error.to_string().contains("here.glsl"));
    }
}
