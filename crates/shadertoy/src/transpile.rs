//! Rewrites ShaderToy-convention fragment source into a standalone fragment
//! stage.
//!
//! Only the `mainImage` header is touched: it becomes `void main() {` followed
//! by a local bound to the rasterizer fragment coordinate, while the `out`
//! parameter turns into a fragment output global. Everything from the opening
//! brace onward stays byte-for-byte identical and keeps its original line
//! number, so compiler diagnostics can be mapped back with a constant offset.
//!
//! Sources without a `mainImage` header pass through unchanged. That is also
//! what makes the transform idempotent: its own output has no such header.
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::diagnostics::LineMap;
use crate::uniforms;

const HEADER_PATTERN: &str = r"\bvoid\s+mainImage\s*\(([^)]*)\)\s*\{";
const PRECISION_QUALIFIERS: &[&str] = &["lowp", "mediump", "highp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// GLSL 450 with a std140 uniform block and split texture/sampler bindings,
    /// as consumed by wgpu.
    #[default]
    Vulkan,
    /// GLSL 330 core with loose uniforms.
    OpenGl,
}

impl Dialect {
    fn version_directive(self) -> &'static str {
        match self {
            Dialect::Vulkan => "#version 450",
            Dialect::OpenGl => "#version 330 core",
        }
    }

    fn output_declaration(self, location: usize, param: &Parameter) -> String {
        match self {
            Dialect::Vulkan => format!(
                "layout(location = {location}) out {} {};",
                param.ty, param.name
            ),
            Dialect::OpenGl => format!("out {} {};", param.ty, param.name),
        }
    }

    fn frag_coord_local(self, param: &Parameter) -> String {
        match self {
            // wgpu rasterizes with a top-left origin.
            Dialect::Vulkan => format!(
                "{ty} {name} = {ty}(gl_FragCoord.x, iResolution.y - gl_FragCoord.y);",
                ty = param.ty,
                name = param.name
            ),
            Dialect::OpenGl => format!("{} {} = gl_FragCoord.xy;", param.ty, param.name),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dialect::Vulkan => f.write_str("vulkan"),
            Dialect::OpenGl => f.write_str("opengl"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranspileOptions {
    pub dialect: Dialect,
    /// Emits `HW_PERFORMANCE 0` instead of `1`.
    pub low_performance: bool,
    /// Rejects malformed `mainImage` parameters instead of skipping them.
    pub strict: bool,
}

impl Default for TranspileOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Vulkan,
            low_performance: true,
            strict: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryPoint {
    /// A `main` entry point was synthesized from `mainImage`.
    Synthesized,
    /// No `mainImage` header was found; the source was left as written.
    PassThrough,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranspiledShader {
    pub source: String,
    pub uniforms: Vec<&'static str>,
    pub preamble_lines: usize,
    pub entry_point: EntryPoint,
    pub skipped_parameters: Vec<String>,
}

impl TranspiledShader {
    fn pass_through(source: &str) -> Self {
        Self {
            source: source.to_string(),
            uniforms: Vec::new(),
            preamble_lines: 0,
            entry_point: EntryPoint::PassThrough,
            skipped_parameters: Vec::new(),
        }
    }

    pub fn declares(&self, name: &str) -> bool {
        self.uniforms.iter().any(|declared| *declared == name)
    }

    pub fn line_map(&self) -> LineMap {
        LineMap::new(self.preamble_lines)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranspileError {
    #[error("mainImage parameter `{0}` is not of the form `out T name` or `in T name`")]
    MalformedParameter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Qualifier {
    Out,
    In,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Parameter {
    ty: String,
    name: String,
}

#[derive(Debug, Default)]
struct Signature {
    outputs: Vec<Parameter>,
    inputs: Vec<Parameter>,
    skipped: Vec<String>,
}

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(HEADER_PATTERN).expect("mainImage header pattern is valid"))
}

/// Transpiles `source` into a fragment stage for `options.dialect`.
pub fn transpile(
    source: &str,
    options: &TranspileOptions,
) -> Result<TranspiledShader, TranspileError> {
    let comments = comment_spans(source);
    let in_comment = |offset: usize| comments.iter().any(|span| span.contains(&offset));
    let Some(captures) = header_regex()
        .captures_iter(source)
        .find(|caps| caps.get(0).is_some_and(|header| !in_comment(header.start())))
    else {
        debug!("no mainImage header found; passing shader source through");
        return Ok(TranspiledShader::pass_through(source));
    };
    let (Some(header), Some(params)) = (captures.get(0), captures.get(1)) else {
        return Ok(TranspiledShader::pass_through(source));
    };

    let signature = parse_signature(params.as_str(), options.strict)?;
    let dialect = options.dialect;

    let mut preamble = vec![
        dialect.version_directive().to_string(),
        format!(
            "#define HW_PERFORMANCE {}",
            if options.low_performance { 0 } else { 1 }
        ),
    ];
    let uniforms = uniforms::declare(dialect, &mut preamble);
    for (location, output) in signature.outputs.iter().enumerate() {
        preamble.push(dialect.output_declaration(location, output));
    }
    let preamble_lines = preamble.len();

    let mut entry = String::from("void main() {");
    for input in &signature.inputs {
        entry.push(' ');
        entry.push_str(&dialect.frag_coord_local(input));
    }
    for _ in header.as_str().matches('\n') {
        entry.push('\n');
    }

    let before = sanitize(&source[..header.start()]);
    let after = &source[header.end()..];

    let mut output =
        String::with_capacity(source.len() + preamble.iter().map(|l| l.len() + 1).sum::<usize>());
    for line in &preamble {
        output.push_str(line);
        output.push('\n');
    }
    output.push_str(&before);
    output.push_str(&entry);
    output.push_str(after);

    debug!(
        dialect = %dialect,
        preamble_lines,
        skipped = signature.skipped.len(),
        "transpiled mainImage into fragment entry point"
    );

    Ok(TranspiledShader {
        source: output,
        uniforms,
        preamble_lines,
        entry_point: EntryPoint::Synthesized,
        skipped_parameters: signature.skipped,
    })
}

fn parse_signature(params: &str, strict: bool) -> Result<Signature, TranspileError> {
    let mut signature = Signature::default();
    for raw in params.split(',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match parse_parameter(raw) {
            Some((Qualifier::Out, param)) => signature.outputs.push(param),
            Some((Qualifier::In, param)) => signature.inputs.push(param),
            None if strict => return Err(TranspileError::MalformedParameter(raw.to_string())),
            None => {
                let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
                warn!(parameter = %normalized, "skipping malformed mainImage parameter");
                signature.skipped.push(normalized);
            }
        }
    }
    Ok(signature)
}

fn parse_parameter(raw: &str) -> Option<(Qualifier, Parameter)> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let qualifier = match tokens[0] {
        "out" => Qualifier::Out,
        "in" => Qualifier::In,
        _ => return None,
    };
    let ty = tokens[tokens.len() - 2];
    let name = tokens[tokens.len() - 1];
    if !is_identifier(ty) || !is_identifier(name) {
        return None;
    }
    Some((
        qualifier,
        Parameter {
            ty: ty.to_string(),
            name: name.to_string(),
        },
    ))
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Comments out `#version` directives and redeclared implicit uniforms in
/// place so line numbers are unchanged.
fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for line in text.split_inclusive('\n') {
        if redeclares_builtin(line) {
            out.push_str("// ");
        }
        out.push_str(line);
    }
    out
}

fn redeclares_builtin(line: &str) -> bool {
    let code = line.split("//").next().unwrap_or_default().trim_start();
    if code.starts_with("#version") {
        return true;
    }
    let Some(rest) = code.strip_prefix("uniform") else {
        return false;
    };
    if !rest.starts_with(char::is_whitespace) {
        return false;
    }
    declared_names(rest).any(uniforms::is_implicit)
}

/// Names declared by the text following a `uniform` keyword, skipping
/// precision qualifiers and the type.
fn declared_names(declaration: &str) -> impl Iterator<Item = &str> {
    let declaration = declaration.split(';').next().unwrap_or_default();
    let mut rest = declaration.trim_start();
    loop {
        let Some((word, tail)) = rest.split_once(char::is_whitespace) else {
            rest = "";
            break;
        };
        rest = tail.trim_start();
        if !PRECISION_QUALIFIERS.contains(&word) {
            break;
        }
    }
    rest.split(',').filter_map(|declarator| {
        declarator
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .find(|token| !token.is_empty())
    })
}

/// Byte ranges covered by `//` line comments and `/* */` block comments.
fn comment_spans(source: &str) -> Vec<Range<usize>> {
    let bytes = source.as_bytes();
    let mut spans = Vec::new();
    let mut index = 0;
    while index + 1 < bytes.len() {
        match (bytes[index], bytes[index + 1]) {
            (b'/', b'/') => {
                let end = source[index..]
                    .find('\n')
                    .map_or(source.len(), |offset| index + offset);
                spans.push(index..end);
                index = end;
            }
            (b'/', b'*') => {
                let end = source[index + 2..]
                    .find("*/")
                    .map_or(source.len(), |offset| index + 2 + offset + 2);
                spans.push(index..end);
                index = end;
            }
            _ => index += 1,
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    const GRADIENT: &str = "void mainImage( out vec4 fragColor, in vec2 fragCoord ) { fragColor = vec4(fragCoord.xy/iResolution.xy, 0.0, 1.0); }";

    fn opengl() -> TranspileOptions {
        TranspileOptions {
            dialect: Dialect::OpenGl,
            ..TranspileOptions::default()
        }
    }

    #[test]
    fn synthesizes_entry_point_for_gradient() {
        let shader = transpile(GRADIENT, &opengl()).unwrap();

        assert_eq!(shader.entry_point, EntryPoint::Synthesized);
        for uniform in crate::uniforms::IMPLICIT_UNIFORMS {
            assert!(shader.declares(uniform.name), "missing {}", uniform.name);
        }
        assert!(shader.source.contains("uniform vec2 iResolution;"));
        assert!(shader.source.contains("out vec4 fragColor;"));
        assert!(shader.source.contains("vec2 fragCoord = gl_FragCoord.xy;"));
        assert!(shader
            .source
            .contains("fragColor = vec4(fragCoord.xy/iResolution.xy, 0.0, 1.0);"));
        assert!(!shader.source.contains("mainImage"));
        assert!(shader.source.starts_with("#version 330 core\n#define HW_PERFORMANCE 0\n"));
    }

    #[test]
    fn vulkan_dialect_flips_frag_coord() {
        let shader = transpile(GRADIENT, &TranspileOptions::default()).unwrap();
        assert!(shader.source.starts_with("#version 450\n"));
        assert!(shader
            .source
            .contains("layout(location = 0) out vec4 fragColor;"));
        assert!(shader
            .source
            .contains("vec2 fragCoord = vec2(gl_FragCoord.x, iResolution.y - gl_FragCoord.y);"));
    }

    #[test]
    fn second_pass_is_a_no_op() {
        for options in [opengl(), TranspileOptions::default()] {
            let once = transpile(GRADIENT, &options).unwrap();
            let twice = transpile(&once.source, &options).unwrap();
            assert_eq!(twice.entry_point, EntryPoint::PassThrough);
            assert_eq!(twice.source, once.source);
            assert_eq!(twice.source.matches("void main()").count(), 1);
        }
    }

    #[test]
    fn passes_through_conventional_entry_point() {
        let source = "#version 330 core\nout vec4 c;\nvoid main() { c = vec4(1.0); }\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert_eq!(shader.entry_point, EntryPoint::PassThrough);
        assert_eq!(shader.source, source);
        assert!(shader.uniforms.is_empty());
        assert_eq!(shader.preamble_lines, 0);
    }

    #[test]
    fn high_performance_define() {
        let options = TranspileOptions {
            low_performance: false,
            ..opengl()
        };
        let shader = transpile(GRADIENT, &options).unwrap();
        assert!(shader.source.contains("#define HW_PERFORMANCE 1\n"));
    }

    #[test]
    fn keeps_author_names_and_types() {
        let source = "void mainImage(out vec4 O, in vec2 U)\n{\n    O = vec4(U, 0., 1.);\n}\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert!(shader.source.contains("out vec4 O;"));
        assert!(shader.source.contains("void main() { vec2 U = gl_FragCoord.xy;"));
        assert!(shader.source.contains("    O = vec4(U, 0., 1.);\n}\n"));
    }

    #[test]
    fn body_lines_keep_their_numbers() {
        let source = "// header comment\nfloat helper() { return 1.0; }\nvoid mainImage(\n    out vec4 fragColor,\n    in vec2 fragCoord)\n{\n    fragColor = vec4(helper());\n}\n";
        let shader = transpile(source, &TranspileOptions::default()).unwrap();
        let generated: Vec<&str> = shader.source.lines().collect();
        for (index, line) in source.lines().enumerate() {
            if line.contains("fragColor = vec4(helper())") || line.contains("helper()") {
                assert_eq!(generated[shader.preamble_lines + index], line);
            }
        }
    }

    #[test]
    fn comments_out_redeclared_uniforms_and_version() {
        let source = "#version 300 es\nuniform float iTime;\nuniform vec3 iResolution;\nuniform float myParam;\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(iTime); }\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert!(shader.source.contains("// #version 300 es\n"));
        assert!(shader.source.contains("// uniform float iTime;\n"));
        assert!(shader.source.contains("// uniform vec3 iResolution;\n"));
        assert!(shader.source.contains("\nuniform float myParam;\n"));
        assert_eq!(
            shader.source.lines().count(),
            shader.preamble_lines + source.lines().count()
        );
    }

    #[test]
    fn skips_malformed_parameter_leniently() {
        let source = "void mainImage(out vec4 fragColor, vec2 fragCoord) { fragColor = vec4(1.0); }";
        let shader = transpile(source, &opengl()).unwrap();
        assert_eq!(shader.skipped_parameters, vec!["vec2 fragCoord".to_string()]);
        assert!(shader.source.contains("out vec4 fragColor;"));
        assert!(!shader.source.contains("gl_FragCoord.xy"));
    }

    #[test]
    fn strict_mode_rejects_malformed_parameter() {
        let source = "void mainImage(inout vec4 fragColor, in vec2 fragCoord) { }";
        let options = TranspileOptions {
            strict: true,
            ..opengl()
        };
        let err = transpile(source, &options).unwrap_err();
        assert_eq!(
            err,
            TranspileError::MalformedParameter("inout vec4 fragColor".to_string())
        );
    }

    #[test]
    fn ignores_prototype_without_body() {
        let source = "void mainImage(out vec4 c, in vec2 p);\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(p, 0., 1.); }\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert!(shader.source.contains("void mainImage(out vec4 c, in vec2 p);\n"));
        assert!(shader
            .source
            .contains("void main() { vec2 p = gl_FragCoord.xy; c = vec4(p, 0., 1.); }"));
    }

    #[test]
    fn commented_out_headers_are_not_rewritten() {
        let body = "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    fragColor = vec4(1.0);\n}\n";
        let sources = [
            format!("// old: void mainImage(out vec4 c, in vec2 p) {{ c = vec4(0.); }}\n{body}"),
            format!("/* previous version\nvoid mainImage(out vec4 c, in vec2 p) {{\n    c = vec4(0.);\n}}\n*/\n{body}"),
        ];
        for source in &sources {
            let shader = transpile(source, &opengl()).unwrap();
            assert_eq!(shader.entry_point, EntryPoint::Synthesized);
            assert!(shader.source.contains("out vec4 fragColor;"));
            assert!(!shader.source.contains("out vec4 c;"));
            assert!(shader
                .source
                .contains("void main() { vec2 fragCoord = gl_FragCoord.xy;\n    fragColor = vec4(1.0);"));
            assert!(shader.source.contains("void mainImage(out vec4 c, in vec2 p)"));
            assert!(!shader.source.contains("\nvoid mainImage(out vec4 fragColor"));

            let again = transpile(&shader.source, &opengl()).unwrap();
            assert_eq!(again.entry_point, EntryPoint::PassThrough);
            assert_eq!(again.source, shader.source);
        }
    }

    #[test]
    fn only_commented_header_passes_through() {
        let source = "// void mainImage(out vec4 c, in vec2 p) { }\nvoid main() { }\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert_eq!(shader.entry_point, EntryPoint::PassThrough);
        assert_eq!(shader.source, source);
    }

    #[test]
    fn uniform_check_ignores_trailing_comments() {
        let source = "uniform float speed; // scales iTime\nuniform highp float iTime; // clock\nuniform vec3 iChannelResolution[4];\nuniform vec2 offset = vec2(0.0); /* iMouse */\nuniformity();\nvoid mainImage(out vec4 c, in vec2 p) { c = vec4(speed); }\n";
        let shader = transpile(source, &opengl()).unwrap();
        assert!(shader
            .source
            .contains("\nuniform float speed; // scales iTime\n"));
        assert!(shader.source.contains("// uniform highp float iTime; // clock\n"));
        assert!(shader
            .source
            .contains("// uniform vec3 iChannelResolution[4];\n"));
        assert!(shader
            .source
            .contains("\nuniform vec2 offset = vec2(0.0); /* iMouse */\n"));
        assert!(shader.source.contains("\nuniformity();\n"));
    }
}
