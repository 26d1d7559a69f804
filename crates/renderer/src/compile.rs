use std::borrow::Cow;
use std::error::Error as StdError;

use anyhow::{anyhow, Context, Result};
use shadertoy::{transpile, Dialect, TranspileOptions, TranspiledShader};
use tracing::debug;
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::types::ShaderCompiler;

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Transpiles ShaderToy source for wgpu and checks it with naga's GLSL
/// frontend and validator, without touching a GPU.
///
/// The dialect is forced to [`Dialect::Vulkan`]. Diagnostics are reported as
/// `label:LINE:COLUMN: message` with lines counted in the author's file.
pub fn validate_fragment(
    source: &str,
    label: &str,
    options: &TranspileOptions,
) -> Result<TranspiledShader> {
    let transpiled = transpile_for_wgpu(source, label, options)?;
    let map = transpiled.line_map();

    let mut frontend = Frontend::default();
    let module = frontend
        .parse(&Options::from(ShaderStage::Fragment), &transpiled.source)
        .map_err(|errors| {
            let report = errors
                .errors
                .iter()
                .map(|err| {
                    let location = err.meta.location(&transpiled.source);
                    format!(
                        "{label}:{}:{}: {}",
                        map.locate(location.line_number as usize),
                        location.line_position,
                        err.kind
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            anyhow!("failed to compile shader {label}:\n{report}")
        })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|err| {
            anyhow!(
                "shader {label} failed validation: {}",
                error_chain(err.as_inner())
            )
        })?;

    Ok(transpiled)
}

/// Transpiles and compiles a ShaderToy fragment shader into a module.
pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    source: &str,
    label: &str,
    options: &TranspileOptions,
    compiler: ShaderCompiler,
) -> Result<wgpu::ShaderModule> {
    match compiler {
        ShaderCompiler::NagaGlsl => {
            let transpiled = validate_fragment(source, label, options)?;
            Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(transpiled.source),
                    stage: ShaderStage::Fragment,
                    defines: &[],
                },
            }))
        }
        ShaderCompiler::Shaderc => {
            let transpiled = transpile_for_wgpu(source, label, options)?;
            compile_with_shaderc(device, &transpiled, label)
        }
    }
}

fn transpile_for_wgpu(
    source: &str,
    label: &str,
    options: &TranspileOptions,
) -> Result<TranspiledShader> {
    let options = TranspileOptions {
        dialect: Dialect::Vulkan,
        ..*options
    };
    let transpiled =
        transpile(source, &options).with_context(|| format!("failed to transpile {label}"))?;
    debug!(
        shader = label,
        preamble_lines = transpiled.preamble_lines,
        entry_point = ?transpiled.entry_point,
        "prepared fragment stage"
    );
    Ok(transpiled)
}

#[cfg(feature = "shaderc")]
fn compile_with_shaderc(
    device: &wgpu::Device,
    transpiled: &TranspiledShader,
    label: &str,
) -> Result<wgpu::ShaderModule> {
    let compiler =
        shaderc::Compiler::new().map_err(|err| anyhow!("failed to initialise shaderc: {err}"))?;
    let mut options = shaderc::CompileOptions::new()
        .map_err(|err| anyhow!("failed to create shaderc options: {err}"))?;
    options.set_source_language(shaderc::SourceLanguage::GLSL);
    options.set_target_env(
        shaderc::TargetEnv::Vulkan,
        shaderc::EnvVersion::Vulkan1_0 as u32,
    );
    let file_name = diagnostic_file_name(label);
    let artifact = compiler
        .compile_into_spirv(
            &transpiled.source,
            shaderc::ShaderKind::Fragment,
            &file_name,
            "main",
            Some(&options),
        )
        .map_err(|err| {
            anyhow!(
                "failed to compile shader {label}:\n{}",
                transpiled.line_map().remap(&err.to_string())
            )
        })?;
    if artifact.get_num_warnings() > 0 {
        tracing::warn!(
            shader = label,
            warnings = %transpiled.line_map().remap(&artifact.get_warning_messages()),
            "shaderc reported warnings"
        );
    }

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::SpirV(Cow::Owned(artifact.as_binary().to_vec())),
    }))
}

#[cfg(not(feature = "shaderc"))]
fn compile_with_shaderc(
    _device: &wgpu::Device,
    _transpiled: &TranspiledShader,
    label: &str,
) -> Result<wgpu::ShaderModule> {
    Err(anyhow!(
        "cannot compile {label}: shaderc support was not enabled at build time (rebuild with --features shaderc or use --shader-compiler naga)"
    ))
}

/// shaderc only prefixes diagnostics with names it was given; make sure the
/// name carries an extension the line remapper recognises.
#[cfg_attr(not(feature = "shaderc"), allow(dead_code))]
fn diagnostic_file_name(label: &str) -> String {
    let is_shader_file = [".frag", ".glsl", ".vert"]
        .iter()
        .any(|ext| label.ends_with(ext));
    if is_shader_file {
        label.to_string()
    } else {
        format!("{label}.frag")
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const GRADIENT: &str = "void mainImage(out vec4 fragColor, in vec2 fragCoord)
{
    vec2 uv = fragCoord / iResolution.xy;
    float level = texture(iChannel0, vec2(uv.x, 0.25)).x;
    fragColor = vec4(uv, level, 1.0);
}
";

    #[test]
    fn transpiled_gradient_passes_naga_validation() {
        let transpiled =
            validate_fragment(GRADIENT, "gradient.frag", &TranspileOptions::default()).unwrap();
        assert!(transpiled.source.starts_with("#version 450"));
        assert!(transpiled.declares("iChannel0"));
    }

    #[test]
    fn naga_errors_point_at_user_lines() {
        let source = "void mainImage(out vec4 fragColor, in vec2 fragCoord)\n{\n    fragColor = vec4(missingValue);\n}\n";
        let err = validate_fragment(source, "broken.frag", &TranspileOptions::default())
            .unwrap_err()
            .to_string();
        assert!(err.contains("broken.frag:3:"), "{err}");
    }

    #[test]
    fn opengl_dialect_is_overridden_for_wgpu() {
        let options = TranspileOptions {
            dialect: Dialect::OpenGl,
            ..TranspileOptions::default()
        };
        let transpiled = validate_fragment(GRADIENT, "gradient.frag", &options).unwrap();
        assert!(transpiled.source.contains("layout(std140"));
    }

    #[test]
    fn shaderc_names_always_carry_a_shader_extension() {
        assert_eq!(diagnostic_file_name("bars.glsl"), "bars.glsl");
        assert_eq!(diagnostic_file_name("Audio Bars"), "Audio Bars.frag");
    }
}
