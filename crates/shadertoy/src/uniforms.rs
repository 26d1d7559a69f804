//! The implicit uniform contract every transpiled shader is compiled against.
//!
//! The table order doubles as the member order of the std140 block emitted for
//! [`Dialect::Vulkan`]; `renderer::gpu::uniforms::ShadertoyUniforms` mirrors it
//! field for field.
use crate::transpile::Dialect;

/// Number of `iChannelN` input slots.
pub const CHANNEL_COUNT: usize = 4;

/// Name of the uniform block instance used by the Vulkan dialect.
pub const BLOCK_INSTANCE: &str = "wavetoy_inputs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformStorage {
    /// Member of the per-frame uniform block.
    Block,
    /// Sampled texture bound to a channel slot.
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplicitUniform {
    pub name: &'static str,
    pub glsl_type: &'static str,
    pub array_len: Option<usize>,
    pub storage: UniformStorage,
    /// Float-sized padding slots that follow this member in the std140 block.
    pub block_padding: usize,
}

const fn block(name: &'static str, glsl_type: &'static str) -> ImplicitUniform {
    ImplicitUniform {
        name,
        glsl_type,
        array_len: None,
        storage: UniformStorage::Block,
        block_padding: 0,
    }
}

const fn sampler(name: &'static str) -> ImplicitUniform {
    ImplicitUniform {
        name,
        glsl_type: "sampler2D",
        array_len: None,
        storage: UniformStorage::Sampler,
        block_padding: 0,
    }
}

pub const IMPLICIT_UNIFORMS: &[ImplicitUniform] = &[
    block("iResolution", "vec2"),
    block("iTime", "float"),
    block("iTimeDelta", "float"),
    block("iFrameRate", "float"),
    block("iFrame", "uint"),
    ImplicitUniform {
        block_padding: 1,
        ..block("iSampleRate", "float")
    },
    block("iMouse", "vec4"),
    block("iDate", "vec4"),
    block("iChannelTime0", "float"),
    block("iChannelTime1", "float"),
    block("iChannelTime2", "float"),
    block("iChannelTime3", "float"),
    ImplicitUniform {
        array_len: Some(CHANNEL_COUNT),
        ..block("iChannelResolution", "vec2")
    },
    sampler("iChannel0"),
    sampler("iChannel1"),
    sampler("iChannel2"),
    sampler("iChannel3"),
];

/// Array-style alias for the per-channel time scalars.
const CHANNEL_TIME_ALIAS: &str =
    "#define iChannelTime float[4](iChannelTime0, iChannelTime1, iChannelTime2, iChannelTime3)";

/// Returns true when `identifier` names an implicit uniform, including the
/// `iChannelTime` array alias.
pub fn is_implicit(identifier: &str) -> bool {
    identifier == "iChannelTime" || IMPLICIT_UNIFORMS.iter().any(|u| u.name == identifier)
}

/// Appends the uniform declarations for `dialect` to `lines` and returns the
/// declared names in table order.
pub(crate) fn declare(dialect: Dialect, lines: &mut Vec<String>) -> Vec<&'static str> {
    match dialect {
        Dialect::Vulkan => declare_vulkan(lines),
        Dialect::OpenGl => declare_opengl(lines),
    }
    lines.push(CHANNEL_TIME_ALIAS.to_string());
    IMPLICIT_UNIFORMS.iter().map(|u| u.name).collect()
}

fn array_suffix(uniform: &ImplicitUniform) -> String {
    uniform
        .array_len
        .map(|len| format!("[{len}]"))
        .unwrap_or_default()
}

fn declare_opengl(lines: &mut Vec<String>) {
    for uniform in IMPLICIT_UNIFORMS {
        lines.push(format!(
            "uniform {} {}{};",
            uniform.glsl_type,
            uniform.name,
            array_suffix(uniform)
        ));
    }
}

fn declare_vulkan(lines: &mut Vec<String>) {
    lines.push("layout(std140, set = 0, binding = 0) uniform WavetoyInputs {".to_string());
    let mut pad = 0;
    for uniform in block_members() {
        lines.push(format!(
            "    {} _{}{};",
            uniform.glsl_type,
            uniform.name,
            array_suffix(uniform)
        ));
        for _ in 0..uniform.block_padding {
            lines.push(format!("    float _wavetoy_pad{pad};"));
            pad += 1;
        }
    }
    lines.push(format!("}} {BLOCK_INSTANCE};"));

    for uniform in block_members() {
        lines.push(format!(
            "#define {name} {BLOCK_INSTANCE}._{name}",
            name = uniform.name
        ));
    }

    for (slot, uniform) in IMPLICIT_UNIFORMS
        .iter()
        .filter(|u| u.storage == UniformStorage::Sampler)
        .enumerate()
    {
        let texture = format!("_{}_texture", uniform.name);
        let sampler = format!("_{}_sampler", uniform.name);
        lines.push(format!(
            "layout(set = 1, binding = {}) uniform texture2D {texture};",
            slot * 2
        ));
        lines.push(format!(
            "layout(set = 1, binding = {}) uniform sampler {sampler};",
            slot * 2 + 1
        ));
        lines.push(format!(
            "#define {} sampler2D({texture}, {sampler})",
            uniform.name
        ));
    }
}

fn block_members() -> impl Iterator<Item = &'static ImplicitUniform> {
    IMPLICIT_UNIFORMS
        .iter()
        .filter(|u| u.storage == UniformStorage::Block)
}
