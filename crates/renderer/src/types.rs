use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use audio::AnalyzerSettings;
use shadertoy::{TextureFilter, TextureWrap, TranspileOptions};

/// ShaderToy exposes four optional input channels (`iChannel0-3`).
pub use shadertoy::CHANNEL_COUNT;

/// Sampling parameters for a static image channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSampling {
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    /// Flip rows so the first image row lands at `v = 1`.
    pub vflip: bool,
}

impl Default for ImageSampling {
    fn default() -> Self {
        Self {
            filter: TextureFilter::Linear,
            wrap: TextureWrap::Repeat,
            vflip: true,
        }
    }
}

/// Describes how a ShaderToy channel should be populated.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelSource {
    /// Image decoded once at startup.
    Image {
        path: PathBuf,
        sampling: ImageSampling,
    },
    /// Audio file played back and analysed into a spectrum texture every frame.
    Audio { path: PathBuf },
}

/// Collection of ShaderToy channel bindings prepared for the renderer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChannelBindings {
    sources: [Option<ChannelSource>; CHANNEL_COUNT],
}

impl ChannelBindings {
    /// Creates an empty bindings table with all channels unassigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `source` to `channel`, replacing whatever was bound there.
    pub fn set(&mut self, channel: usize, source: ChannelSource) -> Result<()> {
        if channel >= CHANNEL_COUNT {
            anyhow::bail!(
                "channel {} exceeds supported ShaderToy channel count ({})",
                channel,
                CHANNEL_COUNT
            );
        }
        self.sources[channel] = Some(source);
        Ok(())
    }

    pub fn set_image(&mut self, channel: usize, path: PathBuf, sampling: ImageSampling) -> Result<()> {
        self.set(channel, ChannelSource::Image { path, sampling })
    }

    pub fn set_audio(&mut self, channel: usize, path: PathBuf) -> Result<()> {
        self.set(channel, ChannelSource::Audio { path })
    }

    pub fn get(&self, channel: usize) -> Option<&ChannelSource> {
        self.sources.get(channel).and_then(Option::as_ref)
    }

    /// Exposes the underlying channel slots for GPU resource creation.
    pub fn slots(&self) -> &[Option<ChannelSource>; CHANNEL_COUNT] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(Option::is_none)
    }
}

/// Shader compilation backend requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderCompiler {
    /// Compile transpiled GLSL through shaderc into SPIR-V.
    Shaderc,
    /// Hand GLSL to naga's built-in frontend.
    NagaGlsl,
}

impl Default for ShaderCompiler {
    fn default() -> Self {
        if cfg!(feature = "shaderc") {
            ShaderCompiler::Shaderc
        } else {
            ShaderCompiler::NagaGlsl
        }
    }
}

impl std::fmt::Display for ShaderCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShaderCompiler::Shaderc => f.write_str("shaderc"),
            ShaderCompiler::NagaGlsl => f.write_str("naga"),
        }
    }
}

impl FromStr for ShaderCompiler {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shaderc" => Ok(ShaderCompiler::Shaderc),
            "naga" | "naga-glsl" => Ok(ShaderCompiler::NagaGlsl),
            other => Err(format!(
                "unknown shader compiler '{other}' (expected 'naga' or 'shaderc')"
            )),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// Everything here is already resolved: the binary merges CLI flags, pack
/// manifest and config file before building one.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Window title.
    pub title: String,
    /// ShaderToy-convention fragment source, before transpiling.
    pub shader_source: String,
    /// Name used for the shader in compiler diagnostics, usually its path.
    pub shader_label: String,
    pub transpile: TranspileOptions,
    pub channel_bindings: ChannelBindings,
    /// Optional FPS cap; `None` renders as fast as presentation allows.
    pub target_fps: Option<f32>,
    pub shader_compiler: ShaderCompiler,
    pub analyzer: AnalyzerSettings,
    /// Initial playback gain for every audio channel, `[0, 1]`.
    pub volume: f32,
    /// Start with the clock frozen and audio paused.
    pub start_paused: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (600, 400),
            title: "wavetoy".to_string(),
            shader_source: String::new(),
            shader_label: "shader".to_string(),
            transpile: TranspileOptions::default(),
            channel_bindings: ChannelBindings::default(),
            target_fps: None,
            shader_compiler: ShaderCompiler::default(),
            analyzer: AnalyzerSettings::default(),
            volume: 1.0,
            start_paused: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rebinding_a_channel_replaces_the_source() {
        let mut bindings = ChannelBindings::new();
        assert!(bindings.is_empty());

        bindings
            .set_image(1, PathBuf::from("noise.png"), ImageSampling::default())
            .unwrap();
        bindings.set_audio(1, PathBuf::from("track.mp3")).unwrap();

        assert_eq!(
            bindings.get(1),
            Some(&ChannelSource::Audio {
                path: PathBuf::from("track.mp3")
            })
        );
        assert!(bindings.get(0).is_none());
        assert_eq!(bindings.slots().iter().flatten().count(), 1);
    }

    #[test]
    fn out_of_range_channel_is_rejected() {
        let mut bindings = ChannelBindings::new();
        let err = bindings
            .set_audio(CHANNEL_COUNT, PathBuf::from("track.wav"))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(bindings.is_empty());
    }

    #[test]
    fn shader_compiler_parses_cli_spellings() {
        assert_eq!("naga".parse(), Ok(ShaderCompiler::NagaGlsl));
        assert_eq!("Shaderc".parse(), Ok(ShaderCompiler::Shaderc));
        assert!("glslang".parse::<ShaderCompiler>().is_err());
        assert_eq!(ShaderCompiler::NagaGlsl.to_string(), "naga");
    }
}
