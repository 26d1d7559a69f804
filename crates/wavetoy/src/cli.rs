use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use audio::AnalyzerSettings;
use clap::{ArgAction, Args, Parser, Subcommand};
use renderer::ShaderCompiler;
use shadertoy::Dialect;

#[derive(Parser, Debug)]
#[command(
    name = "wavetoy",
    author,
    version,
    about = "Preview ShaderToy-style shaders driven by audio spectra",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
    /// Raise log verbosity (`-v` debug, `-vv` trace) when `RUST_LOG` is unset.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Fragment shader file (`.frag`/`.glsl`) or shader pack directory.
    #[arg(value_name = "TARGET")]
    pub target: Option<PathBuf>,

    /// Window size in physical pixels (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Bind an image or audio file to `iChannel0`.
    #[arg(long, value_name = "PATH")]
    pub channel0: Option<PathBuf>,
    /// Bind an image or audio file to `iChannel1`.
    #[arg(long, value_name = "PATH")]
    pub channel1: Option<PathBuf>,
    /// Bind an image or audio file to `iChannel2`.
    #[arg(long, value_name = "PATH")]
    pub channel2: Option<PathBuf>,
    /// Bind an image or audio file to `iChannel3`.
    #[arg(long, value_name = "PATH")]
    pub channel3: Option<PathBuf>,

    /// Optional FPS cap (0 = uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Shader compiler backend: `naga` or `shaderc`.
    #[arg(long, value_name = "COMPILER", value_parser = parse_shader_compiler)]
    pub shader_compiler: Option<ShaderCompiler>,

    /// Define `HW_PERFORMANCE` as 1 instead of 0.
    #[arg(long)]
    pub high_performance: bool,

    /// Reject malformed `mainImage` parameters instead of skipping them.
    #[arg(long)]
    pub strict: bool,

    /// Playback volume in `[0, 1]`.
    #[arg(long, value_name = "GAIN")]
    pub volume: Option<f32>,

    /// Start with time frozen and audio paused.
    #[arg(long)]
    pub paused: bool,

    #[command(flatten)]
    pub analyzer: AnalyzerArgs,
}

impl RunArgs {
    pub fn channel_overrides(&self) -> [Option<&PathBuf>; 4] {
        [
            self.channel0.as_ref(),
            self.channel1.as_ref(),
            self.channel2.as_ref(),
            self.channel3.as_ref(),
        ]
    }
}

/// Spectrum analysis overrides shared by the preview and `analyze`.
#[derive(Args, Debug, Default, Clone, Copy)]
pub struct AnalyzerArgs {
    /// Level mapped to 0 in the spectrum texture, in dB.
    #[arg(long, value_name = "DB", allow_hyphen_values = true)]
    pub db_min: Option<f32>,

    /// Level mapped to 1 in the spectrum texture, in dB.
    #[arg(long, value_name = "DB", allow_hyphen_values = true)]
    pub db_max: Option<f32>,

    /// Peak-hold decay time constant (e.g. `200ms`).
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub decay: Option<Duration>,

    /// Linear gain applied to samples before analysis.
    #[arg(long, value_name = "GAIN")]
    pub gain: Option<f32>,
}

impl AnalyzerArgs {
    /// Overlays the flags that were given on `base`.
    pub fn apply(&self, base: AnalyzerSettings) -> AnalyzerSettings {
        AnalyzerSettings {
            db_min: self.db_min.unwrap_or(base.db_min),
            db_max: self.db_max.unwrap_or(base.db_max),
            decay: self.decay.unwrap_or(base.decay),
            gain: self.gain.unwrap_or(base.gain),
            ..base
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the transpiled form of a ShaderToy-convention shader.
    Transpile(TranspileArgs),
    /// Decode an audio file and print one spectrum analysis.
    Analyze(AnalyzeArgs),
}

#[derive(Parser, Debug)]
pub struct TranspileArgs {
    /// Shader source file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output dialect: `vulkan` or `opengl`.
    #[arg(long, value_name = "DIALECT", value_parser = parse_dialect, default_value = "vulkan")]
    pub dialect: Dialect,

    /// Define `HW_PERFORMANCE` as 1 instead of 0.
    #[arg(long)]
    pub high_performance: bool,

    /// Reject malformed `mainImage` parameters instead of skipping them.
    #[arg(long)]
    pub strict: bool,

    /// Print the uniform manifest and line map as JSON instead of source.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct AnalyzeArgs {
    /// Audio file (wav, mp3, ogg or flac).
    #[arg(value_name = "AUDIO")]
    pub audio: PathBuf,

    /// Playback position to analyse, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub at: f64,

    /// Print the full frame as JSON.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub analyzer: AnalyzerArgs,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32)> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| anyhow!("expected WxH format, e.g. 600x400"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid width in size specification"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid height in size specification"))?;
    if width == 0 || height == 0 {
        bail!("surface dimensions must be greater than zero");
    }
    Ok((width, height))
}

pub fn parse_shader_compiler(value: &str) -> Result<ShaderCompiler, String> {
    let compiler: ShaderCompiler = value.parse()?;
    if compiler == ShaderCompiler::Shaderc && !cfg!(feature = "shaderc") {
        return Err("shaderc support is not enabled in this build".to_string());
    }
    Ok(compiler)
}

pub fn parse_dialect(value: &str) -> Result<Dialect, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "vulkan" | "vk" | "450" => Ok(Dialect::Vulkan),
        "opengl" | "gl" | "330" => Ok(Dialect::OpenGl),
        other => Err(format!(
            "unknown dialect '{other}'; expected vulkan or opengl"
        )),
    }
}
