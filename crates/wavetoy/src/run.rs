use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use audio::{AnalyzerSettings, AudioTrack, SpectralAnalyzer};
use renderer::{ChannelBindings, Renderer, RendererConfig};
use serde::Serialize;
use shadertoy::{is_pack_dir, transpile, Dialect, EntryPoint, LocalPack, TranspileOptions};
use tracing_subscriber::EnvFilter;

use crate::bindings::{apply_channel_overrides, channel_bindings_from_pack};
use crate::cli::{AnalyzeArgs, Cli, Command, RunArgs, TranspileArgs};
use crate::config::{AppConfig, ResolvedConfig};
use crate::paths::{expand_home, AppPaths};

const DEFAULT_SURFACE_SIZE: (u32, u32) = (600, 400);
/// Elapsed time handed to the analyzer for one-shot analyses.
const ANALYZE_DELTA: f32 = 1.0 / 60.0;

pub fn run(args: Cli) -> Result<()> {
    initialise_tracing(args.verbose);

    match args.command {
        Some(Command::Transpile(transpile_args)) => run_transpile(&transpile_args),
        Some(Command::Analyze(analyze_args)) => run_analyze(&analyze_args, &load_config()?),
        None => run_preview(&args.run, &load_config()?),
    }
}

/// `transpile` never reads the config file.
fn load_config() -> Result<ResolvedConfig> {
    let paths = AppPaths::discover()?;
    let config_path = paths.config_file();
    let config = AppConfig::load(&config_path)?.resolve(&config_path)?;
    tracing::debug!(config = %config_path.display(), "resolved wavetoy paths");
    Ok(config)
}

fn initialise_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wavetoy={level},renderer={level},audio={level},shadertoy={level}"))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// The shader to run plus whatever its pack declared.
struct LoadedShader {
    source: String,
    label: String,
    bindings: ChannelBindings,
    low_performance: Option<bool>,
    title: String,
}

fn load_target(target: &Path) -> Result<LoadedShader> {
    if is_pack_dir(target) {
        let pack = LocalPack::load(target)
            .with_context(|| format!("failed to load shader pack {}", target.display()))?;
        let source = pack.read_source().with_context(|| {
            format!("failed to read shader source {}", pack.source_path().display())
        })?;
        let manifest = pack.manifest();
        tracing::info!(
            root = %pack.root().display(),
            name = manifest.name.as_deref().unwrap_or("unnamed"),
            inputs = manifest.inputs.len(),
            "loaded shader pack"
        );
        let title = manifest
            .name
            .clone()
            .unwrap_or_else(|| display_name(target));
        Ok(LoadedShader {
            source,
            label: pack.source_path().display().to_string(),
            bindings: channel_bindings_from_pack(&pack),
            low_performance: manifest.low_performance,
            title,
        })
    } else if target.is_dir() {
        bail!(
            "{} is a directory without a {}",
            target.display(),
            shadertoy::MANIFEST_FILE
        );
    } else {
        let source = fs::read_to_string(target)
            .with_context(|| format!("failed to read shader {}", target.display()))?;
        tracing::info!(path = %target.display(), "loaded shader file");
        Ok(LoadedShader {
            source,
            label: target.display().to_string(),
            bindings: ChannelBindings::default(),
            low_performance: None,
            title: display_name(target),
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Merges CLI flags over the pack manifest over the config file.
fn build_renderer_config(args: &RunArgs, config: &ResolvedConfig) -> Result<RendererConfig> {
    let target: PathBuf = match (&args.target, &config.default_target) {
        (Some(target), _) => target.clone(),
        (None, Some(default)) => expand_home(default),
        (None, None) => bail!("no shader given; pass a TARGET or set default_target in config"),
    };
    let shader = load_target(&target)?;

    let mut channel_bindings = shader.bindings;
    apply_channel_overrides(&mut channel_bindings, &args.channel_overrides())?;

    let low_performance = if args.high_performance {
        false
    } else {
        shader
            .low_performance
            .or(config.low_performance)
            .unwrap_or(true)
    };
    let transpile = TranspileOptions {
        dialect: Dialect::Vulkan,
        low_performance,
        strict: args.strict || config.strict,
    };

    let analyzer = args.analyzer.apply(config.analyzer);
    analyzer
        .validate()
        .context("invalid audio analyzer settings")?;

    let volume = args.volume.or(config.volume).unwrap_or(1.0);
    if !(0.0..=1.0).contains(&volume) {
        bail!("volume must be within [0, 1], got {volume}");
    }

    Ok(RendererConfig {
        surface_size: args.size.or(config.size).unwrap_or(DEFAULT_SURFACE_SIZE),
        title: format!("wavetoy - {}", shader.title),
        shader_source: shader.source,
        shader_label: shader.label,
        transpile,
        channel_bindings,
        target_fps: args.fps.or(config.fps).filter(|fps| *fps > 0.0),
        shader_compiler: args.shader_compiler.or(config.compiler).unwrap_or_default(),
        analyzer,
        volume,
        start_paused: args.paused,
    })
}

fn run_preview(args: &RunArgs, config: &ResolvedConfig) -> Result<()> {
    let renderer_config = build_renderer_config(args, config)?;
    tracing::info!(
        shader = %renderer_config.shader_label,
        size = ?renderer_config.surface_size,
        compiler = %renderer_config.shader_compiler,
        fps = ?renderer_config.target_fps,
        "starting preview"
    );
    Renderer::new(renderer_config).run()
}

#[derive(Debug, Serialize)]
struct TranspileReport<'a> {
    file: &'a Path,
    dialect: Dialect,
    entry_point: EntryPoint,
    uniforms: &'a [&'static str],
    skipped_parameters: &'a [String],
    line_map: LineMapReport,
}

/// Generated line `n` maps to user line `n - preamble_lines`.
#[derive(Debug, Serialize)]
struct LineMapReport {
    preamble_lines: usize,
    first_user_line: usize,
}

fn run_transpile(args: &TranspileArgs) -> Result<()> {
    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read shader {}", args.file.display()))?;
    let options = TranspileOptions {
        dialect: args.dialect,
        low_performance: !args.high_performance,
        strict: args.strict,
    };
    let shader = transpile(&source, &options)
        .with_context(|| format!("failed to transpile {}", args.file.display()))?;

    if args.json {
        let report = TranspileReport {
            file: &args.file,
            dialect: args.dialect,
            entry_point: shader.entry_point,
            uniforms: &shader.uniforms,
            skipped_parameters: &shader.skipped_parameters,
            line_map: LineMapReport {
                preamble_lines: shader.preamble_lines,
                first_user_line: shader.preamble_lines + 1,
            },
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", shader.source);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct AnalysisReport {
    file: PathBuf,
    sample_rate: u32,
    channels: usize,
    duration_secs: f64,
    position_secs: f64,
    fft_size: usize,
    bins: usize,
    peak_bin: usize,
    peak_frequency_hz: f32,
    peak_level: f32,
    mean_level: f32,
    waveform_min: f32,
    waveform_max: f32,
    spectrum: Vec<f32>,
    waveform: Vec<f32>,
}

fn analyze_file(path: &Path, at: f64, settings: AnalyzerSettings) -> Result<AnalysisReport> {
    if !at.is_finite() || at < 0.0 {
        bail!("--at must be a non-negative number of seconds");
    }
    let track = AudioTrack::load(path)
        .with_context(|| format!("failed to load audio {}", path.display()))?;
    let offset_frames = (at * f64::from(track.sample_rate())).round() as usize;
    track.advance(offset_frames);

    let mut analyzer = SpectralAnalyzer::new(settings)?;
    let frame = analyzer.analyze(&track, ANALYZE_DELTA);
    let spectrum = frame.spectrum();
    let waveform = frame.waveform();

    let (peak_bin, peak_level) = spectrum
        .iter()
        .copied()
        .enumerate()
        .fold((0, 0.0_f32), |best, (index, level)| {
            if level > best.1 {
                (index, level)
            } else {
                best
            }
        });
    let mean_level = spectrum.iter().sum::<f32>() / spectrum.len().max(1) as f32;
    let waveform_min = waveform.iter().copied().fold(f32::INFINITY, f32::min);
    let waveform_max = waveform.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    Ok(AnalysisReport {
        file: path.to_path_buf(),
        sample_rate: track.sample_rate(),
        channels: track.channels(),
        duration_secs: track.duration().as_secs_f64(),
        position_secs: track.position().as_secs_f64(),
        fft_size: settings.fft_size,
        bins: frame.bins(),
        peak_bin,
        peak_frequency_hz: peak_bin as f32 * track.sample_rate() as f32 / settings.fft_size as f32,
        peak_level,
        mean_level,
        waveform_min,
        waveform_max,
        spectrum: spectrum.to_vec(),
        waveform: waveform.to_vec(),
    })
}

fn run_analyze(args: &AnalyzeArgs, config: &ResolvedConfig) -> Result<()> {
    let settings = args.analyzer.apply(config.analyzer);
    settings
        .validate()
        .context("invalid audio analyzer settings")?;
    let report = analyze_file(&args.audio, args.at, settings)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("file:        {}", report.file.display());
    println!(
        "format:      {} Hz, {} channel(s), {}",
        report.sample_rate,
        report.channels,
        humantime::format_duration(Duration::from_millis(
            (report.duration_secs * 1000.0) as u64
        ))
    );
    println!("position:    {:.3}s", report.position_secs);
    println!("bins:        {} (fft size {})", report.bins, report.fft_size);
    println!(
        "peak:        bin {} (~{:.1} Hz) at level {:.3}",
        report.peak_bin, report.peak_frequency_hz, report.peak_level
    );
    println!("mean level:  {:.3}", report.mean_level);
    println!(
        "waveform:    [{:.3}, {:.3}]",
        report.waveform_min, report.waveform_max
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;
    use renderer::{ChannelSource, ShaderCompiler};
    use tempfile::TempDir;

    const SHADER: &str = "void mainImage(out vec4 fragColor, in vec2 fragCoord) {\n    fragColor = vec4(1.0);\n}\n";

    fn defaults() -> ResolvedConfig {
        AppConfig::default()
            .resolve(Path::new("config.toml"))
            .unwrap()
    }

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["wavetoy"];
        full.extend_from_slice(argv);
        Cli::try_parse_from(full).unwrap().run
    }

    fn write_pack(dir: &Path) {
        fs::write(
            dir.join("shader.toml"),
            "name = \"Bars\"\nsource = \"image.glsl\"\nlow_performance = false\n\n[[inputs]]\nchannel = 0\ntype = \"audio\"\npath = \"song.wav\"\n",
        )
        .unwrap();
        fs::write(dir.join("image.glsl"), SHADER).unwrap();
    }

    fn write_sine(path: &Path, frequency: f32, sample_rate: u32, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for n in 0..frames {
            let t = n as f32 / sample_rate as f32;
            let sample = (t * frequency * std::f32::consts::TAU).sin() * 0.8;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn plain_file_uses_builtin_defaults() {
        let dir = TempDir::new().unwrap();
        let shader = dir.path().join("glow.frag");
        fs::write(&shader, SHADER).unwrap();

        let args = run_args(&[shader.to_str().unwrap()]);
        let config = build_renderer_config(&args, &defaults()).unwrap();

        assert_eq!(config.surface_size, (600, 400));
        assert_eq!(config.title, "wavetoy - glow");
        assert!(config.transpile.low_performance);
        assert!(config.channel_bindings.is_empty());
        assert_eq!(config.target_fps, None);
        assert_eq!(config.shader_source, SHADER);
    }

    #[test]
    fn pack_manifest_overrides_config_and_cli_overrides_pack() {
        let dir = TempDir::new().unwrap();
        write_pack(dir.path());
        let mut config = defaults();
        config.low_performance = Some(true);
        config.size = Some((320, 200));
        config.fps = Some(30.0);

        let args = run_args(&[dir.path().to_str().unwrap()]);
        let from_pack = build_renderer_config(&args, &config).unwrap();
        assert!(!from_pack.transpile.low_performance);
        assert_eq!(from_pack.surface_size, (320, 200));
        assert_eq!(from_pack.target_fps, Some(30.0));
        assert_eq!(from_pack.title, "wavetoy - Bars");
        assert!(matches!(
            from_pack.channel_bindings.get(0),
            Some(ChannelSource::Audio { .. })
        ));

        let args = run_args(&[
            dir.path().to_str().unwrap(),
            "--size",
            "1024x768",
            "--fps",
            "0",
            "--channel0",
            "noise.png",
            "--shader-compiler",
            "naga",
        ]);
        let from_cli = build_renderer_config(&args, &config).unwrap();
        assert_eq!(from_cli.surface_size, (1024, 768));
        assert_eq!(from_cli.target_fps, None);
        assert_eq!(from_cli.shader_compiler, ShaderCompiler::NagaGlsl);
        assert!(matches!(
            from_cli.channel_bindings.get(0),
            Some(ChannelSource::Image { .. })
        ));
    }

    #[test]
    fn default_target_comes_from_config() {
        let dir = TempDir::new().unwrap();
        let shader = dir.path().join("default.glsl");
        fs::write(&shader, SHADER).unwrap();
        let mut config = defaults();
        config.default_target = Some(shader.clone());

        let built = build_renderer_config(&RunArgs::default(), &config).unwrap();
        assert_eq!(built.shader_label, shader.display().to_string());

        assert!(build_renderer_config(&RunArgs::default(), &defaults()).is_err());
    }

    #[test]
    fn analyzer_flags_are_validated() {
        let dir = TempDir::new().unwrap();
        let shader = dir.path().join("glow.frag");
        fs::write(&shader, SHADER).unwrap();

        let args = run_args(&[
            shader.to_str().unwrap(),
            "--db-min",
            "-20",
            "--db-max",
            "-40",
        ]);
        assert!(build_renderer_config(&args, &defaults()).is_err());

        let args = run_args(&[shader.to_str().unwrap(), "--volume", "1.5"]);
        assert!(build_renderer_config(&args, &defaults()).is_err());
    }

    #[test]
    fn directory_without_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(load_target(dir.path()).is_err());
    }

    #[test]
    fn analyze_finds_the_sine_peak() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let sample_rate = 44_100;
        let frequency = 1_000.0;
        write_sine(&path, frequency, sample_rate, 1.0);

        let settings = AnalyzerSettings {
            db_max: 100.0,
            ..AnalyzerSettings::default()
        };
        let report = analyze_file(&path, 0.25, settings).unwrap();

        assert_eq!(report.sample_rate, sample_rate);
        assert_eq!(report.channels, 1);
        assert_eq!(report.bins, settings.bins());
        assert!((report.position_secs - 0.25).abs() < 1e-3);
        let bin_width = sample_rate as f32 / settings.fft_size as f32;
        assert!((report.peak_frequency_hz - frequency).abs() <= bin_width * 1.5);
        assert!(report.waveform_min < 0.5 && report.waveform_max > 0.5);
    }

    #[test]
    fn analyze_rejects_negative_offsets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine(&path, 440.0, 8_000, 0.1);
        assert!(analyze_file(&path, -1.0, AnalyzerSettings::default()).is_err());
    }
}
