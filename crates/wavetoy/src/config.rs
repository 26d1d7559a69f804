//! User configuration loaded from `config.toml`.
//!
//! Every key is optional; anything missing falls back to the built-in
//! defaults, and CLI flags or a pack manifest override what is set here.
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use audio::AnalyzerSettings;
use renderer::ShaderCompiler;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::parse_surface_size;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Shader file or pack launched when no target is given.
    pub default_target: Option<PathBuf>,
    pub window: WindowSection,
    pub shader: ShaderSection,
    pub audio: AudioSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowSection {
    /// `WIDTHxHEIGHT`.
    pub size: Option<String>,
    pub fps: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShaderSection {
    pub low_performance: Option<bool>,
    pub compiler: Option<String>,
    pub strict: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioSection {
    pub db_min: Option<f32>,
    pub db_max: Option<f32>,
    #[serde(deserialize_with = "deserialize_duration_opt")]
    pub decay: Option<Duration>,
    pub gain: Option<f32>,
    pub fft_size: Option<usize>,
    pub volume: Option<f32>,
}

/// Config values after parsing the string-typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub default_target: Option<PathBuf>,
    pub size: Option<(u32, u32)>,
    pub fps: Option<f32>,
    pub low_performance: Option<bool>,
    pub compiler: Option<ShaderCompiler>,
    pub strict: bool,
    pub analyzer: AnalyzerSettings,
    pub volume: Option<f32>,
}

impl AppConfig {
    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Self::parse(&text, path),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file; using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses sizes and compiler names and overlays the audio section on the
    /// analyzer defaults.
    pub fn resolve(&self, path: &Path) -> Result<ResolvedConfig, ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let size = self
            .window
            .size
            .as_deref()
            .map(parse_surface_size)
            .transpose()
            .map_err(|err| invalid(format!("window.size: {err}")))?;
        let compiler = self
            .shader
            .compiler
            .as_deref()
            .map(str::parse::<ShaderCompiler>)
            .transpose()
            .map_err(|err| invalid(format!("shader.compiler: {err}")))?;

        let defaults = AnalyzerSettings::default();
        let analyzer = AnalyzerSettings {
            fft_size: self.audio.fft_size.unwrap_or(defaults.fft_size),
            db_min: self.audio.db_min.unwrap_or(defaults.db_min),
            db_max: self.audio.db_max.unwrap_or(defaults.db_max),
            decay: self.audio.decay.unwrap_or(defaults.decay),
            gain: self.audio.gain.unwrap_or(defaults.gain),
        };
        analyzer
            .validate()
            .map_err(|err| invalid(format!("audio: {err}")))?;

        Ok(ResolvedConfig {
            default_target: self.default_target.clone(),
            size,
            fps: self.window.fps,
            low_performance: self.shader.low_performance,
            compiler,
            strict: self.shader.strict.unwrap_or(false),
            analyzer,
            volume: self.audio.volume,
        })
    }
}

/// Accepts a humantime string (`"200ms"`) or a number of seconds.
fn deserialize_duration_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Option<Duration>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map(Some)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v)
                .map(|secs| Some(Duration::from_secs(secs)))
                .map_err(|_| E::custom("duration must be non-negative"))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Some(Duration::from_secs(v)))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Some(Duration::from_secs_f64(v)))
        }
    }

    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> AppConfig {
        AppConfig::parse(text, Path::new("config.toml")).unwrap()
    }

    #[test]
    fn empty_config_resolves_to_defaults() {
        let resolved = parse("").resolve(Path::new("config.toml")).unwrap();
        assert_eq!(resolved.analyzer, AnalyzerSettings::default());
        assert_eq!(resolved.size, None);
        assert_eq!(resolved.compiler, None);
        assert!(!resolved.strict);
    }

    #[test]
    fn full_config_overrides_every_section() {
        let config = parse(
            r#"
default_target = "~/shaders/bars"
[window]
size = "800x600"
fps = 30
[shader]
low_performance = false
compiler = "naga"
strict = true
[audio]
db_min = -90.0
db_max = 20.0
decay = "350ms"
gain = 2.0
fft_size = 2048
volume = 0.5
"#,
        );
        let resolved = config.resolve(Path::new("config.toml")).unwrap();
        assert_eq!(resolved.default_target, Some(PathBuf::from("~/shaders/bars")));
        assert_eq!(resolved.size, Some((800, 600)));
        assert_eq!(resolved.fps, Some(30.0));
        assert_eq!(resolved.low_performance, Some(false));
        assert_eq!(resolved.compiler, Some(ShaderCompiler::NagaGlsl));
        assert!(resolved.strict);
        assert_eq!(resolved.analyzer.fft_size, 2048);
        assert_eq!(resolved.analyzer.decay, Duration::from_millis(350));
        assert_eq!(resolved.analyzer.gain, 2.0);
        assert_eq!(resolved.volume, Some(0.5));
    }

    #[test]
    fn decay_accepts_numeric_seconds() {
        let whole = parse("[audio]\ndecay = 2\n");
        assert_eq!(whole.audio.decay, Some(Duration::from_secs(2)));
        let fractional = parse("[audio]\ndecay = 0.25\n");
        assert_eq!(fractional.audio.decay, Some(Duration::from_millis(250)));
    }

    #[test]
    fn malformed_values_are_reported_with_the_path() {
        let err = AppConfig::parse("[audio]\ndecay = \"soon\"\n", Path::new("/etc/w.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("/etc/w.toml"));

        let err = AppConfig::parse("[window]\ncolour = 1\n", Path::new("w.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn invalid_analyzer_range_is_rejected() {
        let config = parse("[audio]\ndb_min = 10.0\ndb_max = 0.0\n");
        let err = config.resolve(Path::new("config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("audio"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("config.toml")).unwrap();
        assert!(config.default_target.is_none());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[shader]\ncompiler = \"shaderc\"\n").unwrap();
        let resolved = AppConfig::load(&path).unwrap().resolve(&path).unwrap();
        assert_eq!(resolved.compiler, Some(ShaderCompiler::Shaderc));
    }
}
