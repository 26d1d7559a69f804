//! Audio ingest and analysis for audio-bound shader channels.
//!
//! Types:
//!
//! - `AudioTrack` holds a decoded file in memory and the looping playback
//!   cursor shared between the output callback and the analyzer.
//! - `Playback` drives a track through a cpal output stream with
//!   play/pause/reset controls.
//! - `SpectralAnalyzer` produces a `SpectrumFrame` (spectrum row plus
//!   waveform row) from the window ending at the cursor.
//!
//! Functions:
//!
//! - `decode_file` decodes a whole file to interleaved `f32` samples.
mod analyzer;
mod decode;
mod error;
mod playback;
mod track;

pub use analyzer::{AnalyzerSettings, SettingsError, SpectralAnalyzer, SpectrumFrame};
pub use decode::{decode_file, DecodedAudio};
pub use error::{AudioError, AudioResult};
pub use playback::Playback;
pub use track::AudioTrack;

/// File extensions recognized as audio when binding channels by path.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];
