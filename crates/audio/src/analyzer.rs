//! Turns the window of audio ending at the playback cursor into the two-row
//! spectrum/waveform texture ShaderToy shaders expect from an audio channel.
//!
//! Row 0 holds Hann-windowed FFT magnitudes in decibels, mapped linearly from
//! `[db_min, db_max]` onto `[0, 1]` and smoothed with peak-hold decay. Row 1
//! holds the same window resampled by direct index picks and mapped from
//! `[-1, 1]` onto `[0, 1]`.
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::track::AudioTrack;

/// Added to scaled magnitudes before taking the logarithm.
const MAGNITUDE_EPSILON: f32 = 1e-12;
/// Lower bound for the elapsed time between two analyses, in seconds.
const MIN_DELTA: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub fft_size: usize,
    pub db_min: f32,
    pub db_max: f32,
    pub decay: Duration,
    pub gain: f32,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            db_min: -100.0,
            db_max: 40.0,
            decay: Duration::from_millis(200),
            gain: 1.0,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("fft size must be an even number of at least 4 samples, got {0}")]
    FftSize(usize),
    #[error("db_max ({db_max}) must be greater than db_min ({db_min})")]
    DecibelRange { db_min: f32, db_max: f32 },
    #[error("decay time constant must be positive")]
    Decay,
    #[error("gain must be finite and non-negative, got {0}")]
    Gain(f32),
}

impl AnalyzerSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.fft_size < 4 || self.fft_size % 2 != 0 {
            return Err(SettingsError::FftSize(self.fft_size));
        }
        if !(self.db_min.is_finite() && self.db_max.is_finite() && self.db_max > self.db_min) {
            return Err(SettingsError::DecibelRange {
                db_min: self.db_min,
                db_max: self.db_max,
            });
        }
        if self.decay.is_zero() {
            return Err(SettingsError::Decay);
        }
        if !(self.gain.is_finite() && self.gain >= 0.0) {
            return Err(SettingsError::Gain(self.gain));
        }
        Ok(())
    }

    pub fn bins(&self) -> usize {
        self.fft_size / 2
    }
}

/// One analysis result, stored row-major as `[spectrum..., waveform...]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumFrame {
    bins: usize,
    data: Vec<f32>,
}

impl SpectrumFrame {
    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn spectrum(&self) -> &[f32] {
        &self.data[..self.bins]
    }

    pub fn waveform(&self) -> &[f32] {
        &self.data[self.bins..]
    }

    /// Both rows, contiguous, ready for a `bins x 2` single-channel upload.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Quantizes both rows for textures without float support.
    pub fn to_unorm8(&self) -> Vec<u8> {
        self.data
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

/// Per-track analyzer. Holds the FFT plan, scratch buffers and the
/// peak-hold memory carried from one call to the next.
pub struct SpectralAnalyzer {
    settings: AnalyzerSettings,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    mono: Vec<f32>,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    previous: Vec<f32>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    pub fn new(settings: AnalyzerSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let size = settings.fft_size;
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        let output = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        Ok(Self {
            settings,
            window: hann(size),
            mono: vec![0.0; size],
            input: fft.make_input_vec(),
            output,
            scratch,
            previous: vec![0.0; settings.bins()],
            fft,
        })
    }

    pub fn settings(&self) -> &AnalyzerSettings {
        &self.settings
    }

    /// Forgets the peak-hold memory.
    pub fn reset(&mut self) {
        self.previous.fill(0.0);
    }

    /// Analyzes the window ending at the track's current cursor. `dt` is the
    /// wall-clock time in seconds since the previous call.
    pub fn analyze(&mut self, track: &AudioTrack, dt: f32) -> SpectrumFrame {
        let end = track.cursor();
        self.fill_mono_window(track, end);

        for ((input, sample), weight) in self.input.iter_mut().zip(&self.mono).zip(&self.window) {
            *input = sample * weight;
        }
        let bins = self.settings.bins();
        let transformed = self
            .fft
            .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch);
        if let Err(err) = transformed {
            warn!(%err, "fft failed; treating window as silence");
            self.output.fill(Complex::new(0.0, 0.0));
        }

        let AnalyzerSettings {
            db_min,
            db_max,
            gain,
            ..
        } = self.settings;
        let range = db_max - db_min;
        let tau = self.settings.decay.as_secs_f32().max(f32::MIN_POSITIVE);
        let decay = (-dt.max(MIN_DELTA) / tau).exp();

        let mut data = Vec::with_capacity(bins * 2);
        for (bin, previous) in self.output.iter().take(bins).zip(&mut self.previous) {
            let db = 20.0 * (gain * bin.norm() + MAGNITUDE_EPSILON).log10();
            let normalized = ((db - db_min) / range).clamp(0.0, 1.0);
            let held = normalized.max(*previous * decay);
            *previous = held;
            data.push(held);
        }

        let last = self.settings.fft_size - 1;
        for i in 0..bins {
            let sample = self.mono[i * last / (bins - 1)];
            data.push(((sample + 1.0) * 0.5).clamp(0.0, 1.0));
        }

        SpectrumFrame { bins, data }
    }

    /// Copies up to `fft_size` frames ending at `end` into the mono buffer,
    /// averaging channels and zero-padding short tracks on the right.
    fn fill_mono_window(&mut self, track: &AudioTrack, end: usize) {
        let frames = track.frame_count();
        let channels = track.channels();
        let samples = track.samples();
        let len = self.mono.len().min(frames);
        let start = (end % frames + frames - len) % frames;

        let (head, tail) = self.mono.split_at_mut(len);
        for (offset, mono) in head.iter_mut().enumerate() {
            let frame = (start + offset) % frames * channels;
            let sum: f32 = samples[frame..frame + channels].iter().sum();
            *mono = sum / channels as f32;
        }
        tail.fill(0.0);
    }
}

/// Symmetric Hann window, `0.5 - 0.5 cos(2πn / (N - 1))`.
pub(crate) fn hann(size: usize) -> Vec<f32> {
    let denominator = (size.max(2) - 1) as f32;
    (0..size)
        .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / denominator).cos())
        .collect()
}
