//! A fully decoded audio file plus the looping playback cursor shared between
//! the output callback and the analyzer.
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::decode::{decode_file, DecodedAudio};
use crate::error::{AudioError, AudioResult};

/// Interleaved sample data that never changes after load, a cursor in
/// `[0, frame_count)` guarded by a single mutex, and a volume scalar.
pub struct AudioTrack {
    samples: Box<[f32]>,
    channels: usize,
    sample_rate: u32,
    frames: usize,
    cursor: Mutex<usize>,
    volume: AtomicU32,
}

impl std::fmt::Debug for AudioTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioTrack")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .field("cursor", &self.cursor())
            .field("volume", &self.volume())
            .finish()
    }
}

impl AudioTrack {
    pub fn load(path: &Path) -> AudioResult<Self> {
        Self::from_decoded(decode_file(path)?)
    }

    pub fn from_decoded(audio: DecodedAudio) -> AudioResult<Self> {
        Self::from_interleaved(audio.samples, audio.channels, audio.sample_rate)
    }

    /// Builds a track from interleaved samples. A trailing partial frame is
    /// dropped and samples are clamped to `[-1, 1]`.
    pub fn from_interleaved(
        mut samples: Vec<f32>,
        channels: usize,
        sample_rate: u32,
    ) -> AudioResult<Self> {
        if channels == 0 {
            return Err(AudioError::Empty);
        }
        let frames = samples.len() / channels;
        if frames == 0 {
            return Err(AudioError::Empty);
        }
        samples.truncate(frames * channels);
        for sample in &mut samples {
            *sample = if sample.is_finite() {
                sample.clamp(-1.0, 1.0)
            } else {
                0.0
            };
        }
        Ok(Self {
            samples: samples.into_boxed_slice(),
            channels,
            sample_rate: sample_rate.max(1),
            frames,
            cursor: Mutex::new(0),
            volume: AtomicU32::new(1.0f32.to_bits()),
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / f64::from(self.sample_rate))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    fn lock_cursor(&self) -> MutexGuard<'_, usize> {
        self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cursor(&self) -> usize {
        *self.lock_cursor()
    }

    pub fn position(&self) -> Duration {
        Duration::from_secs_f64(self.cursor() as f64 / f64::from(self.sample_rate))
    }

    /// Claims the next `frames` frames of playback and returns the cursor
    /// value they start at. The cursor wraps modulo the frame count.
    pub fn advance(&self, frames: usize) -> usize {
        let mut cursor = self.lock_cursor();
        let start = *cursor;
        *cursor = (start + frames % self.frames) % self.frames;
        start
    }

    pub fn reset(&self) {
        *self.lock_cursor() = 0;
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    /// Sets the playback gain, clamped to `[0, 1]`.
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Fills an interleaved output buffer of `out_channels` channels with the
    /// next frames of the loop, scaled by the volume and clipped to `[-1, 1]`.
    ///
    /// Output channel `c` reads source channel `c % channels`, so mono files
    /// play on every speaker and surplus source channels are dropped.
    pub fn fill_output(&self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            out.fill(0.0);
            return;
        }
        let frames = out.len() / out_channels;
        let start = self.advance(frames);
        let volume = self.volume();

        let (body, remainder) = out.split_at_mut(frames * out_channels);
        for (offset, frame) in body.chunks_exact_mut(out_channels).enumerate() {
            let source = ((start + offset) % self.frames) * self.channels;
            for (channel, sample) in frame.iter_mut().enumerate() {
                let value = self.samples[source + channel % self.channels] * volume;
                *sample = value.clamp(-1.0, 1.0);
            }
        }
        remainder.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> AudioTrack {
        let samples = (0..frames).map(|i| i as f32 / 100.0).collect();
        AudioTrack::from_interleaved(samples, 1, 48_000).unwrap()
    }

    #[test]
    fn ring_read_wraps_tail_into_head() {
        let track = ramp(10);
        let mut scratch = vec![0.0; 7];
        track.fill_output(&mut scratch, 1);
        assert_eq!(track.cursor(), 7);

        let mut out = vec![0.0; 6];
        track.fill_output(&mut out, 1);
        assert_eq!(out, vec![0.07, 0.08, 0.09, 0.0, 0.01, 0.02]);
        assert_eq!(track.cursor(), (7 + 6) % 10);
    }

    #[test]
    fn requests_longer_than_the_buffer_loop_repeatedly() {
        let track = ramp(3);
        track.advance(2);
        let mut out = vec![0.0; 7];
        track.fill_output(&mut out, 1);
        assert_eq!(out, vec![0.02, 0.0, 0.01, 0.02, 0.0, 0.01, 0.02]);
        assert_eq!(track.cursor(), (2 + 7) % 3);
    }

    #[test]
    fn volume_scales_and_output_is_clipped() {
        let track = AudioTrack::from_interleaved(vec![1.0, -1.0, 0.5, -0.5], 2, 44_100).unwrap();
        track.set_volume(0.5);
        let mut out = vec![0.0; 4];
        track.fill_output(&mut out, 2);
        assert_eq!(out, vec![0.5, -0.5, 0.25, -0.25]);

        track.set_volume(3.0);
        assert_eq!(track.volume(), 1.0);
        track.set_volume(f32::NAN);
        assert_eq!(track.volume(), 0.0);
    }

    #[test]
    fn mono_source_feeds_every_output_channel() {
        let track = AudioTrack::from_interleaved(vec![0.1, 0.2], 1, 44_100).unwrap();
        let mut out = vec![0.0; 5];
        track.fill_output(&mut out, 2);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2, 0.0]);
    }

    #[test]
    fn reset_rewinds_without_touching_volume() {
        let track = ramp(16);
        track.set_volume(0.25);
        track.advance(9);
        track.reset();
        assert_eq!(track.cursor(), 0);
        assert_eq!(track.volume(), 0.25);
    }

    #[test]
    fn clamps_and_rejects_empty_input() {
        let track = AudioTrack::from_interleaved(vec![2.0, f32::NAN, -3.0], 1, 8_000).unwrap();
        assert_eq!(track.samples(), &[1.0, 0.0, -1.0]);
        assert!(matches!(
            AudioTrack::from_interleaved(vec![0.5], 2, 8_000),
            Err(AudioError::Empty)
        ));
        assert!(matches!(
            AudioTrack::from_interleaved(Vec::new(), 1, 8_000),
            Err(AudioError::Empty)
        ));
    }

    #[test]
    fn position_tracks_the_cursor_in_seconds() {
        let track = AudioTrack::from_interleaved(vec![0.0; 48_000], 1, 24_000).unwrap();
        track.advance(12_000);
        assert_eq!(track.position(), Duration::from_millis(500));
        assert_eq!(track.duration(), Duration::from_secs(2));
    }
}
