//! Realtime output of an [`AudioTrack`] through cpal.
//!
//! The output callback is the only code that advances the track cursor; it
//! claims its frames under the track lock and copies samples after releasing
//! it. Stream errors raised on the audio thread are forwarded over a channel
//! so the frame loop can log them.
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info};

use crate::error::{AudioError, AudioResult};
use crate::track::AudioTrack;

pub struct Playback {
    track: Arc<AudioTrack>,
    stream: Stream,
    errors: Receiver<String>,
}

impl std::fmt::Debug for Playback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playback")
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

impl Playback {
    /// Opens the default output device and builds a paused stream for
    /// `track`. Call [`Playback::play`] to start it.
    pub fn open(track: Arc<AudioTrack>) -> AudioResult<Self> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let config = select_config(&device, &track)?;
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            "opening audio output"
        );
        if config.sample_rate.0 != track.sample_rate() {
            debug!(
                track_rate = track.sample_rate(),
                device_rate = config.sample_rate.0,
                "device rate differs from track rate; playback pitch will shift"
            );
        }

        let (error_tx, errors) = unbounded();
        let stream = build_stream(&device, &config, Arc::clone(&track), error_tx)?;
        stream.pause()?;
        Ok(Self {
            track,
            stream,
            errors,
        })
    }

    /// Resumes the callback from the current cursor.
    pub fn play(&mut self) -> AudioResult<()> {
        self.stream.play()?;
        Ok(())
    }

    /// Stops the callback; the cursor keeps its value.
    pub fn pause(&mut self) -> AudioResult<()> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn set_playing(&mut self, playing: bool) -> AudioResult<()> {
        if playing {
            self.play()
        } else {
            self.pause()
        }
    }

    pub fn reset(&self) {
        self.track.reset();
    }

    /// Returns stream errors reported since the last call.
    pub fn drain_errors(&self) -> Vec<String> {
        self.errors.try_iter().collect()
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    track: Arc<AudioTrack>,
    errors: Sender<String>,
) -> AudioResult<Stream> {
    let channels = usize::from(config.channels);
    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            track.fill_output(data, channels);
        },
        move |err| {
            let _ = errors.send(err.to_string());
        },
        None,
    )?;
    Ok(stream)
}

/// Picks an f32 output configuration, preferring the track's own channel
/// count and sample rate.
fn select_config(device: &cpal::Device, track: &AudioTrack) -> AudioResult<StreamConfig> {
    let ranges: Vec<SupportedStreamConfigRange> = device
        .supported_output_configs()?
        .filter(|range| range.sample_format() == SampleFormat::F32)
        .collect();
    let rate = track.sample_rate();
    let supports_rate =
        |range: &&SupportedStreamConfigRange| (range.min_sample_rate().0..=range.max_sample_rate().0).contains(&rate);

    let chosen = ranges
        .iter()
        .filter(supports_rate)
        .find(|range| usize::from(range.channels()) == track.channels())
        .or_else(|| ranges.iter().filter(supports_rate).max_by_key(|r| r.channels()))
        .map(|range| range.clone().with_sample_rate(SampleRate(rate)))
        .or_else(|| ranges.first().map(|range| range.clone().with_max_sample_rate()))
        .ok_or(AudioError::NoConfig)?;

    Ok(StreamConfig {
        channels: chosen.channels(),
        sample_rate: chosen.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    })
}
