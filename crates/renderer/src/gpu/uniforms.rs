use bytemuck::{Pod, Zeroable};
use chrono::{Datelike, Local, NaiveDateTime, Timelike};

use crate::runtime::FrameTick;
use crate::types::CHANNEL_COUNT;

/// CPU mirror of the std140 block declared by the transpiler.
///
/// Member order and padding follow `shadertoy::uniforms::IMPLICIT_UNIFORMS`.
/// `vec2` array elements occupy a full 16-byte std140 stride, hence the
/// `[f32; 4]` per channel resolution.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ShadertoyUniforms {
    pub i_resolution: [f32; 2],
    pub i_time: f32,
    pub i_time_delta: f32,
    pub i_frame_rate: f32,
    pub i_frame: u32,
    pub i_sample_rate: f32,
    pub _padding0: f32,
    pub i_mouse: [f32; 4],
    pub i_date: [f32; 4],
    pub i_channel_time: [f32; CHANNEL_COUNT],
    pub i_channel_resolution: [[f32; 4]; CHANNEL_COUNT],
}

unsafe impl Zeroable for ShadertoyUniforms {}
unsafe impl Pod for ShadertoyUniforms {}

impl ShadertoyUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        let mut uniforms = Self {
            i_resolution: [width as f32, height as f32],
            i_time: 0.0,
            i_time_delta: 0.0,
            i_frame_rate: 0.0,
            i_frame: 0,
            i_sample_rate: 44_100.0,
            _padding0: 0.0,
            i_mouse: [0.0; 4],
            i_date: [0.0; 4],
            i_channel_time: [0.0; CHANNEL_COUNT],
            i_channel_resolution: [[0.0; 4]; CHANNEL_COUNT],
        };
        uniforms.refresh_date();
        uniforms
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.i_resolution = [width, height];
    }

    pub fn set_channel_resolution(&mut self, index: usize, resolution: [f32; 2]) {
        if let Some(slot) = self.i_channel_resolution.get_mut(index) {
            *slot = [resolution[0], resolution[1], 0.0, 0.0];
        }
    }

    pub fn set_channel_time(&mut self, index: usize, seconds: f32) {
        if let Some(slot) = self.i_channel_time.get_mut(index) {
            *slot = seconds;
        }
    }

    pub fn set_sample_rate(&mut self, rate: f32) {
        self.i_sample_rate = rate;
    }

    pub fn set_mouse(&mut self, mouse: [f32; 4]) {
        self.i_mouse = mouse;
    }

    pub fn apply_tick(&mut self, tick: &FrameTick) {
        self.i_time = tick.seconds;
        self.i_time_delta = tick.delta;
        self.i_frame_rate = tick.fps;
        self.i_frame = tick.frame_index.min(u64::from(u32::MAX)) as u32;
    }

    pub fn refresh_date(&mut self) {
        self.i_date = date_vector(Local::now().naive_local());
    }
}

/// Year, zero-based month, day of month and seconds since midnight.
fn date_vector(now: NaiveDateTime) -> [f32; 4] {
    let seconds_since_midnight =
        now.num_seconds_from_midnight() as f32 + now.nanosecond() as f32 / 1_000_000_000.0;
    [
        now.year() as f32,
        now.month0() as f32,
        now.day() as f32,
        seconds_since_midnight,
    ]
}
