use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use audio::{AnalyzerSettings, AudioTrack, Playback, SpectralAnalyzer};
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use crate::gpu::{ChannelPlan, FrameInputs, GpuState, ShaderSpec};
use crate::input::{Control, InputState};
use crate::runtime::{FrameClock, FrameScheduler};
use crate::types::{ChannelSource, RendererConfig, CHANNEL_COUNT};

/// Sample rate reported through `iSampleRate` when no audio is bound.
const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// An audio-bound channel: decoded track, its output stream and analyzer.
struct AudioChannel {
    index: usize,
    track: Arc<AudioTrack>,
    playback: Playback,
    analyzer: SpectralAnalyzer,
}

impl AudioChannel {
    fn open(index: usize, path: &Path, settings: AnalyzerSettings, volume: f32) -> Result<Self> {
        let track = Arc::new(
            AudioTrack::load(path)
                .with_context(|| format!("failed to load audio for channel {index}"))?,
        );
        track.set_volume(volume);
        let analyzer = SpectralAnalyzer::new(settings)?;
        let playback = Playback::open(Arc::clone(&track))
            .with_context(|| format!("failed to open audio output for channel {index}"))?;
        info!(
            channel = index,
            path = %path.display(),
            duration = ?track.duration(),
            sample_rate = track.sample_rate(),
            "audio channel ready"
        );
        Ok(Self {
            index,
            track,
            playback,
            analyzer,
        })
    }
}

/// Everything the event loop closure owns. `gpu` is declared first so the
/// surface is dropped before the window it was created from.
pub(crate) struct WindowState {
    gpu: GpuState,
    window: Arc<Window>,
    input: InputState,
    clock: FrameClock,
    scheduler: FrameScheduler,
    audio: Vec<AudioChannel>,
    volume: f32,
    muted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopAction {
    Continue,
    Exit,
}

impl WindowState {
    pub(crate) fn new(window: Arc<Window>, config: &RendererConfig) -> Result<Self> {
        let mut audio = Vec::new();
        for (index, slot) in config.channel_bindings.slots().iter().enumerate() {
            let Some(ChannelSource::Audio { path }) = slot else {
                continue;
            };
            match AudioChannel::open(index, path, config.analyzer, config.volume) {
                Ok(channel) => audio.push(channel),
                Err(err) => warn!(
                    channel = index,
                    path = %path.display(),
                    error = %format!("{err:#}"),
                    "audio channel disabled; using placeholder"
                ),
            }
        }

        let bins = config.analyzer.bins() as u32;
        let plans: [ChannelPlan<'_>; CHANNEL_COUNT] = std::array::from_fn(|index| {
            match config.channel_bindings.get(index) {
                Some(ChannelSource::Image { path, sampling }) => ChannelPlan::Image {
                    path: path.as_path(),
                    sampling: *sampling,
                },
                Some(ChannelSource::Audio { .. })
                    if audio.iter().any(|channel| channel.index == index) =>
                {
                    ChannelPlan::Audio { bins }
                }
                _ => ChannelPlan::Empty,
            }
        });

        let shader = ShaderSpec {
            source: &config.shader_source,
            label: &config.shader_label,
            options: &config.transpile,
            compiler: config.shader_compiler,
        };
        let size = window.inner_size();
        let mut gpu = GpuState::new(window.as_ref(), size, &shader, &plans)?;
        gpu.set_sample_rate(
            audio
                .first()
                .map_or(DEFAULT_SAMPLE_RATE, |channel| channel.track.sample_rate()),
        );

        let mut clock = FrameClock::new();
        clock.set_paused(config.start_paused);
        let mut state = Self {
            gpu,
            window,
            input: InputState::new(size.height),
            clock,
            scheduler: FrameScheduler::new(config.target_fps),
            audio,
            volume: config.volume,
            muted: false,
        };
        state.sync_playback();
        Ok(state)
    }

    pub(crate) fn window(&self) -> &Window {
        &self.window
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
        self.input.set_surface_height(new_size.height);
    }

    fn apply(&mut self, control: Control) -> LoopAction {
        match control {
            Control::TogglePause => {
                let paused = self.clock.toggle_pause();
                info!(paused, "toggled playback");
                self.sync_playback();
            }
            Control::Reset => {
                self.clock.reset();
                for channel in &mut self.audio {
                    channel.playback.reset();
                    channel.analyzer.reset();
                }
                info!("reset time and audio cursors");
            }
            Control::ToggleMute => {
                self.muted = !self.muted;
                let volume = if self.muted { 0.0 } else { self.volume };
                for channel in &self.audio {
                    channel.track.set_volume(volume);
                }
                info!(muted = self.muted, "toggled mute");
            }
            Control::Exit => return LoopAction::Exit,
        }
        LoopAction::Continue
    }

    /// Makes every stream follow the clock's paused flag.
    fn sync_playback(&mut self) {
        let playing = !self.clock.is_paused();
        for channel in &mut self.audio {
            if let Err(err) = channel.playback.set_playing(playing) {
                warn!(channel = channel.index, error = %err, "failed to change playback state");
            }
        }
    }

    fn render_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let tick = self.clock.tick();
        let mut channel_times = [None; CHANNEL_COUNT];
        for channel in &mut self.audio {
            for message in channel.playback.drain_errors() {
                warn!(channel = channel.index, error = %message, "audio stream error");
            }
            let frame = channel.analyzer.analyze(&channel.track, tick.delta);
            self.gpu.update_audio_channel(channel.index, &frame);
            channel_times[channel.index] = Some(channel.track.position().as_secs_f32());
        }

        let inputs = FrameInputs {
            tick,
            mouse: self.input.mouse_uniform(),
            channel_times,
        };
        let result = self.gpu.render(&inputs);
        self.input.end_frame();
        result
    }
}

/// Opens the preview window and drives the `winit` event loop on the calling
/// thread until the window closes.
pub(crate) fn run_window(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(window_size)
        .build(&event_loop)
        .context("failed to create preview window")?;
    let window = Arc::new(window);

    let mut state = WindowState::new(Arc::clone(&window), config)?;
    info!("controls: space pause/play, r reset, m mute, escape quit");
    state.window().request_redraw();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id, event } if window_id == state.window().id() => {
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let pressed = event.state == ElementState::Pressed;
                        let fresh = state.input.key(event.logical_key.clone(), pressed);
                        if fresh && !event.repeat {
                            if let Some(control) = Control::from_key(&event.logical_key) {
                                if state.apply(control) == LoopAction::Exit {
                                    elwt.exit();
                                }
                            }
                        }
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        state.input.cursor_moved(position.x, position.y);
                    }
                    WindowEvent::MouseInput {
                        state: button_state,
                        button: MouseButton::Left,
                        ..
                    } => {
                        state
                            .input
                            .mouse_button(button_state == ElementState::Pressed);
                    }
                    WindowEvent::Resized(new_size) => {
                        state.resize(new_size);
                    }
                    WindowEvent::ScaleFactorChanged {
                        mut inner_size_writer,
                        ..
                    } => {
                        let _ = inner_size_writer.request_inner_size(state.gpu.size());
                    }
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        match state.render_frame() {
                            Ok(()) => state.scheduler.mark_rendered(now),
                            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                                let size = state.gpu.size();
                                state.resize(size);
                            }
                            Err(wgpu::SurfaceError::OutOfMemory) => {
                                error!("surface out of memory; closing window");
                                elwt.exit();
                            }
                            Err(other) => {
                                debug!(error = ?other, "surface error; retrying next frame");
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                let now = Instant::now();
                if state.scheduler.ready_for_frame(now) {
                    state.window().request_redraw();
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = state.scheduler.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}
