//! Preview window for ShaderToy-style fragment shaders with live audio input.
//!
//! The crate glues the `winit` window, the `wgpu` pipeline and the audio
//! analyzer together:
//!
//! ```text
//!   wavetoy CLI
//!          │ RendererConfig
//!          ▼
//!   Renderer::run ──▶ WindowState ──▶ winit event loop ──▶ render_frame()
//!                        │                                   │
//!                        └─▶ Playback (cpal)                 ├─▶ SpectralAnalyzer ─▶ audio texture
//!                                                            └─▶ ShadertoyUniforms ─▶ GPU UBO
//! ```
//!
//! `WindowState` owns every GPU resource and audio stream; `Renderer` is the
//! entry point the CLI calls. Fragment sources are run through
//! [`shadertoy::transpile`] before compilation so they see the uniforms and
//! channel bindings ShaderToy shaders expect.

mod compile;
mod gpu;
mod input;
mod runtime;
mod types;
mod window;

use anyhow::{Context, Result};

pub use compile::validate_fragment;
pub use input::{Control, InputState};
pub use runtime::{FrameClock, FrameScheduler, FrameTick, SystemTimeSource, TimeSource};
pub use types::{
    ChannelBindings, ChannelSource, ImageSampling, RendererConfig, ShaderCompiler, CHANNEL_COUNT,
};

/// Entry point that owns the configuration for one preview session.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    /// Validates the shader up front, then blocks on the window event loop
    /// until the user closes the preview.
    pub fn run(self) -> Result<()> {
        self.config
            .analyzer
            .validate()
            .context("invalid audio analyzer settings")?;
        let transpiled = validate_fragment(
            &self.config.shader_source,
            &self.config.shader_label,
            &self.config.transpile,
        )?;
        tracing::debug!(
            label = %self.config.shader_label,
            preamble_lines = transpiled.preamble_lines,
            skipped = transpiled.skipped_parameters.len(),
            "shader passed validation"
        );
        window::run_window(&self.config)
    }
}
