//! GPU side of the preview window.
//!
//! - `context` owns wgpu instance/device/surface wiring and reconfigures the
//!   swapchain when the window resizes.
//! - `channels` materialises channel resources (images, spectrum textures,
//!   placeholders) and exposes their resolutions for uniforms.
//! - `pipeline` compiles transpiled GLSL into a render pipeline with one
//!   uniform bind group and one channel bind group.
//! - `uniforms` mirrors the std140 block declared by the transpiler.
//! - `state` glues everything together for `window`.

mod channels;
mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use channels::ChannelPlan;
pub(crate) use pipeline::ShaderSpec;
pub(crate) use state::{FrameInputs, GpuState};
