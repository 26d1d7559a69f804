use anyhow::Result;
use audio::SpectrumFrame;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;

use crate::runtime::FrameTick;
use crate::types::CHANNEL_COUNT;

use super::channels::ChannelPlan;
use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ShaderPipeline, ShaderSpec};
use super::uniforms::ShadertoyUniforms;

/// Per-frame inputs the frame loop hands to the GPU.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameInputs {
    pub tick: FrameTick,
    pub mouse: [f32; 4],
    /// Playback position per channel; `None` leaves the slot at zero.
    pub channel_times: [Option<f32>; CHANNEL_COUNT],
}

/// Owns the surface, one compiled pipeline and the uniform buffer it reads.
pub(crate) struct GpuState {
    context: GpuContext,
    _layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: ShadertoyUniforms,
    pipeline: ShaderPipeline,
}

impl GpuState {
    pub(crate) fn new<T>(
        target: &T,
        initial_size: PhysicalSize<u32>,
        shader: &ShaderSpec<'_>,
        plans: &[ChannelPlan<'_>; CHANNEL_COUNT],
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform buffer"),
            size: std::mem::size_of::<ShadertoyUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let pipeline = ShaderPipeline::new(
            &context.device,
            &context.queue,
            &layouts,
            context.surface_format,
            shader,
            plans,
            context.float_filterable,
        )?;

        let mut uniforms = ShadertoyUniforms::new(context.size.width, context.size.height);
        for index in 0..CHANNEL_COUNT {
            uniforms.set_channel_resolution(index, pipeline.channel_resolution(index));
        }
        Self::write_uniforms(&context.queue, &uniform_buffer, &uniforms);

        Ok(Self {
            context,
            _layouts: layouts,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            pipeline,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.context.resize(new_size);
        self.uniforms
            .set_resolution(new_size.width as f32, new_size.height as f32);
    }

    pub(crate) fn set_sample_rate(&mut self, rate: u32) {
        self.uniforms.set_sample_rate(rate as f32);
    }

    pub(crate) fn update_audio_channel(&self, index: usize, frame: &SpectrumFrame) {
        self.pipeline
            .update_audio_channel(&self.context.queue, index, frame);
    }

    /// Uploads this frame's uniforms, draws the full-screen triangle and
    /// presents.
    pub(crate) fn render(&mut self, inputs: &FrameInputs) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;

        self.uniforms.apply_tick(&inputs.tick);
        self.uniforms.set_mouse(inputs.mouse);
        for (index, time) in inputs.channel_times.iter().enumerate() {
            self.uniforms.set_channel_time(index, time.unwrap_or(0.0));
        }
        self.uniforms.refresh_date();
        Self::write_uniforms(&self.context.queue, &self.uniform_buffer, &self.uniforms);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.pipeline.channel_bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn write_uniforms(queue: &wgpu::Queue, buffer: &wgpu::Buffer, uniforms: &ShadertoyUniforms) {
        queue.write_buffer(buffer, 0, bytemuck::bytes_of(uniforms));
    }
}
