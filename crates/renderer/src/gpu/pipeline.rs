use anyhow::{anyhow, Context, Result};
use audio::SpectrumFrame;
use shadertoy::TranspileOptions;

use crate::compile::{compile_fragment_shader, compile_vertex_shader};
use crate::types::{ShaderCompiler, CHANNEL_COUNT};

use super::channels::{self, ChannelPlan, ChannelResources};

pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub channel_layout: wgpu::BindGroupLayout,
    pub vertex_module: wgpu::ShaderModule,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let channel_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("channel layout"),
            entries: &build_channel_layout_entries(),
        });

        Self {
            uniform_layout,
            channel_layout,
            vertex_module: compile_vertex_shader(device),
        }
    }
}

/// Fragment source and compile settings for one pipeline.
pub(crate) struct ShaderSpec<'a> {
    pub source: &'a str,
    pub label: &'a str,
    pub options: &'a TranspileOptions,
    pub compiler: ShaderCompiler,
}

pub(crate) struct ShaderPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub channel_bind_group: wgpu::BindGroup,
    pub channel_resources: Vec<ChannelResources>,
}

impl ShaderPipeline {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PipelineLayouts,
        surface_format: wgpu::TextureFormat,
        shader: &ShaderSpec<'_>,
        plans: &[ChannelPlan<'_>; CHANNEL_COUNT],
        float_filterable: bool,
    ) -> Result<Self> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let built = Self::build(
            device,
            queue,
            layouts,
            surface_format,
            shader,
            plans,
            float_filterable,
        );
        let scope_error = pollster::block_on(device.pop_error_scope());
        let pipeline = built?;
        if let Some(error) = scope_error {
            return Err(anyhow!(
                "failed to build render pipeline for {}: {error}",
                shader.label
            ));
        }
        Ok(pipeline)
    }

    fn build(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layouts: &PipelineLayouts,
        surface_format: wgpu::TextureFormat,
        shader: &ShaderSpec<'_>,
        plans: &[ChannelPlan<'_>; CHANNEL_COUNT],
        float_filterable: bool,
    ) -> Result<Self> {
        let fragment_module = compile_fragment_shader(
            device,
            shader.source,
            shader.label,
            shader.options,
            shader.compiler,
        )
        .context("failed to compile shader")?;

        let channel_resources = channels::create_resources(device, queue, plans, float_filterable);
        let channel_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("channel bind group"),
            layout: &layouts.channel_layout,
            entries: &build_channel_entries(&channel_resources),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("shader pipeline layout"),
            bind_group_layouts: &[&layouts.uniform_layout, &layouts.channel_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("shader pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &layouts.vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            channel_bind_group,
            channel_resources,
        })
    }

    pub fn channel_resolution(&self, index: usize) -> [f32; 2] {
        self.channel_resources
            .get(index)
            .map_or([0.0, 0.0], |resource| resource.resolution)
    }

    pub fn update_audio_channel(&self, queue: &wgpu::Queue, index: usize, frame: &SpectrumFrame) {
        if let Some(resource) = self.channel_resources.get(index) {
            resource.update_audio(queue, frame);
        }
    }
}

pub(crate) fn build_channel_entries(
    resources: &[ChannelResources],
) -> Vec<wgpu::BindGroupEntry<'_>> {
    let mut entries = Vec::with_capacity(resources.len() * 2);
    for (index, resource) in resources.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(&resource.view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(&resource.sampler),
        });
    }
    entries
}

/// Texture at binding `2n`, sampler at `2n + 1`, matching the declarations
/// the transpiler emits for `iChannelN`.
pub(crate) fn build_channel_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(CHANNEL_COUNT * 2);
    for index in 0..CHANNEL_COUNT as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}
