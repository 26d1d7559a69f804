use std::path::Path;

use anyhow::{Context, Result};
use audio::SpectrumFrame;
use image::imageops::flip_vertical_in_place;
use image::DynamicImage;
use shadertoy::{TextureFilter, TextureWrap};
use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::types::{ImageSampling, CHANNEL_COUNT};

/// What a channel slot should hold once GPU resources are created.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ChannelPlan<'a> {
    Empty,
    Image {
        path: &'a Path,
        sampling: ImageSampling,
    },
    /// Spectrum texture `bins` wide and two rows tall.
    Audio { bins: u32 },
}

pub(crate) struct ChannelResources {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    /// Pixel dimensions reported through `iChannelResolution`.
    pub resolution: [f32; 2],
    audio_format: Option<wgpu::TextureFormat>,
}

impl ChannelResources {
    /// Overwrites the whole spectrum texture with `frame`. Ignored for
    /// non-audio channels and for frames of a different width.
    pub(crate) fn update_audio(&self, queue: &wgpu::Queue, frame: &SpectrumFrame) {
        let Some(format) = self.audio_format else {
            return;
        };
        let size = self.texture.size();
        if frame.bins() as u32 != size.width {
            tracing::warn!(
                expected = size.width,
                actual = frame.bins(),
                "spectrum upload ignored due to mismatched bin count"
            );
            return;
        }

        let texels = audio_texels(format, frame);
        let bytes_per_texel = texels.len() as u32 / (size.width * size.height);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(size.width * bytes_per_texel),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }
}

pub(crate) fn create_resources(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    plans: &[ChannelPlan<'_>; CHANNEL_COUNT],
    float_filterable: bool,
) -> Vec<ChannelResources> {
    plans
        .iter()
        .enumerate()
        .map(|(index, plan)| match plan {
            ChannelPlan::Empty => create_placeholder_texture(device, queue, index),
            ChannelPlan::Image { path, sampling } => {
                match load_image_channel(device, queue, index, path, *sampling) {
                    Ok(resource) => resource,
                    Err(error) => {
                        tracing::warn!(
                            channel = index,
                            path = %path.display(),
                            error = %format!("{error:#}"),
                            "failed to load image channel; using placeholder"
                        );
                        create_placeholder_texture(device, queue, index)
                    }
                }
            }
            ChannelPlan::Audio { bins } => {
                create_audio_channel(device, queue, index, *bins, float_filterable)
            }
        })
        .collect()
}

fn create_placeholder_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
) -> ChannelResources {
    let texture = device.create_texture_with_data(
        queue,
        &texture_descriptor(
            &format!("placeholder channel texture #{index}"),
            1,
            1,
            wgpu::TextureFormat::Rgba8Unorm,
        ),
        TextureDataOrder::LayerMajor,
        &[0, 0, 0, 255],
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(device, wgpu::AddressMode::ClampToEdge, wgpu::FilterMode::Linear);

    ChannelResources {
        texture,
        view,
        sampler,
        resolution: [0.0, 0.0],
        audio_format: None,
    }
}

fn load_image_channel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    path: &Path,
    sampling: ImageSampling,
) -> Result<ChannelResources> {
    let image = image::open(path).with_context(|| {
        format!(
            "failed to open image for channel {} at {}",
            index,
            path.display()
        )
    })?;
    let (width, height, format, data) = image_texels(image, sampling.vflip);

    let texture = device.create_texture_with_data(
        queue,
        &texture_descriptor(&format!("channel texture #{index}"), width, height, format),
        TextureDataOrder::LayerMajor,
        &data,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(
        device,
        address_mode(sampling.wrap),
        filter_mode(sampling.filter),
    );
    tracing::debug!(
        channel = index,
        path = %path.display(),
        width,
        height,
        ?format,
        "loaded image channel"
    );

    Ok(ChannelResources {
        texture,
        view,
        sampler,
        resolution: [width as f32, height as f32],
        audio_format: None,
    })
}

fn create_audio_channel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    index: usize,
    bins: u32,
    float_filterable: bool,
) -> ChannelResources {
    let format = audio_texture_format(float_filterable);
    if !float_filterable {
        tracing::debug!(
            channel = index,
            "adapter lacks filterable float textures; spectrum uses 8-bit texels"
        );
    }
    let bytes_per_texel = format.block_copy_size(None).unwrap_or(4) as usize;
    let zeros = vec![0u8; bins as usize * 2 * bytes_per_texel];
    let texture = device.create_texture_with_data(
        queue,
        &texture_descriptor(&format!("audio channel texture #{index}"), bins, 2, format),
        TextureDataOrder::LayerMajor,
        &zeros,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let sampler = create_sampler(device, wgpu::AddressMode::ClampToEdge, wgpu::FilterMode::Linear);

    ChannelResources {
        texture,
        view,
        sampler,
        resolution: [bins as f32, 2.0],
        audio_format: Some(format),
    }
}

fn texture_descriptor(
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::TextureDescriptor<'_> {
    wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    }
}

fn create_sampler(
    device: &wgpu::Device,
    address: wgpu::AddressMode,
    filter: wgpu::FilterMode,
) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Single-channel images stay single-channel; everything else is expanded to
/// RGBA since wgpu has no three-channel 8-bit format.
fn image_texels(image: DynamicImage, vflip: bool) -> (u32, u32, wgpu::TextureFormat, Vec<u8>) {
    if image.color().channel_count() == 1 {
        let mut luma = image.into_luma8();
        if vflip {
            flip_vertical_in_place(&mut luma);
        }
        let (width, height) = luma.dimensions();
        (width, height, wgpu::TextureFormat::R8Unorm, luma.into_raw())
    } else {
        let mut rgba = image.into_rgba8();
        if vflip {
            flip_vertical_in_place(&mut rgba);
        }
        let (width, height) = rgba.dimensions();
        (width, height, wgpu::TextureFormat::Rgba8Unorm, rgba.into_raw())
    }
}

fn audio_texture_format(float_filterable: bool) -> wgpu::TextureFormat {
    if float_filterable {
        wgpu::TextureFormat::R32Float
    } else {
        wgpu::TextureFormat::R8Unorm
    }
}

fn audio_texels(format: wgpu::TextureFormat, frame: &SpectrumFrame) -> Vec<u8> {
    match format {
        wgpu::TextureFormat::R32Float => bytemuck::cast_slice::<f32, u8>(frame.as_slice()).to_vec(),
        _ => frame.to_unorm8(),
    }
}

fn address_mode(wrap: TextureWrap) -> wgpu::AddressMode {
    match wrap {
        TextureWrap::Repeat => wgpu::AddressMode::Repeat,
        TextureWrap::Clamp => wgpu::AddressMode::ClampToEdge,
        TextureWrap::Mirror => wgpu::AddressMode::MirrorRepeat,
    }
}

fn filter_mode(filter: TextureFilter) -> wgpu::FilterMode {
    match filter {
        TextureFilter::Linear => wgpu::FilterMode::Linear,
        TextureFilter::Nearest => wgpu::FilterMode::Nearest,
    }
}
