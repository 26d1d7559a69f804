use std::path::Path;

use anyhow::{bail, Result};
use audio::AUDIO_EXTENSIONS;
use renderer::{ChannelBindings, ImageSampling};
use shadertoy::{InputSource, LocalPack};

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "gif", "tiff"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Image,
    Audio,
}

/// Picks the channel kind from the file extension.
pub fn classify(path: &Path) -> Result<ChannelKind> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(ChannelKind::Image)
    } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(ChannelKind::Audio)
    } else {
        bail!(
            "cannot bind {}: unsupported extension (images: {}; audio: {})",
            path.display(),
            IMAGE_EXTENSIONS.join(", "),
            AUDIO_EXTENSIONS.join(", ")
        )
    }
}

pub fn channel_bindings_from_pack(pack: &LocalPack) -> ChannelBindings {
    let mut bindings = ChannelBindings::default();
    for input in pack.inputs() {
        let resolved = pack.asset_path(input);
        if !resolved.exists() {
            tracing::warn!(
                channel = input.channel,
                path = %resolved.display(),
                "channel input not found on disk"
            );
        }
        let result = match &input.source {
            InputSource::Texture {
                filter, wrap, vflip, ..
            } => bindings.set_image(
                input.channel as usize,
                resolved.clone(),
                ImageSampling {
                    filter: *filter,
                    wrap: *wrap,
                    vflip: *vflip,
                },
            ),
            InputSource::Audio { .. } => bindings.set_audio(input.channel as usize, resolved.clone()),
        };
        if let Err(err) = result {
            tracing::warn!(
                channel = input.channel,
                path = %resolved.display(),
                error = %err,
                "failed to register channel"
            );
        }
    }
    bindings
}

/// Applies `--channelN` flags on top of whatever the pack declared.
pub fn apply_channel_overrides<P: AsRef<Path>>(
    bindings: &mut ChannelBindings,
    overrides: &[Option<P>],
) -> Result<()> {
    for (channel, path) in overrides.iter().enumerate() {
        let Some(path) = path else {
            continue;
        };
        let path = path.as_ref().to_path_buf();
        match classify(&path)? {
            ChannelKind::Image => bindings.set_image(channel, path, ImageSampling::default())?,
            ChannelKind::Audio => bindings.set_audio(channel, path)?,
        }
    }
    Ok(())
}
