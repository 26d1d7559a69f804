//! Defines the `shader.toml` schema for on-disk shader packs: which GLSL file
//! holds `mainImage`, optional transpiler overrides, and what each of the four
//! channels is bound to.
//!
//! Types:
//!
//! - `ShaderPackManifest` captures top-level metadata, the source path and the
//!   channel inputs consumed by `LocalPack` and the binary's binding glue.
//! - `PassInput` pairs a channel index with an `InputSource`.
//! - `InputSource` is either a still texture (with sampling hints) or an audio
//!   file that drives a live spectrum texture.
//! - `TextureFilter` and `TextureWrap` mirror the sampler options the renderer
//!   understands.
//!
//! Functions:
//!
//! - `ShaderPackManifest::validate` returns human-readable issues so loaders
//!   can surface misconfigurations without panicking.
use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::uniforms::CHANNEL_COUNT;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ShaderPackManifest {
    pub name: Option<String>,
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub low_performance: Option<bool>,
    #[serde(default)]
    pub inputs: Vec<PassInput>,
}

fn default_source() -> PathBuf {
    PathBuf::from("image.glsl")
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PassInput {
    pub channel: u8,
    #[serde(flatten)]
    pub source: InputSource,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputSource {
    Texture {
        path: PathBuf,
        #[serde(default)]
        filter: TextureFilter,
        #[serde(default)]
        wrap: TextureWrap,
        #[serde(default = "default_vflip")]
        vflip: bool,
    },
    Audio {
        path: PathBuf,
    },
}

fn default_vflip() -> bool {
    true
}

impl InputSource {
    pub fn path(&self) -> &PathBuf {
        match self {
            InputSource::Texture { path, .. } | InputSource::Audio { path } => path,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextureFilter {
    #[default]
    Linear,
    Nearest,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextureWrap {
    #[default]
    Repeat,
    Clamp,
    Mirror,
}

impl ShaderPackManifest {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.source.as_os_str().is_empty() {
            issues.push("manifest source path must not be empty".to_string());
        }
        let mut seen = HashSet::new();
        for input in &self.inputs {
            if usize::from(input.channel) >= CHANNEL_COUNT {
                issues.push(format!(
                    "input uses channel {} which exceeds the {CHANNEL_COUNT}-channel limit",
                    input.channel
                ));
            }
            if !seen.insert(input.channel) {
                issues.push(format!("channel {} is bound more than once", input.channel));
            }
            if input.source.path().as_os_str().is_empty() {
                issues.push(format!("channel {} has an empty path", input.channel));
            }
        }
        issues
    }
}
