//! Wraps a shader pack directory so callers can load the manifest, read the
//! GLSL source, and resolve channel assets relative to the pack root.
//!
//! Types:
//!
//! - `PackError` classifies manifest parsing, validation, and I/O failures.
//! - `LocalPack` stores the resolved root directory and parsed
//!   `ShaderPackManifest`.
//!
//! Functions:
//!
//! - `LocalPack::load` reads `shader.toml`, validates it, and checks that the
//!   declared source exists so later compile errors point at shader code
//!   rather than missing files.
//! - `LocalPack::read_source` and `asset_path` are used when building channel
//!   bindings.
//! - `is_pack_dir` lets the CLI decide whether a target is a pack or a loose
//!   shader file.
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::manifest::{PassInput, ShaderPackManifest};

pub const MANIFEST_FILE: &str = "shader.toml";

#[derive(Debug, Error)]
pub enum PackError {
    #[error("manifest not found at {0}")]
    ManifestMissing(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(#[from] toml::de::Error),

    #[error("manifest validation failed: {0:?}")]
    ManifestValidation(Vec<String>),

    #[error("shader source not found at {0}")]
    SourceMissing(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct LocalPack {
    root: PathBuf,
    manifest: ShaderPackManifest,
}

impl LocalPack {
    pub fn load(root: impl AsRef<Path>) -> Result<Self, PackError> {
        let root = root.as_ref().to_path_buf();
        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(PackError::ManifestMissing(manifest_path));
        }

        let manifest_raw = fs::read_to_string(&manifest_path)?;
        let manifest: ShaderPackManifest = toml::from_str(&manifest_raw)?;
        let issues = manifest.validate();
        if !issues.is_empty() {
            return Err(PackError::ManifestValidation(issues));
        }

        let pack = Self { root, manifest };
        let source = pack.source_path();
        if !source.is_file() {
            return Err(PackError::SourceMissing(source));
        }
        Ok(pack)
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn manifest(&self) -> &ShaderPackManifest {
        &self.manifest
    }

    pub fn source_path(&self) -> PathBuf {
        self.root.join(&self.manifest.source)
    }

    pub fn read_source(&self) -> Result<String, PackError> {
        Ok(fs::read_to_string(self.source_path())?)
    }

    pub fn asset_path(&self, input: &PassInput) -> PathBuf {
        self.root.join(input.source.path())
    }

    pub fn inputs(&self) -> impl Iterator<Item = &PassInput> {
        self.manifest.inputs.iter()
    }
}

pub fn is_pack_dir(path: &Path) -> bool {
    path.is_dir() && path.join(MANIFEST_FILE).is_file()
}
