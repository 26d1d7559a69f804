//! ShaderToy source handling that needs no GPU: the `mainImage` transpiler,
//! the implicit uniform contract, compiler diagnostic remapping, and the
//! on-disk shader pack format.
mod diagnostics;
mod manifest;
mod pack;
mod transpile;
pub mod uniforms;

pub use diagnostics::{LineMap, SourceLine};
pub use manifest::{InputSource, PassInput, ShaderPackManifest, TextureFilter, TextureWrap};
pub use pack::{is_pack_dir, LocalPack, PackError, MANIFEST_FILE};
pub use transpile::{
    transpile, Dialect, EntryPoint, TranspileError, TranspileOptions, TranspiledShader,
};
pub use uniforms::CHANNEL_COUNT;
