//! Asset side of vitrine: turning an asset reference into a [`ModelScene`].
//!
//! - [`reference`] resolves raw references against the application base path
//! - [`source`] fetches bytes (directory, HTTP, memory)
//! - [`loader`] parses glTF/GLB into the engine's CPU scene types, expanding
//!   meshopt-compressed geometry and KTX2 textures on the way
//!
//! [`ModelScene`]: vitrine_engine::scene::ModelScene

mod compression;
mod error;
mod uri;

pub mod loader;
pub mod reference;
pub mod source;

pub use error::AssetLoadError;
pub use loader::{AssetLoader, GltfLoader};
pub use reference::{normalize_base, resolve_model_url, AssetConfig};
pub use source::{AssetSource, DefaultSource, DirSource, HttpSource, MemorySource};
