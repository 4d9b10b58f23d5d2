//! CPU-side scene description.
//!
//! Asset loaders produce a [`ModelScene`]: flattened mesh instances with world
//! matrices already propagated. Renderers upload it per request and never
//! keep it.

mod bounds;
mod model;

pub use bounds::Aabb;
pub use model::{ImageFormat, Material, MeshInstance, MeshVertex, ModelScene, TextureImage};
