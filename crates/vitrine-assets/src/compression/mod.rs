//! Decoders for compressed glTF payloads.
//!
//! Geometry compressed with `EXT_meshopt_compression` is expanded into the
//! fallback buffers before accessors are read. KTX2 images (plain or UASTC,
//! optionally Zstandard supercompressed) are transcoded to the best format
//! the render device can sample.

mod geometry;
mod texture;

pub(crate) use geometry::{decompress_views, is_fallback_buffer, EXT_MESHOPT_COMPRESSION};
pub(crate) use texture::{decode_ktx2, is_ktx2};
#[cfg(test)]
pub(crate) use texture::tests::ktx2_file;

/// Extensions whose payloads this crate decodes itself. They may appear in
/// `extensionsRequired` without failing validation.
pub(crate) const DECODED_EXTENSIONS: &[&str] = &[EXT_MESHOPT_COMPRESSION, "KHR_texture_basisu"];
