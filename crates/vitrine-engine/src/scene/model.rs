use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::Aabb;

/// Interleaved vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Pixel layout of a [`TextureImage`]. All variants are sRGB encoded.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ImageFormat {
    /// Uncompressed RGBA8 with straight alpha.
    Rgba8,
    /// BC7 blocks (desktop GPUs).
    Bc7,
    /// ETC2 RGBA8 blocks (mobile and embedded GPUs).
    Etc2Rgba8,
    /// ASTC 4x4 blocks.
    Astc4x4,
}

impl ImageFormat {
    pub fn is_compressed(self) -> bool {
        self != ImageFormat::Rgba8
    }

    /// Bytes of a `width`×`height` image in this format. Block formats store
    /// 16 bytes per 4x4 block.
    pub fn byte_len(self, width: u32, height: u32) -> usize {
        match self {
            ImageFormat::Rgba8 => width as usize * height as usize * 4,
            _ => width.div_ceil(4) as usize * height.div_ceil(4) as usize * 16,
        }
    }
}

/// One decoded or transcoded image, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub data: Vec<u8>,
}

impl TextureImage {
    pub fn rgba(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: ImageFormat::Rgba8,
            data: pixels,
        }
    }

    /// True when `data` matches the declared dimensions and format.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == self.format.byte_len(self.width, self.height)
    }
}

/// Minimal material: a base color factor and an optional base color image.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Material {
    /// Linear RGBA factor.
    pub base_color: [f32; 4],
    /// Index into [`ModelScene::images`].
    pub base_color_texture: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            base_color_texture: None,
        }
    }
}

/// One triangle list placed in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Local-to-world matrix, parents already applied.
    pub world: Mat4,
    pub material: Material,
}

impl MeshInstance {
    pub fn local_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from_array(v.position)))
    }

    pub fn world_bounds(&self) -> Option<Aabb> {
        self.local_bounds().map(|b| b.transformed(&self.world))
    }
}

/// Everything needed to render one asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelScene {
    pub meshes: Vec<MeshInstance>,
    pub images: Vec<TextureImage>,
}

impl ModelScene {
    pub fn is_empty(&self) -> bool {
        self.meshes.iter().all(|m| m.indices.is_empty())
    }

    /// World-space bounds of all geometry, or `None` when there is none.
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.meshes
            .iter()
            .filter_map(MeshInstance::world_bounds)
            .reduce(Aabb::union)
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }
}
