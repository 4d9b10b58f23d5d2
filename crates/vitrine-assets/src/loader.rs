//! glTF/GLB loading into [`ModelScene`].

use std::collections::HashMap;

use async_trait::async_trait;
use glam::{Mat4, Vec3};
use gltf::buffer::Source as BufferSource;
use gltf::image::Source as ImageSource;
use vitrine_engine::device::TextureCompression;
use vitrine_engine::scene::{Material, MeshInstance, MeshVertex, ModelScene, TextureImage};

use crate::compression::{self, DECODED_EXTENSIONS};
use crate::error::AssetLoadError;
use crate::source::AssetSource;
use crate::uri;

/// Node hierarchies deeper than this are cut off.
const MAX_NODE_DEPTH: usize = 64;

/// Texture extensions that name an alternative image, in order of preference.
const TEXTURE_SOURCE_EXTENSIONS: &[&str] = &["KHR_texture_basisu", "EXT_texture_webp"];

/// Turns a resolved asset URL into a renderable scene.
///
/// `targets` lists the compressed texture families the render device can
/// sample; universal textures are transcoded to the best of them.
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(
        &self,
        url: &str,
        targets: TextureCompression,
    ) -> Result<ModelScene, AssetLoadError>;
}

/// glTF 2.0 loader (`.gltf` with external or embedded buffers, and `.glb`).
///
/// Only triangle-list primitives are kept. Base color factor and base color
/// texture are the only material inputs read. Geometry compressed with
/// `EXT_meshopt_compression` and KTX2 textures (`KHR_texture_basisu`) are
/// decoded; other required extensions fail the load.
#[derive(Debug)]
pub struct GltfLoader<S> {
    source: S,
}

impl<S: AssetSource> GltfLoader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn load_buffers(
        &self,
        url: &str,
        document: &gltf::Document,
        blob: Option<&[u8]>,
    ) -> Result<Vec<Vec<u8>>, AssetLoadError> {
        let mut plans = Vec::new();
        for buffer in document.buffers() {
            if compression::is_fallback_buffer(&buffer) {
                let zeroed = Fetch::Ready(vec![0; buffer.length()]);
                plans.push((buffer.index(), buffer.length(), zeroed));
                continue;
            }
            let plan = match buffer.source() {
                BufferSource::Bin => match blob {
                    Some(blob) => Fetch::Ready(blob.to_vec()),
                    None => {
                        return Err(AssetLoadError::Buffer {
                            index: buffer.index(),
                            reason: "binary chunk is missing".into(),
                        });
                    }
                },
                BufferSource::Uri(u) => match uri::decode_data_uri(u) {
                    Some(Ok(bytes)) => Fetch::Ready(bytes),
                    Some(Err(e)) => {
                        return Err(AssetLoadError::Buffer {
                            index: buffer.index(),
                            reason: e.to_string(),
                        });
                    }
                    None => Fetch::Remote(uri::join(url, u)),
                },
            };
            plans.push((buffer.index(), buffer.length(), plan));
        }

        let mut buffers = Vec::with_capacity(plans.len());
        for (index, length, plan) in plans {
            let data = match plan {
                Fetch::Ready(bytes) => bytes,
                Fetch::Remote(buffer_url) => self.source.fetch(&buffer_url).await?,
            };
            if data.len() < length {
                return Err(AssetLoadError::Buffer {
                    index,
                    reason: format!("expected {length} bytes, got {}", data.len()),
                });
            }
            buffers.push(data);
        }
        Ok(buffers)
    }

    /// Decodes the referenced images. Failures are logged and yield `None`.
    async fn load_images(
        &self,
        url: &str,
        plans: Vec<(usize, Fetch)>,
        targets: TextureCompression,
    ) -> Vec<(usize, Option<TextureImage>)> {
        let mut out = Vec::with_capacity(plans.len());
        for (index, plan) in plans {
            let bytes = match plan {
                Fetch::Ready(bytes) => Ok(bytes),
                Fetch::Remote(image_url) => self.source.fetch(&image_url).await,
            };
            let decoded = bytes.and_then(|b| decode_image(index, &b, targets));
            match decoded {
                Ok(image) => out.push((index, Some(image))),
                Err(e) => {
                    log::warn!("{url}: skipping texture: {e}");
                    out.push((index, None));
                }
            }
        }
        out
    }
}

#[async_trait]
impl<S: AssetSource> AssetLoader for GltfLoader<S> {
    async fn load(
        &self,
        url: &str,
        targets: TextureCompression,
    ) -> Result<ModelScene, AssetLoadError> {
        if url.trim().is_empty() {
            return Err(AssetLoadError::InvalidReference);
        }

        let bytes = self.source.fetch(url).await?;
        let (document, blob) = parse_document(&bytes)?;
        let mut buffers = self.load_buffers(url, &document, blob.as_deref()).await?;
        let decompressed = compression::decompress_views(&document, &mut buffers)?;
        if decompressed > 0 {
            log::debug!("{url}: decompressed {decompressed} meshopt buffer views");
        }

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or(AssetLoadError::EmptyScene)?;

        let mut meshes = Vec::new();
        let mut texture_of = Vec::new();
        for node in scene.nodes() {
            collect_node(&node, Mat4::IDENTITY, 0, &buffers, &mut meshes, &mut texture_of);
        }

        let image_plans = plan_images(url, &document, &buffers, &texture_of);
        let decoded = self.load_images(url, image_plans, targets).await;

        let mut remap = HashMap::new();
        let mut images = Vec::new();
        for (gltf_index, image) in decoded {
            if let Some(image) = image {
                remap.insert(gltf_index, images.len());
                images.push(image);
            }
        }
        for (mesh, source_image) in meshes.iter_mut().zip(&texture_of) {
            mesh.material.base_color_texture = source_image.and_then(|i| remap.get(&i).copied());
        }

        log::debug!(
            "{url}: {} meshes, {} triangles, {} textures",
            meshes.len(),
            meshes.iter().map(|m| m.indices.len() / 3).sum::<usize>(),
            images.len()
        );
        Ok(ModelScene { meshes, images })
    }
}

enum Fetch {
    Ready(Vec<u8>),
    Remote(String),
}

/// Parses glTF or GLB, accepting the extensions decoded in [`compression`]
/// as required extensions.
fn parse_document(bytes: &[u8]) -> Result<(gltf::Document, Option<Vec<u8>>), AssetLoadError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice_without_validation(bytes)?;
    let mut json = document.into_json();
    json.extensions_required
        .retain(|name| !DECODED_EXTENSIONS.contains(&name.as_str()));
    let document = gltf::Document::from_json(json)?;
    Ok((document, blob))
}

// ── scene traversal ───────────────────────────────────────────────────────

fn collect_node(
    node: &gltf::Node<'_>,
    parent: Mat4,
    depth: usize,
    buffers: &[Vec<u8>],
    meshes: &mut Vec<MeshInstance>,
    texture_of: &mut Vec<Option<usize>>,
) {
    if depth > MAX_NODE_DEPTH {
        log::warn!("node {} is nested too deep, skipping", node.index());
        return;
    }
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        for primitive in mesh.primitives() {
            if let Some((instance, image)) = build_primitive(&primitive, world, buffers) {
                meshes.push(instance);
                texture_of.push(image);
            }
        }
    }
    for child in node.children() {
        collect_node(&child, world, depth + 1, buffers, meshes, texture_of);
    }
}

fn build_primitive(
    primitive: &gltf::Primitive<'_>,
    world: Mat4,
    buffers: &[Vec<u8>],
) -> Option<(MeshInstance, Option<usize>)> {
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::debug!("skipping {:?} primitive", primitive.mode());
        return None;
    }
    let reader = primitive.reader(|b| buffers.get(b.index()).map(Vec::as_slice));
    let positions: Vec<[f32; 3]> = reader.read_positions()?.collect();
    if positions.is_empty() {
        return None;
    }

    let pbr = primitive.material().pbr_metallic_roughness();
    let texture = pbr.base_color_texture();
    let uv_set = texture.as_ref().map_or(0, |info| info.tex_coord());
    let image = texture.and_then(|info| texture_image(&info.texture()));

    let indices = match reader.read_indices() {
        Some(read) => sanitize_indices(read.into_u32().collect(), positions.len()),
        None => sanitize_indices((0..positions.len() as u32).collect(), positions.len()),
    };
    let normals: Vec<[f32; 3]> = match reader.read_normals() {
        Some(read) => read.collect(),
        None => generate_normals(&positions, &indices),
    };
    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(uv_set)
        .map(|read| read.into_f32().collect())
        .unwrap_or_default();

    let vertices = positions
        .iter()
        .enumerate()
        .map(|(i, &position)| MeshVertex {
            position,
            normal: normals.get(i).copied().unwrap_or([0.0, 1.0, 0.0]),
            uv: uvs.get(i).copied().unwrap_or_default(),
        })
        .collect();

    let instance = MeshInstance {
        vertices,
        indices,
        world,
        material: Material {
            base_color: pbr.base_color_factor(),
            base_color_texture: None,
        },
    };
    Some((instance, image))
}

/// Image index of `texture`, preferring extension-provided sources.
fn texture_image(texture: &gltf::Texture<'_>) -> Option<usize> {
    TEXTURE_SOURCE_EXTENSIONS
        .iter()
        .find_map(|name| texture.extension_value(name)?.get("source")?.as_u64())
        .map(|index| index as usize)
        .or_else(|| texture.source().map(|image| image.index()))
}

/// Drops trailing partial triangles and triangles with out-of-range indices.
fn sanitize_indices(indices: Vec<u32>, vertex_count: usize) -> Vec<u32> {
    indices
        .chunks_exact(3)
        .filter(|tri| tri.iter().all(|&i| (i as usize) < vertex_count))
        .flatten()
        .copied()
        .collect()
}

/// Area-weighted smooth normals.
fn generate_normals(positions: &[[f32; 3]], indices: &[u32]) -> Vec<[f32; 3]> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from_array(positions[a]);
        let pb = Vec3::from_array(positions[b]);
        let pc = Vec3::from_array(positions[c]);
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    acc.into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y).to_array())
        .collect()
}

// ── images ────────────────────────────────────────────────────────────────

/// Works out where each referenced image's bytes come from.
fn plan_images(
    url: &str,
    document: &gltf::Document,
    buffers: &[Vec<u8>],
    texture_of: &[Option<usize>],
) -> Vec<(usize, Fetch)> {
    let mut wanted: Vec<usize> = texture_of.iter().flatten().copied().collect();
    wanted.sort_unstable();
    wanted.dedup();

    let mut plans = Vec::with_capacity(wanted.len());
    for index in wanted {
        let Some(image) = document.images().nth(index) else {
            continue;
        };
        let plan = match image.source() {
            ImageSource::View { view, .. } => {
                let start = view.offset();
                let end = start + view.length();
                match buffers.get(view.buffer().index()).and_then(|b| b.get(start..end)) {
                    Some(bytes) => Fetch::Ready(bytes.to_vec()),
                    None => {
                        log::warn!("{url}: image {index} view is out of bounds");
                        continue;
                    }
                }
            }
            ImageSource::Uri { uri: u, .. } => match uri::decode_data_uri(u) {
                Some(Ok(bytes)) => Fetch::Ready(bytes),
                Some(Err(e)) => {
                    log::warn!("{url}: image {index}: {e}");
                    continue;
                }
                None => Fetch::Remote(uri::join(url, u)),
            },
        };
        plans.push((index, plan));
    }
    plans
}

fn decode_image(
    index: usize,
    bytes: &[u8],
    targets: TextureCompression,
) -> Result<TextureImage, AssetLoadError> {
    let fail = |reason: String| AssetLoadError::Image { index, reason };
    if compression::is_ktx2(bytes) {
        return compression::decode_ktx2(bytes, targets).map_err(fail);
    }
    let decoded = ::image::load_from_memory(bytes).map_err(|e| fail(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    Ok(TextureImage::rgba(rgba.width(), rgba.height(), rgba.into_raw()))
}
