use std::borrow::Cow;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::scene::{ImageFormat, ModelScene, MeshVertex, TextureImage};

use super::gpu_scene::{GpuDraw, GpuTexture};
use super::shaders::MESH_WGSL;
use super::{
    downscale_to_fit, CameraFrame, GpuScene, RenderTargets, COLOR_FORMAT, DEPTH_FORMAT,
    SAMPLE_COUNT,
};

/// Ambient light intensity (white).
pub const AMBIENT_INTENSITY: f32 = 0.9;

/// Key light intensity (white).
pub const KEY_INTENSITY: f32 = 1.4;

/// Direction from the scene towards the key light (unnormalized).
pub const KEY_DIRECTION: Vec3 = Vec3::new(1.0, 2.0, 2.0);

/// Lit mesh renderer.
///
/// Long-lived objects (pipeline, layouts, sampler, fallback texture, frame
/// uniform) are created once per device and reused for every thumbnail.
/// Per-request objects live in a [`GpuScene`] returned by [`MeshRenderer::upload`].
#[derive(Default)]
pub struct MeshRenderer {
    pipeline: Option<wgpu::RenderPipeline>,

    frame_bgl: Option<wgpu::BindGroupLayout>,
    draw_bgl: Option<wgpu::BindGroupLayout>,

    frame_ubo: Option<wgpu::Buffer>,
    frame_bind_group: Option<wgpu::BindGroup>,

    sampler: Option<wgpu::Sampler>,
    white: Option<GpuTexture>,
}

impl MeshRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads geometry, material uniforms and textures of `scene`.
    ///
    /// Meshes without triangles are skipped. Images larger than the device
    /// allows are downscaled; images that still cannot be sampled (bad
    /// dimensions, unsupported block format) fall back to a white texture.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &ModelScene,
    ) -> Result<GpuScene> {
        self.ensure_pipeline(device);
        self.ensure_shared(device, queue);

        let bgl = self.draw_bgl.as_ref().context("draw layout missing")?;
        let sampler = self.sampler.as_ref().context("sampler missing")?;
        let white = self.white.as_ref().context("fallback texture missing")?;

        // Built first so every early return below still releases what was uploaded.
        let mut gpu = GpuScene::new();

        let max_dim = device.limits().max_texture_dimension_2d;
        let features = device.features();

        let mut slots: Vec<Option<usize>> = Vec::with_capacity(scene.images.len());
        for (i, image) in scene.images.iter().enumerate() {
            let image = match prepare_image(image, max_dim, features) {
                Ok(image) => image,
                Err(reason) => {
                    log::debug!("image {i} {reason}; using white");
                    slots.push(None);
                    continue;
                }
            };
            let texture = device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("vitrine base color"),
                    size: wgpu::Extent3d {
                        width: image.width,
                        height: image.height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: texture_format(image.format),
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &image.data,
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            slots.push(Some(gpu.textures.len()));
            gpu.textures.push(GpuTexture { texture, view });
        }

        for mesh in &scene.meshes {
            if mesh.vertices.is_empty() || mesh.indices.len() < 3 {
                continue;
            }

            let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vitrine mesh vbo"),
                contents: bytemuck::cast_slice(&mesh.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
            let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vitrine mesh ibo"),
                contents: bytemuck::cast_slice(&mesh.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

            let uniform = DrawUniform::new(mesh.world, mesh.material.base_color);
            let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vitrine draw ubo"),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM,
            });

            let view = mesh
                .material
                .base_color_texture
                .and_then(|i| slots.get(i).copied().flatten())
                .map_or(&white.view, |slot| &gpu.textures[slot].view);

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("vitrine draw bind group"),
                layout: bgl,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            });

            gpu.draws.push(GpuDraw {
                vertex,
                index,
                index_count: mesh.indices.len() as u32,
                uniform,
                bind_group,
            });
        }

        Ok(gpu)
    }

    /// Records one frame of `scene` into `targets` (MSAA color resolved into
    /// the copyable texture).
    pub fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        targets: &RenderTargets,
        scene: &GpuScene,
        camera: &CameraFrame,
        clear: wgpu::Color,
    ) -> Result<()> {
        self.ensure_pipeline(device);
        self.ensure_shared(device, queue);

        let ubo = self.frame_ubo.as_ref().context("frame uniform missing")?;
        queue.write_buffer(ubo, 0, bytemuck::bytes_of(&FrameUniform::new(camera)));

        let pipeline = self.pipeline.as_ref().context("pipeline missing")?;
        let frame_bind_group = self
            .frame_bind_group
            .as_ref()
            .context("frame bind group missing")?;

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vitrine mesh pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.msaa_view(),
                resolve_target: Some(targets.resolve_view()),
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear),
                    store: wgpu::StoreOp::Discard,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, frame_bind_group, &[]);
        for draw in &scene.draws {
            rpass.set_bind_group(1, &draw.bind_group, &[]);
            rpass.set_vertex_buffer(0, draw.vertex.slice(..));
            rpass.set_index_buffer(draw.index.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..draw.index_count, 0, 0..1);
        }

        Ok(())
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device) {
        if self.pipeline.is_some() {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("vitrine mesh shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_WGSL.into()),
        });

        let frame_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vitrine frame bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let draw_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("vitrine draw bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vitrine mesh pipeline layout"),
            bind_group_layouts: &[&frame_bgl, &draw_bgl],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("vitrine mesh pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[vertex_layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                // Assets are frequently authored double-sided.
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: SAMPLE_COUNT,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },

            multiview_mask: None,
            cache: None,
        });

        self.pipeline = Some(pipeline);
        self.frame_bgl = Some(frame_bgl);
        self.draw_bgl = Some(draw_bgl);

        self.frame_bind_group = None;
        self.frame_ubo = None;
    }

    fn ensure_shared(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        if self.frame_ubo.is_none() {
            let Some(bgl) = self.frame_bgl.as_ref() else { return };

            let ubo = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vitrine frame ubo"),
                size: std::mem::size_of::<FrameUniform>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("vitrine frame bind group"),
                layout: bgl,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ubo.as_entire_binding(),
                }],
            });
            self.frame_ubo = Some(ubo);
            self.frame_bind_group = Some(bind_group);
        }

        if self.sampler.is_none() {
            self.sampler = Some(device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("vitrine base color sampler"),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                ..Default::default()
            }));
        }

        if self.white.is_none() {
            let texture = device.create_texture_with_data(
                queue,
                &wgpu::TextureDescriptor {
                    label: Some("vitrine white"),
                    size: wgpu::Extent3d {
                        width: 1,
                        height: 1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8UnormSrgb,
                    usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                    view_formats: &[],
                },
                wgpu::util::TextureDataOrder::LayerMajor,
                &[255, 255, 255, 255],
            );
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            self.white = Some(GpuTexture { texture, view });
        }
    }
}

/// GPU format an image of `format` is uploaded as.
fn texture_format(format: ImageFormat) -> wgpu::TextureFormat {
    match format {
        ImageFormat::Rgba8 => wgpu::TextureFormat::Rgba8UnormSrgb,
        ImageFormat::Bc7 => wgpu::TextureFormat::Bc7RgbaUnormSrgb,
        ImageFormat::Etc2Rgba8 => wgpu::TextureFormat::Etc2Rgba8UnormSrgb,
        ImageFormat::Astc4x4 => wgpu::TextureFormat::Astc {
            block: wgpu::AstcBlock::B4x4,
            channel: wgpu::AstcChannel::UnormSrgb,
        },
    }
}

/// Checks that `image` can be sampled on a device with `features` and
/// `max_dim`, downscaling it when only its size is in the way.
fn prepare_image(
    image: &TextureImage,
    max_dim: u32,
    features: wgpu::Features,
) -> Result<Cow<'_, TextureImage>, &'static str> {
    if !image.is_well_formed() {
        return Err("has inconsistent dimensions");
    }
    if image.format.is_compressed() {
        if !features.contains(texture_format(image.format).required_features()) {
            return Err("uses a block format this device cannot sample");
        }
        if image.width % 4 != 0 || image.height % 4 != 0 {
            return Err("is not a whole number of blocks");
        }
        if image.width.max(image.height) > max_dim {
            return Err("is compressed and larger than the device allows");
        }
        return Ok(Cow::Borrowed(image));
    }
    Ok(match downscale_to_fit(image, max_dim) {
        Some(smaller) => Cow::Owned(smaller),
        None => Cow::Borrowed(image),
    })
}

fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        1 => Float32x3, // normal
        2 => Float32x2  // uv
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRS,
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    key_dir: [f32; 4],
    key_color: [f32; 4],
    ambient: [f32; 4],
}

impl FrameUniform {
    fn new(camera: &CameraFrame) -> Self {
        let dir = KEY_DIRECTION.normalize();
        Self {
            view_proj: camera.view_proj().to_cols_array_2d(),
            key_dir: [dir.x, dir.y, dir.z, 0.0],
            key_color: [KEY_INTENSITY, KEY_INTENSITY, KEY_INTENSITY, 0.0],
            ambient: [AMBIENT_INTENSITY, AMBIENT_INTENSITY, AMBIENT_INTENSITY, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    base_color: [f32; 4],
}

impl DrawUniform {
    fn new(world: Mat4, base_color: [f32; 4]) -> Self {
        // Singular transforms (zero scale) have no inverse; shading degrades gracefully.
        let normal = if world.determinant().abs() > f32::EPSILON {
            world.inverse().transpose()
        } else {
            world
        };
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: normal.to_cols_array_2d(),
            base_color,
        }
    }
}
