use super::ReadbackLayout;

/// Format of the color attachment and of the encoded output.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// MSAA sample count (4 is guaranteed for the formats above).
pub const SAMPLE_COUNT: u32 = 4;

/// Size-dependent GPU allocations of the offscreen surface.
///
/// Recreated only when the physical size changes; the device that owns them
/// is never recreated.
pub struct RenderTargets {
    size: (u32, u32),
    msaa: wgpu::Texture,
    msaa_view: wgpu::TextureView,
    resolve: wgpu::Texture,
    resolve_view: wgpu::TextureView,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    layout: ReadbackLayout,
}

impl RenderTargets {
    pub fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let (width, height) = (size.0.max(1), size.1.max(1));
        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = |label: &str,
                       format: wgpu::TextureFormat,
                       samples: u32,
                       usage: wgpu::TextureUsages| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: samples,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let msaa = texture(
            "vitrine msaa color",
            COLOR_FORMAT,
            SAMPLE_COUNT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let resolve = texture(
            "vitrine resolved color",
            COLOR_FORMAT,
            1,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        );
        let depth = texture(
            "vitrine depth",
            DEPTH_FORMAT,
            SAMPLE_COUNT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );

        let layout = ReadbackLayout::new(width, height);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vitrine readback"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Self {
            size: (width, height),
            msaa_view: msaa.create_view(&wgpu::TextureViewDescriptor::default()),
            resolve_view: resolve.create_view(&wgpu::TextureViewDescriptor::default()),
            depth_view: depth.create_view(&wgpu::TextureViewDescriptor::default()),
            msaa,
            resolve,
            depth,
            readback,
            layout,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn layout(&self) -> ReadbackLayout {
        self.layout
    }

    pub fn msaa_view(&self) -> &wgpu::TextureView {
        &self.msaa_view
    }

    pub fn resolve_view(&self) -> &wgpu::TextureView {
        &self.resolve_view
    }

    pub fn depth_view(&self) -> &wgpu::TextureView {
        &self.depth_view
    }

    pub fn readback(&self) -> &wgpu::Buffer {
        &self.readback
    }

    /// Records a copy of the resolved color texture into the readback buffer.
    pub fn copy_to_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.resolve,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.layout.padded_bytes_per_row),
                    rows_per_image: Some(self.layout.height),
                },
            },
            wgpu::Extent3d {
                width: self.layout.width,
                height: self.layout.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Releases GPU memory eagerly instead of waiting for the last handle to drop.
    pub fn destroy(self) {
        self.msaa.destroy();
        self.resolve.destroy();
        self.depth.destroy();
        self.readback.destroy();
    }
}
