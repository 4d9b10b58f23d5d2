use anyhow::{Context, Result};

use crate::device::{capture_errors, GpuInit, HeadlessGpu, TextureCompression};
use crate::render::{self, fit_extent, CameraFrame, MeshRenderer, RenderTargets, RgbaFrame};
use crate::scene::ModelScene;

use super::{RenderSurface, SurfaceConfig, SurfaceFactory};

/// The shared drawable: device, size-dependent targets and the renderer.
///
/// This is the headless counterpart of a canvas + renderer pair. It lives for
/// the whole process and is only ever resized.
pub struct OffscreenSurface {
    gpu: HeadlessGpu,
    config: SurfaceConfig,
    targets: RenderTargets,
    renderer: MeshRenderer,
}

impl OffscreenSurface {
    pub fn new(gpu: HeadlessGpu, config: SurfaceConfig) -> Result<Self> {
        let targets = create_targets(&gpu, &config)?;
        Ok(Self {
            gpu,
            config,
            targets,
            renderer: MeshRenderer::new(),
        })
    }

    /// Renders one frame of `scene` and reads it back.
    ///
    /// Returns `Ok(None)` when the scene has no geometry that can be framed.
    /// Per-request GPU objects are released before returning, on every path.
    pub fn render_scene(&mut self, scene: &ModelScene) -> Result<Option<RgbaFrame>> {
        let Some(bounds) = scene.world_bounds() else {
            return Ok(None);
        };
        let Some(camera) = CameraFrame::around(&bounds, self.config.aspect()) else {
            return Ok(None);
        };

        let device = self.gpu.device();
        let queue = self.gpu.queue();
        let renderer = &mut self.renderer;
        let targets = &self.targets;
        let clear = self.config.background.clear_color();

        let gpu_scene = capture_errors(device, "uploading scene", || {
            renderer.upload(device, queue, scene)
        })?;

        capture_errors(device, "drawing thumbnail", || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vitrine thumbnail encoder"),
            });
            renderer.draw(device, queue, &mut encoder, targets, &gpu_scene, &camera, clear)?;
            targets.copy_to_readback(&mut encoder);
            queue.submit(std::iter::once(encoder.finish()));
            Ok(())
        })?;

        let frame = capture_errors(device, "reading back thumbnail", || {
            render::read_frame(device, targets.readback(), targets.layout())
        })
        .context("failed to read back thumbnail")?;

        drop(gpu_scene);
        Ok(Some(frame))
    }
}

impl RenderSurface for OffscreenSurface {
    fn config(&self) -> &SurfaceConfig {
        &self.config
    }

    fn reconfigure(&mut self, config: &SurfaceConfig) -> Result<()> {
        let size = fit_extent(config.physical_size(), self.gpu.max_texture_dimension());
        if size != self.targets.size() {
            let resized = create_targets(&self.gpu, config)?;
            std::mem::replace(&mut self.targets, resized).destroy();
        }
        // Background and logical size only affect the next frame's clear/camera.
        self.config = *config;
        Ok(())
    }

    fn probe_capabilities(&mut self) -> TextureCompression {
        TextureCompression::from_features(self.gpu.device().features())
    }
}

/// Creates an [`OffscreenSurface`] on a fresh headless device.
#[derive(Debug, Clone, Default)]
pub struct WgpuSurfaceFactory {
    init: GpuInit,
}

impl WgpuSurfaceFactory {
    pub fn new(init: GpuInit) -> Self {
        Self { init }
    }
}

impl SurfaceFactory for WgpuSurfaceFactory {
    type Surface = OffscreenSurface;

    fn create(&mut self, config: &SurfaceConfig) -> Result<OffscreenSurface> {
        let gpu = pollster::block_on(HeadlessGpu::new(self.init.clone()))?;
        OffscreenSurface::new(gpu, *config)
    }
}

/// Allocates targets for `config`, shrunk to the device's texture limit.
fn create_targets(gpu: &HeadlessGpu, config: &SurfaceConfig) -> Result<RenderTargets> {
    let requested = config.physical_size();
    let size = fit_extent(requested, gpu.max_texture_dimension());
    if size != requested {
        log::warn!(
            "surface {}x{} exceeds the device limit, rendering at {}x{}",
            requested.0,
            requested.1,
            size.0,
            size.1
        );
    }
    capture_errors(gpu.device(), "allocating render targets", || {
        Ok(RenderTargets::new(gpu.device(), size))
    })
}
