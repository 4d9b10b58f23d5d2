//! The render step of a job: asset reference in, encoded image out.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use vitrine_assets::{AssetConfig, AssetLoadError, AssetLoader};
use vitrine_engine::render::{self, RgbaFrame};
use vitrine_engine::scene::ModelScene;
use vitrine_engine::surface::{
    OffscreenSurface, RenderSurface, SurfaceConfig, SurfaceFactory, SurfaceManager,
    WgpuSurfaceFactory,
};

use crate::error::ThumbnailError;

/// Produces one thumbnail.
///
/// `Ok(None)` means the asset loaded but had nothing to frame.
#[async_trait]
pub trait ThumbnailRenderer: Send + Sync {
    async fn render(
        &self,
        key: &str,
        config: &SurfaceConfig,
    ) -> Result<Option<String>, ThumbnailError>;
}

/// A surface that can draw a loaded scene and hand back its pixels.
pub trait SceneSurface: RenderSurface {
    fn render_scene(&mut self, scene: &ModelScene) -> anyhow::Result<Option<RgbaFrame>>;
}

impl SceneSurface for OffscreenSurface {
    fn render_scene(&mut self, scene: &ModelScene) -> anyhow::Result<Option<RgbaFrame>> {
        OffscreenSurface::render_scene(self, scene)
    }
}

/// Renders through the shared GPU surface.
///
/// The surface lock is held for the whole job, asset loading included, so
/// jobs never interleave on the surface even when more than one is admitted.
pub struct GpuThumbnailRenderer<F: SurfaceFactory = WgpuSurfaceFactory> {
    surfaces: Mutex<SurfaceManager<F>>,
    loader: Arc<dyn AssetLoader>,
    assets: AssetConfig,
}

impl GpuThumbnailRenderer<WgpuSurfaceFactory> {
    pub fn new(loader: Arc<dyn AssetLoader>, assets: AssetConfig) -> Self {
        Self::with_factory(WgpuSurfaceFactory::default(), loader, assets)
    }
}

impl<F: SurfaceFactory> GpuThumbnailRenderer<F> {
    pub fn with_factory(factory: F, loader: Arc<dyn AssetLoader>, assets: AssetConfig) -> Self {
        Self {
            surfaces: Mutex::new(SurfaceManager::new(factory)),
            loader,
            assets,
        }
    }
}

#[async_trait]
impl<F> ThumbnailRenderer for GpuThumbnailRenderer<F>
where
    F: SurfaceFactory + Send,
    F::Surface: SceneSurface + Send,
{
    async fn render(
        &self,
        key: &str,
        config: &SurfaceConfig,
    ) -> Result<Option<String>, ThumbnailError> {
        let mut surfaces = self.surfaces.lock().await;
        let shared = surfaces.get_or_create(config)?;
        let targets = shared.ensure_probed();

        let url = self.assets.resolve(key);
        if url.is_empty() {
            return Err(AssetLoadError::InvalidReference.into());
        }
        let scene = self.loader.load(&url, targets).await?;
        if scene.is_empty() {
            log::debug!("{key}: no geometry to render");
            return Ok(None);
        }

        let Some(frame) = shared
            .surface_mut()
            .render_scene(&scene)
            .map_err(ThumbnailError::Render)?
        else {
            log::debug!("{key}: scene bounds are degenerate");
            return Ok(None);
        };
        let encoded = render::png_data_url(&frame).map_err(ThumbnailError::Render)?;
        Ok(Some(encoded))
    }
}
