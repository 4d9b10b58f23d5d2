use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::device::TextureCompression;

use super::{SurfaceConfig, SurfaceError};

/// A drawable target that can change its output parameters in place.
pub trait RenderSurface {
    /// Configuration the surface currently renders with.
    fn config(&self) -> &SurfaceConfig;

    /// Applies new output parameters without recreating the GPU context.
    ///
    /// On error the surface keeps its previous configuration.
    fn reconfigure(&mut self, config: &SurfaceConfig) -> anyhow::Result<()>;

    /// Queries device capabilities that loaders need (compressed texture support).
    fn probe_capabilities(&mut self) -> TextureCompression;
}

/// Creates the one surface the manager will ever own.
pub trait SurfaceFactory {
    type Surface: RenderSurface;

    fn create(&mut self, config: &SurfaceConfig) -> anyhow::Result<Self::Surface>;
}

/// The live surface plus its one-time capability probe state.
pub struct SharedSurface<S> {
    surface: S,
    ready: bool,
    capabilities: TextureCompression,
}

impl<S: RenderSurface> SharedSurface<S> {
    fn new(surface: S) -> Self {
        Self {
            surface,
            ready: false,
            capabilities: TextureCompression::default(),
        }
    }

    #[cfg(test)]
    fn is_ready(&self) -> bool {
        self.ready
    }

    /// Runs the capability probe the first time only.
    pub fn ensure_probed(&mut self) -> TextureCompression {
        if !self.ready {
            self.capabilities = self.surface.probe_capabilities();
            self.ready = true;
            log::info!("surface capabilities: {:?}", self.capabilities);
        }
        self.capabilities
    }

    #[cfg(test)]
    fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }
}

enum Slot<S> {
    Empty,
    Live(SharedSurface<S>),
    Unsupported(String),
}

/// Owns the process-lifetime render surface.
///
/// Access must stay on one execution context at a time; callers wrap the
/// manager in a lock and hold it for the whole render.
pub struct SurfaceManager<F: SurfaceFactory> {
    factory: F,
    slot: Slot<F::Surface>,
    reconfigurations: u64,
}

impl<F: SurfaceFactory> SurfaceManager<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            slot: Slot::Empty,
            reconfigurations: 0,
        }
    }

    /// Returns the shared surface, creating it on first use and reconfiguring
    /// it when width, height, pixel ratio or background differ.
    ///
    /// A failed creation is remembered: the environment is treated as
    /// unsupported and every later call fails fast without touching the GPU.
    /// A factory that panics counts as a failed creation.
    pub fn get_or_create(
        &mut self,
        config: &SurfaceConfig,
    ) -> Result<&mut SharedSurface<F::Surface>, SurfaceError> {
        if let Slot::Empty = self.slot {
            let factory = &mut self.factory;
            let created = panic::catch_unwind(AssertUnwindSafe(|| factory.create(config)))
                .unwrap_or_else(|payload| Err(anyhow::anyhow!("{}", panic_message(&*payload))));
            self.slot = match created {
                Ok(surface) => {
                    log::info!(
                        "created shared surface {}x{} @{}x",
                        config.width,
                        config.height,
                        config.pixel_ratio
                    );
                    Slot::Live(SharedSurface::new(surface))
                }
                Err(err) => {
                    log::warn!("GPU surface unavailable, thumbnails disabled: {err:#}");
                    Slot::Unsupported(format!("{err:#}"))
                }
            };
        }

        match &mut self.slot {
            Slot::Live(shared) => {
                if shared.surface.config() != config {
                    self.reconfigurations += 1;
                    log::debug!(
                        "reconfiguring shared surface to {}x{} @{}x ({}), change #{}",
                        config.width,
                        config.height,
                        config.pixel_ratio,
                        config.background,
                        self.reconfigurations
                    );
                    shared.surface.reconfigure(config)?;
                }
                Ok(shared)
            }
            Slot::Unsupported(reason) => Err(SurfaceError::Unsupported(reason.clone())),
            Slot::Empty => Err(SurfaceError::Unsupported("surface was not created".into())),
        }
    }

    #[cfg(test)]
    fn is_created(&self) -> bool {
        matches!(self.slot, Slot::Live(_))
    }

    #[cfg(test)]
    fn is_unsupported(&self) -> bool {
        matches!(self.slot, Slot::Unsupported(_))
    }

    #[cfg(test)]
    fn reconfigurations(&self) -> u64 {
        self.reconfigurations
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("surface creation panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("surface creation panicked: {s}")
    } else {
        "surface creation panicked".to_owned()
    }
}
