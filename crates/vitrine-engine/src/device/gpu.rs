use std::sync::Arc;

use anyhow::{Context, Result};

/// Initialization parameters for the headless GPU layer.
///
/// Keep this structure stable and minimal. Add configuration flags only when a
/// concrete platform or backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Adapter selection preference.
    ///
    /// Thumbnails are small; low power keeps discrete GPUs asleep on laptops.
    pub power_preference: wgpu::PowerPreference,

    /// Accept a software adapter when no hardware adapter is available.
    pub force_fallback_adapter: bool,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    ///
    /// `None` requests everything the adapter offers, so large surfaces and
    /// textures stay within what the hardware actually supports.
    pub required_limits: Option<wgpu::Limits>,

    /// Also enable whichever compressed texture families the adapter supports.
    pub texture_compression: bool,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            required_features: wgpu::Features::empty(),
            required_limits: None,
            texture_compression: true,
        }
    }
}

/// Feature flags of every compressed texture family the renderer can sample.
pub const COMPRESSION_FEATURES: wgpu::Features = wgpu::Features::TEXTURE_COMPRESSION_BC
    .union(wgpu::Features::TEXTURE_COMPRESSION_ETC2)
    .union(wgpu::Features::TEXTURE_COMPRESSION_ASTC);

/// Owns the wgpu core objects for offscreen rendering.
///
/// There is no surface/swapchain here: every frame is rendered into textures
/// owned by [`crate::surface::OffscreenSurface`] and read back to the CPU.
pub struct HeadlessGpu {
    /// Logical device.
    device: wgpu::Device,

    /// Command queue.
    queue: wgpu::Queue,
}

impl HeadlessGpu {
    /// Creates a GPU context that is not bound to any window.
    ///
    /// Adapter/device acquisition is asynchronous under wgpu. Failure here means
    /// the environment cannot render at all.
    pub async fn new(init: GpuInit) -> Result<Self> {
        let GpuInit {
            power_preference,
            force_fallback_adapter,
            mut required_features,
            required_limits,
            texture_compression,
        } = init;

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: None,
                force_fallback_adapter,
            })
            .await
            .context("failed to find a suitable GPU adapter")?;

        if texture_compression {
            required_features |= adapter.features() & COMPRESSION_FEATURES;
        }
        let required_limits = required_limits.unwrap_or_else(|| adapter.limits());

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("vitrine device"),
                required_features,
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create wgpu device/queue")?;

        // Errors outside an error scope would otherwise panic the calling thread.
        device.on_uncaptured_error(Arc::new(|err: wgpu::Error| {
            log::error!("uncaptured wgpu error: {err}");
        }));

        let info = adapter.get_info();
        log::info!(
            "headless GPU ready: \"{}\" ({:?}, {:?}), max texture {}",
            info.name,
            info.backend,
            info.device_type,
            device.limits().max_texture_dimension_2d
        );

        Ok(Self { device, queue })
    }

    /// Returns a reference to the logical device.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Returns a reference to the command queue.
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Largest width or height a 2D texture may have on this device.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

/// Runs `f` with validation and out-of-memory errors captured in error scopes
/// and reported as `Err` instead of reaching the uncaptured-error handler.
///
/// Scopes are thread-local, so `f` must issue all of its GPU calls on the
/// calling thread.
pub fn capture_errors<T>(
    device: &wgpu::Device,
    label: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let validation = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let out_of_memory = device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

    let value = f();

    let out_of_memory = pollster::block_on(out_of_memory.pop());
    let validation = pollster::block_on(validation.pop());
    if let Some(err) = out_of_memory.or(validation) {
        return Err(anyhow::anyhow!("{label}: {err}"));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_init_uses_adapter_limits_and_compression() {
        let init = GpuInit::default();
        assert!(init.required_limits.is_none());
        assert!(init.texture_compression);
        assert!(init.required_features.is_empty());
    }

    #[test]
    fn compression_features_cover_every_family() {
        assert!(COMPRESSION_FEATURES.contains(wgpu::Features::TEXTURE_COMPRESSION_BC));
        assert!(COMPRESSION_FEATURES.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2));
        assert!(COMPRESSION_FEATURES.contains(wgpu::Features::TEXTURE_COMPRESSION_ASTC));
    }
}
