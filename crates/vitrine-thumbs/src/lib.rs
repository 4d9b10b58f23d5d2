//! Thumbnail service for 3D model assets.
//!
//! [`Thumbnails`] is the entry point. It owns the result cache, the in-flight
//! registry and the scheduler, and drives a [`ThumbnailRenderer`] (normally
//! [`GpuThumbnailRenderer`]) one job at a time.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use vitrine_assets::{AssetConfig, DefaultSource, GltfLoader};
//! use vitrine_thumbs::{GpuThumbnailRenderer, ThumbnailOptions, Thumbnails};
//!
//! let assets = AssetConfig::from_env();
//! let loader = Arc::new(GltfLoader::new(DefaultSource::new(&assets)));
//! let renderer = GpuThumbnailRenderer::new(loader, assets);
//! let thumbs = Thumbnails::new(Arc::new(renderer), ThumbnailOptions::default());
//!
//! let image = thumbs.ensure("model-a.glb").await;
//! # let _ = image;
//! # Ok(())
//! # }
//! ```

mod cache;
mod error;
mod idle;
mod options;
mod registry;
mod renderer;
mod scheduler;
mod service;

pub use cache::{ResultCache, Thumbnail};
pub use error::ThumbnailError;
pub use idle::{IdleNotifier, IdleSignal, NeverIdle, NextTick};
pub use options::{Schedule, ThumbnailOptions};
pub use registry::ThumbnailFuture;
pub use renderer::{GpuThumbnailRenderer, SceneSurface, ThumbnailRenderer};
pub use service::{ThumbnailStats, Thumbnails};
