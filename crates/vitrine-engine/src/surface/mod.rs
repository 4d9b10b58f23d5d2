//! The shared offscreen render surface and its lifecycle manager.
//!
//! One surface (device + render targets + renderer) is created lazily and then
//! reconfigured in place for the rest of the process. Creating GPU contexts is
//! slow and platforms cap how many may exist, so the manager never builds a
//! second one.

mod config;
mod error;
mod manager;
mod offscreen;

pub use config::{Background, InvalidBackground, SurfaceConfig};
pub use error::SurfaceError;
pub use manager::{RenderSurface, SharedSurface, SurfaceFactory, SurfaceManager};
pub use offscreen::{OffscreenSurface, WgpuSurfaceFactory};
