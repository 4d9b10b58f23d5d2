//! Headless GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a window
//! - reporting adapter capabilities that only need to be probed once

mod caps;
mod gpu;

pub use caps::TextureCompression;
pub use gpu::{capture_errors, GpuInit, HeadlessGpu, COMPRESSION_FEATURES};
