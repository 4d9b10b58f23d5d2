//! GPU rendering of a [`crate::scene::ModelScene`] into an image.
//!
//! Conventions:
//! - right-handed world, +Y up, wgpu depth range `[0, 1]`
//! - color targets are `Rgba8UnormSrgb`; shaders work in linear space

mod camera;
mod encode;
mod fit;
mod gpu_scene;
mod mesh;
mod readback;
mod shaders;
mod targets;

pub use camera::{CameraFrame, FOV_Y_DEGREES};
pub use encode::{decode_png_data_url, encode_png, png_data_url};
pub use fit::{downscale_to_fit, fit_extent};
pub use gpu_scene::{DisposalReport, GpuScene};
pub use mesh::{MeshRenderer, AMBIENT_INTENSITY, KEY_DIRECTION, KEY_INTENSITY};
pub use readback::{read_frame, strip_row_padding, ReadbackLayout, RgbaFrame};
pub use targets::{RenderTargets, COLOR_FORMAT, DEPTH_FORMAT, SAMPLE_COUNT};
