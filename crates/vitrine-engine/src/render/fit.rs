//! Keeping textures and targets inside device limits.

use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::scene::{ImageFormat, TextureImage};

/// Scales `(width, height)` down uniformly so neither side exceeds `max_dim`.
///
/// Sizes already within the limit are returned unchanged. Sides never drop
/// below one pixel.
pub fn fit_extent((width, height): (u32, u32), max_dim: u32) -> (u32, u32) {
    let max_dim = max_dim.max(1);
    let longest = width.max(height);
    if longest <= max_dim {
        return (width.max(1), height.max(1));
    }
    let scale = max_dim as f64 / longest as f64;
    let shrink = |v: u32| ((v as f64 * scale).floor() as u32).clamp(1, max_dim);
    (shrink(width), shrink(height))
}

/// Returns a copy of `image` that fits within `max_dim`, or `None` when it
/// already does.
///
/// Block-compressed images cannot be resampled here; they come back as
/// `None` too and the caller decides whether they can be used at all.
pub fn downscale_to_fit(image: &TextureImage, max_dim: u32) -> Option<TextureImage> {
    if image.format != ImageFormat::Rgba8 {
        return None;
    }
    let (width, height) = fit_extent((image.width, image.height), max_dim);
    if (width, height) == (image.width, image.height) {
        return None;
    }

    let source = RgbaImage::from_raw(image.width, image.height, image.data.clone())?;
    let resized = imageops::resize(&source, width, height, FilterType::Triangle);
    log::debug!(
        "downscaled {}x{} texture to {}x{}",
        image.width,
        image.height,
        width,
        height
    );
    Some(TextureImage::rgba(width, height, resized.into_raw()))
}
