use std::fmt;
use std::str::FromStr;

use crate::paint::Color;

/// What fills pixels not covered by the model.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub enum Background {
    #[default]
    Transparent,
    Solid(Color),
}

impl Background {
    /// Clear value for the color attachment.
    pub fn clear_color(&self) -> wgpu::Color {
        match self {
            Background::Transparent => wgpu::Color::TRANSPARENT,
            Background::Solid(c) => c.to_wgpu(),
        }
    }
}

/// Returned when a background string is neither `transparent` nor a hex color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid background {0:?}: expected \"transparent\" or a hex color like #rrggbb")]
pub struct InvalidBackground(pub String);

impl FromStr for Background {
    type Err = InvalidBackground;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.is_empty() || t.eq_ignore_ascii_case("transparent") || t.eq_ignore_ascii_case("none") {
            return Ok(Background::Transparent);
        }
        Color::parse_hex(t)
            .map(Background::Solid)
            .ok_or_else(|| InvalidBackground(s.to_owned()))
    }
}

impl fmt::Display for Background {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Background::Transparent => f.write_str("transparent"),
            Background::Solid(c) => {
                let b = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                write!(f, "#{:02x}{:02x}{:02x}{:02x}", b(c.r), b(c.g), b(c.b), b(c.a))
            }
        }
    }
}

/// Output parameters of the shared surface.
///
/// `width`/`height` are logical pixels; the backing textures are scaled by
/// `pixel_ratio`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub background: Background,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            pixel_ratio: 1.0,
            background: Background::Transparent,
        }
    }
}

impl SurfaceConfig {
    /// Backing texture size: `floor(logical * pixel_ratio)`, never zero.
    pub fn physical_size(&self) -> (u32, u32) {
        let scale = |v: u32| ((v as f32 * self.pixel_ratio).floor() as u32).max(1);
        (scale(self.width), scale(self.height))
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}
