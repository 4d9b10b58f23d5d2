/// Straight-alpha sRGB color, as authored in configuration strings.
///
/// Conversion to the linear premultiplied values the GPU expects happens at
/// the last moment ([`Color::to_wgpu`]), so equality compares what the user wrote.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
    pub const BLACK: Self = Self { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    #[inline]
    pub const fn transparent() -> Self {
        Self { r: 0.0, g: 0.0, b: 0.0, a: 0.0 }
    }

    /// Creates a color from straight sRGB bytes (`0`–`255`).
    #[inline]
    pub fn from_srgb_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    /// Parses `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse_hex(s: &str) -> Option<Self> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if !hex.is_ascii() {
            return None;
        }

        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);

        match hex.len() {
            3 => Some(Self::from_srgb_u8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
            6 => Some(Self::from_srgb_u8(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Some(Self::from_srgb_u8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Returns linear RGB with straight alpha.
    #[inline]
    pub fn to_linear(self) -> [f32; 4] {
        [
            srgb_to_linear(self.r),
            srgb_to_linear(self.g),
            srgb_to_linear(self.b),
            self.a.clamp(0.0, 1.0),
        ]
    }

    /// Returns the linear premultiplied clear value for an sRGB render target.
    pub fn to_wgpu(self) -> wgpu::Color {
        let [r, g, b, a] = self.to_linear();
        wgpu::Color {
            r: (r * a) as f64,
            g: (g * a) as f64,
            b: (b * a) as f64,
            a: a as f64,
        }
    }
}

#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_hex ─────────────────────────────────────────────────────────

    #[test]
    fn parses_six_digit_hex() {
        let c = Color::parse_hex("#ff8000").unwrap();
        assert_eq!(c, Color::from_srgb_u8(255, 128, 0, 255));
    }

    #[test]
    fn parses_short_hex_by_doubling_nibbles() {
        assert_eq!(Color::parse_hex("#fff"), Some(Color::WHITE));
        assert_eq!(Color::parse_hex("000"), Some(Color::BLACK));
    }

    #[test]
    fn parses_alpha_channel() {
        let c = Color::parse_hex("#00000080").unwrap();
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(Color::parse_hex("#12345"), None);
        assert_eq!(Color::parse_hex("#gggggg"), None);
        assert_eq!(Color::parse_hex(""), None);
        assert_eq!(Color::parse_hex("#ééé"), None);
    }

    // ── conversion ────────────────────────────────────────────────────────

    #[test]
    fn white_and_black_are_fixed_points() {
        for (got, want) in Color::WHITE.to_linear().iter().zip([1.0, 1.0, 1.0, 1.0]) {
            assert!((got - want).abs() < 1e-6);
        }
        assert_eq!(Color::BLACK.to_linear(), [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn transparent_clear_is_all_zero() {
        let c = Color::transparent().to_wgpu();
        assert_eq!((c.r, c.g, c.b, c.a), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn mid_grey_is_darker_in_linear_space() {
        let [r, _, _, _] = Color::from_srgb_u8(128, 128, 128, 255).to_linear();
        assert!(r > 0.2 && r < 0.23);
    }
}
