use crate::scene::ImageFormat;

/// Compressed texture families supported by the adapter.
///
/// Probing is cheap under wgpu but the answer never changes for a device, so
/// the surface records it once and reuses it.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TextureCompression {
    pub bc: bool,
    pub etc2: bool,
    pub astc: bool,
}

impl TextureCompression {
    pub fn from_features(features: wgpu::Features) -> Self {
        Self {
            bc: features.contains(wgpu::Features::TEXTURE_COMPRESSION_BC),
            etc2: features.contains(wgpu::Features::TEXTURE_COMPRESSION_ETC2),
            astc: features.contains(wgpu::Features::TEXTURE_COMPRESSION_ASTC),
        }
    }

    /// True when no compressed family is available (transcoders must target RGBA8).
    pub fn is_none(self) -> bool {
        !(self.bc || self.etc2 || self.astc)
    }

    /// Best transcode target for universal textures on this device.
    pub fn preferred_format(self) -> ImageFormat {
        if self.astc {
            ImageFormat::Astc4x4
        } else if self.bc {
            ImageFormat::Bc7
        } else if self.etc2 {
            ImageFormat::Etc2Rgba8
        } else {
            ImageFormat::Rgba8
        }
    }

    /// Whether images in `format` can be sampled on this device.
    pub fn supports(self, format: ImageFormat) -> bool {
        match format {
            ImageFormat::Rgba8 => true,
            ImageFormat::Bc7 => self.bc,
            ImageFormat::Etc2Rgba8 => self.etc2,
            ImageFormat::Astc4x4 => self.astc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_features_report_nothing() {
        let caps = TextureCompression::from_features(wgpu::Features::empty());
        assert!(caps.is_none());
    }

    #[test]
    fn bc_feature_is_detected() {
        let caps = TextureCompression::from_features(wgpu::Features::TEXTURE_COMPRESSION_BC);
        assert!(caps.bc);
        assert!(!caps.etc2);
        assert!(!caps.astc);
        assert!(!caps.is_none());
    }

    #[test]
    fn preferred_format_follows_quality_order() {
        let none = TextureCompression::default();
        assert_eq!(none.preferred_format(), ImageFormat::Rgba8);

        let mobile = TextureCompression { etc2: true, ..none };
        assert_eq!(mobile.preferred_format(), ImageFormat::Etc2Rgba8);

        let desktop = TextureCompression { bc: true, etc2: true, ..none };
        assert_eq!(desktop.preferred_format(), ImageFormat::Bc7);

        let all = TextureCompression { astc: true, ..desktop };
        assert_eq!(all.preferred_format(), ImageFormat::Astc4x4);
        assert!(all.supports(ImageFormat::Etc2Rgba8));
        assert!(!mobile.supports(ImageFormat::Bc7));
    }
}
