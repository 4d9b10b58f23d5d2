use std::borrow::Cow;
use std::io::Read;

use basis_universal::{
    DecodeFlags, LowLevelUastcTranscoder, SliceParametersUastc, TranscoderBlockFormat,
};
use ktx2::{Format, SupercompressionScheme};
use vitrine_engine::device::TextureCompression;
use vitrine_engine::scene::{ImageFormat, TextureImage};

const KTX2_MAGIC: [u8; 12] = [
    0xAB, 0x4B, 0x54, 0x58, 0x20, 0x32, 0x30, 0xBB, 0x0D, 0x0A, 0x1A, 0x0A,
];

const UASTC_BLOCK_BYTES: usize = 16;

/// vkFormats that upload without transcoding.
const PASSTHROUGH: &[(Format, ImageFormat)] = &[
    (Format::R8G8B8A8_SRGB, ImageFormat::Rgba8),
    (Format::R8G8B8A8_UNORM, ImageFormat::Rgba8),
    (Format::BC7_SRGB_BLOCK, ImageFormat::Bc7),
    (Format::BC7_UNORM_BLOCK, ImageFormat::Bc7),
    (Format::ETC2_R8G8B8A8_SRGB_BLOCK, ImageFormat::Etc2Rgba8),
    (Format::ETC2_R8G8B8A8_UNORM_BLOCK, ImageFormat::Etc2Rgba8),
    (Format::ASTC_4x4_SRGB_BLOCK, ImageFormat::Astc4x4),
    (Format::ASTC_4x4_UNORM_BLOCK, ImageFormat::Astc4x4),
];

pub(crate) fn is_ktx2(bytes: &[u8]) -> bool {
    bytes.starts_with(&KTX2_MAGIC)
}

/// Decodes the base level of a KTX2 container.
///
/// UASTC payloads are transcoded to `targets.preferred_format()`; images
/// whose sides are not multiples of four fall back to RGBA8. Payloads in a
/// fixed vkFormat are passed through when the device can sample them.
pub(crate) fn decode_ktx2(
    bytes: &[u8],
    targets: TextureCompression,
) -> Result<TextureImage, String> {
    let reader = ktx2::Reader::new(bytes).map_err(|e| format!("invalid KTX2: {e:?}"))?;
    let header = reader.header();
    let (width, height) = (header.pixel_width, header.pixel_height.max(1));
    let level = reader.levels().next().ok_or("KTX2 has no mip levels")?;

    let data = match header.supercompression_scheme {
        None => Cow::Borrowed(level),
        Some(SupercompressionScheme::Zstandard) => Cow::Owned(inflate_zstd(level)?),
        Some(other) => return Err(format!("unsupported KTX2 supercompression {other:?}")),
    };

    let image = match header.format {
        None => transcode_uastc(&data, width, height, targets)?,
        Some(format) => {
            let (_, image_format) = PASSTHROUGH
                .iter()
                .find(|(vk, _)| *vk == format)
                .ok_or_else(|| format!("unsupported KTX2 format {format:?}"))?;
            if !targets.supports(*image_format) {
                return Err(format!("device cannot sample {image_format:?} textures"));
            }
            TextureImage {
                width,
                height,
                format: *image_format,
                data: data.into_owned(),
            }
        }
    };

    if !image.is_well_formed() {
        return Err(format!(
            "{}x{} {:?} image carries {} bytes",
            image.width,
            image.height,
            image.format,
            image.data.len()
        ));
    }
    Ok(image)
}

fn inflate_zstd(level: &[u8]) -> Result<Vec<u8>, String> {
    let mut source = level;
    let mut decoder = ruzstd::StreamingDecoder::new(&mut source)
        .map_err(|e| format!("invalid zstd frame: {e:?}"))?;
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| format!("zstd decode failed: {e}"))?;
    Ok(out)
}

fn transcode_uastc(
    data: &[u8],
    width: u32,
    height: u32,
    targets: TextureCompression,
) -> Result<TextureImage, String> {
    let (blocks_x, blocks_y) = (width.div_ceil(4), height.div_ceil(4));
    if data.len() != blocks_x as usize * blocks_y as usize * UASTC_BLOCK_BYTES {
        return Err(format!(
            "UASTC level holds {} bytes for a {width}x{height} image",
            data.len()
        ));
    }

    let format = match targets.preferred_format() {
        compressed if compressed.is_compressed() && width % 4 == 0 && height % 4 == 0 => {
            compressed
        }
        _ => ImageFormat::Rgba8,
    };
    let block_format = match format {
        ImageFormat::Astc4x4 => TranscoderBlockFormat::ASTC_4x4,
        ImageFormat::Bc7 => TranscoderBlockFormat::BC7,
        ImageFormat::Etc2Rgba8 => TranscoderBlockFormat::ETC2_RGBA,
        ImageFormat::Rgba8 => TranscoderBlockFormat::RGBA32,
    };

    basis_universal::transcoder_init();
    let params = SliceParametersUastc {
        num_blocks_x: blocks_x,
        num_blocks_y: blocks_y,
        has_alpha: true,
        original_width: width,
        original_height: height,
    };
    let data = LowLevelUastcTranscoder::new()
        .transcode_slice(data, params, DecodeFlags::HIGH_QUALITY, block_format)
        .map_err(|_| format!("UASTC transcode to {format:?} failed"))?;
    log::debug!("transcoded {width}x{height} UASTC texture to {format:?}");

    Ok(TextureImage {
        width,
        height,
        format,
        data,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const VK_FORMAT_R8G8B8A8_SRGB: u32 = 43;
    const SCHEME_ZSTD: u32 = 2;

    /// Single-level 2D KTX2 file around `level`.
    pub(crate) fn ktx2_file(
        vk_format: u32,
        width: u32,
        height: u32,
        scheme: u32,
        level: &[u8],
        uncompressed_len: usize,
    ) -> Vec<u8> {
        let mut out = KTX2_MAGIC.to_vec();
        for field in [vk_format, 1, width, height, 0, 0, 1, 1, scheme] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        // dfd, kvd offsets and lengths, then sgd offset and length
        for _ in 0..4 {
            out.extend_from_slice(&0u32.to_le_bytes());
        }
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());

        let data_offset = out.len() as u64 + 24;
        out.extend_from_slice(&data_offset.to_le_bytes());
        out.extend_from_slice(&(level.len() as u64).to_le_bytes());
        out.extend_from_slice(&(uncompressed_len as u64).to_le_bytes());
        out.extend_from_slice(level);
        out
    }

    fn rgba_ktx2(width: u32, height: u32, pixels: &[u8]) -> Vec<u8> {
        ktx2_file(VK_FORMAT_R8G8B8A8_SRGB, width, height, 0, pixels, pixels.len())
    }

    #[test]
    fn detects_container_magic() {
        assert!(is_ktx2(&rgba_ktx2(1, 1, &[0; 4])));
        assert!(!is_ktx2(b"\x89PNG\r\n\x1a\n"));
        assert!(!is_ktx2(&[]));
    }

    #[test]
    fn plain_rgba_passes_through() {
        let pixels: Vec<u8> = (0..16).collect();
        let image = decode_ktx2(&rgba_ktx2(2, 2, &pixels), TextureCompression::default()).unwrap();
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(image.format, ImageFormat::Rgba8);
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn zstd_supercompressed_level_is_inflated() {
        let pixels: Vec<u8> = (100..116).collect();
        // single-segment frame with one raw block
        let mut frame = vec![0x28, 0xB5, 0x2F, 0xFD, 0x20, 16, 0x81, 0x00, 0x00];
        frame.extend_from_slice(&pixels);

        let file = ktx2_file(VK_FORMAT_R8G8B8A8_SRGB, 2, 2, SCHEME_ZSTD, &frame, 16);
        let image = decode_ktx2(&file, TextureCompression::default()).unwrap();
        assert_eq!(image.data, pixels);
    }

    #[test]
    fn short_level_is_rejected() {
        let file = rgba_ktx2(4, 4, &[0; 16]);
        let err = decode_ktx2(&file, TextureCompression::default()).unwrap_err();
        assert!(err.contains("carries 16 bytes"));
    }

    #[test]
    fn unsampleable_block_format_is_rejected() {
        // vkFormat 146 is VK_FORMAT_BC7_SRGB_BLOCK
        let file = ktx2_file(146, 4, 4, 0, &[0; 16], 16);
        let err = decode_ktx2(&file, TextureCompression::default()).unwrap_err();
        assert!(err.contains("cannot sample"));

        let bc = TextureCompression { bc: true, ..Default::default() };
        let image = decode_ktx2(&file, bc).unwrap();
        assert_eq!(image.format, ImageFormat::Bc7);
    }

    #[test]
    fn uastc_size_mismatch_is_rejected_before_transcoding() {
        let file = ktx2_file(0, 8, 8, 0, &[0; 16], 16);
        let err = decode_ktx2(&file, TextureCompression::default()).unwrap_err();
        assert!(err.contains("UASTC level holds 16 bytes"));
    }

    #[test]
    fn garbage_is_rejected() {
        let mut bytes = KTX2_MAGIC.to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(decode_ktx2(&bytes, TextureCompression::default()).is_err());
    }
}
