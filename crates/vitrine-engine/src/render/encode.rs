use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use super::RgbaFrame;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encodes a frame as PNG.
pub fn encode_png(frame: &RgbaFrame) -> Result<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * 4;
    anyhow::ensure!(
        frame.pixels.len() == expected,
        "frame has {} bytes, expected {expected} for {}x{} RGBA",
        frame.pixels.len(),
        frame.width,
        frame.height
    );

    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(
            &frame.pixels,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgba8,
        )
        .context("failed to encode thumbnail as PNG")?;
    Ok(out)
}

/// Encodes a frame as an embeddable `data:image/png;base64,...` string.
pub fn png_data_url(frame: &RgbaFrame) -> Result<String> {
    let png = encode_png(frame)?;
    Ok(format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png)))
}

/// Inverse of [`png_data_url`]; `None` for anything that is not a PNG data URL.
pub fn decode_png_data_url(url: &str) -> Option<Vec<u8>> {
    let payload = url.strip_prefix(PNG_DATA_URL_PREFIX)?;
    STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> RgbaFrame {
        RgbaFrame {
            width: 2,
            height: 2,
            pixels: vec![
                255, 0, 0, 255, 0, 255, 0, 255, //
                0, 0, 255, 255, 0, 0, 0, 0,
            ],
        }
    }

    #[test]
    fn data_url_carries_a_decodable_png() {
        let url = png_data_url(&checker()).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let png = decode_png_data_url(&url).unwrap();
        let img = image::load_from_memory_with_format(&png, image::ImageFormat::Png)
            .unwrap()
            .to_rgba8();
        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.as_raw(), &checker().pixels);
    }

    #[test]
    fn mismatched_pixel_buffer_is_an_error() {
        let frame = RgbaFrame { width: 4, height: 4, pixels: vec![0; 8] };
        assert!(encode_png(&frame).is_err());
    }

    #[test]
    fn non_png_data_urls_are_rejected() {
        assert_eq!(decode_png_data_url("data:image/jpeg;base64,AAAA"), None);
        assert_eq!(decode_png_data_url("https://example.com/a.png"), None);
    }
}
