//! Image decoding and intensity conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, TIFF) and produces the RGB
//! raster the watershed floods over, plus the single-channel intensity
//! image the threshold works on.

use image::{GrayImage, Luma, RgbImage};

use crate::types::PipelineError;

/// Fixed-point BT.601 weights, scaled by 2^14.
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;
const ROUND: u32 = 1 << (SHIFT - 1);

/// Decode raw image bytes into an 8-bit RGB raster.
///
/// Whatever the `image` crate can decode with the enabled formats is
/// accepted; alpha is discarded.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
#[must_use = "returns the decoded image"]
pub fn decode(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Convert an RGB raster to intensity with the ITU-R BT.601 weights
/// `0.299 R + 0.587 G + 0.114 B`, rounded to the nearest integer.
#[must_use]
pub fn intensity(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let weighted = u32::from(r) * R_WEIGHT
            + u32::from(g) * G_WEIGHT
            + u32::from(b) * B_WEIGHT
            + ROUND;
        // The weights sum to 2^14, so the shifted value is at most 255.
        Luma([u8::try_from(weighted >> SHIFT).unwrap_or(u8::MAX)])
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGB image as a PNG byte buffer.
    fn encode_png(img: &RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn decoded_dimensions_match_input() {
        let img = RgbImage::from_pixel(17, 31, image::Rgb([128, 64, 32]));
        let decoded = decode(&encode_png(&img)).unwrap();
        assert_eq!(decoded.dimensions(), (17, 31));
        assert_eq!(decoded.get_pixel(3, 3).0, [128, 64, 32]);
    }

    #[test]
    fn gray_pixels_keep_their_value() {
        for v in [0_u8, 1, 77, 128, 254, 255] {
            let img = RgbImage::from_pixel(1, 1, image::Rgb([v, v, v]));
            assert_eq!(intensity(&img).get_pixel(0, 0).0[0], v);
        }
    }

    #[test]
    fn primaries_follow_bt601_weights() {
        let value = |rgb: [u8; 3]| {
            let img = RgbImage::from_pixel(1, 1, image::Rgb(rgb));
            intensity(&img).get_pixel(0, 0).0[0]
        };
        // 0.299 * 255 = 76.2, 0.587 * 255 = 149.7, 0.114 * 255 = 29.1
        assert_eq!(value([255, 0, 0]), 76);
        assert_eq!(value([0, 255, 0]), 150);
        assert_eq!(value([0, 0, 255]), 29);
    }
}
