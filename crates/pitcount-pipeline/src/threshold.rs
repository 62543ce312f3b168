//! Adaptive (locally weighted) thresholding.
//!
//! Each pixel is compared against the Gaussian-weighted mean of its
//! `block_size × block_size` neighborhood. Pixels sufficiently darker
//! than their surroundings become foreground (255), so dark particles on
//! an unevenly lit background separate cleanly.
//!
//! The kernel follows the usual size-to-sigma rule
//! `σ = 0.3·((size − 1)/2 − 1) + 0.8`, which is why the blur here is a
//! direct separable convolution rather than
//! [`imageproc::filter::gaussian_blur_f32`]: the latter derives the
//! kernel width from sigma, not the other way round.

use image::{GrayImage, Luma};

/// Gaussian sigma conventionally paired with an odd kernel `size`.
#[must_use]
pub fn sigma_for_size(size: u32) -> f64 {
    0.3f64.mul_add((f64::from(size) - 1.0).mul_add(0.5, -1.0), 0.8)
}

/// Normalized 1D Gaussian kernel of `size` taps.
#[must_use]
pub fn gaussian_kernel(size: u32) -> Vec<f64> {
    let sigma = sigma_for_size(size);
    let center = (f64::from(size) - 1.0) * 0.5;
    let scale = -0.5 / (sigma * sigma);
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let d = f64::from(i) - center;
            (scale * d * d).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Index into `[0, len)` with out-of-range positions replicated from
/// the nearest edge.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
const fn replicate(pos: isize, len: usize) -> usize {
    let last = len as isize - 1;
    if pos < 0 {
        0
    } else if pos > last {
        last as usize
    } else {
        pos as usize
    }
}

/// Gaussian-weighted local mean with replicated borders, rounded to
/// 8 bits.
#[must_use = "returns the local mean image"]
#[allow(clippy::cast_possible_wrap)]
pub fn local_mean(gray: &GrayImage, block_size: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return GrayImage::new(w, h);
    }
    let kernel = gaussian_kernel(block_size);
    let radius = (block_size / 2) as isize;
    let (width, height) = (w as usize, h as usize);

    // Horizontal pass into a float buffer.
    let src = gray.as_raw();
    let mut horizontal = vec![0.0_f64; src.len()];
    for (row, out) in src.chunks_exact(width).zip(horizontal.chunks_exact_mut(width)) {
        for (x, slot) in out.iter_mut().enumerate() {
            *slot = kernel
                .iter()
                .zip(-radius..)
                .map(|(k, dx)| k * f64::from(row[replicate(x as isize + dx, width)]))
                .sum();
        }
    }

    // Vertical pass, rounding to the nearest integer.
    GrayImage::from_fn(w, h, |x, y| {
        let x = x as usize;
        let sum: f64 = kernel
            .iter()
            .zip(-radius..)
            .map(|(k, dy)| k * horizontal[replicate(y as isize + dy, height) * width + x])
            .sum();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = sum.round().clamp(0.0, 255.0) as u8;
        Luma([value])
    })
}

/// Inverted adaptive threshold.
///
/// A pixel becomes foreground (255) when `pixel − mean ≤ −⌊offset⌋`,
/// i.e. when it is at least `offset` levels darker than its local mean.
/// Everything else is 0.
#[must_use = "returns the binary mask"]
pub fn adaptive_threshold_inv(gray: &GrayImage, block_size: u32, offset: f64) -> GrayImage {
    let mean = local_mean(gray, block_size);
    #[allow(clippy::cast_possible_truncation)]
    let delta = offset.floor() as i32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let diff = i32::from(gray.get_pixel(x, y).0[0]) - i32::from(mean.get_pixel(x, y).0[0]);
        Luma([if diff <= -delta { 255 } else { 0 }])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigma_for_default_block() {
        assert!((sigma_for_size(55) - 8.6).abs() < 1e-12);
        assert!((sigma_for_size(3) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(55);
        assert_eq!(k.len(), 55);
        let sum: f64 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..27 {
            assert!((k[i] - k[54 - i]).abs() < 1e-15);
        }
        assert!(k[27] > k[26]);
    }

    #[test]
    fn uniform_image_mean_is_unchanged() {
        let img = GrayImage::from_pixel(30, 20, Luma([173]));
        let mean = local_mean(&img, 55);
        assert!(mean.pixels().all(|p| p.0[0] == 173));
    }

    #[test]
    fn uniform_image_has_no_foreground() {
        let img = GrayImage::from_pixel(30, 20, Luma([90]));
        let mask = adaptive_threshold_inv(&img, 55, 12.0);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn dark_spot_becomes_foreground() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([200]));
        for y in 28..33 {
            for x in 28..33 {
                img.put_pixel(x, y, Luma([40]));
            }
        }
        let mask = adaptive_threshold_inv(&img, 55, 12.0);
        assert_eq!(mask.get_pixel(30, 30).0[0], 255);
        assert_eq!(mask.get_pixel(5, 5).0[0], 0);
    }

    #[test]
    fn bright_spot_stays_background() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([60]));
        img.put_pixel(30, 30, Luma([250]));
        let mask = adaptive_threshold_inv(&img, 55, 12.0);
        assert_eq!(mask.get_pixel(30, 30).0[0], 0);
    }

    #[test]
    fn empty_image_stays_empty() {
        let img = GrayImage::new(0, 0);
        assert_eq!(adaptive_threshold_inv(&img, 55, 12.0).dimensions(), (0, 0));
    }
}
