//! Binary morphology and distance measurement on foreground masks.
//!
//! Masks are `GrayImage`s with foreground = any nonzero value. Iterating
//! a `3×3` all-ones element `k` times is the same as a single pass with a
//! `(2k+1)×(2k+1)` square, which is what the `L∞` norm in
//! [`imageproc::morphology`] computes.

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;

use crate::types::DistanceImage;

/// Morphological opening (erode then dilate) with a `3×3` element
/// applied `iterations` times.
///
/// Removes foreground specks narrower than the element while leaving
/// larger regions essentially intact.
#[must_use = "returns the opened mask"]
pub fn open(mask: &GrayImage, iterations: u8) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    imageproc::morphology::open(mask, Norm::LInf, iterations)
}

/// Morphological dilation with a `3×3` element applied `iterations`
/// times.
#[must_use = "returns the dilated mask"]
pub fn dilate(mask: &GrayImage, iterations: u8) -> GrayImage {
    if mask.width() == 0 || mask.height() == 0 {
        return mask.clone();
    }
    imageproc::morphology::dilate(mask, Norm::LInf, iterations)
}

/// Chamfer weight for a horizontal or vertical step.
pub const CHAMFER_AXIAL: f64 = 1.0;
/// Chamfer weight for a diagonal step.
pub const CHAMFER_DIAGONAL: f64 = 1.4;
/// Chamfer weight for a knight's-move step.
pub const CHAMFER_KNIGHT: f64 = 2.1969;

/// Forward-pass half of the `5×5` chamfer mask, as `(dx, dy, weight)`.
/// The backward pass uses the same offsets negated.
const FORWARD_MASK: [(i64, i64, f64); 8] = [
    (-1, -2, CHAMFER_KNIGHT),
    (1, -2, CHAMFER_KNIGHT),
    (-2, -1, CHAMFER_KNIGHT),
    (-1, -1, CHAMFER_DIAGONAL),
    (0, -1, CHAMFER_AXIAL),
    (1, -1, CHAMFER_DIAGONAL),
    (2, -1, CHAMFER_KNIGHT),
    (-1, 0, CHAMFER_AXIAL),
];

/// Approximate Euclidean distance from every foreground pixel of `mask`
/// to the nearest background pixel, using a two-pass `5×5` chamfer mask
/// (weights `1`, `1.4`, `2.1969`). Background pixels are at distance `0`.
///
/// Pixels outside the image are infinitely far, not background, so a
/// region touching the border is measured only against the background
/// inside the image.
///
/// A mask with no background pixel at all has nothing to measure
/// against, so every distance is `0`.
#[must_use = "returns the distance image"]
pub fn distance_to_background(mask: &GrayImage) -> DistanceImage {
    let (w, h) = mask.dimensions();
    if !mask.pixels().any(|p| p.0[0] == 0) {
        return DistanceImage::new(w, h);
    }
    let mut dist = DistanceImage::from_fn(w, h, |x, y| {
        Luma([if mask.get_pixel(x, y).0[0] == 0 {
            0.0
        } else {
            f64::INFINITY
        }])
    });

    let relax = |dist: &mut DistanceImage, x: u32, y: u32, sign: i64| {
        let current = dist.get_pixel(x, y).0[0];
        if current <= 0.0 {
            return;
        }
        let best = FORWARD_MASK
            .iter()
            .filter_map(|&(dx, dy, weight)| {
                let nx = u32::try_from(i64::from(x) + sign * dx)
                    .ok()
                    .filter(|&nx| nx < w)?;
                let ny = u32::try_from(i64::from(y) + sign * dy)
                    .ok()
                    .filter(|&ny| ny < h)?;
                Some(dist.get_pixel(nx, ny).0[0] + weight)
            })
            .fold(current, f64::min);
        dist.put_pixel(x, y, Luma([best]));
    };

    for y in 0..h {
        for x in 0..w {
            relax(&mut dist, x, y, 1);
        }
    }
    for y in (0..h).rev() {
        for x in (0..w).rev() {
            relax(&mut dist, x, y, -1);
        }
    }
    dist
}

/// Number of foreground pixels in a mask.
#[must_use]
pub fn count_foreground(mask: &GrayImage) -> u64 {
    mask.pixels().map(|p| u64::from(p.0[0] != 0)).sum()
}
