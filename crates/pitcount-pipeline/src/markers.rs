//! Watershed seed construction.
//!
//! Splits the cleaned foreground mask into three kinds of pixel and
//! encodes them as signed labels:
//!
//! | Label | Meaning |
//! |---|---|
//! | [`BOUNDARY`] | watershed line (or image frame) after flooding |
//! | [`UNKNOWN`] | not yet assigned; the watershed floods these |
//! | [`BACKGROUND`] | sure background |
//! | [`FIRST_BLOB`] and up | one label per sure-foreground component |

use image::{GrayImage, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

use crate::types::{DistanceImage, LabelImage};

/// Separating line between two regions, written by the watershed.
pub const BOUNDARY: i32 = -1;

/// Pixel the watershed has yet to assign.
pub const UNKNOWN: i32 = 0;

/// Sure background.
pub const BACKGROUND: i32 = 1;

/// Label of the first sure-foreground component.
pub const FIRST_BLOB: i32 = BACKGROUND + 1;

/// Whether `label` identifies a particle region.
#[must_use]
pub const fn is_blob_label(label: i32) -> bool {
    label >= FIRST_BLOB
}

/// Pixels whose distance to the background exceeds `ratio` times the
/// largest distance in the image.
#[must_use = "returns the sure-foreground mask"]
pub fn sure_foreground(distance: &DistanceImage, ratio: f64) -> GrayImage {
    let max = distance.pixels().map(|p| p.0[0]).fold(0.0_f64, f64::max);
    let cutoff = ratio * max;
    GrayImage::from_fn(distance.width(), distance.height(), |x, y| {
        Luma([if distance.get_pixel(x, y).0[0] > cutoff { 255 } else { 0 }])
    })
}

/// Sure background minus sure foreground: the band the watershed has
/// to decide.
#[must_use = "returns the unknown-region mask"]
pub fn unknown_region(sure_background: &GrayImage, sure_foreground: &GrayImage) -> GrayImage {
    GrayImage::from_fn(sure_background.width(), sure_background.height(), |x, y| {
        let bg = sure_background.get_pixel(x, y).0[0];
        let fg = sure_foreground.get_pixel(x, y).0[0];
        Luma([bg.saturating_sub(fg)])
    })
}

/// Seed labels for the watershed.
///
/// Each 8-connected sure-foreground component gets its own label from
/// [`FIRST_BLOB`] upward; unknown pixels get [`UNKNOWN`]; everything
/// else is [`BACKGROUND`].
#[must_use = "returns the marker image"]
pub fn label_markers(sure_foreground: &GrayImage, unknown: &GrayImage) -> LabelImage {
    let (w, h) = sure_foreground.dimensions();
    if w == 0 || h == 0 {
        return LabelImage::new(w, h);
    }
    let components = connected_components(sure_foreground, Connectivity::Eight, Luma([0u8]));
    LabelImage::from_fn(components.width(), components.height(), |x, y| {
        if unknown.get_pixel(x, y).0[0] != 0 {
            Luma([UNKNOWN])
        } else {
            let component = i32::try_from(components.get_pixel(x, y).0[0]).unwrap_or(i32::MAX - 1);
            Luma([component + BACKGROUND])
        }
    })
}

/// Number of distinct blob seeds in a marker image.
#[must_use]
pub fn count_seeds(markers: &LabelImage) -> usize {
    markers
        .pixels()
        .map(|p| p.0[0])
        .filter(|&l| is_blob_label(l))
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}
