//! Contour extraction: one outer boundary per flooded region.
//!
//! This module defines the [`ContourTracer`] trait for pluggable border
//! tracing and the [`ContourTracerKind`] enum for selecting which
//! algorithm to use at runtime. [`extract_blobs`] walks every blob label
//! of a flooded label image, traces the label's mask, and turns the
//! traced boundary into a [`BlobDescriptor`].

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::contours::BorderType;

use crate::geometry;
use crate::markers::is_blob_label;
use crate::types::{BlobDescriptor, Contour, LabelImage, PixelPoint};

/// Minimum number of boundary points for a usable descriptor.
pub const MIN_CONTOUR_POINTS: usize = 3;

/// Selects which border tracing algorithm to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContourTracerKind {
    /// Suzuki-Abe border following via `imageproc::contours::find_contours`,
    /// keeping the last outer border found in raster order and compressing
    /// straight runs down to their end points.
    #[default]
    BorderFollowing,
}

/// Trait for border tracing strategies.
///
/// Input: a binary mask (nonzero = region, 0 = elsewhere).
/// Output: the region's external boundary, if it has one.
pub trait ContourTracer {
    /// Trace the outer boundary of one region in `mask`.
    ///
    /// When the mask holds several regions, the one whose border is
    /// found last in raster order wins.
    fn trace_outer(&self, mask: &GrayImage) -> Option<Contour>;
}

impl ContourTracer for ContourTracerKind {
    fn trace_outer(&self, mask: &GrayImage) -> Option<Contour> {
        match *self {
            Self::BorderFollowing => trace_border_following(mask),
        }
    }
}

fn trace_border_following(mask: &GrayImage) -> Option<Contour> {
    let contours = imageproc::contours::find_contours::<i32>(mask);
    let outer = contours
        .into_iter()
        .rfind(|c| c.border_type == BorderType::Outer)?;
    let chain: Vec<PixelPoint> = outer.points.into_iter().map(PixelPoint::from).collect();
    Some(Contour::new(geometry::compress_chain(&chain)))
}

/// Inclusive bounding box of one label.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
}

impl Bounds {
    const fn at(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }
}

/// Bounding boxes of every blob label, keyed in ascending label order.
fn blob_bounds(labels: &LabelImage) -> BTreeMap<i32, Bounds> {
    let mut bounds: BTreeMap<i32, Bounds> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if !is_blob_label(label) {
            continue;
        }
        bounds
            .entry(label)
            .and_modify(|b| b.include(x, y))
            .or_insert_with(|| Bounds::at(x, y));
    }
    bounds
}

/// Trace one descriptor per blob label, in ascending label order.
///
/// Each label is traced on its own bounding-box crop (padded by one
/// pixel of background), so the result does not depend on the order in
/// which labels are visited. Labels whose boundary has fewer than
/// [`MIN_CONTOUR_POINTS`] points are skipped.
#[must_use]
pub fn extract_blobs(labels: &LabelImage, tracer: &impl ContourTracer) -> Vec<BlobDescriptor> {
    blob_bounds(labels)
        .into_iter()
        .filter_map(|(label, b)| {
            let crop_w = b.max_x - b.min_x + 3;
            let crop_h = b.max_y - b.min_y + 3;
            let mask = GrayImage::from_fn(crop_w, crop_h, |cx, cy| {
                let inside = cx >= 1
                    && cy >= 1
                    && cx - 1 <= b.max_x - b.min_x
                    && cy - 1 <= b.max_y - b.min_y
                    && labels.get_pixel(b.min_x + cx - 1, b.min_y + cy - 1).0[0] == label;
                Luma([if inside { 255 } else { 0 }])
            });
            let contour = tracer.trace_outer(&mask)?;
            if contour.len() < MIN_CONTOUR_POINTS {
                return None;
            }
            let dx = i32::try_from(b.min_x).ok()? - 1;
            let dy = i32::try_from(b.min_y).ok()? - 1;
            let shifted = contour
                .into_points()
                .into_iter()
                .map(|p| PixelPoint::new(p.x + dx, p.y + dy))
                .collect();
            Some(BlobDescriptor::from_contour(Contour::new(shifted)))
        })
        .collect()
}
