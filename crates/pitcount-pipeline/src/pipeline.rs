//! Incremental segmentation: advance stage-by-stage, inspecting each
//! intermediate raster before continuing.
//!
//! Unlike [`crate::segment_staged`] which runs the whole segmentation in
//! one call, [`Segmentation`] lets the caller drive execution one step at
//! a time:
//!
//! ```rust
//! # use pitcount_pipeline::{Segmentation, SegmentConfig, PipelineError, RgbImage};
//! # fn run(image: RgbImage) -> Result<(), PipelineError> {
//! let staged = Segmentation::new(image, SegmentConfig::default())?
//!     .intensity()
//!     .threshold()
//!     .open()
//!     .seed()
//!     .flood()
//!     .extract()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, carrying
//! all previously computed intermediates. The caller can inspect the
//! current stage's output via accessor methods at any point.
//!
//! # Memory
//!
//! Every stage retains the full raster stack. [`StagedResult`] needs
//! every intermediate for visualization, so callers that only want the
//! descriptors should prefer [`crate::segment_with`].

use image::{GrayImage, RgbImage};

use crate::contour::{ContourTracerKind, extract_blobs};
use crate::diagnostics::{StageMetrics, extract_metrics};
use crate::markers;
use crate::morphology;
use crate::threshold;
use crate::types::{
    BlobDescriptor, Dimensions, DistanceImage, LabelImage, PipelineError, SegmentConfig,
    StagedResult,
};
use crate::watershed;

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Segmentation state before any processing has occurred.
///
/// Call [`intensity`](Self::intensity) to advance to the next stage.
#[must_use = "segmentation stages are consumed by advancing — call .intensity() to continue"]
pub struct Pending {
    config: SegmentConfig,
    image: RgbImage,
}

impl Pending {
    /// The source image.
    #[must_use]
    pub const fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Convert to single-channel intensity.
    pub fn intensity(self) -> Intensity {
        let intensity = crate::grayscale::intensity(&self.image);
        Intensity {
            config: self.config,
            image: self.image,
            intensity,
        }
    }
}

// ───────────────────────── Stage 1: Intensity ────────────────────────

/// Segmentation state after intensity conversion.
#[must_use = "segmentation stages are consumed by advancing — call .threshold() to continue"]
pub struct Intensity {
    config: SegmentConfig,
    image: RgbImage,
    intensity: GrayImage,
}

impl Intensity {
    /// The intensity image.
    #[must_use]
    pub const fn intensity(&self) -> &GrayImage {
        &self.intensity
    }

    /// Apply the inverted adaptive threshold.
    pub fn threshold(self) -> Thresholded {
        let binary = threshold::adaptive_threshold_inv(
            &self.intensity,
            self.config.block_size,
            self.config.offset,
        );
        Thresholded {
            config: self.config,
            image: self.image,
            intensity: self.intensity,
            binary,
        }
    }
}

// ───────────────────────── Stage 2: Thresholded ──────────────────────

/// Segmentation state after adaptive thresholding.
#[must_use = "segmentation stages are consumed by advancing — call .open() to continue"]
pub struct Thresholded {
    config: SegmentConfig,
    image: RgbImage,
    intensity: GrayImage,
    binary: GrayImage,
}

impl Thresholded {
    /// The binary foreground mask.
    #[must_use]
    pub const fn binary(&self) -> &GrayImage {
        &self.binary
    }

    /// Remove speckle with a morphological opening.
    pub fn open(self) -> Opened {
        let opened = morphology::open(&self.binary, self.config.open_iterations);
        Opened {
            config: self.config,
            image: self.image,
            intensity: self.intensity,
            binary: self.binary,
            opened,
        }
    }
}

// ───────────────────────── Stage 3: Opened ───────────────────────────

/// Segmentation state after the opening.
#[must_use = "segmentation stages are consumed by advancing — call .seed() to continue"]
pub struct Opened {
    config: SegmentConfig,
    image: RgbImage,
    intensity: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
}

impl Opened {
    /// The cleaned foreground mask.
    #[must_use]
    pub const fn opened(&self) -> &GrayImage {
        &self.opened
    }

    /// Build sure-foreground, sure-background, and unknown regions and
    /// label the watershed seeds.
    pub fn seed(self) -> Seeded {
        let distance = morphology::distance_to_background(&self.opened);
        let sure_foreground = markers::sure_foreground(&distance, self.config.foreground_ratio);
        let sure_background = morphology::dilate(&self.opened, self.config.dilate_iterations);
        let unknown = markers::unknown_region(&sure_background, &sure_foreground);
        let markers = markers::label_markers(&sure_foreground, &unknown);
        Seeded {
            config: self.config,
            image: self.image,
            intensity: self.intensity,
            binary: self.binary,
            opened: self.opened,
            distance,
            sure_foreground,
            sure_background,
            unknown,
            markers,
        }
    }
}

// ───────────────────────── Stage 4: Seeded ───────────────────────────

/// Segmentation state after seed construction.
#[must_use = "segmentation stages are consumed by advancing — call .flood() to continue"]
pub struct Seeded {
    config: SegmentConfig,
    image: RgbImage,
    intensity: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
    distance: DistanceImage,
    sure_foreground: GrayImage,
    sure_background: GrayImage,
    unknown: GrayImage,
    markers: LabelImage,
}

impl Seeded {
    /// Distance of each foreground pixel to the background.
    #[must_use]
    pub const fn distance(&self) -> &DistanceImage {
        &self.distance
    }

    /// The seed labels handed to the watershed.
    #[must_use]
    pub const fn markers(&self) -> &LabelImage {
        &self.markers
    }

    /// The sure-foreground mask.
    #[must_use]
    pub const fn sure_foreground(&self) -> &GrayImage {
        &self.sure_foreground
    }

    /// The band left for the watershed to decide.
    #[must_use]
    pub const fn unknown(&self) -> &GrayImage {
        &self.unknown
    }

    /// Number of distinct seeds.
    #[must_use]
    pub fn seed_count(&self) -> usize {
        markers::count_seeds(&self.markers)
    }

    /// Flood the seeds over the color image.
    pub fn flood(self) -> Flooded {
        let flooded = watershed::flood(&self.image, &self.markers);
        Flooded {
            config: self.config,
            image: self.image,
            intensity: self.intensity,
            binary: self.binary,
            opened: self.opened,
            distance: self.distance,
            sure_foreground: self.sure_foreground,
            sure_background: self.sure_background,
            unknown: self.unknown,
            markers: self.markers,
            flooded,
        }
    }
}

// ───────────────────────── Stage 5: Flooded ──────────────────────────

/// Segmentation state after watershed flooding.
#[must_use = "segmentation stages are consumed by advancing — call .extract() to continue"]
pub struct Flooded {
    config: SegmentConfig,
    image: RgbImage,
    intensity: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
    distance: DistanceImage,
    sure_foreground: GrayImage,
    sure_background: GrayImage,
    unknown: GrayImage,
    markers: LabelImage,
    flooded: LabelImage,
}

impl Flooded {
    /// The final region labels.
    #[must_use]
    pub const fn flooded(&self) -> &LabelImage {
        &self.flooded
    }

    /// Trace one descriptor per blob region.
    pub fn extract(self) -> Extracted {
        let blobs = extract_blobs(&self.flooded, &ContourTracerKind::default());
        Extracted {
            config: self.config,
            dimensions: Dimensions::new(self.image.width(), self.image.height()),
            intensity: self.intensity,
            binary: self.binary,
            opened: self.opened,
            distance: self.distance,
            sure_foreground: self.sure_foreground,
            sure_background: self.sure_background,
            unknown: self.unknown,
            markers: self.markers,
            flooded: self.flooded,
            blobs,
        }
    }
}

// ───────────────────────── Stage 6: Extracted ────────────────────────

/// Final segmentation state.
#[must_use = "call .into_result() to extract the StagedResult"]
pub struct Extracted {
    config: SegmentConfig,
    dimensions: Dimensions,
    intensity: GrayImage,
    binary: GrayImage,
    opened: GrayImage,
    distance: DistanceImage,
    sure_foreground: GrayImage,
    sure_background: GrayImage,
    unknown: GrayImage,
    markers: LabelImage,
    flooded: LabelImage,
    blobs: Vec<BlobDescriptor>,
}

impl Extracted {
    /// The extracted descriptors, in ascending label order.
    #[must_use]
    pub fn blobs(&self) -> &[BlobDescriptor] {
        &self.blobs
    }

    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The configuration this run used.
    #[must_use]
    pub const fn config(&self) -> &SegmentConfig {
        &self.config
    }

    /// Consume the pipeline and return the full [`StagedResult`].
    #[must_use]
    pub fn into_result(self) -> StagedResult {
        StagedResult {
            intensity: self.intensity,
            binary: self.binary,
            opened: self.opened,
            distance: self.distance,
            sure_foreground: self.sure_foreground,
            sure_background: self.sure_background,
            unknown: self.unknown,
            markers: self.markers,
            flooded: self.flooded,
            blobs: self.blobs,
            dimensions: self.dimensions,
        }
    }
}

// ─────────────────────────── SegmentStage ────────────────────────────

/// Total number of processing stages after [`Pending`].
pub const STAGE_COUNT: usize = 6;

/// Trait implemented by every stage that has performed work, giving
/// uniform access to its identity and metrics.
pub trait SegmentStage {
    /// Human-readable name of this stage (e.g. `"threshold"`).
    const NAME: &str;

    /// One-based index of this stage (`1` for [`Intensity`] through
    /// [`STAGE_COUNT`] for [`Extracted`]).
    const INDEX: usize;

    /// Stage-specific metrics for diagnostics.
    fn metrics(&self) -> StageMetrics;
}

impl SegmentStage for Intensity {
    const NAME: &str = "intensity";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Intensity {
            width: self.intensity.width(),
            height: self.intensity.height(),
        }
    }
}

impl SegmentStage for Thresholded {
    const NAME: &str = "threshold";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Threshold {
            block_size: self.config.block_size,
            offset: self.config.offset,
            foreground_pixels: morphology::count_foreground(&self.binary),
            total_pixels: u64::from(self.binary.width()) * u64::from(self.binary.height()),
        }
    }
}

impl SegmentStage for Opened {
    const NAME: &str = "open";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Open {
            iterations: self.config.open_iterations,
            foreground_before: morphology::count_foreground(&self.binary),
            foreground_after: morphology::count_foreground(&self.opened),
        }
    }
}

impl SegmentStage for Seeded {
    const NAME: &str = "seed";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Seed {
            max_distance: self.distance.pixels().map(|p| p.0[0]).fold(0.0, f64::max),
            sure_foreground_pixels: morphology::count_foreground(&self.sure_foreground),
            unknown_pixels: morphology::count_foreground(&self.unknown),
            seed_count: self.seed_count(),
        }
    }
}

impl SegmentStage for Flooded {
    const NAME: &str = "flood";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Flood {
            boundary_pixels: watershed::count_boundary(&self.flooded),
        }
    }
}

impl SegmentStage for Extracted {
    const NAME: &str = "extract";
    const INDEX: usize = 6;

    fn metrics(&self) -> StageMetrics {
        extract_metrics(&self.blobs)
    }
}

// ───────────────────── Segmentation entry point ──────────────────────

/// Incremental segmentation pipeline.
///
/// Created via [`Segmentation::new`], which validates the config and
/// stores the image without doing any processing. Each stage method
/// consumes the current state and returns the next, making it a
/// compile-time error to skip stages or call them out of order.
pub struct Segmentation;

impl Segmentation {
    /// Create a new segmentation run from a decoded image and config.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if `config` fails
    /// [`SegmentConfig::validate`].
    #[allow(clippy::new_ret_no_self)]
    pub fn new(image: RgbImage, config: SegmentConfig) -> Result<Pending, PipelineError> {
        config.validate()?;
        Ok(Pending { config, image })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::markers::{BOUNDARY, is_blob_label};

    /// Two well separated dark disks on a light background.
    fn two_disks() -> RgbImage {
        RgbImage::from_fn(100, 60, |x, y| {
            let (fx, fy) = (f64::from(x), f64::from(y));
            let near = |cx: f64, cy: f64| (fx - cx).hypot(fy - cy) < 10.0;
            if near(25.0, 30.0) || near(75.0, 30.0) {
                image::Rgb([40, 40, 40])
            } else {
                image::Rgb([210, 210, 210])
            }
        })
    }

    fn start() -> Pending {
        Segmentation::new(two_disks(), SegmentConfig::default()).unwrap()
    }

    // ─────────── Typed API tests ─────────────────────────────────

    #[test]
    fn new_rejects_invalid_config() {
        let config = SegmentConfig {
            open_iterations: 0,
            ..SegmentConfig::default()
        };
        assert!(matches!(
            Segmentation::new(two_disks(), config),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn pending_exposes_image() {
        assert_eq!(start().image().dimensions(), (100, 60));
    }

    #[test]
    fn threshold_marks_disks() {
        let thresholded = start().intensity().threshold();
        assert_eq!(thresholded.binary().get_pixel(25, 30).0[0], 255);
        assert_eq!(thresholded.binary().get_pixel(50, 5).0[0], 0);
    }

    #[test]
    fn seeded_has_one_seed_per_disk() {
        let seeded = start().intensity().threshold().open().seed();
        assert_eq!(seeded.seed_count(), 2);
        assert!(is_blob_label(seeded.markers().get_pixel(25, 30).0[0]));
        assert!(seeded.distance().get_pixel(25, 30).0[0] > 5.0);
    }

    #[test]
    fn flooded_frame_is_boundary() {
        let flooded = start().intensity().threshold().open().seed().flood();
        assert_eq!(flooded.flooded().get_pixel(0, 0).0[0], BOUNDARY);
        assert_eq!(flooded.flooded().get_pixel(99, 59).0[0], BOUNDARY);
    }

    #[test]
    fn extracted_finds_both_disks() {
        let extracted = start().intensity().threshold().open().seed().flood().extract();
        assert_eq!(extracted.blobs().len(), 2);
        assert_eq!(extracted.dimensions(), Dimensions::new(100, 60));
        for blob in extracted.blobs() {
            assert!(blob.area() > 200.0 && blob.area() < 450.0, "area {}", blob.area());
            assert!(blob.circularity() > 0.8, "circularity {}", blob.circularity());
        }
        // Ascending label order follows raster order of the seeds.
        let first_x = extracted.blobs()[0].contour().points()[0].x;
        assert!(first_x < 50);
    }

    #[test]
    fn staged_result_keeps_every_raster() {
        let result = start()
            .intensity()
            .threshold()
            .open()
            .seed()
            .flood()
            .extract()
            .into_result();
        assert_eq!(result.intensity.dimensions(), (100, 60));
        assert_eq!(result.binary.dimensions(), (100, 60));
        assert_eq!(result.distance.dimensions(), (100, 60));
        assert_eq!(result.flooded.dimensions(), (100, 60));
        assert_eq!(result.blobs.len(), 2);
    }

    // ─────────── SegmentStage metadata ───────────────────────────

    #[test]
    fn stage_indices_are_sequential() {
        assert_eq!(Intensity::INDEX, 1);
        assert_eq!(Thresholded::INDEX, 2);
        assert_eq!(Opened::INDEX, 3);
        assert_eq!(Seeded::INDEX, 4);
        assert_eq!(Flooded::INDEX, 5);
        assert_eq!(Extracted::INDEX, STAGE_COUNT);
    }

    #[test]
    fn opened_metrics_report_counts() {
        let opened = start().intensity().threshold().open();
        let StageMetrics::Open {
            foreground_before,
            foreground_after,
            ..
        } = opened.metrics()
        else {
            unreachable!("Opened reports Open metrics");
        };
        assert!(foreground_after <= foreground_before);
        assert!(foreground_after > 0);
    }
}
