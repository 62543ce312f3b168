//! pitcount-pipeline: Pure particle segmentation pipeline (sans-IO).
//!
//! Converts a raster image into candidate particle descriptors through:
//! intensity -> adaptive threshold -> opening -> distance transform and
//! seeding -> watershed -> contour extraction.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! images and byte slices and returns structured data. Reading files and
//! presenting results live in the `pitcount` binary.

pub mod contour;
pub mod diagnostics;
pub mod geometry;
pub mod grayscale;
pub mod markers;
pub mod morphology;
pub mod pipeline;
pub mod threshold;
pub mod types;
pub mod watershed;

pub use contour::{ContourTracer, ContourTracerKind};
pub use diagnostics::{Clock, SegmentDiagnostics, WebClock, segment_with_diagnostics};
pub use pipeline::{SegmentStage, Segmentation};
pub use types::{
    BlobDescriptor, Contour, Dimensions, GrayImage, PipelineError, PixelPoint, Point, RgbImage,
    SegmentConfig, SegmentResult, StagedResult,
};

/// Segment `image` with the default configuration.
///
/// Deterministic: the same image always yields the same descriptors in
/// the same (ascending label) order. An image with no pixels, or with
/// nothing darker than its surroundings, yields an empty list.
#[must_use]
pub fn segment(image: &RgbImage) -> Vec<BlobDescriptor> {
    match segment_with(image, &SegmentConfig::default()) {
        Ok(blobs) => blobs,
        // The default configuration always validates.
        Err(_) => Vec::new(),
    }
}

/// Segment `image` with an explicit configuration.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`SegmentConfig::validate`].
pub fn segment_with(
    image: &RgbImage,
    config: &SegmentConfig,
) -> Result<Vec<BlobDescriptor>, PipelineError> {
    Ok(segment_staged(image, config)?.blobs)
}

/// Segment `image`, keeping every intermediate raster.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`SegmentConfig::validate`].
pub fn segment_staged(
    image: &RgbImage,
    config: &SegmentConfig,
) -> Result<StagedResult, PipelineError> {
    log::debug!(
        "segmenting {}x{} image with {config:?}",
        image.width(),
        image.height()
    );
    let staged = Segmentation::new(image.clone(), config.clone())?
        .intensity()
        .threshold()
        .open()
        .seed()
        .flood()
        .extract()
        .into_result();
    log::info!(
        "Analysis complete. Found {} potential segments.",
        staged.blobs.len()
    );
    Ok(staged)
}

/// Decode raw image bytes (PNG, JPEG, BMP, TIFF) and segment them.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
pub fn segment_bytes(
    image_bytes: &[u8],
    config: &SegmentConfig,
) -> Result<SegmentResult, PipelineError> {
    config.validate()?;
    let image = grayscale::decode(image_bytes)?;
    log::info!("Image loaded, starting analysis...");
    let blobs = segment_with(&image, config)?;
    Ok(SegmentResult {
        blobs,
        dimensions: Dimensions::new(image.width(), image.height()),
    })
}
