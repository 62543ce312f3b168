//! Shared types for the pitcount segmentation pipeline.

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::geometry;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` so downstream crates can hand decoded images to
/// the pipeline without depending on `image` directly.
pub use image::RgbImage;

/// Per-pixel Euclidean distances produced by the distance transform.
pub type DistanceImage = ImageBuffer<Luma<f64>, Vec<f64>>;

/// Signed per-pixel region labels (markers before and after flooding).
///
/// See [`crate::markers`] for the meaning of each label value.
pub type LabelImage = ImageBuffer<Luma<i32>, Vec<i32>>;

/// A 2D point in continuous image (or display) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The pixel containing this point, truncating toward zero.
    ///
    /// Coordinates outside the `i32` range saturate.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_pixel(self) -> PixelPoint {
        PixelPoint::new(self.x.trunc() as i32, self.y.trunc() as i32)
    }
}

/// A point on the integer pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column index.
    pub x: i32,
    /// Row index.
    pub y: i32,
}

impl PixelPoint {
    /// Create a new pixel point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The same location as a continuous [`Point`].
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

impl From<imageproc::point::Point<i32>> for PixelPoint {
    fn from(p: imageproc::point::Point<i32>) -> Self {
        Self::new(p.x, p.y)
    }
}

/// A closed polygon boundary on the pixel grid.
///
/// The last point connects back to the first; the closing edge is not
/// stored explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<PixelPoint>);

impl Contour {
    /// Create a new contour from its boundary points.
    #[must_use]
    pub const fn new(points: Vec<PixelPoint>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of boundary points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all boundary points.
    #[must_use]
    pub fn points(&self) -> &[PixelPoint] {
        &self.0
    }

    /// Consumes the contour and returns the underlying points.
    #[must_use]
    pub fn into_points(self) -> Vec<PixelPoint> {
        self.0
    }

    /// Multiply every coordinate by `factor`, truncating toward zero.
    ///
    /// Used to bring image-space contours into zoomed display space.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn scaled(&self, factor: f64) -> Self {
        Self(
            self.0
                .iter()
                .map(|p| {
                    PixelPoint::new(
                        (f64::from(p.x) * factor).trunc() as i32,
                        (f64::from(p.y) * factor).trunc() as i32,
                    )
                })
                .collect(),
        )
    }
}

/// One detected (or hand-placed) particle: its boundary and shape metrics.
///
/// `area` and `circularity` are derived once, when the descriptor is
/// built, and never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    contour: Contour,
    area: f64,
    circularity: f64,
}

impl BlobDescriptor {
    /// Build a descriptor from a traced contour.
    ///
    /// Area is the shoelace polygon area; circularity is
    /// `4π·area / perimeter²`, or `0` for a zero-length perimeter.
    #[must_use]
    pub fn from_contour(contour: Contour) -> Self {
        let area = geometry::polygon_area(contour.points());
        let perimeter = geometry::perimeter(contour.points());
        let circularity = geometry::circularity(area, perimeter);
        Self {
            contour,
            area,
            circularity,
        }
    }

    /// Build a hand-placed circular descriptor.
    ///
    /// The contour is a `vertices`-point polygon approximating the circle;
    /// the metrics are fixed to the ideal circle: `area = π·r²` and
    /// `circularity = 1.0`.
    #[must_use]
    pub fn circle(center: PixelPoint, radius: f64, vertices: usize) -> Self {
        Self {
            contour: geometry::circle_contour(center, radius, vertices),
            area: std::f64::consts::PI * radius * radius,
            circularity: 1.0,
        }
    }

    /// The boundary polygon in image-pixel coordinates.
    #[must_use]
    pub const fn contour(&self) -> &Contour {
        &self.contour
    }

    /// Enclosed area in square pixels.
    #[must_use]
    pub const fn area(&self) -> f64 {
        self.area
    }

    /// Isoperimetric shape score (1.0 for a perfect circle).
    #[must_use]
    pub const fn circularity(&self) -> f64 {
        self.circularity
    }

    /// Signed distance from `point` to the boundary: positive inside,
    /// negative outside, zero on an edge.
    #[must_use]
    pub fn signed_distance(&self, point: Point) -> f64 {
        geometry::signed_distance(self.contour.points(), point)
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns `true` if the image has no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Whether a pixel lies inside `[0, width) × [0, height)`.
    #[must_use]
    pub fn contains(&self, p: PixelPoint) -> bool {
        u32::try_from(p.x).is_ok_and(|x| x < self.width)
            && u32::try_from(p.y).is_ok_and(|y| y < self.height)
    }
}

/// Parameters of the segmentation pipeline.
///
/// The defaults are the fixed values the detector was tuned with; change
/// them only for experimentation (see `pitcount --config-json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Side of the square neighborhood for the adaptive threshold's
    /// Gaussian-weighted local mean. Must be odd and at least 3.
    pub block_size: u32,

    /// Offset subtracted from the local mean. A pixel is foreground when
    /// it is at least this much darker than its neighborhood.
    pub offset: f64,

    /// Iterations of the 3×3 opening that removes speckle noise.
    pub open_iterations: u8,

    /// Iterations of the 3×3 dilation that bounds the sure background.
    pub dilate_iterations: u8,

    /// Fraction of the maximum distance-transform value above which a
    /// pixel is sure foreground. Must lie in `(0, 1)`.
    pub foreground_ratio: f64,
}

impl SegmentConfig {
    /// Default adaptive threshold block size.
    pub const DEFAULT_BLOCK_SIZE: u32 = 55;
    /// Largest block size [`SegmentConfig::validate`] accepts.
    pub const MAX_BLOCK_SIZE: u32 = 1001;
    /// Default adaptive threshold offset.
    pub const DEFAULT_OFFSET: f64 = 12.0;
    /// Default opening iterations.
    pub const DEFAULT_OPEN_ITERATIONS: u8 = 2;
    /// Default sure-background dilation iterations.
    pub const DEFAULT_DILATE_ITERATIONS: u8 = 3;
    /// Default sure-foreground ratio.
    pub const DEFAULT_FOREGROUND_RATIO: f64 = 0.2;

    /// Check the configuration for values the pipeline cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when the block size is
    /// even, below 3 or above [`SegmentConfig::MAX_BLOCK_SIZE`], an
    /// iteration count is zero, or the foreground
    /// ratio is outside `(0, 1)`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "block_size must be odd and >= 3, got {}",
                self.block_size
            )));
        }
        if self.block_size > Self::MAX_BLOCK_SIZE {
            return Err(PipelineError::InvalidConfig(format!(
                "block_size must be <= {}, got {}",
                Self::MAX_BLOCK_SIZE,
                self.block_size
            )));
        }
        if self.open_iterations == 0 || self.dilate_iterations == 0 {
            return Err(PipelineError::InvalidConfig(
                "iteration counts must be at least 1".to_string(),
            ));
        }
        if !(self.foreground_ratio > 0.0 && self.foreground_ratio < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "foreground_ratio must be in (0, 1), got {}",
                self.foreground_ratio
            )));
        }
        Ok(())
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            block_size: Self::DEFAULT_BLOCK_SIZE,
            offset: Self::DEFAULT_OFFSET,
            open_iterations: Self::DEFAULT_OPEN_ITERATIONS,
            dilate_iterations: Self::DEFAULT_DILATE_ITERATIONS,
            foreground_ratio: Self::DEFAULT_FOREGROUND_RATIO,
        }
    }
}

/// Result of segmenting one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResult {
    /// Candidate blobs in ascending label order.
    pub blobs: Vec<BlobDescriptor>,

    /// Dimensions of the source image in pixels.
    pub dimensions: Dimensions,
}

/// Result of segmenting with all intermediate rasters preserved.
///
/// Each field captures the output of one pipeline stage so a viewer can
/// show how a detection came about.
#[derive(Debug, Clone)]
pub struct StagedResult {
    /// Stage 1: single-channel intensity.
    pub intensity: GrayImage,
    /// Stage 2: inverted adaptive threshold mask.
    pub binary: GrayImage,
    /// Stage 3: mask after morphological opening.
    pub opened: GrayImage,
    /// Stage 4: distance of each foreground pixel to the background.
    pub distance: DistanceImage,
    /// Stage 4: sure-foreground mask.
    pub sure_foreground: GrayImage,
    /// Stage 4: sure-background mask.
    pub sure_background: GrayImage,
    /// Stage 4: pixels that are neither sure foreground nor background.
    pub unknown: GrayImage,
    /// Stage 4: seed labels handed to the watershed.
    pub markers: LabelImage,
    /// Stage 5: labels after watershed flooding.
    pub flooded: LabelImage,
    /// Stage 6: extracted blob descriptors.
    pub blobs: Vec<BlobDescriptor>,
    /// Source image dimensions in pixels.
    pub dimensions: Dimensions,
}

impl StagedResult {
    /// Drop the intermediate rasters, keeping only the descriptors.
    #[must_use]
    pub fn into_result(self) -> SegmentResult {
        SegmentResult {
            blobs: self.blobs,
            dimensions: self.dimensions,
        }
    }
}

/// Errors that can occur before segmentation starts.
///
/// Segmentation itself never fails: an image with nothing in it simply
/// yields no blobs.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}
