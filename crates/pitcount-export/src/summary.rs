//! The one-line result summary and its default file name.
//!
//! The line format is fixed so saved results stay comparable across
//! versions:
//!
//! ```text
//! Particle Counts: 12 in image plate.png of min area: 75.0, max area: 2000.0 and circularity between 0.65 - 1.0.
//! ```

use std::fmt;

use chrono::NaiveDateTime;
use pitcount_session::RangeFilter;

/// Count and filter values for one image, ready to print or save.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary<'a> {
    /// Particles passing the filter.
    pub count: usize,
    /// File name of the analysed image.
    pub image_name: &'a str,
    /// Filter the count was taken under.
    pub filter: &'a RangeFilter,
}

impl<'a> Summary<'a> {
    /// Create a new summary.
    #[must_use]
    pub const fn new(count: usize, image_name: &'a str, filter: &'a RangeFilter) -> Self {
        Self {
            count,
            image_name,
            filter,
        }
    }
}

/// Round to two decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl fmt::Display for Summary<'_> {
    /// Values are rounded to two places and printed in shortest
    /// round-trip form, always with a fractional digit (`75.0`, `0.65`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Particle Counts: {} in image {} of min area: {:?}, max area: {:?} and circularity between {:?} - {:?}.",
            self.count,
            self.image_name,
            round2(self.filter.min_area()),
            round2(self.filter.max_area()),
            round2(self.filter.min_circularity()),
            round2(self.filter.max_circularity()),
        )
    }
}

/// `particle_analysis_{stem}_{YYYYmmdd_HHMMSS}.txt`, where `stem` is
/// `image_name` up to its first `.`.
#[must_use]
pub fn default_filename(image_name: &str, at: NaiveDateTime) -> String {
    let stem = image_name
        .split_once('.')
        .map_or(image_name, |(stem, _)| stem);
    format!(
        "particle_analysis_{stem}_{}.txt",
        at.format("%Y%m%d_%H%M%S")
    )
}
