//! Range filters on particle area and circularity, and the per-frame
//! count and render set they produce.

use pitcount_pipeline::{BlobDescriptor, Contour};
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationState;

/// Closed interval a filter endpoint may move within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl Domain {
    /// Create a new domain.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the domain. NaN maps to the lower bound.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Domains of the two filtered quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDomains {
    /// Allowed area thresholds, in square pixels.
    pub area: Domain,
    /// Allowed circularity thresholds.
    pub circularity: Domain,
}

impl FilterDomains {
    /// Default area domain.
    pub const DEFAULT_AREA: Domain = Domain::new(1.0, 5000.0);
    /// Default circularity domain.
    pub const DEFAULT_CIRCULARITY: Domain = Domain::new(0.0, 1.0);
}

impl Default for FilterDomains {
    fn default() -> Self {
        Self {
            area: Self::DEFAULT_AREA,
            circularity: Self::DEFAULT_CIRCULARITY,
        }
    }
}

/// Inclusive thresholds on area and circularity.
///
/// The setters keep every endpoint inside its domain and never let an
/// endpoint cross its partner, so `min ≤ max` always holds. Deserialized
/// values go through the same setters against the default domains.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "FilterBounds")]
pub struct RangeFilter {
    min_area: f64,
    max_area: f64,
    min_circularity: f64,
    max_circularity: f64,
    #[serde(skip)]
    domains: FilterDomains,
}

impl RangeFilter {
    /// Default lower area bound.
    pub const DEFAULT_MIN_AREA: f64 = 75.0;
    /// Default upper area bound.
    pub const DEFAULT_MAX_AREA: f64 = 2000.0;
    /// Default lower circularity bound.
    pub const DEFAULT_MIN_CIRCULARITY: f64 = 0.65;
    /// Default upper circularity bound.
    pub const DEFAULT_MAX_CIRCULARITY: f64 = 1.0;

    /// The default thresholds, clamped into `domains`.
    #[must_use]
    pub fn new(domains: FilterDomains) -> Self {
        let mut filter = Self {
            min_area: domains.area.min,
            max_area: domains.area.max,
            min_circularity: domains.circularity.min,
            max_circularity: domains.circularity.max,
            domains,
        };
        filter.set_max_area(Self::DEFAULT_MAX_AREA);
        filter.set_min_area(Self::DEFAULT_MIN_AREA);
        filter.set_max_circularity(Self::DEFAULT_MAX_CIRCULARITY);
        filter.set_min_circularity(Self::DEFAULT_MIN_CIRCULARITY);
        filter
    }

    /// Lower area bound.
    #[must_use]
    pub const fn min_area(&self) -> f64 {
        self.min_area
    }

    /// Upper area bound.
    #[must_use]
    pub const fn max_area(&self) -> f64 {
        self.max_area
    }

    /// Lower circularity bound.
    #[must_use]
    pub const fn min_circularity(&self) -> f64 {
        self.min_circularity
    }

    /// Upper circularity bound.
    #[must_use]
    pub const fn max_circularity(&self) -> f64 {
        self.max_circularity
    }

    /// The domains the endpoints are clamped to.
    #[must_use]
    pub const fn domains(&self) -> &FilterDomains {
        &self.domains
    }

    /// Move the lower area bound, clamped to the domain and to
    /// `max_area`. Returns the value actually set.
    pub fn set_min_area(&mut self, value: f64) -> f64 {
        self.min_area = self.domains.area.clamp(value).min(self.max_area);
        self.min_area
    }

    /// Move the upper area bound, clamped to the domain and to
    /// `min_area`. Returns the value actually set.
    pub fn set_max_area(&mut self, value: f64) -> f64 {
        self.max_area = self.domains.area.clamp(value).max(self.min_area);
        self.max_area
    }

    /// Move the lower circularity bound, clamped to the domain and to
    /// `max_circularity`. Returns the value actually set.
    pub fn set_min_circularity(&mut self, value: f64) -> f64 {
        self.min_circularity = self
            .domains
            .circularity
            .clamp(value)
            .min(self.max_circularity);
        self.min_circularity
    }

    /// Move the upper circularity bound, clamped to the domain and to
    /// `min_circularity`. Returns the value actually set.
    pub fn set_max_circularity(&mut self, value: f64) -> f64 {
        self.max_circularity = self
            .domains
            .circularity
            .clamp(value)
            .max(self.min_circularity);
        self.max_circularity
    }

    /// Whether `blob` passes both ranges (bounds inclusive).
    #[must_use]
    pub fn accepts(&self, blob: &BlobDescriptor) -> bool {
        (self.min_area..=self.max_area).contains(&blob.area())
            && (self.min_circularity..=self.max_circularity).contains(&blob.circularity())
    }
}

impl Default for RangeFilter {
    fn default() -> Self {
        Self::new(FilterDomains::default())
    }
}

/// Serialized form of a [`RangeFilter`], before clamping.
#[derive(Deserialize)]
#[serde(default)]
struct FilterBounds {
    min_area: f64,
    max_area: f64,
    min_circularity: f64,
    max_circularity: f64,
}

impl Default for FilterBounds {
    fn default() -> Self {
        Self {
            min_area: RangeFilter::DEFAULT_MIN_AREA,
            max_area: RangeFilter::DEFAULT_MAX_AREA,
            min_circularity: RangeFilter::DEFAULT_MIN_CIRCULARITY,
            max_circularity: RangeFilter::DEFAULT_MAX_CIRCULARITY,
        }
    }
}

impl From<FilterBounds> for RangeFilter {
    /// Max endpoints are applied before min ones, so an inverted pair
    /// collapses onto the max.
    fn from(bounds: FilterBounds) -> Self {
        let domains = FilterDomains::default();
        let mut filter = Self::new(domains);
        filter.set_min_area(domains.area.min);
        filter.set_min_circularity(domains.circularity.min);
        filter.set_max_area(bounds.max_area);
        filter.set_min_area(bounds.min_area);
        filter.set_max_circularity(bounds.max_circularity);
        filter.set_min_circularity(bounds.min_circularity);
        filter
    }
}

/// Result of filtering the active descriptors for one frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Evaluation {
    /// Number of descriptors passing the filter.
    pub count: usize,
    /// Zoom-scaled contours of the passing descriptors: automatic ones in
    /// index order, then manual ones in insertion order.
    pub render_set: Vec<Contour>,
}

/// Filter every active descriptor and collect the count and render set.
///
/// Recomputed from scratch on each call; nothing is cached between
/// frames.
#[must_use]
pub fn evaluate(state: &AnnotationState, filter: &RangeFilter, zoom: f64) -> Evaluation {
    let render_set: Vec<Contour> = state
        .active()
        .map(|(_, blob)| blob)
        .filter(|blob| filter.accepts(blob))
        .map(|blob| blob.contour().scaled(zoom))
        .collect();
    Evaluation {
        count: render_set.len(),
        render_set,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pitcount_pipeline::{PixelPoint, geometry};

    use super::*;

    /// Axis-aligned square blob of the given side, top-left at `origin`.
    fn square(origin: (i32, i32), side: i32) -> BlobDescriptor {
        let (x, y) = origin;
        BlobDescriptor::from_contour(Contour::new(vec![
            PixelPoint::new(x, y),
            PixelPoint::new(x + side, y),
            PixelPoint::new(x + side, y + side),
            PixelPoint::new(x, y + side),
        ]))
    }

    fn circle(center: (i32, i32), radius: f64) -> BlobDescriptor {
        BlobDescriptor::circle(PixelPoint::new(center.0, center.1), radius, 50)
    }

    // --- RangeFilter ---

    #[test]
    fn defaults() {
        let f = RangeFilter::default();
        assert!((f.min_area() - 75.0).abs() < f64::EPSILON);
        assert!((f.max_area() - 2000.0).abs() < f64::EPSILON);
        assert!((f.min_circularity() - 0.65).abs() < f64::EPSILON);
        assert!((f.max_circularity() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn setters_clamp_to_domain() {
        let mut f = RangeFilter::default();
        assert!((f.set_max_area(9000.0) - 5000.0).abs() < f64::EPSILON);
        assert!((f.set_min_area(-3.0) - 1.0).abs() < f64::EPSILON);
        assert!((f.set_max_circularity(1.7) - 1.0).abs() < f64::EPSILON);
        assert!(f.set_min_circularity(-0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn endpoints_never_cross() {
        let mut f = RangeFilter::default();
        assert!((f.set_min_area(3000.0) - 2000.0).abs() < f64::EPSILON);
        assert!((f.set_max_area(10.0) - 2000.0).abs() < f64::EPSILON);
        assert!((f.set_max_circularity(0.1) - 0.65).abs() < f64::EPSILON);
        assert!(f.min_area() <= f.max_area());
        assert!(f.min_circularity() <= f.max_circularity());
    }

    #[test]
    fn nan_is_clamped_to_domain_minimum() {
        let mut f = RangeFilter::default();
        assert!((f.set_min_area(f64::NAN) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn accepts_reference_cases() {
        let f = RangeFilter::default();
        // 10×10 square: area 100, circularity π/4 ≈ 0.785.
        assert!(f.accepts(&square((0, 0), 10)));
        // Area 49: too small.
        assert!(!f.accepts(&square((0, 0), 7)));
        // Manual circle r = 10: area ≈ 314, circularity 1.0.
        assert!(f.accepts(&circle((50, 50), 10.0)));
        // Manual circle r = 4: area ≈ 50.
        assert!(!f.accepts(&circle((50, 50), 4.0)));
    }

    #[test]
    fn bounds_are_inclusive() {
        let blob = square((0, 0), 10);
        let mut f = RangeFilter::default();
        f.set_min_circularity(0.0);
        f.set_min_area(100.0);
        f.set_max_area(100.0);
        assert!(f.accepts(&blob));
    }

    #[test]
    fn domain_is_not_serialized() {
        let json = serde_json::to_value(RangeFilter::default()).unwrap_or_default();
        assert!(json.get("domains").is_none());
        assert!((json["min_area"].as_f64().unwrap_or_default() - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn deserializing_clamps_like_the_setters() {
        let json = r#"{"min_area": 900.0, "max_area": 300.0, "max_circularity": 4.0}"#;
        let f: RangeFilter = serde_json::from_str(json).unwrap();
        assert!((f.min_area() - 300.0).abs() < f64::EPSILON);
        assert!((f.max_area() - 300.0).abs() < f64::EPSILON);
        assert!((f.min_circularity() - 0.65).abs() < f64::EPSILON);
        assert!((f.max_circularity() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn serialized_filter_reads_back_unchanged() {
        let mut f = RangeFilter::default();
        f.set_min_area(120.0);
        f.set_max_circularity(0.9);
        let json = serde_json::to_string(&f).unwrap();
        assert_eq!(serde_json::from_str::<RangeFilter>(&json).unwrap(), f);
    }

    // --- evaluate ---

    #[test]
    fn evaluate_orders_automatic_then_manual_and_scales() {
        let mut state = AnnotationState::new(vec![square((0, 0), 10), square((20, 0), 12)]);
        state.add_manual(circle((100, 100), 10.0));
        let eval = evaluate(&state, &RangeFilter::default(), 2.0);
        assert_eq!(eval.count, 3);
        assert_eq!(eval.render_set.len(), 3);
        assert_eq!(eval.render_set[0].points()[1], PixelPoint::new(20, 0));
        assert_eq!(eval.render_set[1].points()[0], PixelPoint::new(40, 0));
        assert_eq!(eval.render_set[2].points()[0], PixelPoint::new(220, 200));
    }

    #[test]
    fn evaluate_skips_suppressed_and_filtered() {
        let mut state = AnnotationState::new(vec![
            square((0, 0), 10),
            square((20, 0), 5),
            square((40, 0), 12),
        ]);
        state.suppress(2);
        let eval = evaluate(&state, &RangeFilter::default(), 1.0);
        assert_eq!(eval.count, 1);
        assert_eq!(eval.render_set[0], *state.automatic()[0].contour());
    }

    #[test]
    fn widening_ranges_never_lowers_count() {
        let blobs: Vec<BlobDescriptor> = (1..30).map(|s| square((s * 40, 0), s)).collect();
        let state = AnnotationState::new(blobs);
        let narrow = RangeFilter::default();
        let mut wide = narrow;
        wide.set_min_area(1.0);
        wide.set_max_area(5000.0);
        wide.set_min_circularity(0.0);
        let narrow_count = evaluate(&state, &narrow, 1.0).count;
        let wide_count = evaluate(&state, &wide, 1.0).count;
        assert!(wide_count >= narrow_count);
        assert_eq!(wide_count, 29);
    }

    #[test]
    fn circle_area_is_ideal_not_polygonal() {
        let blob = circle((0, 0), 10.0);
        let polygon = geometry::polygon_area(blob.contour().points());
        // The stored area is the ideal circle, not the polygon's.
        assert!(blob.area() > polygon);
    }
}
