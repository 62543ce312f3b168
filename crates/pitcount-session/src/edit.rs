//! Resolve an edit-mode click against the annotation state.

use pitcount_pipeline::{BlobDescriptor, Dimensions, Point};
use serde::{Deserialize, Serialize};

use crate::annotation::AnnotationState;
use crate::filter::RangeFilter;

/// Hit-testing and manual-circle parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditConfig {
    /// How far outside a contour (in image pixels) a click still hits it.
    pub tolerance: f64,
    /// Vertex count of the polygon approximating a manual circle.
    pub circle_vertices: usize,
}

impl EditConfig {
    /// Default hit tolerance in pixels.
    pub const DEFAULT_TOLERANCE: f64 = 2.0;
    /// Default manual circle vertex count.
    pub const DEFAULT_CIRCLE_VERTICES: usize = 50;
}

impl Default for EditConfig {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
            circle_vertices: Self::DEFAULT_CIRCLE_VERTICES,
        }
    }
}

/// What a click did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditOutcome {
    /// Manual descriptor `j` was removed.
    RemovedManual(usize),
    /// Automatic detection `i` was suppressed.
    Suppressed(usize),
    /// A manual circle was appended at index `j`.
    Added(usize),
    /// The click was outside the image.
    Ignored,
}

/// Apply a click at image-space `point`.
///
/// Only descriptors currently passing `filter` can be hit. Manual
/// descriptors are tried newest first, then automatic ones in index
/// order; the first whose signed distance exceeds `-tolerance` wins.
/// A click that hits nothing adds a manual circle of the state's default
/// radius, provided it lies inside `dimensions`.
pub fn dispatch(
    state: &mut AnnotationState,
    filter: &RangeFilter,
    point: Point,
    dimensions: Dimensions,
    config: &EditConfig,
) -> EditOutcome {
    let pixel = point.to_pixel();
    let query = pixel.to_point();
    let hits = |blob: &BlobDescriptor| {
        filter.accepts(blob) && blob.signed_distance(query) > -config.tolerance
    };

    let manual_hit = state.manual().iter().rposition(hits);
    let automatic_hit = state
        .automatic()
        .iter()
        .enumerate()
        .position(|(i, blob)| !state.is_suppressed(i) && hits(blob));

    let outcome = if let Some(j) = manual_hit {
        state.remove_manual(j);
        EditOutcome::RemovedManual(j)
    } else if let Some(i) = automatic_hit {
        state.suppress(i);
        EditOutcome::Suppressed(i)
    } else if dimensions.contains(pixel) {
        let blob = BlobDescriptor::circle(
            pixel,
            f64::from(state.default_radius()),
            config.circle_vertices,
        );
        EditOutcome::Added(state.add_manual(blob))
    } else {
        EditOutcome::Ignored
    };

    log::debug!("edit at ({}, {}): {outcome:?}", pixel.x, pixel.y);
    outcome
}

#[cfg(test)]
mod tests {
    use pitcount_pipeline::{Contour, PixelPoint};

    use super::*;

    const DIMS: Dimensions = Dimensions::new(200, 200);

    /// 20×20 square with top-left at `(x, y)`: area 400, circularity 0.785.
    fn square(x: i32, y: i32) -> BlobDescriptor {
        BlobDescriptor::from_contour(Contour::new(vec![
            PixelPoint::new(x, y),
            PixelPoint::new(x + 20, y),
            PixelPoint::new(x + 20, y + 20),
            PixelPoint::new(x, y + 20),
        ]))
    }

    fn click(state: &mut AnnotationState, x: f64, y: f64) -> EditOutcome {
        dispatch(
            state,
            &RangeFilter::default(),
            Point::new(x, y),
            DIMS,
            &EditConfig::default(),
        )
    }

    #[test]
    fn click_inside_automatic_suppresses() {
        let mut state = AnnotationState::new(vec![square(10, 10), square(50, 10)]);
        assert_eq!(click(&mut state, 60.0, 20.0), EditOutcome::Suppressed(1));
        assert!(state.is_suppressed(1));
        assert!(!state.is_suppressed(0));
    }

    #[test]
    fn click_within_tolerance_hits() {
        let mut state = AnnotationState::new(vec![square(10, 10)]);
        // One pixel right of the edge at x = 30.
        assert_eq!(click(&mut state, 31.0, 20.0), EditOutcome::Suppressed(0));
    }

    #[test]
    fn click_at_tolerance_misses() {
        let mut state = AnnotationState::new(vec![square(10, 10)]);
        // Exactly two pixels outside: -2 is not > -2.
        assert!(matches!(click(&mut state, 32.0, 20.0), EditOutcome::Added(0)));
        assert!(state.suppressed().is_empty());
    }

    #[test]
    fn click_point_is_truncated() {
        let mut state = AnnotationState::new(vec![square(10, 10)]);
        // 31.9 truncates to 31, inside the tolerance band.
        assert_eq!(click(&mut state, 31.9, 20.0), EditOutcome::Suppressed(0));
    }

    #[test]
    fn suppressed_detection_is_not_hit_again() {
        let mut state = AnnotationState::new(vec![square(10, 10)]);
        click(&mut state, 20.0, 20.0);
        assert_eq!(click(&mut state, 20.0, 20.0), EditOutcome::Added(0));
        assert_eq!(state.suppressed().len(), 1);
    }

    #[test]
    fn manual_takes_priority_over_automatic() {
        let mut state = AnnotationState::new(vec![square(10, 10)]);
        state.add_manual(BlobDescriptor::circle(PixelPoint::new(20, 20), 10.0, 50));
        assert_eq!(click(&mut state, 20.0, 20.0), EditOutcome::RemovedManual(0));
        assert!(state.manual().is_empty());
        assert!(state.suppressed().is_empty());
    }

    #[test]
    fn newest_manual_is_removed_first() {
        let mut state = AnnotationState::new(Vec::new());
        let circle = BlobDescriptor::circle(PixelPoint::new(100, 100), 10.0, 50);
        state.add_manual(circle.clone());
        state.add_manual(circle);
        assert_eq!(
            click(&mut state, 100.0, 100.0),
            EditOutcome::RemovedManual(1)
        );
        assert_eq!(state.manual().len(), 1);
    }

    #[test]
    fn filtered_out_descriptors_cannot_be_hit() {
        // 5×5 square: area 25, below the default minimum.
        let small = BlobDescriptor::from_contour(Contour::new(vec![
            PixelPoint::new(100, 100),
            PixelPoint::new(105, 100),
            PixelPoint::new(105, 105),
            PixelPoint::new(100, 105),
        ]));
        let mut state = AnnotationState::new(vec![small]);
        assert!(matches!(
            click(&mut state, 102.0, 102.0),
            EditOutcome::Added(0)
        ));
        assert!(state.suppressed().is_empty());
    }

    #[test]
    fn empty_space_adds_default_circle() {
        let mut state = AnnotationState::new(Vec::new());
        assert_eq!(click(&mut state, 150.0, 150.0), EditOutcome::Added(0));
        let added = &state.manual()[0];
        let r = f64::from(AnnotationState::FALLBACK_RADIUS);
        assert!((added.area() - std::f64::consts::PI * r * r).abs() < 1e-9);
        assert!((added.circularity() - 1.0).abs() < f64::EPSILON);
        assert_eq!(added.contour().len(), 50);
        assert_eq!(added.contour().points()[0], PixelPoint::new(160, 150));
    }

    #[test]
    fn click_outside_image_is_ignored() {
        let mut state = AnnotationState::new(Vec::new());
        assert_eq!(click(&mut state, 200.0, 10.0), EditOutcome::Ignored);
        assert_eq!(click(&mut state, -0.5, 10.0), EditOutcome::Added(0));
        assert_eq!(click(&mut state, -1.0, 150.0), EditOutcome::Ignored);
        assert_eq!(state.manual().len(), 1);
    }
}
