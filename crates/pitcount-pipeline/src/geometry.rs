//! Closed-polygon measurements on the pixel grid.
//!
//! Pure functions shared by contour extraction (area, perimeter,
//! circularity, chain compression), manual annotation (synthetic
//! circles), and hit-testing (signed point-to-polygon distance).

use geo::line_measures::Distance;
use geo::{Contains, Euclidean, LineString, Polygon};

use crate::types::{Contour, PixelPoint, Point};

/// Enclosed area of a closed polygon (shoelace formula).
///
/// The polygon is implicitly closed from the last point back to the
/// first. Orientation does not matter; the result is never negative.
#[must_use]
pub fn polygon_area(points: &[PixelPoint]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let twice = twice.unsigned_abs() as f64;
    twice * 0.5
}

/// Total edge length of a closed polygon, including the closing edge.
#[must_use]
pub fn perimeter(points: &[PixelPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.to_point().distance(b.to_point()))
        .sum()
}

/// Isoperimetric circularity `4π·area / perimeter²`.
///
/// Returns `0` for a zero-length perimeter.
#[must_use]
pub fn circularity(area: f64, perimeter: f64) -> f64 {
    if perimeter <= 0.0 {
        return 0.0;
    }
    4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
}

/// Polygon approximating a circle of `radius` around `center`.
///
/// Angles are spaced evenly over `[0, 2π]` inclusive, so the last
/// vertex repeats the first. Coordinates truncate toward zero.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn circle_contour(center: PixelPoint, radius: f64, vertices: usize) -> Contour {
    let step = if vertices > 1 {
        std::f64::consts::TAU / (vertices - 1) as f64
    } else {
        0.0
    };
    let cx = f64::from(center.x);
    let cy = f64::from(center.y);
    let points = (0..vertices)
        .map(|i| {
            let theta = step * i as f64;
            PixelPoint::new(
                radius.mul_add(theta.cos(), cx).trunc() as i32,
                radius.mul_add(theta.sin(), cy).trunc() as i32,
            )
        })
        .collect();
    Contour::new(points)
}

/// Signed Euclidean distance from `point` to the boundary of the
/// polygon: positive inside, negative outside, zero on an edge.
///
/// An empty polygon is infinitely far away.
#[must_use]
pub fn signed_distance(points: &[PixelPoint], point: Point) -> f64 {
    if points.is_empty() {
        return f64::NEG_INFINITY;
    }
    let ring: LineString<f64> = points
        .iter()
        .map(|p| geo::Coord {
            x: f64::from(p.x),
            y: f64::from(p.y),
        })
        .collect();
    let polygon = Polygon::new(ring, vec![]);
    let query = geo::Point::new(point.x, point.y);
    let distance = Euclidean.distance(&query, polygon.exterior());
    if polygon.contains(&query) {
        distance
    } else {
        -distance
    }
}

/// Drop every vertex that continues a straight run in the same
/// direction, keeping only the corners of a closed pixel chain.
///
/// Consecutive duplicate points are merged first. Chains with fewer than
/// three distinct points are returned unchanged.
#[must_use]
pub fn compress_chain(points: &[PixelPoint]) -> Vec<PixelPoint> {
    let mut distinct: Vec<PixelPoint> = Vec::with_capacity(points.len());
    for &p in points {
        if distinct.last() != Some(&p) {
            distinct.push(p);
        }
    }
    while distinct.len() > 1 && distinct.first() == distinct.last() {
        distinct.pop();
    }
    let n = distinct.len();
    if n < 3 {
        return distinct;
    }

    let step = |a: PixelPoint, b: PixelPoint| ((b.x - a.x).signum(), (b.y - a.y).signum());
    (0..n)
        .filter(|&i| {
            let prev = distinct[(i + n - 1) % n];
            let here = distinct[i];
            let next = distinct[(i + 1) % n];
            step(prev, here) != step(here, next)
        })
        .map(|i| distinct[i])
        .collect()
}
