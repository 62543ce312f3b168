//! Draw the render set over the zoomed image.

use image::{RgbImage, imageops};
use pitcount_pipeline::Contour;
use tiny_skia::{LineCap, LineJoin, Paint, PathBuilder, Pixmap, Stroke, Transform};

use crate::ExportError;

/// Stroke appearance for particle outlines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Outline color (RGB).
    pub color: [u8; 3],
    /// Stroke width in display pixels.
    pub line_width: f32,
    /// Whether to anti-alias the outline.
    pub anti_alias: bool,
}

impl OverlayStyle {
    /// Default outline color: pure green.
    pub const DEFAULT_COLOR: [u8; 3] = [0, 255, 0];
    /// Default stroke width.
    pub const DEFAULT_LINE_WIDTH: f32 = 1.0;
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Self::DEFAULT_COLOR,
            line_width: Self::DEFAULT_LINE_WIDTH,
            anti_alias: false,
        }
    }
}

/// Resize `image` by `zoom` and outline every contour in `render_set`.
///
/// `render_set` is expected in display coordinates, already scaled by
/// the same `zoom` (as produced by `pitcount_session::evaluate`). The
/// output is `trunc(width · zoom) × trunc(height · zoom)`.
///
/// # Errors
///
/// Returns [`ExportError::EmptyCanvas`] if the scaled image has no
/// pixels, or [`ExportError::InvalidDimensions`] if it cannot be
/// allocated or `zoom` is not a positive finite number.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn render_overlay(
    image: &RgbImage,
    render_set: &[Contour],
    zoom: f64,
    style: &OverlayStyle,
) -> Result<RgbImage, ExportError> {
    if !zoom.is_finite() || zoom <= 0.0 {
        return Err(ExportError::InvalidDimensions {
            width: image.width(),
            height: image.height(),
        });
    }
    let width = (f64::from(image.width()) * zoom).trunc();
    let height = (f64::from(image.height()) * zoom).trunc();
    if width < 1.0 || height < 1.0 {
        return Err(ExportError::EmptyCanvas);
    }
    let (width, height) = (width as u32, height as u32);

    let scaled = imageops::resize(image, width, height, imageops::FilterType::Triangle);
    let mut pixmap =
        Pixmap::new(width, height).ok_or(ExportError::InvalidDimensions { width, height })?;
    for (dst, src) in pixmap.data_mut().chunks_exact_mut(4).zip(scaled.pixels()) {
        dst.copy_from_slice(&[src[0], src[1], src[2], 255]);
    }

    let stroke = Stroke {
        width: style.line_width,
        line_cap: LineCap::Round,
        line_join: LineJoin::Round,
        ..Stroke::default()
    };
    let mut paint = Paint::default();
    let [r, g, b] = style.color;
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = style.anti_alias;

    // Integer contour points address pixel centers.
    let transform = Transform::from_translate(0.5, 0.5);
    let mut drawn = 0_usize;
    for contour in render_set {
        let Some(path) = contour_path(contour) else {
            continue;
        };
        pixmap.stroke_path(&path, &paint, &stroke, transform, None);
        drawn += 1;
    }
    log::debug!("overlay {width}x{height}: {drawn} outlines");

    // Every pixel is opaque, so the premultiplied data is plain RGB.
    let rgb = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    RgbImage::from_raw(width, height, rgb).ok_or(ExportError::InvalidDimensions { width, height })
}

/// Closed path through the contour's points.
#[allow(clippy::cast_precision_loss)]
fn contour_path(contour: &Contour) -> Option<tiny_skia::Path> {
    let (first, rest) = contour.points().split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pitcount_pipeline::PixelPoint;

    use super::*;

    fn gray(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, image::Rgb([100, 100, 100]))
    }

    fn square(x0: i32, y0: i32, x1: i32, y1: i32) -> Contour {
        Contour::new(vec![
            PixelPoint::new(x0, y0),
            PixelPoint::new(x1, y0),
            PixelPoint::new(x1, y1),
            PixelPoint::new(x0, y1),
        ])
    }

    #[test]
    fn output_is_scaled_by_zoom() {
        let out = render_overlay(&gray(40, 30), &[], 1.5, &OverlayStyle::default()).unwrap();
        assert_eq!(out.dimensions(), (60, 45));
        assert_eq!(out.get_pixel(10, 10), &image::Rgb([100, 100, 100]));
    }

    #[test]
    fn outline_is_green_and_interior_untouched() {
        let out = render_overlay(
            &gray(40, 40),
            &[square(10, 10, 30, 30)],
            1.0,
            &OverlayStyle::default(),
        )
        .unwrap();
        assert_eq!(out.get_pixel(20, 10), &image::Rgb([0, 255, 0]));
        assert_eq!(out.get_pixel(10, 20), &image::Rgb([0, 255, 0]));
        assert_eq!(out.get_pixel(20, 20), &image::Rgb([100, 100, 100]));
        assert_eq!(out.get_pixel(5, 5), &image::Rgb([100, 100, 100]));
    }

    #[test]
    fn empty_contours_are_skipped() {
        let out = render_overlay(
            &gray(10, 10),
            &[Contour::new(Vec::new())],
            1.0,
            &OverlayStyle::default(),
        )
        .unwrap();
        assert!(out.pixels().all(|p| p == &image::Rgb([100, 100, 100])));
    }

    #[test]
    fn zoom_to_nothing_is_an_error() {
        let result = render_overlay(&gray(5, 5), &[], 0.1, &OverlayStyle::default());
        assert!(matches!(result, Err(ExportError::EmptyCanvas)));
        let result = render_overlay(&gray(0, 0), &[], 1.0, &OverlayStyle::default());
        assert!(matches!(result, Err(ExportError::EmptyCanvas)));
    }

    #[test]
    fn non_finite_zoom_is_rejected() {
        let result = render_overlay(&gray(5, 5), &[], f64::NAN, &OverlayStyle::default());
        assert!(matches!(result, Err(ExportError::InvalidDimensions { .. })));
    }
}
