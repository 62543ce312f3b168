//! Zoom and pan between image pixels and display coordinates.
//!
//! The same [`View`] drives rendering ([`View::to_display`],
//! [`View::image_rect`]) and hit-testing ([`View::to_image`]), so a click
//! always lands where the contour was drawn.

use pitcount_pipeline::{Dimensions, Point};
use serde::{Deserialize, Serialize};

/// Zoom limits and padding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Smallest allowed zoom factor.
    pub min_zoom: f64,
    /// Largest allowed zoom factor.
    pub max_zoom: f64,
    /// Zoom change per button press or wheel notch.
    pub zoom_step: f64,
    /// Extra pan travel past the image edge, in display pixels.
    pub pan_padding: f64,
    /// Margin kept around the image by [`View::fit_to_window`].
    pub fit_padding: f64,
    /// Canvas extent below which fitting is not attempted.
    pub min_canvas: f64,
}

impl ViewConfig {
    /// Default minimum zoom.
    pub const DEFAULT_MIN_ZOOM: f64 = 0.1;
    /// Default maximum zoom.
    pub const DEFAULT_MAX_ZOOM: f64 = 10.0;
    /// Default zoom step.
    pub const DEFAULT_ZOOM_STEP: f64 = 0.1;
    /// Default pan padding.
    pub const DEFAULT_PAN_PADDING: f64 = 2.0;
    /// Default fit padding.
    pub const DEFAULT_FIT_PADDING: f64 = 4.0;
    /// Default minimum usable canvas extent.
    pub const DEFAULT_MIN_CANVAS: f64 = 20.0;

    /// Clamp `zoom` into `[min_zoom, max_zoom]`. NaN maps to `min_zoom`.
    #[must_use]
    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            self.min_zoom
        } else {
            zoom.clamp(self.min_zoom, self.max_zoom)
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: Self::DEFAULT_MIN_ZOOM,
            max_zoom: Self::DEFAULT_MAX_ZOOM,
            zoom_step: Self::DEFAULT_ZOOM_STEP,
            pan_padding: Self::DEFAULT_PAN_PADDING,
            fit_padding: Self::DEFAULT_FIT_PADDING,
            min_canvas: Self::DEFAULT_MIN_CANVAS,
        }
    }
}

/// Current zoom factor and pan offset.
///
/// `offset` is the displacement of the image center from the canvas
/// center, in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Display pixels per image pixel.
    pub zoom: f64,
    /// Pan offset in display pixels.
    pub offset: Point,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            offset: Point::new(0.0, 0.0),
        }
    }
}

/// Axis-aligned rectangle in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

/// A view of one image on one canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct View {
    state: ViewState,
    canvas: Dimensions,
    image: Dimensions,
    config: ViewConfig,
}

impl View {
    /// A view at zoom 1 with no pan.
    #[must_use]
    pub fn new(canvas: Dimensions, image: Dimensions, config: ViewConfig) -> Self {
        let mut view = Self {
            state: ViewState::default(),
            canvas,
            image,
            config,
        };
        view.state.zoom = config.clamp_zoom(1.0);
        view.clamp();
        view
    }

    /// Current zoom and offset.
    #[must_use]
    pub const fn state(&self) -> ViewState {
        self.state
    }

    /// Current zoom factor.
    #[must_use]
    pub const fn zoom(&self) -> f64 {
        self.state.zoom
    }

    /// Canvas size in display pixels.
    #[must_use]
    pub const fn canvas(&self) -> Dimensions {
        self.canvas
    }

    /// Image size in image pixels.
    #[must_use]
    pub const fn image(&self) -> Dimensions {
        self.image
    }

    /// Zoom limits and padding in effect.
    #[must_use]
    pub const fn config(&self) -> &ViewConfig {
        &self.config
    }

    fn canvas_center(&self) -> Point {
        Point::new(
            f64::from(self.canvas.width) / 2.0,
            f64::from(self.canvas.height) / 2.0,
        )
    }

    fn image_center(&self) -> Point {
        Point::new(
            f64::from(self.image.width) / 2.0,
            f64::from(self.image.height) / 2.0,
        )
    }

    /// Map an image-space point to display space.
    #[must_use]
    pub fn to_display(&self, p: Point) -> Point {
        let cc = self.canvas_center();
        let ic = self.image_center();
        let ViewState { zoom, offset } = self.state;
        Point::new(
            (p.x - ic.x).mul_add(zoom, cc.x + offset.x),
            (p.y - ic.y).mul_add(zoom, cc.y + offset.y),
        )
    }

    /// Map a display-space point back to image space.
    ///
    /// Returns `None` when the point falls outside the image.
    #[must_use]
    pub fn to_image(&self, q: Point) -> Option<Point> {
        let cc = self.canvas_center();
        let ic = self.image_center();
        let ViewState { zoom, offset } = self.state;
        let p = Point::new(
            (q.x - cc.x - offset.x) / zoom + ic.x,
            (q.y - cc.y - offset.y) / zoom + ic.y,
        );
        let inside = (0.0..f64::from(self.image.width)).contains(&p.x)
            && (0.0..f64::from(self.image.height)).contains(&p.y);
        inside.then_some(p)
    }

    /// Largest allowed `|offset|` per axis at the current zoom.
    #[must_use]
    pub fn max_offset(&self) -> Point {
        let limit = |image: u32, canvas: u32| {
            let scaled = (f64::from(image) * self.state.zoom).trunc();
            let canvas = f64::from(canvas);
            if scaled > canvas {
                (scaled - canvas) / 2.0 + self.config.pan_padding
            } else {
                0.0
            }
        };
        Point::new(
            limit(self.image.width, self.canvas.width),
            limit(self.image.height, self.canvas.height),
        )
    }

    fn clamp(&mut self) {
        let max = self.max_offset();
        let offset = &mut self.state.offset;
        offset.x = offset.x.clamp(-max.x, max.x);
        offset.y = offset.y.clamp(-max.y, max.y);
    }

    /// Move the view by a display-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.state.offset.x += dx;
        self.state.offset.y += dy;
        self.clamp();
    }

    /// Change the zoom while keeping the image point under `anchor`
    /// (display space) fixed, as far as pan clamping allows.
    pub fn zoom_about(&mut self, zoom: f64, anchor: Point) {
        let new_zoom = self.config.clamp_zoom(zoom);
        let ratio = new_zoom / self.state.zoom;
        let cc = self.canvas_center();
        let rel = Point::new(anchor.x - cc.x, anchor.y - cc.y);
        let offset = &mut self.state.offset;
        offset.x = (offset.x - rel.x).mul_add(ratio, rel.x);
        offset.y = (offset.y - rel.y).mul_add(ratio, rel.y);
        self.state.zoom = new_zoom;
        self.clamp();
    }

    /// Zoom in one step about the canvas center.
    pub fn zoom_in(&mut self) {
        self.zoom_about(self.state.zoom + self.config.zoom_step, self.canvas_center());
    }

    /// Zoom out one step about the canvas center.
    pub fn zoom_out(&mut self) {
        self.zoom_about(self.state.zoom - self.config.zoom_step, self.canvas_center());
    }

    /// Zoom one step toward the sign of `delta`, about `pointer`.
    ///
    /// A zero delta does nothing.
    pub fn scroll(&mut self, delta: f64, pointer: Point) {
        let step = if delta > 0.0 {
            self.config.zoom_step
        } else if delta < 0.0 {
            -self.config.zoom_step
        } else {
            return;
        };
        self.zoom_about(self.state.zoom + step, pointer);
    }

    /// The largest zoom at which the whole image fits in the padded
    /// canvas, with the pan reset.
    ///
    /// Falls back to zoom 1 when the canvas is below the usable minimum
    /// or the image is empty.
    pub fn fit_to_window(&mut self) {
        let width = f64::from(self.canvas.width);
        let height = f64::from(self.canvas.height);
        let zoom = if width < self.config.min_canvas
            || height < self.config.min_canvas
            || self.image.is_empty()
        {
            1.0
        } else {
            let pad = 2.0 * self.config.fit_padding;
            let fit_x = (width - pad) / f64::from(self.image.width);
            let fit_y = (height - pad) / f64::from(self.image.height);
            fit_x.min(fit_y)
        };
        self.state = ViewState {
            zoom: self.config.clamp_zoom(zoom),
            offset: Point::new(0.0, 0.0),
        };
        self.clamp();
        log::debug!("fit to window: zoom {:.3}", self.state.zoom);
    }

    /// Track a new canvas size.
    pub fn resize(&mut self, canvas: Dimensions) {
        self.canvas = canvas;
        self.clamp();
    }

    /// Replace the image, resetting zoom and pan.
    pub fn set_image(&mut self, image: Dimensions) {
        self.image = image;
        self.state = ViewState::default();
        self.state.zoom = self.config.clamp_zoom(1.0);
        self.clamp();
    }

    /// Where the image is drawn, in display coordinates.
    #[must_use]
    pub fn image_rect(&self) -> DisplayRect {
        let top_left = self.to_display(Point::new(0.0, 0.0));
        DisplayRect {
            x: top_left.x,
            y: top_left.y,
            width: f64::from(self.image.width) * self.state.zoom,
            height: f64::from(self.image.height) * self.state.zoom,
        }
    }
}
