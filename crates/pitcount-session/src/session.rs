//! Interactive state for one loaded image.

use std::time::Duration;

use pitcount_pipeline::{Dimensions, Point, SegmentResult};
use serde::{Deserialize, Serialize};
use web_time::Instant;

use crate::annotation::AnnotationState;
use crate::coalesce::UpdateCoalescer;
use crate::edit::{self, EditConfig, EditOutcome};
use crate::filter::{self, Evaluation, FilterDomains, RangeFilter};
use crate::view::{DisplayRect, View, ViewConfig};

/// What a pointer press does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Presses start a pan.
    #[default]
    Idle,
    /// Presses add or remove particles.
    Editing,
}

impl Mode {
    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Idle => Self::Editing,
            Self::Editing => Self::Idle,
        }
    }
}

/// Tunables for the interactive session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Zoom limits and padding.
    pub view: ViewConfig,
    /// Hit tolerance and manual circle shape.
    pub edit: EditConfig,
    /// Domains of the filter sliders.
    pub filter: FilterDomains,
    /// Quiet period before a requested filter change is applied.
    pub coalesce_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            view: ViewConfig::default(),
            edit: EditConfig::default(),
            filter: FilterDomains::default(),
            coalesce_delay: UpdateCoalescer::<RangeFilter>::DEFAULT_DELAY,
        }
    }
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Where to draw the image.
    pub image_rect: DisplayRect,
    /// Zoom factor the render set was scaled by.
    pub zoom: f64,
    /// Count and zoom-scaled contours of the passing particles.
    pub evaluation: Evaluation,
}

/// Annotation, filter, and view state for the current image.
///
/// Segmentation happens outside the session; [`Session::load`] takes its
/// finished result. Count and render set are derived on demand from the
/// current state and never cached.
#[derive(Debug, Clone)]
pub struct Session {
    config: SessionConfig,
    annotations: AnnotationState,
    view: View,
    filter: RangeFilter,
    mode: Mode,
    drag_from: Option<Point>,
    pending_filter: UpdateCoalescer<RangeFilter>,
}

impl Session {
    /// An empty session drawing onto `canvas`.
    #[must_use]
    pub fn new(config: SessionConfig, canvas: Dimensions) -> Self {
        Self {
            annotations: AnnotationState::default(),
            view: View::new(canvas, Dimensions::new(0, 0), config.view),
            filter: RangeFilter::new(config.filter),
            mode: Mode::Idle,
            drag_from: None,
            pending_filter: UpdateCoalescer::new(config.coalesce_delay),
            config,
        }
    }

    /// Start over with a freshly segmented image.
    ///
    /// Corrections are discarded, the view resets to zoom `1.0` with no
    /// pan, and the mode returns to [`Mode::Idle`]. Filter values carry
    /// over.
    pub fn load(&mut self, result: SegmentResult) {
        let SegmentResult { blobs, dimensions } = result;
        log::info!(
            "loaded {}x{} image with {} candidates",
            dimensions.width,
            dimensions.height,
            blobs.len()
        );
        self.annotations.reset(blobs);
        self.view.set_image(dimensions);
        self.mode = Mode::Idle;
        self.drag_from = None;
    }

    /// Session tunables.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Automatic detections and corrections.
    #[must_use]
    pub const fn annotations(&self) -> &AnnotationState {
        &self.annotations
    }

    /// The current view.
    #[must_use]
    pub const fn view(&self) -> &View {
        &self.view
    }

    /// The filter in effect.
    #[must_use]
    pub const fn filter(&self) -> &RangeFilter {
        &self.filter
    }

    /// Current press behavior.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch between panning and editing; returns the new mode.
    pub fn toggle_edit(&mut self) -> Mode {
        self.mode = self.mode.toggled();
        self.drag_from = None;
        log::debug!("mode: {:?}", self.mode);
        self.mode
    }

    /// Pointer pressed at display position `pos`.
    ///
    /// In [`Mode::Idle`] this starts a pan and returns `None`. In
    /// [`Mode::Editing`] the press is resolved as an edit; a press off
    /// the image is [`EditOutcome::Ignored`].
    pub fn press(&mut self, pos: Point) -> Option<EditOutcome> {
        match self.mode {
            Mode::Idle => {
                self.drag_from = Some(pos);
                None
            }
            Mode::Editing => Some(
                self.view
                    .to_image(pos)
                    .map_or(EditOutcome::Ignored, |p| self.edit_at_image(p)),
            ),
        }
    }

    /// Pointer moved to `pos` with the button held.
    pub fn drag(&mut self, pos: Point) {
        if let Some(from) = self.drag_from.replace(pos) {
            self.view.pan_by(pos.x - from.x, pos.y - from.y);
        }
    }

    /// Pointer released.
    pub fn release(&mut self) {
        self.drag_from = None;
    }

    /// Apply an edit at an image-space point, bypassing the view.
    pub fn edit_at_image(&mut self, point: Point) -> EditOutcome {
        edit::dispatch(
            &mut self.annotations,
            &self.filter,
            point,
            self.view.image(),
            &self.config.edit,
        )
    }

    /// Wheel zoom about the pointer.
    pub fn scroll(&mut self, delta: f64, pointer: Point) {
        self.view.scroll(delta, pointer);
    }

    /// Zoom in one step.
    pub fn zoom_in(&mut self) {
        self.view.zoom_in();
    }

    /// Zoom out one step.
    pub fn zoom_out(&mut self) {
        self.view.zoom_out();
    }

    /// Fit the image to the canvas.
    pub fn fit_to_window(&mut self) {
        self.view.fit_to_window();
    }

    /// The canvas changed size.
    pub fn resize(&mut self, canvas: Dimensions) {
        self.view.resize(canvas);
    }

    /// Replace the filter immediately, dropping any pending request.
    pub fn set_filter(&mut self, filter: RangeFilter) {
        self.pending_filter.flush();
        self.filter = filter;
    }

    /// Queue a filter change; it takes effect once [`Session::poll_filter`]
    /// sees the input has been quiet long enough.
    pub fn request_filter(&mut self, filter: RangeFilter, now: Instant) {
        self.pending_filter.request(filter, now);
    }

    /// Apply a queued filter if it is due. Returns `true` if the filter
    /// changed.
    pub fn poll_filter(&mut self, now: Instant) -> bool {
        self.pending_filter
            .poll(now)
            .is_some_and(|filter| self.apply_filter(filter))
    }

    /// Apply a queued filter now, regardless of timing.
    pub fn flush_filter(&mut self) -> bool {
        self.pending_filter
            .flush()
            .is_some_and(|filter| self.apply_filter(filter))
    }

    fn apply_filter(&mut self, filter: RangeFilter) -> bool {
        let changed = filter != self.filter;
        self.filter = filter;
        changed
    }

    /// Count and render set for the current state.
    #[must_use]
    pub fn evaluation(&self) -> Evaluation {
        filter::evaluate(&self.annotations, &self.filter, self.view.zoom())
    }

    /// Number of particles passing the current filter.
    #[must_use]
    pub fn count(&self) -> usize {
        self.annotations
            .active()
            .filter(|(_, blob)| self.filter.accepts(blob))
            .count()
    }

    /// Everything needed to draw the current state.
    #[must_use]
    pub fn frame(&self) -> Frame {
        Frame {
            image_rect: self.view.image_rect(),
            zoom: self.view.zoom(),
            evaluation: self.evaluation(),
        }
    }
}
