//! Automatic detections plus the user's corrections.

use std::collections::BTreeSet;

use pitcount_pipeline::BlobDescriptor;

/// Where an active descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Index into the automatic detections.
    Automatic(usize),
    /// Index into the manual additions.
    Manual(usize),
}

/// Annotation state for one loaded image.
///
/// The automatic list is fixed at load time. Corrections never remove an
/// automatic detection; they only mark its index as suppressed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationState {
    automatic: Vec<BlobDescriptor>,
    suppressed: BTreeSet<usize>,
    manual: Vec<BlobDescriptor>,
    default_radius: u32,
}

impl AnnotationState {
    /// Radius for manual circles when there are no automatic detections.
    pub const FALLBACK_RADIUS: u32 = 10;

    /// Fresh state for a newly loaded image.
    #[must_use]
    pub fn new(automatic: Vec<BlobDescriptor>) -> Self {
        let default_radius = default_radius(&automatic);
        Self {
            automatic,
            suppressed: BTreeSet::new(),
            manual: Vec::new(),
            default_radius,
        }
    }

    /// Replace everything with the detections of a new image.
    pub fn reset(&mut self, automatic: Vec<BlobDescriptor>) {
        *self = Self::new(automatic);
    }

    /// Detections produced by segmentation, in label order.
    #[must_use]
    pub fn automatic(&self) -> &[BlobDescriptor] {
        &self.automatic
    }

    /// Suppressed automatic indices, ascending.
    #[must_use]
    pub const fn suppressed(&self) -> &BTreeSet<usize> {
        &self.suppressed
    }

    /// Hand-placed descriptors, in insertion order.
    #[must_use]
    pub fn manual(&self) -> &[BlobDescriptor] {
        &self.manual
    }

    /// Radius of new manual circles, in image pixels.
    #[must_use]
    pub const fn default_radius(&self) -> u32 {
        self.default_radius
    }

    /// Whether automatic detection `index` is suppressed.
    #[must_use]
    pub fn is_suppressed(&self, index: usize) -> bool {
        self.suppressed.contains(&index)
    }

    /// Suppress automatic detection `index`.
    ///
    /// Returns `false` if the index is out of range or already
    /// suppressed.
    pub fn suppress(&mut self, index: usize) -> bool {
        index < self.automatic.len() && self.suppressed.insert(index)
    }

    /// Append a manual descriptor and return its index.
    pub fn add_manual(&mut self, blob: BlobDescriptor) -> usize {
        self.manual.push(blob);
        self.manual.len() - 1
    }

    /// Remove manual descriptor `index`, shifting later ones down.
    pub fn remove_manual(&mut self, index: usize) -> Option<BlobDescriptor> {
        (index < self.manual.len()).then(|| self.manual.remove(index))
    }

    /// The active set: non-suppressed automatic detections in index
    /// order, then manual additions in insertion order.
    pub fn active(&self) -> impl Iterator<Item = (Origin, &BlobDescriptor)> {
        let automatic = self
            .automatic
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.suppressed.contains(i))
            .map(|(i, blob)| (Origin::Automatic(i), blob));
        let manual = self
            .manual
            .iter()
            .enumerate()
            .map(|(j, blob)| (Origin::Manual(j), blob));
        automatic.chain(manual)
    }

    /// Number of active descriptors, before filtering.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.automatic.len() - self.suppressed.len() + self.manual.len()
    }
}

/// `trunc(sqrt(mean_area / π))`, at least one pixel.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn default_radius(automatic: &[BlobDescriptor]) -> u32 {
    if automatic.is_empty() {
        return AnnotationState::FALLBACK_RADIUS;
    }
    let mean = automatic.iter().map(BlobDescriptor::area).sum::<f64>() / automatic.len() as f64;
    let radius = (mean / std::f64::consts::PI).sqrt().trunc();
    if radius.is_finite() {
        (radius as u32).max(1)
    } else {
        AnnotationState::FALLBACK_RADIUS
    }
}
