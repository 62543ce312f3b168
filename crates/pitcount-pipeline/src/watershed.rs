//! Marker-controlled watershed by priority flooding.
//!
//! Regions grow outward from their seed labels over the color image,
//! always extending the front across the smallest color step first. A
//! pixel reached from two different regions becomes a [`BOUNDARY`]
//! pixel, which is how touching particles end up separated.
//!
//! Details that affect the output:
//!
//! - The one-pixel frame of the image is always [`BOUNDARY`] and never
//!   flooded.
//! - Neighbors are 4-connected and inspected left, right, up, down.
//! - The step between two pixels is the largest absolute per-channel
//!   difference, so priorities are integers in `0..=255` and the queue is
//!   256 FIFO buckets. Ties are resolved first-in first-out.
//! - Negative labels inside the frame are cleared to [`UNKNOWN`] before
//!   flooding starts.

use std::collections::VecDeque;

use image::RgbImage;

use crate::markers::{BOUNDARY, UNKNOWN};
use crate::types::LabelImage;

/// Label of a pixel waiting in the flood queue.
const IN_QUEUE: i32 = -2;

/// Number of distinct step priorities.
const LEVELS: usize = 256;

/// Bucketed FIFO priority queue over pixel offsets.
struct FloodQueue {
    buckets: [VecDeque<usize>; LEVELS],
    active: usize,
}

impl FloodQueue {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| VecDeque::new()),
            active: LEVELS,
        }
    }

    fn push(&mut self, priority: usize, offset: usize) {
        self.buckets[priority].push_back(offset);
        self.active = self.active.min(priority);
    }

    /// Pop from the lowest non-empty bucket at or above `active`.
    fn pop(&mut self) -> Option<usize> {
        while self.active < LEVELS {
            if let Some(offset) = self.buckets[self.active].pop_front() {
                return Some(offset);
            }
            self.active += 1;
        }
        None
    }
}

/// Largest absolute per-channel difference between two pixels.
fn step(raw: &[u8], a: usize, b: usize) -> usize {
    (0..3)
        .map(|c| usize::from(raw[a * 3 + c].abs_diff(raw[b * 3 + c])))
        .max()
        .unwrap_or(0)
}

/// Flood `markers` over `image` and return the final labels.
///
/// Every interior [`UNKNOWN`] pixel reachable from a seed ends up with
/// that seed's label or [`BOUNDARY`]. Images narrower or shorter than
/// three pixels have no interior and come back entirely [`BOUNDARY`].
#[must_use = "returns the flooded label image"]
pub fn flood(image: &RgbImage, markers: &LabelImage) -> LabelImage {
    let (w, h) = markers.dimensions();
    let mut labels = markers.clone();
    if w < 3 || h < 3 {
        labels.pixels_mut().for_each(|p| p.0[0] = BOUNDARY);
        return labels;
    }

    let (width, height) = (w as usize, h as usize);
    let raw = image.as_raw();
    let lab: &mut [i32] = &mut labels;
    let mut queue = FloodQueue::new();

    for x in 0..width {
        lab[x] = BOUNDARY;
        lab[(height - 1) * width + x] = BOUNDARY;
    }

    // Seed the queue with every unknown pixel touching a labeled region.
    for y in 1..height - 1 {
        let row = y * width;
        lab[row] = BOUNDARY;
        lab[row + width - 1] = BOUNDARY;
        for x in 1..width - 1 {
            let here = row + x;
            if lab[here] < 0 {
                lab[here] = UNKNOWN;
            }
            if lab[here] != UNKNOWN {
                continue;
            }
            let priority = [here - 1, here + 1, here - width, here + width]
                .into_iter()
                .filter(|&n| lab[n] > 0)
                .map(|n| step(raw, here, n))
                .min();
            if let Some(priority) = priority {
                queue.push(priority, here);
                lab[here] = IN_QUEUE;
            }
        }
    }

    while let Some(here) = queue.pop() {
        let neighbors = [here - 1, here + 1, here - width, here + width];

        let mut label = UNKNOWN;
        for &n in &neighbors {
            let t = lab[n];
            if t > 0 {
                if label == UNKNOWN {
                    label = t;
                } else if t != label {
                    label = BOUNDARY;
                }
            }
        }
        if label == UNKNOWN {
            label = BOUNDARY;
        }
        lab[here] = label;
        if label == BOUNDARY {
            continue;
        }

        for n in neighbors {
            if lab[n] == UNKNOWN {
                queue.push(step(raw, here, n), n);
                lab[n] = IN_QUEUE;
            }
        }
    }

    labels
}

/// Number of [`BOUNDARY`] pixels in a label image.
#[must_use]
pub fn count_boundary(labels: &LabelImage) -> u64 {
    labels.pixels().map(|p| u64::from(p.0[0] == BOUNDARY)).sum()
}
