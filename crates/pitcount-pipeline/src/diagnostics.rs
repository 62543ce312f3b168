//! Segmentation diagnostics: timing, counts, and other metrics for each
//! stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter experimentation. [`segment_with_diagnostics`] collects them
//! alongside the segmentation result.
//!
//! Duration measurements use [`std::time::Duration`] (platform-agnostic).
//! Timestamps come from a caller-supplied [`Clock`]; [`WebClock`] uses the
//! `web-time` crate, which maps to `performance.now()` on WASM and
//! `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::pipeline::{Segmentation, SegmentStage};
use crate::types::{BlobDescriptor, PipelineError, SegmentConfig, SegmentResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> web_time::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &web_time::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from a single segmentation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentDiagnostics {
    /// Stage 1: intensity conversion.
    pub intensity: StageDiagnostics,
    /// Stage 2: adaptive threshold.
    pub threshold: StageDiagnostics,
    /// Stage 3: morphological opening.
    pub open: StageDiagnostics,
    /// Stage 4: distance transform and seed labeling.
    pub seed: StageDiagnostics,
    /// Stage 5: watershed flooding.
    pub flood: StageDiagnostics,
    /// Stage 6: contour extraction.
    pub extract: StageDiagnostics,
    /// Total wall-clock duration of the entire run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: SegmentSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Intensity conversion metrics.
    Intensity {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Adaptive threshold metrics.
    Threshold {
        /// Neighborhood side length.
        block_size: u32,
        /// Offset below the local mean.
        offset: f64,
        /// Foreground pixels after thresholding.
        foreground_pixels: u64,
        /// Total pixel count for computing foreground density.
        total_pixels: u64,
    },
    /// Morphological opening metrics.
    Open {
        /// Number of `3×3` iterations.
        iterations: u8,
        /// Foreground pixels before opening.
        foreground_before: u64,
        /// Foreground pixels after opening.
        foreground_after: u64,
    },
    /// Seed construction metrics.
    Seed {
        /// Largest distance to the background, in pixels.
        max_distance: f64,
        /// Sure-foreground pixels.
        sure_foreground_pixels: u64,
        /// Pixels left for the watershed to decide.
        unknown_pixels: u64,
        /// Distinct sure-foreground components.
        seed_count: usize,
    },
    /// Watershed metrics.
    Flood {
        /// Pixels labeled as region boundaries (including the frame).
        boundary_pixels: u64,
    },
    /// Contour extraction metrics.
    Extract {
        /// Number of blob descriptors emitted.
        blob_count: usize,
        /// Smallest blob area.
        min_area: f64,
        /// Largest blob area.
        max_area: f64,
        /// Mean blob area.
        mean_area: f64,
        /// Mean circularity.
        mean_circularity: f64,
    },
}

/// High-level summary counts for the entire run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of watershed seeds.
    pub seed_count: usize,
    /// Number of blob descriptors emitted.
    pub blob_count: usize,
}

impl SegmentDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Segmentation Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Seeds: {}  |  Blobs: {}",
            self.summary.seed_count, self.summary.blob_count,
        ));

        lines.join("\n")
    }

    /// Stage diagnostics in execution order, with display names.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Intensity", &self.intensity),
            ("Threshold", &self.threshold),
            ("Open", &self.open),
            ("Seed", &self.seed),
            ("Flood", &self.flood),
            ("Extract", &self.extract),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Intensity { width, height } => format!("{width}x{height}"),
        StageMetrics::Threshold {
            block_size,
            offset,
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("block={block_size} C={offset:.1} fg={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Open {
            iterations,
            foreground_before,
            foreground_after,
        } => format!("iter={iterations} fg={foreground_before}->{foreground_after}"),
        StageMetrics::Seed {
            max_distance,
            sure_foreground_pixels,
            unknown_pixels,
            seed_count,
        } => format!(
            "max_dist={max_distance:.2} sure_fg={sure_foreground_pixels} unknown={unknown_pixels} seeds={seed_count}",
        ),
        StageMetrics::Flood { boundary_pixels } => format!("boundary={boundary_pixels}"),
        StageMetrics::Extract {
            blob_count,
            min_area,
            max_area,
            mean_area,
            mean_circularity,
        } => format!(
            "{blob_count} blobs, area min={min_area:.1} max={max_area:.1} mean={mean_area:.1}, circ mean={mean_circularity:.3}",
        ),
    }
}

/// Area and circularity statistics over a set of descriptors.
pub(crate) fn extract_metrics(blobs: &[BlobDescriptor]) -> StageMetrics {
    let min_area = blobs.iter().map(BlobDescriptor::area).reduce(f64::min);
    let max_area = blobs.iter().map(BlobDescriptor::area).reduce(f64::max);
    #[allow(clippy::cast_precision_loss)]
    let n = blobs.len() as f64;
    let (mean_area, mean_circularity) = if blobs.is_empty() {
        (0.0, 0.0)
    } else {
        (
            blobs.iter().map(BlobDescriptor::area).sum::<f64>() / n,
            blobs.iter().map(BlobDescriptor::circularity).sum::<f64>() / n,
        )
    };
    StageMetrics::Extract {
        blob_count: blobs.len(),
        min_area: min_area.unwrap_or(0.0),
        max_area: max_area.unwrap_or(0.0),
        mean_area,
        mean_circularity,
    }
}

/// Time one stage transition and record its metrics.
fn timed<C: Clock, S: SegmentStage>(clock: &C, advance: impl FnOnce() -> S) -> (S, StageDiagnostics) {
    let start = clock.now();
    let stage = advance();
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    log::debug!("stage {} ({}) took {duration:?}", S::INDEX, S::NAME);
    (stage, StageDiagnostics { duration, metrics })
}

/// Segment `image`, timing every stage with `clock`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// [`SegmentConfig::validate`].
pub fn segment_with_diagnostics<C: Clock>(
    image: &RgbImage,
    config: &SegmentConfig,
    clock: &C,
) -> Result<(SegmentResult, SegmentDiagnostics), PipelineError> {
    let run_start = clock.now();
    let pending = Segmentation::new(image.clone(), config.clone())?;

    let (intensity, intensity_diag) = timed(clock, || pending.intensity());
    let (thresholded, threshold_diag) = timed(clock, || intensity.threshold());
    let (opened, open_diag) = timed(clock, || thresholded.open());
    let (seeded, seed_diag) = timed(clock, || opened.seed());
    let seed_count = seeded.seed_count();
    let (flooded, flood_diag) = timed(clock, || seeded.flood());
    let (extracted, extract_diag) = timed(clock, || flooded.extract());

    let result = extracted.into_result().into_result();
    let total_duration = clock.elapsed(&run_start);
    let dims = result.dimensions;
    log::info!(
        "Analysis complete. Found {} potential segments.",
        result.blobs.len()
    );

    let diagnostics = SegmentDiagnostics {
        intensity: intensity_diag,
        threshold: threshold_diag,
        open: open_diag,
        seed: seed_diag,
        flood: flood_diag,
        extract: extract_diag,
        total_duration,
        summary: SegmentSummary {
            image_width: dims.width,
            image_height: dims.height,
            pixel_count: dims.pixel_count(),
            seed_count,
            blob_count: result.blobs.len(),
        },
    };
    Ok((result, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond every time it is read.
    struct TickClock {
        ticks: Cell<u64>,
    }

    impl TickClock {
        const fn new() -> Self {
            Self {
                ticks: Cell::new(0),
            }
        }
    }

    impl Clock for TickClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn sample_image() -> RgbImage {
        RgbImage::from_fn(60, 60, |x, y| {
            let dx = f64::from(x) - 30.0;
            let dy = f64::from(y) - 30.0;
            if dx.hypot(dy) < 10.0 {
                image::Rgb([40, 40, 40])
            } else {
                image::Rgb([220, 220, 220])
            }
        })
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn extract_metrics_of_nothing_is_zero() {
        let StageMetrics::Extract {
            blob_count,
            min_area,
            mean_circularity,
            ..
        } = extract_metrics(&[])
        else {
            unreachable!("extract_metrics always returns Extract");
        };
        assert_eq!(blob_count, 0);
        assert!(min_area.abs() < f64::EPSILON);
        assert!(mean_circularity.abs() < f64::EPSILON);
    }

    #[test]
    fn diagnostics_cover_every_stage() {
        let clock = TickClock::new();
        let (result, diag) =
            segment_with_diagnostics(&sample_image(), &SegmentConfig::default(), &clock).unwrap();

        assert_eq!(diag.summary.image_width, 60);
        assert_eq!(diag.summary.pixel_count, 3600);
        assert_eq!(diag.summary.blob_count, result.blobs.len());
        for (_, stage) in diag.stages() {
            assert_eq!(stage.duration, Duration::from_millis(1));
        }
        assert!(diag.total_duration >= Duration::from_millis(6));
        assert!(matches!(diag.flood.metrics, StageMetrics::Flood { .. }));
    }

    #[test]
    fn invalid_config_is_rejected_before_timing() {
        let config = SegmentConfig {
            block_size: 4,
            ..SegmentConfig::default()
        };
        let result = segment_with_diagnostics(&sample_image(), &config, &WebClock);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn report_lists_stages() {
        let (_, diag) =
            segment_with_diagnostics(&sample_image(), &SegmentConfig::default(), &TickClock::new())
                .unwrap();
        let report = diag.report();
        assert!(report.contains("Segmentation Diagnostics Report"));
        for name in ["Intensity", "Threshold", "Open", "Seed", "Flood", "Extract"] {
            assert!(report.contains(name), "missing {name}");
        }
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let (_, diag) =
            segment_with_diagnostics(&sample_image(), &SegmentConfig::default(), &TickClock::new())
                .unwrap();
        let json = serde_json::to_value(&diag).unwrap();
        assert!((json["flood"]["duration"].as_f64().unwrap() - 0.001).abs() < 1e-12);
        let back: SegmentDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.flood.duration, diag.flood.duration);
    }
}
