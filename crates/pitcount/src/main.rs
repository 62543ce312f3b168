//! pitcount: count particles in a microscopy image.
//!
//! Segments the image once, applies the area and circularity filters,
//! replays any scripted corrections, and prints the summary line. The
//! summary can be saved under its default name, and the counted outlines
//! can be written as an overlay image.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin pitcount -- [OPTIONS] <IMAGE_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use pitcount_export::{OverlayStyle, Summary};
use pitcount_pipeline::diagnostics::Clock;
use pitcount_pipeline::{Point, SegmentConfig};
use pitcount_session::{EditOutcome, RangeFilter, Session, SessionConfig};

/// Count dark particles (etch pits, cells, grains) in a microscopy image.
///
/// Detected particles are filtered by area and circularity; the count
/// and filter values are printed as a one-line summary.
#[derive(Parser)]
#[command(name = "pitcount", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, TIFF).
    image_path: PathBuf,

    /// Smallest particle area counted, in square pixels.
    #[arg(long, default_value_t = RangeFilter::DEFAULT_MIN_AREA)]
    min_area: f64,

    /// Largest particle area counted, in square pixels.
    #[arg(long, default_value_t = RangeFilter::DEFAULT_MAX_AREA)]
    max_area: f64,

    /// Lowest circularity counted (1.0 is a perfect circle).
    #[arg(long, default_value_t = RangeFilter::DEFAULT_MIN_CIRCULARITY)]
    min_circularity: f64,

    /// Highest circularity counted.
    #[arg(long, default_value_t = RangeFilter::DEFAULT_MAX_CIRCULARITY)]
    max_circularity: f64,

    /// Edit click at image coordinates `X,Y`, applied in order.
    ///
    /// A click on a counted particle removes it; a click on empty space
    /// adds a circular particle of the default radius.
    #[arg(long = "click", value_name = "X,Y", value_parser = parse_point)]
    clicks: Vec<Point>,

    /// Full segmentation config as a JSON string.
    ///
    /// The JSON must be a valid `SegmentConfig` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Save the summary under its default file name in `--output-dir`.
    #[arg(long)]
    save: bool,

    /// Directory for `--save`.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Save the summary to this path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the image with counted outlines drawn in green.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Zoom factor for `--overlay`.
    #[arg(long, default_value_t = 1.0)]
    zoom: f64,

    /// Print per-stage segmentation diagnostics to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Print results (and diagnostics) as JSON instead of text.
    #[arg(long)]
    json: bool,
}

/// Parse `X,Y` into an image-space point.
fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got {s:?}"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid coordinate {v:?}: {e}"))
    };
    Ok(Point::new(parse(x)?, parse(y)?))
}

/// Build the segmentation config from `--config-json`, or the defaults.
fn segment_config(cli: &Cli) -> Result<SegmentConfig, String> {
    let config: SegmentConfig = match cli.config_json {
        Some(ref json) => {
            serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
        }
        None => SegmentConfig::default(),
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Apply the filter flags, warning about any value that had to move.
fn filter_from_cli(cli: &Cli, session: &Session) -> RangeFilter {
    let mut filter = *session.filter();
    let domains = *filter.domains();
    filter.set_min_area(domains.area.min);
    filter.set_min_circularity(domains.circularity.min);

    let requested = [
        ("--max-area", cli.max_area, filter.set_max_area(cli.max_area)),
        ("--min-area", cli.min_area, filter.set_min_area(cli.min_area)),
        (
            "--max-circularity",
            cli.max_circularity,
            filter.set_max_circularity(cli.max_circularity),
        ),
        (
            "--min-circularity",
            cli.min_circularity,
            filter.set_min_circularity(cli.min_circularity),
        ),
    ];
    for (flag, wanted, applied) in requested {
        if (wanted - applied).abs() > f64::EPSILON {
            log::warn!("{flag} {wanted} clamped to {applied}");
        }
    }
    filter
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match segment_config(&cli) {
        Ok(c) => c,
        Err(msg) => {
            log::error!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::error!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let image = match pitcount_pipeline::grayscale::decode(&image_bytes) {
        Ok(image) => image,
        Err(e) => {
            log::error!("Error decoding {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    log::info!("Image loaded, starting analysis...");

    let (result, diagnostics) =
        match pitcount_pipeline::segment_with_diagnostics(&image, &config, &StdClock) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!("Segmentation error: {e}");
                return ExitCode::FAILURE;
            }
        };
    if cli.diagnostics && !cli.json {
        eprintln!("{}", diagnostics.report());
    }

    let mut session = Session::new(SessionConfig::default(), result.dimensions);
    session.load(result);
    let filter = filter_from_cli(&cli, &session);
    session.set_filter(filter);

    let edits = replay_clicks(&mut session, &cli.clicks);

    let image_name = cli.image_path.file_name().map_or_else(
        || cli.image_path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    );
    let count = session.count();
    let summary = Summary::new(count, &image_name, session.filter()).to_string();

    if cli.json {
        let mut report = serde_json::json!({
            "image": image_name,
            "count": count,
            "filter": session.filter(),
            "edits": edits,
            "summary": summary,
        });
        if cli.diagnostics {
            match serde_json::to_value(&diagnostics) {
                Ok(value) => report["diagnostics"] = value,
                Err(e) => {
                    log::error!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                log::error!("Error serializing results: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{summary}");
    }

    let mut ok = true;
    if cli.save {
        let now = chrono::Local::now().naive_local();
        let name = pitcount_export::default_filename(&image_name, now);
        ok &= write_summary(&cli.output_dir.join(name), &summary);
    }
    if let Some(ref path) = cli.output {
        ok &= write_summary(path, &summary);
    }
    if let Some(ref path) = cli.overlay {
        ok &= write_overlay(path, &image, &session, cli.zoom);
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Apply `clicks` in edit mode, logging each outcome.
fn replay_clicks(session: &mut Session, clicks: &[Point]) -> Vec<EditOutcome> {
    clicks
        .iter()
        .map(|&p| {
            let outcome = session.edit_at_image(p);
            log::info!("click ({}, {}): {outcome:?}", p.x, p.y);
            outcome
        })
        .collect()
}

fn write_summary(path: &Path, summary: &str) -> bool {
    match std::fs::write(path, summary) {
        Ok(()) => {
            log::info!("Results saved to {}", path.display());
            true
        }
        Err(e) => {
            log::error!("Failed to save {}: {e}", path.display());
            false
        }
    }
}

fn write_overlay(
    path: &Path,
    image: &pitcount_pipeline::RgbImage,
    session: &Session,
    zoom: f64,
) -> bool {
    let evaluation = pitcount_session::evaluate(session.annotations(), session.filter(), zoom);
    let overlay = match pitcount_export::render_overlay(
        image,
        &evaluation.render_set,
        zoom,
        &OverlayStyle::default(),
    ) {
        Ok(overlay) => overlay,
        Err(e) => {
            log::error!("Error rendering overlay: {e}");
            return false;
        }
    };
    match overlay.save(path) {
        Ok(()) => {
            log::info!(
                "Overlay written to {} ({}x{}, {} outlines)",
                path.display(),
                overlay.width(),
                overlay.height(),
                evaluation.count
            );
            true
        }
        Err(e) => {
            log::error!("Error writing overlay to {}: {e}", path.display());
            false
        }
    }
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pitcount_pipeline::{Dimensions, SegmentResult};

    use super::*;

    #[test]
    fn parse_point_accepts_spaces_and_fractions() {
        assert_eq!(parse_point("12, 7.5").unwrap(), Point::new(12.0, 7.5));
    }

    #[test]
    fn parse_point_rejects_garbage() {
        assert!(parse_point("12").is_err());
        assert!(parse_point("a,3").is_err());
    }

    #[test]
    fn cli_defaults_match_filter_defaults() {
        let cli = Cli::parse_from(["pitcount", "plate.png"]);
        let session = Session::new(SessionConfig::default(), Dimensions::new(10, 10));
        assert_eq!(filter_from_cli(&cli, &session), RangeFilter::default());
        assert!(cli.clicks.is_empty());
    }

    #[test]
    fn inverted_area_range_is_clamped() {
        let cli = Cli::parse_from(["pitcount", "p.png", "--min-area", "900", "--max-area", "300"]);
        let session = Session::new(SessionConfig::default(), Dimensions::new(10, 10));
        let filter = filter_from_cli(&cli, &session);
        assert!((filter.max_area() - 300.0).abs() < f64::EPSILON);
        assert!((filter.min_area() - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn clicks_are_repeatable() {
        let cli = Cli::parse_from(["pitcount", "p.png", "--click", "1,2", "--click", "3,4"]);
        assert_eq!(cli.clicks, vec![Point::new(1.0, 2.0), Point::new(3.0, 4.0)]);
    }

    #[test]
    fn config_json_fills_defaults() {
        let cli = Cli::parse_from(["pitcount", "p.png", "--config-json", r#"{"block_size": 31}"#]);
        let config = segment_config(&cli).unwrap();
        assert_eq!(config.block_size, 31);
        assert_eq!(config.open_iterations, SegmentConfig::DEFAULT_OPEN_ITERATIONS);
    }

    #[test]
    fn invalid_config_json_is_reported() {
        let cli = Cli::parse_from(["pitcount", "p.png", "--config-json", r#"{"block_size": 4}"#]);
        assert!(segment_config(&cli).is_err());
    }

    #[test]
    fn oversized_block_size_is_rejected() {
        let json = r#"{"block_size": 2000000001}"#;
        let cli = Cli::parse_from(["pitcount", "p.png", "--config-json", json]);
        assert!(segment_config(&cli).is_err());
    }

    #[test]
    fn replayed_click_on_empty_image_adds() {
        let mut session = Session::new(SessionConfig::default(), Dimensions::new(50, 50));
        session.load(SegmentResult {
            blobs: Vec::new(),
            dimensions: Dimensions::new(50, 50),
        });
        let edits = replay_clicks(&mut session, &[Point::new(25.0, 25.0), Point::new(25.0, 25.0)]);
        assert_eq!(edits, vec![EditOutcome::Added(0), EditOutcome::RemovedManual(0)]);
    }
}
