//! pitcount-export: Pure result formatters (sans-IO)
//!
//! Turns a finished count into things a user keeps: the one-line text
//! summary, its default file name, and a raster overlay of the counted
//! outlines. Writing them anywhere is the caller's job.

pub mod overlay;
pub mod summary;

pub use overlay::{OverlayStyle, render_overlay};
pub use summary::{Summary, default_filename};

/// Errors from building an overlay.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The zoomed image has no pixels.
    #[error("overlay would be empty at this zoom")]
    EmptyCanvas,

    /// The zoomed image cannot be represented.
    #[error("invalid overlay dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}
