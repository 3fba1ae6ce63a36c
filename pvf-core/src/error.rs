//! Error taxonomy for the engine.
//!
//! `ConfigurationError` and `InputError` are the only two kinds that cross
//! the public API as `Err`. Coverage failure (an unvisited start trident) is
//! an ordinary outcome, reported as `None` from [`crate::model::PathVectorField::av_traj`],
//! not an error. Internal invariant violations (an out-of-range index
//! reaching code that assumed validation already happened) are bugs and are
//! raised with `debug_assert!`/`unreachable!` at the call site rather than
//! surfaced here.

use thiserror::Error;

/// A parameter rejected at construction or configuration time.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("node spacing must be positive, got {0}")]
    NonPositiveSpacing(f64),
    #[error("grid extents must be positive, got ({0}, {1})")]
    NonPositiveExtents(f64, f64),
    #[error("grid extents have not been set; call set_extents before training or synthesis")]
    ExtentsNotSet,
}

/// A trajectory rejected during training.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("trajectory is empty")]
    Empty,
    #[error("trajectory has fewer than two points ({0})")]
    TooShort(usize),
    #[error("trajectory contains a zero-length segment at index {0}")]
    ZeroLengthSegment(usize),
    #[error("trajectory point ({x}, {y}) lies outside grid extents ({ex}, {ey})")]
    OutOfExtents { x: f64, y: f64, ex: f64, ey: f64 },
}
