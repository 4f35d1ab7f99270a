//! Error types for mp4fpsmod-timing.

use std::io;
use thiserror::Error;

/// Result type for timing operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for timing operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The timecode text yielded no timestamps.
    #[error("No entry in the timecode file")]
    EmptyInput,

    /// Resolved frame ranges do not cover the track exactly.
    #[error("Total number of frames differs from the movie: ranges cover {actual}, movie has {expected}")]
    FrameCountMismatch { expected: usize, actual: usize },

    /// An explicit schedule does not have one timestamp per sample.
    #[error("timecode entry count differs from the movie: {actual} timecodes, movie has {expected}")]
    TimecodeCountMismatch { expected: usize, actual: usize },

    /// The timecodes cannot be expressed as exact catalog rates.
    ///
    /// Not fatal: callers fall back to the explicit schedule.
    #[error("No exact frame rate matches delta {delta} at frame {index}")]
    ExactFitUnavailable { index: usize, delta: f64 },

    /// Malformed or zero frame rate.
    #[error("Invalid frame rate: {0}")]
    InvalidRate(String),

    /// Malformed `NFRAMES:FPS` range.
    #[error("Invalid frame range: {0}")]
    InvalidRange(String),

    /// Derived time scale does not fit in 32 bits.
    #[error("Time scale overflow: {0} does not fit in 32 bits")]
    TimeScaleOverflow(u64),

    /// A sample duration does not fit the time-to-sample table.
    #[error("Sample delta {delta} at sample {index} does not fit in 32 bits")]
    DeltaOverflow { index: usize, delta: u64 },

    /// Decode timestamps decrease, usually from an out-of-order timecode file.
    #[error("Decode timestamps go backwards at sample {index}: {current} after {previous}; timecodes must not decrease")]
    NonMonotonic {
        index: usize,
        previous: u64,
        current: u64,
    },

    /// A composition offset does not fit the composition offset table.
    #[error("Composition offset {offset} at sample {index} does not fit in 31 bits")]
    OffsetOverflow { index: usize, offset: i64 },

    /// I/O error while reading timecodes.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure reported by the container collaborator.
    #[error("{0}")]
    Container(String),
}

impl Error {
    /// Create a container error.
    pub fn container(msg: impl Into<String>) -> Self {
        Self::Container(msg.into())
    }

    /// Whether this error only signals that exact fitting was not possible.
    pub fn is_fit_unavailable(&self) -> bool {
        matches!(self, Self::ExactFitUnavailable { .. })
    }
}
