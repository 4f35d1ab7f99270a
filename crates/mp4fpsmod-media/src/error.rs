//! Error types for mp4fpsmod-media.

use std::io;
use thiserror::Error;

/// Result type for mp4fpsmod-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for mp4fpsmod-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid MP4 file structure.
    #[error("Invalid MP4: {0}")]
    InvalidMp4(String),

    /// Missing required atom in MP4 file.
    #[error("Missing required atom: {0}")]
    MissingAtom(&'static str),

    /// The movie has no track with a `vide` handler.
    #[error("Video track not found")]
    NoVideoTrack,

    /// Unsupported feature or layout.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Box payload shorter than its layout requires.
    #[error("Buffer underflow in {atom}: need {need} bytes, have {have}")]
    BufferUnderflow {
        atom: &'static str,
        need: usize,
        have: usize,
    },

    /// Output path names the input file.
    #[error("Destination must differ from the source file")]
    SameSourceAndDestination,
}

impl Error {
    /// Create an invalid MP4 error.
    pub fn invalid_mp4(msg: impl Into<String>) -> Self {
        Self::InvalidMp4(msg.into())
    }

    /// Create an unsupported error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<Error> for mp4fpsmod_timing::Error {
    fn from(err: Error) -> Self {
        mp4fpsmod_timing::Error::container(err.to_string())
    }
}
