//! mp4fpsmod - change the frame timing of MP4 video without re-encoding
//!
//! This library crate exposes the top-level retiming flow for the binary and
//! for integration testing.

pub mod retime;

pub use retime::{is_usage_error, retime, Options, RetimeReport, UsageError};
