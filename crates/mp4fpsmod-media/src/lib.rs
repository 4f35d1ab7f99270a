//! mp4fpsmod-media: MP4 container access for retiming
//!
//! This crate loads the `moov` atom of an MP4 file into an editable tree,
//! exposes the first video track through
//! [`TrackTiming`](mp4fpsmod_timing::TrackTiming), and writes the edited
//! movie to a new file.
//!
//! # Modules
//!
//! - `mp4` - Atom reading, typed timing boxes, track access and saving
//!
//! # Saving
//!
//! The output file keeps every top-level atom of the source in order. Only
//! `moov` is re-serialized; everything else, including `mdat`, is copied
//! byte for byte. If `moov` precedes the media data and changes size, chunk
//! offsets are adjusted so they still point at the same samples.

pub mod error;
pub mod mp4;

pub use error::{Error, Result};
pub use mp4::{Mp4File, VideoTrack};
