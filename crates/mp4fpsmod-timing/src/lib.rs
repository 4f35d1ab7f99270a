//! mp4fpsmod-timing: frame timing for MP4 video tracks
//!
//! This crate rebuilds the timing tables of a video track so it plays at a
//! new schedule without touching the compressed frames. A schedule is either
//! a list of constant-rate ranges (`NFRAMES:FPS`) or one timestamp per frame
//! read from a timecode v2 file.
//!
//! # Modules
//!
//! - `timecode` - Timecode v2 parsing and time-scale selection
//! - `normalize` - Clustering jittery frame deltas into clean groups
//! - `fit` - Recognizing exact broadcast rates in a timestamp sequence
//! - `sample_time` - Per-sample decode/composition timestamps
//! - `run_length` - `stts` / `ctts` run encoding
//! - `edit_list` - Keeping the edit list in step with composition offsets
//! - `editor` - Applying a schedule to a track through [`TrackTiming`]
//!
//! # Architecture
//!
//! The container is reached only through the [`TrackTiming`] trait. Editing
//! a track:
//!
//! 1. Expands the current `stts`/`ctts` runs into per-sample timestamps and
//!    freezes the presentation order
//! 2. Assigns new decode times in decode order and new composition times in
//!    presentation order
//! 3. Delays composition so no frame is shown before it is decoded
//! 4. Writes the new time scale, duration, run tables and edit list

pub mod edit_list;
pub mod editor;
pub mod error;
pub mod fit;
pub mod normalize;
pub mod rate;
pub mod run_length;
pub mod sample_time;
pub mod timecode;
pub mod track;

pub use edit_list::synchronize_edit_list;
pub use editor::{TimingEditor, TimingSummary};
pub use error::{Error, Result};
pub use fit::{fit_exact_ranges, RateCatalog, FIT_TOLERANCE};
pub use normalize::{normalize_timecodes, DeltaGroup};
pub use rate::{FpsRange, Rate};
pub use run_length::{CompositionOffset, SampleRun, TimeToSample};
pub use sample_time::{SampleTime, SampleTimeTable, DEFAULT_TIME_SCALE};
pub use timecode::{parse_timecodes, Timecodes, TIMECODE_TIME_SCALE};
pub use track::{EditEntry, TrackTiming, UNITY_MEDIA_RATE};
