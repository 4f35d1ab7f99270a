//! The container-side view of a track's timing.

use crate::run_length::{CompositionOffset, TimeToSample};
use crate::Result;

/// Media rate 1.0 in 16.16 fixed point.
pub const UNITY_MEDIA_RATE: i32 = 0x0001_0000;

/// One edit list entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditEntry {
    /// Duration of the edit, in movie time-scale units.
    pub segment_duration: u64,
    /// Start of the edit in media time-scale units; -1 is an empty edit.
    pub media_time: i64,
    /// Playback rate, 16.16 fixed point.
    pub media_rate: i32,
}

impl EditEntry {
    /// An edit playing the whole track from media time 0.
    pub fn full_track(segment_duration: u64) -> Self {
        Self {
            segment_duration,
            media_time: 0,
            media_rate: UNITY_MEDIA_RATE,
        }
    }
}

/// Timing accessors a container exposes for one track.
///
/// Tables are always replaced wholesale: implementations receive a complete
/// new table and swap it in.
pub trait TrackTiming {
    /// Number of samples in the track.
    fn sample_count(&self) -> u32;

    /// Current time-to-sample runs.
    fn time_to_sample(&self) -> &[TimeToSample];

    /// Current composition offset runs, if the track has the table.
    fn composition_offsets(&self) -> Option<&[CompositionOffset]>;

    /// Replace the time-to-sample table.
    fn set_time_to_sample(&mut self, runs: Vec<TimeToSample>) -> Result<()>;

    /// Replace the composition offset table.
    fn set_composition_offsets(&mut self, runs: Vec<CompositionOffset>) -> Result<()>;

    /// Media time scale, units per second.
    fn time_scale(&self) -> u32;

    /// Set the media time scale.
    fn set_time_scale(&mut self, time_scale: u32) -> Result<()>;

    /// Set the media duration (media time scale) and everything derived
    /// from it.
    fn set_media_duration(&mut self, duration: u64) -> Result<()>;

    /// Track duration in movie time-scale units.
    fn track_duration(&self) -> u64;

    /// First edit list entry, if the track has an edit list.
    fn edit(&self) -> Option<EditEntry>;

    /// Create an edit list holding one full-track entry and return it.
    fn add_edit(&mut self) -> Result<EditEntry>;

    /// Overwrite the first edit list entry.
    fn set_edit(&mut self, edit: EditEntry) -> Result<()>;
}
