//! Retiming a track.

use crate::edit_list::synchronize_edit_list;
use crate::rate::FpsRange;
use crate::run_length::{encode_composition_offsets, encode_time_to_sample};
use crate::sample_time::{exact_time_scale, resolve_ranges, SampleTimeTable};
use crate::track::{EditEntry, TrackTiming};
use crate::{Error, Result};

/// What a retiming wrote to the track.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingSummary {
    /// New media time scale.
    pub time_scale: u32,
    /// New media duration, in `time_scale` units.
    pub duration: u64,
    /// Ranges as applied (resolved and reduced); empty for explicit
    /// timestamps.
    pub ranges: Vec<FpsRange>,
    /// Number of time-to-sample runs written.
    pub time_to_sample_entries: usize,
    /// Number of composition offset runs written, if the track has the table.
    pub composition_offset_entries: Option<usize>,
    /// Edit list entry written alongside composition offsets.
    pub edit: Option<EditEntry>,
}

/// Rewrites the timing of one track.
///
/// The sample table and its composition order are captured from the
/// track's current timing when the editor is created.
pub struct TimingEditor<'a, T: TrackTiming + ?Sized> {
    track: &'a mut T,
    table: SampleTimeTable,
}

impl<'a, T: TrackTiming + ?Sized> TimingEditor<'a, T> {
    /// Capture the track's current timing.
    pub fn new(track: &'a mut T) -> Result<Self> {
        let table = SampleTimeTable::from_runs(track.time_to_sample(), track.composition_offsets());
        let sample_count = track.sample_count() as usize;
        if table.len() != sample_count {
            return Err(Error::container(format!(
                "time-to-sample table covers {} samples but the track has {}",
                table.len(),
                sample_count
            )));
        }
        tracing::debug!(samples = table.len(), "Captured sample times");
        Ok(Self { track, table })
    }

    /// The sample table as last written.
    pub fn table(&self) -> &SampleTimeTable {
        &self.table
    }

    /// Play the track at constant-rate ranges.
    ///
    /// The time scale is the smallest one in which every frame duration is
    /// an integer, when that fits in 32 bits.
    pub fn set_fps(&mut self, ranges: &[FpsRange]) -> Result<TimingSummary> {
        let mut ranges = ranges.to_vec();
        resolve_ranges(&mut ranges, self.table.len())?;
        let time_scale = exact_time_scale(&mut ranges);
        tracing::debug!(time_scale, ranges = ranges.len(), "Applying fps ranges");

        let duration = self.table.apply_ranges(&ranges, time_scale)?;
        self.commit(time_scale, duration, ranges)
    }

    /// Play the track at explicit per-sample timestamps.
    pub fn set_timecodes(&mut self, stamps: &[f64], time_scale: u32) -> Result<TimingSummary> {
        tracing::debug!(time_scale, stamps = stamps.len(), "Applying timecodes");
        let duration = self.table.apply_timestamps(stamps)?;
        self.commit(time_scale, duration, Vec::new())
    }

    /// Encode the new tables, then write them and the durations to the
    /// track.
    fn commit(
        &mut self,
        time_scale: u32,
        duration: u64,
        ranges: Vec<FpsRange>,
    ) -> Result<TimingSummary> {
        let time_to_sample = encode_time_to_sample(self.table.samples())?;
        let composition = if self.track.composition_offsets().is_some() {
            let delay = self.table.shift_composition();
            Some((encode_composition_offsets(self.table.samples())?, delay))
        } else {
            None
        };

        self.track.set_time_scale(time_scale)?;
        self.track.set_media_duration(duration)?;

        let time_to_sample_entries = time_to_sample.len();
        self.track.set_time_to_sample(time_to_sample)?;

        let (composition_offset_entries, edit) = match composition {
            Some((offsets, delay)) => {
                let entries = offsets.len();
                self.track.set_composition_offsets(offsets)?;
                let edit = synchronize_edit_list(self.track, delay)?;
                (Some(entries), Some(edit))
            }
            None => (None, None),
        };

        Ok(TimingSummary {
            time_scale,
            duration,
            ranges,
            time_to_sample_entries,
            composition_offset_entries,
            edit,
        })
    }
}
