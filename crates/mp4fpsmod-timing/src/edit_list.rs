//! Keeping the edit list in step with composition offsets.

use crate::track::{EditEntry, TrackTiming};
use crate::Result;

/// Point the track's edit at the first presented frame.
///
/// Shifting composition offsets by `initial_delay` delays every frame;
/// starting the edit at that media time removes the delay again. The edit
/// spans the whole track. A track without an edit list gets one.
pub fn synchronize_edit_list<T: TrackTiming + ?Sized>(
    track: &mut T,
    initial_delay: u64,
) -> Result<EditEntry> {
    let current = match track.edit() {
        Some(edit) => edit,
        None => track.add_edit()?,
    };

    let edit = EditEntry {
        segment_duration: track.track_duration(),
        media_time: i64::try_from(initial_delay).unwrap_or(i64::MAX),
        ..current
    };
    track.set_edit(edit)?;

    tracing::debug!(
        media_time = edit.media_time,
        duration = edit.segment_duration,
        "Updated edit list"
    );
    Ok(edit)
}
