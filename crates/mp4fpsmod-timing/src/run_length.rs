//! Run-length timing tables.
//!
//! Both `stts` (time-to-sample) and `ctts` (composition offsets) store a
//! per-sample value sequence as `(count, value)` pairs over maximal constant
//! runs.

use crate::sample_time::SampleTime;
use crate::{Error, Result};

/// `count` consecutive samples sharing `value`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRun<T> {
    pub count: u32,
    pub value: T,
}

impl<T> SampleRun<T> {
    pub const fn new(count: u32, value: T) -> Self {
        Self { count, value }
    }
}

/// Time-to-sample run: `count` samples of duration `value`.
pub type TimeToSample = SampleRun<u32>;

/// Composition offset run: `count` samples presented `value` after decode.
pub type CompositionOffset = SampleRun<i32>;

/// Total number of samples covered by `runs`.
pub fn total_samples<T>(runs: &[SampleRun<T>]) -> usize {
    runs.iter().map(|r| r.count as usize).sum()
}

/// Expand runs back into one value per sample.
pub fn expand<T: Copy>(runs: &[SampleRun<T>]) -> impl Iterator<Item = T> + '_ {
    runs.iter()
        .flat_map(|r| std::iter::repeat(r.value).take(r.count as usize))
}

fn push_value<T: PartialEq>(runs: &mut Vec<SampleRun<T>>, value: T) {
    match runs.last_mut() {
        Some(last) if last.value == value => last.count += 1,
        _ => runs.push(SampleRun::new(1, value)),
    }
}

/// Encode decode-time deltas as time-to-sample runs.
///
/// The table stores one delta per sample but only `n - 1` differences exist;
/// the last sample reuses the duration of the one before it, so the final
/// run is one longer than the number of deltas it covers. A lone sample is
/// encoded as a single zero-duration run.
pub fn encode_time_to_sample(samples: &[SampleTime]) -> Result<Vec<TimeToSample>> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let mut runs: Vec<TimeToSample> = Vec::new();
    for (i, pair) in samples.windows(2).enumerate() {
        let (prev, dts) = (pair[0].dts, pair[1].dts);
        let delta = dts.checked_sub(prev).ok_or(Error::NonMonotonic {
            index: i + 1,
            previous: prev,
            current: dts,
        })?;
        let delta = u32::try_from(delta).map_err(|_| Error::DeltaOverflow {
            index: i + 1,
            delta,
        })?;
        push_value(&mut runs, delta);
    }

    match runs.last_mut() {
        Some(last) => last.count += 1,
        None => runs.push(SampleRun::new(1, 0)),
    }
    Ok(runs)
}

/// Encode composition offsets as composition offset runs.
///
/// Offsets must already be non-negative (see
/// [`SampleTimeTable::shift_composition`](crate::SampleTimeTable::shift_composition)).
pub fn encode_composition_offsets(samples: &[SampleTime]) -> Result<Vec<CompositionOffset>> {
    let mut runs: Vec<CompositionOffset> = Vec::new();
    for (index, sample) in samples.iter().enumerate() {
        let offset = i32::try_from(sample.cts_offset)
            .ok()
            .filter(|o| *o >= 0)
            .ok_or(Error::OffsetOverflow {
                index,
                offset: sample.cts_offset,
            })?;
        push_value(&mut runs, offset);
    }
    Ok(runs)
}
