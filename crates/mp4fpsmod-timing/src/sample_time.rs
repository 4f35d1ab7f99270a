//! Per-sample decode/composition timestamps.

use crate::rate::{checked_lcm, FpsRange};
use crate::run_length::{CompositionOffset, TimeToSample};
use crate::{Error, Result};

/// Time scale used when no exact common scale fits in 32 bits.
pub const DEFAULT_TIME_SCALE: u32 = 1000;

/// Timing of one sample, in track time-scale units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleTime {
    /// Decode timestamp.
    pub dts: u64,
    /// Composition (presentation) timestamp.
    pub cts: u64,
    /// `cts - dts`, refreshed by [`SampleTimeTable::shift_composition`].
    pub cts_offset: i64,
}

/// Timestamps of every sample in decode order, plus the frozen composition
/// order.
///
/// `composition_order[k]` is the decode index of the sample presented
/// `k`-th. It is computed once from the source timing; retiming assigns new
/// values but never reorders frames.
#[derive(Debug, Clone, Default)]
pub struct SampleTimeTable {
    samples: Vec<SampleTime>,
    composition_order: Vec<usize>,
}

impl SampleTimeTable {
    /// Build from existing samples, deriving the composition order by
    /// sorting on (cts, dts).
    pub fn new(samples: Vec<SampleTime>) -> Self {
        let mut composition_order: Vec<usize> = (0..samples.len()).collect();
        composition_order.sort_by_key(|&i| (samples[i].cts, samples[i].dts));

        let table = Self {
            samples,
            composition_order,
        };
        table.debug_check();
        table
    }

    /// Build from a track's time-to-sample and composition offset runs.
    ///
    /// Offset runs covering fewer samples leave the rest at offset 0; extra
    /// runs are ignored.
    pub fn from_runs(
        time_to_sample: &[TimeToSample],
        composition_offsets: Option<&[CompositionOffset]>,
    ) -> Self {
        let mut samples = Vec::new();
        let mut dts = 0u64;
        for run in time_to_sample {
            for _ in 0..run.count {
                samples.push(SampleTime {
                    dts,
                    cts: dts,
                    cts_offset: 0,
                });
                dts += u64::from(run.value);
            }
        }

        if let Some(runs) = composition_offsets {
            let offsets = runs
                .iter()
                .flat_map(|r| std::iter::repeat(r.value).take(r.count as usize));
            for (sample, offset) in samples.iter_mut().zip(offsets) {
                sample.cts_offset = i64::from(offset);
                sample.cts = sample.dts.saturating_add_signed(sample.cts_offset);
            }
        }

        Self::new(samples)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples in decode order.
    pub fn samples(&self) -> &[SampleTime] {
        &self.samples
    }

    /// Decode indices in presentation order.
    pub fn composition_order(&self) -> &[usize] {
        &self.composition_order
    }

    fn debug_check(&self) {
        debug_assert_eq!(self.samples.len(), self.composition_order.len());
    }

    /// Assign sample `frame` the timestamp `t`: its decode time, and the
    /// composition time of the frame presented at position `frame`.
    fn assign(&mut self, frame: usize, t: u64) {
        self.samples[frame].dts = t;
        let presented = self.composition_order[frame];
        self.samples[presented].cts = t;
    }

    /// Fill the table from constant-rate ranges.
    ///
    /// Ranges must already be resolved (see [`resolve_ranges`]) and cover
    /// the table exactly. Returns the total duration: the running offset
    /// after the last frame.
    pub fn apply_ranges(&mut self, ranges: &[FpsRange], time_scale: u32) -> Result<u64> {
        let total: usize = ranges.iter().map(|r| r.num_frames as usize).sum();
        if total != self.len() {
            return Err(Error::FrameCountMismatch {
                expected: self.len(),
                actual: total,
            });
        }

        let mut offset = 0.0f64;
        let mut frame = 0usize;
        for range in ranges {
            let delta = range.rate.frame_duration(time_scale);
            for _ in 0..range.num_frames {
                self.assign(frame, offset as u64);
                offset += delta;
                frame += 1;
            }
        }

        self.debug_check();
        Ok(offset as u64)
    }

    /// Fill the table from one timestamp per sample.
    ///
    /// Timestamps are truncated to integers. Returns the total duration: the
    /// last decode timestamp.
    pub fn apply_timestamps(&mut self, stamps: &[f64]) -> Result<u64> {
        if stamps.len() != self.len() {
            return Err(Error::TimecodeCountMismatch {
                expected: self.len(),
                actual: stamps.len(),
            });
        }

        let mut last = 0u64;
        for (frame, &stamp) in stamps.iter().enumerate() {
            last = stamp as u64;
            self.assign(frame, last);
        }

        self.debug_check();
        Ok(last)
    }

    /// Delay every composition time so no sample is presented before it is
    /// decoded, and refresh each `cts_offset`.
    ///
    /// Returns the delay, `max(dts - cts)` over all samples (never negative).
    pub fn shift_composition(&mut self) -> u64 {
        let max_diff = self
            .samples
            .iter()
            .map(|s| s.dts as i64 - s.cts as i64)
            .fold(0i64, i64::max);

        for sample in &mut self.samples {
            sample.cts += max_diff as u64;
            sample.cts_offset = sample.cts as i64 - sample.dts as i64;
        }

        self.debug_check();
        max_diff as u64
    }
}

/// Resolve the "remaining frames" range and check the total.
///
/// A range with `num_frames == 0` takes `sample_count` minus the sum of all
/// other ranges (floored at 0). At most one such range is allowed.
pub fn resolve_ranges(ranges: &mut [FpsRange], sample_count: usize) -> Result<()> {
    let open: Vec<usize> = ranges
        .iter()
        .enumerate()
        .filter(|(_, r)| r.num_frames == 0)
        .map(|(i, _)| i)
        .collect();
    if open.len() > 1 {
        return Err(Error::InvalidRange(
            "only one range may use 0 frames (the remaining frames)".to_string(),
        ));
    }

    let fixed: usize = ranges.iter().map(|r| r.num_frames as usize).sum();
    if let Some(&i) = open.first() {
        let rest = sample_count.saturating_sub(fixed);
        ranges[i].num_frames = u32::try_from(rest).map_err(|_| Error::FrameCountMismatch {
            expected: sample_count,
            actual: fixed,
        })?;
    }

    let total: usize = ranges.iter().map(|r| r.num_frames as usize).sum();
    if total != sample_count {
        return Err(Error::FrameCountMismatch {
            expected: sample_count,
            actual: total,
        });
    }
    Ok(())
}

/// Reduce every rate and find a time scale in which all frame durations
/// are integers.
///
/// That is the least common multiple of the reduced numerators; if it
/// overflows 32 bits, [`DEFAULT_TIME_SCALE`] is used instead.
pub fn exact_time_scale(ranges: &mut [FpsRange]) -> u32 {
    let mut time_scale = 1u32;
    let mut exact = true;
    for range in ranges.iter_mut() {
        range.rate = range.rate.reduced();
        match checked_lcm(range.rate.num, time_scale) {
            Some(lcm) if lcm != 0 => time_scale = lcm,
            _ => {
                exact = false;
                break;
            }
        }
    }

    if exact {
        time_scale
    } else {
        tracing::warn!(
            "No exact common time scale fits in 32 bits, using {}",
            DEFAULT_TIME_SCALE
        );
        DEFAULT_TIME_SCALE
    }
}
