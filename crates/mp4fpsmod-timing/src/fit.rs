//! Fitting timecodes to exact broadcast frame rates.

use crate::rate::{FpsRange, Rate};
use crate::{Error, Result};

/// Maximum relative deviation (2^-11) between a delta and a catalog frame
/// duration for the delta to count as that rate.
pub const FIT_TOLERANCE: f64 = 0.000_488_281_25;

#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    rate: Rate,
    frame_duration: f64,
}

/// The well-known rates timecodes are matched against.
///
/// The most recently matched entry is kept in front so runs of one rate
/// resolve on the first comparison.
#[derive(Debug, Clone)]
pub struct RateCatalog {
    entries: Vec<CatalogEntry>,
}

impl RateCatalog {
    /// Rates recognised by [`fit_exact_ranges`], in initial search order.
    pub const RATES: [Rate; 5] = [
        Rate::NTSC_FILM,
        Rate::PAL,
        Rate::NTSC,
        Rate::PAL_HIGH,
        Rate::NTSC_HIGH,
    ];

    /// Catalog with frame durations expressed in `time_scale` units.
    pub fn new(time_scale: u32) -> Self {
        let entries = Self::RATES
            .iter()
            .map(|&rate| CatalogEntry {
                rate,
                frame_duration: f64::from(rate.den) / f64::from(rate.num) * f64::from(time_scale),
            })
            .collect();
        Self { entries }
    }

    /// Current search order.
    pub fn rates(&self) -> impl Iterator<Item = Rate> + '_ {
        self.entries.iter().map(|e| e.rate)
    }

    /// Position of the first entry within tolerance of `delta`.
    fn position(&self, delta: f64) -> Option<usize> {
        if delta <= 0.0 || delta.is_nan() {
            return None;
        }
        self.entries
            .iter()
            .position(|e| (delta - e.frame_duration).abs() / delta < FIT_TOLERANCE)
    }

    /// Swap the entry at `index` into the front slot.
    fn promote(&mut self, index: usize) {
        if index != 0 {
            self.entries.swap(0, index);
        }
    }

    /// Match `delta` against the catalog, promoting the hit.
    pub fn match_delta(&mut self, delta: f64) -> Option<Rate> {
        let index = self.position(delta)?;
        let rate = self.entries[index].rate;
        self.promote(index);
        Some(rate)
    }
}

/// Re-express timestamps as constant-rate ranges of catalog rates.
///
/// Consecutive deltas matching the same rate extend one range. The closing
/// frame has no delta of its own, so the last range is extended by one after
/// the scan and the range total equals `stamps.len()`.
///
/// Fails with [`Error::ExactFitUnavailable`] if any delta matches no rate, or
/// if there are fewer than two timestamps.
pub fn fit_exact_ranges(stamps: &[f64], time_scale: u32) -> Result<Vec<FpsRange>> {
    let mut catalog = RateCatalog::new(time_scale);
    let mut ranges: Vec<FpsRange> = Vec::new();

    for (index, pair) in stamps.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        let rate = catalog
            .match_delta(delta)
            .ok_or(Error::ExactFitUnavailable { index, delta })?;

        match ranges.last_mut() {
            Some(last) if last.rate == rate => last.num_frames += 1,
            _ => ranges.push(FpsRange::new(1, rate)),
        }
    }

    let Some(last) = ranges.last_mut() else {
        return Err(Error::ExactFitUnavailable {
            index: 0,
            delta: 0.0,
        });
    };
    last.num_frames += 1;

    tracing::debug!(ranges = ranges.len(), "Converted timecodes to exact fps ranges");
    Ok(ranges)
}
