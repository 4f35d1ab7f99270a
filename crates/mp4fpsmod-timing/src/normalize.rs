//! Timecode denoising.
//!
//! Millisecond timecodes written by capture tools jitter by one unit around
//! the true frame duration (41, 42, 42, 41, ... for 23.976 fps). Clustering
//! the deltas into homogeneous runs and replacing each run by its mean
//! recovers the underlying rate.

/// Summary of one cluster of inter-frame deltas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeltaGroup {
    /// Number of deltas (frames) in the group.
    pub len: usize,
    /// Mean delta of the group.
    pub mean: f64,
}

/// Split a sequence into groups of adjacent values lying within `[n, n + 1]`.
///
/// `1, 2, 1, 1, 2, 3, 2, 3, 3, 2, 1, 1, 2` becomes
/// `(1, 2, 1, 1, 2), (3, 2, 3, 3, 2), (1, 1, 2)`.
///
/// A group opens with the window `[v - 1, v + 1]` around its first value and
/// narrows to the two distinct values it actually sees.
pub fn group_adjacent(values: &[i64]) -> Vec<Vec<i64>> {
    let mut groups: Vec<Vec<i64>> = Vec::new();
    let mut window: Option<(i64, i64)> = None;

    for &value in values {
        match (window, groups.last_mut()) {
            (Some((low, high)), Some(group)) if low <= value && value <= high => {
                if let Some(&prev) = group.last() {
                    if prev != value && high - low == 2 {
                        window = Some((prev.min(value), prev.max(value)));
                    }
                }
                group.push(value);
            }
            _ => {
                window = Some((value - 1, value + 1));
                groups.push(vec![value]);
            }
        }
    }

    groups
}

/// Replace jittery timestamps by per-group average deltas.
///
/// Deltas are truncated to integers before clustering. Returns the rebuilt
/// timestamps (starting at 0, same length as the input) together with the
/// grouping summary.
pub fn normalize_timecodes(stamps: &[f64]) -> (Vec<f64>, Vec<DeltaGroup>) {
    let deltas: Vec<i64> = stamps.windows(2).map(|w| (w[1] - w[0]) as i64).collect();

    let groups: Vec<DeltaGroup> = group_adjacent(&deltas)
        .iter()
        .map(|group| {
            let sum: i64 = group.iter().sum();
            DeltaGroup {
                len: group.len(),
                mean: sum as f64 / group.len() as f64,
            }
        })
        .collect();

    let mut normalized = Vec::with_capacity(stamps.len().max(1));
    normalized.push(0.0);
    let mut current = 0.0;
    for group in &groups {
        for _ in 0..group.len {
            current += group.mean;
            normalized.push(current);
        }
    }

    tracing::debug!(
        groups = groups.len(),
        frames = normalized.len(),
        "Normalized timecodes"
    );

    (normalized, groups)
}
