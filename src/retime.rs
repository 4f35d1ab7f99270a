//! Retiming an MP4 file end to end.
//!
//! Reads the source movie, applies either constant-rate ranges or a timecode
//! file to its first video track, and saves the result to a new file.

use anyhow::{Context, Result};
use mp4fpsmod_media::Mp4File;
use mp4fpsmod_timing::{
    fit_exact_ranges, parse_timecodes, DeltaGroup, FpsRange, TimingEditor, TimingSummary,
    Timecodes, TrackTiming,
};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

/// Invalid combination of command-line options.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("no destination given (-o DEST)")]
    MissingDestination,

    #[error("no source file given")]
    MissingSource,

    #[error("give fps ranges (-r) or a timecode file (-t)")]
    MissingSchedule,
}

/// Whether `err` comes from how the tool was invoked rather than from the
/// movie or the timecode data.
pub fn is_usage_error(err: &anyhow::Error) -> bool {
    use mp4fpsmod_timing::Error as TimingError;

    err.downcast_ref::<UsageError>().is_some()
        || matches!(
            err.downcast_ref::<TimingError>(),
            Some(TimingError::InvalidRange(_) | TimingError::InvalidRate(_))
        )
}

/// What to retime and how.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Source movie.
    pub source: Option<PathBuf>,
    /// Output movie; must differ from the source.
    pub destination: Option<PathBuf>,
    /// Constant-rate ranges; take precedence over the timecode file.
    pub ranges: Vec<FpsRange>,
    /// Timecode v2 file.
    pub timecode_file: Option<PathBuf>,
    /// Normalize timecodes and try to fit exact rates.
    pub normalize: bool,
}

impl Options {
    /// Check the usage rules.
    pub fn validate(&self) -> std::result::Result<(), UsageError> {
        self.paths()?;
        if self.ranges.is_empty() && self.timecode_file.is_none() {
            return Err(UsageError::MissingSchedule);
        }
        Ok(())
    }

    fn paths(&self) -> std::result::Result<(&Path, &Path), UsageError> {
        let destination = self
            .destination
            .as_deref()
            .ok_or(UsageError::MissingDestination)?;
        let source = self.source.as_deref().ok_or(UsageError::MissingSource)?;
        Ok((source, destination))
    }
}

/// Outcome of a retiming run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetimeReport {
    /// Delta groups found while normalizing timecodes.
    pub groups: Option<Vec<DeltaGroup>>,
    /// Exact-rate ranges recognized in the timecodes.
    pub fitted_ranges: Option<Vec<FpsRange>>,
    /// Media time scale written to the track.
    pub time_scale: u32,
    /// Media duration written to the track.
    pub duration: u64,
    /// Number of samples in the video track.
    pub sample_count: u32,
    /// Number of `stts` entries written.
    pub time_to_sample_entries: usize,
    /// Number of `ctts` entries written, if the track has composition offsets.
    pub composition_offset_entries: Option<usize>,
    /// Composition delay moved into the edit list.
    pub initial_delay: Option<u64>,
}

impl RetimeReport {
    fn new(summary: TimingSummary, sample_count: u32) -> Self {
        Self {
            groups: None,
            fitted_ranges: None,
            time_scale: summary.time_scale,
            duration: summary.duration,
            sample_count,
            time_to_sample_entries: summary.time_to_sample_entries,
            composition_offset_entries: summary.composition_offset_entries,
            initial_delay: summary
                .edit
                .and_then(|e| u64::try_from(e.media_time).ok()),
        }
    }

    /// Print the grouping and fitting summaries.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        if let Some(groups) = &self.groups {
            writeln!(
                out,
                "\nDivided into {} group{}",
                groups.len(),
                if groups.len() == 1 { "" } else { "s" }
            )?;
            for group in groups {
                writeln!(
                    out,
                    "{} frames: time delta {}",
                    group.len,
                    format_general(group.mean)
                )?;
            }
        }
        if let Some(ranges) = &self.fitted_ranges {
            writeln!(out, "\nConverted to exact fps ranges")?;
            for range in ranges {
                writeln!(out, "{}", range)?;
            }
        }
        Ok(())
    }
}

/// Format like C's `%g`: six significant digits, trailing zeros dropped.
///
/// The notation is chosen from the exponent after rounding, so 999999.7
/// becomes `1e+06`.
fn format_general(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }

    let scientific = format!("{:.5e}", value);
    let (mantissa, exp) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exp.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{}e{}{:02}", trim_fraction(mantissa), sign, exponent.abs());
    }

    let decimals = (5 - exponent).max(0) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

fn load_timecodes(path: &Path, normalize: bool) -> Result<Timecodes> {
    let file = File::open(path).context("Can't open timecode file")?;
    let timecodes = parse_timecodes(BufReader::new(file), normalize)?;
    tracing::debug!(
        path = %path.display(),
        count = timecodes.len(),
        time_scale = timecodes.time_scale,
        "Loaded timecodes"
    );
    Ok(timecodes)
}

/// Apply the ranges, or the timecode file, to the track behind `editor`.
///
/// Normalized timecodes that fit exact rates are applied as ranges;
/// otherwise the timestamps are used as given.
fn apply_schedule<T: TrackTiming + ?Sized>(
    editor: &mut TimingEditor<'_, T>,
    options: &Options,
    sample_count: u32,
) -> Result<RetimeReport> {
    if !options.ranges.is_empty() {
        if options.timecode_file.is_some() {
            tracing::warn!("Both fps ranges and a timecode file given; using the ranges");
        }
        return Ok(RetimeReport::new(editor.set_fps(&options.ranges)?, sample_count));
    }

    let path = options
        .timecode_file
        .as_deref()
        .ok_or(UsageError::MissingSchedule)?;
    let timecodes = load_timecodes(path, options.normalize)?;

    let fitted = if options.normalize {
        match fit_exact_ranges(&timecodes.stamps, timecodes.time_scale) {
            Ok(ranges) => Some(ranges),
            Err(err) if err.is_fit_unavailable() => {
                tracing::warn!("{}; keeping the timecodes as given", err);
                None
            }
            Err(err) => return Err(err.into()),
        }
    } else {
        None
    };

    let summary = match &fitted {
        Some(ranges) => editor.set_fps(ranges)?,
        None => editor.set_timecodes(&timecodes.stamps, timecodes.time_scale)?,
    };
    Ok(RetimeReport {
        groups: timecodes.groups,
        fitted_ranges: fitted,
        ..RetimeReport::new(summary, sample_count)
    })
}

/// Retime the first video track of `options.source` into
/// `options.destination`.
pub fn retime(options: &Options) -> Result<RetimeReport> {
    options.validate()?;
    let (source, destination) = options.paths()?;

    tracing::info!("Reading MP4 stream...");
    let mut file = Mp4File::open(source)
        .with_context(|| format!("Failed to read {}", source.display()))?;
    tracing::info!("Done reading");

    let mut track = file.video_track()?;
    let sample_count = track.sample_count();
    let report = {
        let mut editor = TimingEditor::new(&mut track)?;
        apply_schedule(&mut editor, options, sample_count)?
    };

    file.commit(&track)?;
    tracing::info!("Saving MP4 stream...");
    file.save_to(destination)
        .with_context(|| format!("Failed to write {}", destination.display()))?;
    tracing::info!("Operation completed with no problem");

    Ok(report)
}
