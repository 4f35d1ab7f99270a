//! Timecode (v2 format) ingestion.
//!
//! A timecode file lists one presentation timestamp per frame, in
//! milliseconds, optionally fractional:
//!
//! ```text
//! # timecode format v2
//! 0
//! 41.708
//! 83.417
//! ```

use crate::normalize::{normalize_timecodes, DeltaGroup};
use crate::{Error, Result};
use std::io::BufRead;

/// Time scale of raw timecode stamps (milliseconds).
pub const TIMECODE_TIME_SCALE: u32 = 1000;

/// Timestamps ready to be applied to a track.
#[derive(Debug, Clone)]
pub struct Timecodes {
    /// One timestamp per frame, in `time_scale` units.
    pub stamps: Vec<f64>,
    /// Units per second of `stamps`.
    pub time_scale: u32,
    /// Whether any input line contained a decimal point.
    pub fractional: bool,
    /// Grouping summary when the stamps were normalized.
    pub groups: Option<Vec<DeltaGroup>>,
}

impl Timecodes {
    /// Number of timestamps.
    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    /// Whether there are no timestamps.
    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

/// Parse timecode text.
///
/// Lines starting with `#` are comments. The first number on every other
/// line is a timestamp; lines without one are skipped and do not count as
/// frames. With `normalize`, integer input is denoised (see
/// [`normalize_timecodes`]). Fractional or normalized input is then rescaled
/// to an integer time scale (see [`scale_factor`]).
pub fn parse_timecodes<R: BufRead>(mut reader: R, normalize: bool) -> Result<Timecodes> {
    let mut stamps = Vec::new();
    let mut fractional = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        if line.starts_with('#') {
            continue;
        }
        if line.contains('.') {
            fractional = true;
        }
        if let Some(stamp) = leading_float(&line) {
            stamps.push(stamp);
        }
    }

    if stamps.is_empty() {
        return Err(Error::EmptyInput);
    }
    tracing::debug!(count = stamps.len(), fractional, "Parsed timecodes");

    let mut timecodes = Timecodes {
        stamps,
        time_scale: TIMECODE_TIME_SCALE,
        fractional,
        groups: None,
    };

    if normalize && !fractional {
        let (normalized, groups) = normalize_timecodes(&timecodes.stamps);
        timecodes.stamps = normalized;
        timecodes.groups = Some(groups);
    }

    let n = timecodes.stamps.len();
    if (normalize || fractional) && n > 1 {
        let last = timecodes.stamps[n - 1];
        let delta = last - timecodes.stamps[n - 2];
        let scale = scale_factor(last + delta);

        let time_scale = u64::from(timecodes.time_scale)
            .checked_mul(scale)
            .ok_or(Error::TimeScaleOverflow(u64::MAX))?;
        timecodes.time_scale =
            u32::try_from(time_scale).map_err(|_| Error::TimeScaleOverflow(time_scale))?;

        let factor = scale as f64;
        for stamp in &mut timecodes.stamps {
            *stamp *= factor;
        }
        tracing::debug!(scale, time_scale = timecodes.time_scale, "Rescaled timecodes");
    }

    Ok(timecodes)
}

/// Power-of-ten multiplier that keeps `duration` within 31 bits.
///
/// Searches for the smallest power of ten (starting at 10) not below
/// `0x7fffffff / duration`, then steps back one power.
pub fn scale_factor(duration: f64) -> u64 {
    let scale_max = (f64::from(0x7fff_ffff_u32) / duration).max(0.0) as u64;
    let mut scale: u64 = 10;
    while scale < scale_max {
        match scale.checked_mul(10) {
            Some(next) => scale = next,
            None => break,
        }
    }
    scale / 10
}

/// Leading floating-point number of a line, after optional whitespace.
///
/// Accepts `[+-]digits[.digits][(e|E)[+-]digits]` as well as `.5` style
/// input; trailing text is ignored.
pub(crate) fn leading_float(line: &str) -> Option<f64> {
    let s = line.trim_start();
    let bytes = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let int_end = digits_from(end);
    let mut mantissa_digits = int_end - end;
    end = int_end;

    if bytes.get(end) == Some(&b'.') {
        let frac_end = digits_from(end + 1);
        mantissa_digits += frac_end - (end + 1);
        end = frac_end;
    }
    if mantissa_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_end = digits_from(exp);
        if exp_end > exp {
            end = exp_end;
        }
    }

    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str, normalize: bool) -> Result<Timecodes> {
        parse_timecodes(Cursor::new(text.as_bytes()), normalize)
    }

    #[test]
    fn test_leading_float() {
        assert_eq!(leading_float("42"), Some(42.0));
        assert_eq!(leading_float("  41.708\n"), Some(41.708));
        assert_eq!(leading_float("-3.5 trailing"), Some(-3.5));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("7."), Some(7.0));
        assert_eq!(leading_float("1e3"), Some(1000.0));
        assert_eq!(leading_float("2e"), Some(2.0));
        assert_eq!(leading_float("abc"), None);
        assert_eq!(leading_float(""), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_float("-"), None);
    }

    #[test]
    fn test_scale_factor() {
        // 10 minutes in ms: 0x7fffffff / 600000 = 3579 -> 10000 / 10
        assert_eq!(scale_factor(600_000.0), 1000);
        assert_eq!(scale_factor(1.0), 1_000_000_000);
        // huge durations never scale below 1
        assert_eq!(scale_factor(1e12), 1);
        assert_eq!(scale_factor(-5.0), 1);
    }

    #[test]
    fn test_parse_integer_input_keeps_millis() {
        let tc = parse("# timecode format v2\n0\n40\n80\n", false).unwrap();
        assert_eq!(tc.stamps, vec![0.0, 40.0, 80.0]);
        assert_eq!(tc.time_scale, TIMECODE_TIME_SCALE);
        assert!(!tc.fractional);
        assert!(tc.groups.is_none());
    }

    #[test]
    fn test_parse_skips_comments_and_garbage() {
        let tc = parse("# header\n0\n\nnot a number\n40\n# 999\n80\n", false).unwrap();
        assert_eq!(tc.len(), 3);
    }

    #[test]
    fn test_parse_empty_input() {
        assert!(matches!(parse("# only a comment\n\n", false), Err(Error::EmptyInput)));
        assert!(matches!(parse("", true), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_parse_fractional_rescales() {
        let tc = parse("0\n41.708\n1000000.5\n", false).unwrap();
        assert!(tc.fractional);
        // duration estimate ~2e6 ms -> 0x7fffffff / 2e6 = 1073 -> 10000 / 10
        assert_eq!(tc.time_scale, 1_000_000);
        assert_eq!(tc.stamps, vec![0.0, 41.708 * 1000.0, 1000000.5 * 1000.0]);
    }

    #[test]
    fn test_parse_fractional_short_input_overflows() {
        // ~125 ms needs a 10^7 multiplier, which overflows 32 bits
        assert!(matches!(
            parse("0\n41.708\n83.417\n", false),
            Err(Error::TimeScaleOverflow(10_000_000_000))
        ));
    }

    #[test]
    fn test_parse_fractional_detects_dot_in_skipped_line() {
        let tc = parse("0\n.\n40\n", false).unwrap();
        assert!(tc.fractional);
        assert_eq!(tc.len(), 2);
    }

    #[test]
    fn test_parse_single_fractional_stamp_not_scaled() {
        let tc = parse("0.5\n", false).unwrap();
        assert_eq!(tc.stamps, vec![0.5]);
        assert_eq!(tc.time_scale, TIMECODE_TIME_SCALE);
    }

    #[test]
    fn test_parse_normalize_integer_input() {
        let tc = parse("0\n41\n83\n125\n166\n208\n250\n", true).unwrap();
        let groups = tc.groups.as_ref().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len, 6);

        // ~292 ms -> 0x7fffffff / 292 = 7.3e6 -> 10^7 / 10
        assert_eq!(tc.time_scale, 1_000_000_000);
        assert_eq!(tc.len(), 7);
        assert_eq!(tc.stamps[0], 0.0);
        assert!((tc.stamps[6] - 250e6).abs() < 1e-3);
    }

    #[test]
    fn test_parse_normalize_skipped_for_fractional() {
        let tc = parse("0\n41.5\n1000000\n", true).unwrap();
        assert!(tc.groups.is_none());
        assert_eq!(tc.time_scale, 1_000_000);
    }
}
