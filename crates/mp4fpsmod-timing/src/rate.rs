//! Frame rates and constant-rate frame ranges.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Greatest common divisor.
pub fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

/// Least common multiple, or `None` if it does not fit in 32 bits.
pub fn checked_lcm(a: u32, b: u32) -> Option<u32> {
    let g = gcd(a, b);
    if g == 0 {
        return Some(0);
    }
    b.checked_mul(a / g)
}

/// A frame rate expressed as `num / den` frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rate {
    pub num: u32,
    pub den: u32,
}

impl Rate {
    pub const NTSC_FILM: Self = Self::new(24000, 1001);
    pub const PAL: Self = Self::new(25, 1);
    pub const NTSC: Self = Self::new(30000, 1001);
    pub const PAL_HIGH: Self = Self::new(50, 1);
    pub const NTSC_HIGH: Self = Self::new(60000, 1001);

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Reduce to lowest terms.
    pub fn reduced(self) -> Self {
        let g = gcd(self.num, self.den);
        if g == 0 {
            return self;
        }
        Self::new(self.num / g, self.den / g)
    }

    /// Duration of one frame in `time_scale` units.
    pub fn frame_duration(self, time_scale: u32) -> f64 {
        f64::from(time_scale) / f64::from(self.num) * f64::from(self.den)
    }

    /// Frames per second as a float.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl FromStr for Rate {
    type Err = Error;

    /// Parse `NUM` or `NUM/DEN`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidRate(s.to_string());
        let (num, den) = match s.split_once('/') {
            Some((num, den)) => (num.trim(), den.trim()),
            None => (s.trim(), "1"),
        };
        let num: u32 = num.parse().map_err(|_| invalid())?;
        let den: u32 = den.parse().map_err(|_| invalid())?;
        if num == 0 || den == 0 {
            return Err(invalid());
        }
        Ok(Self::new(num, den))
    }
}

/// A run of consecutive frames played at one constant rate.
///
/// `num_frames == 0` means "all remaining frames"; at most one range in a
/// sequence may use it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsRange {
    pub num_frames: u32,
    pub rate: Rate,
}

impl FpsRange {
    pub const fn new(num_frames: u32, rate: Rate) -> Self {
        Self { num_frames, rate }
    }
}

impl fmt::Display for FpsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames: fps {}", self.num_frames, self.rate)
    }
}

impl FromStr for FpsRange {
    type Err = Error;

    /// Parse `NFRAMES:FPS`, where FPS is `NUM` or `NUM/DEN`.
    fn from_str(s: &str) -> Result<Self> {
        let (frames, rate) = s
            .split_once(':')
            .ok_or_else(|| Error::InvalidRange(s.to_string()))?;
        let num_frames: u32 = frames
            .trim()
            .parse()
            .map_err(|_| Error::InvalidRange(s.to_string()))?;
        Ok(Self::new(num_frames, rate.parse()?))
    }
}
