//! Typed codecs for the boxes the retimer reads and rewrites.
//!
//! Each codec parses a payload (the bytes after the atom header) and writes
//! it back. Version 1 layouts are chosen automatically when a value no
//! longer fits the 32-bit fields of version 0. Bytes following the fields
//! we understand are carried through untouched.

use super::AtomType;
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use mp4fpsmod_timing::{CompositionOffset, EditEntry, SampleRun, TimeToSample};

/// Seconds between 1904-01-01 (the MP4 epoch) and 1970-01-01.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Current time in seconds since the MP4 epoch.
pub fn mp4_timestamp_now() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp() + MAC_EPOCH_OFFSET).unwrap_or(0)
}

/// A box payload with a typed representation.
pub trait BoxCodec: Sized {
    /// Atom type this codec handles.
    const TYPE: AtomType;

    /// Parse a payload.
    fn parse(data: &[u8]) -> Result<Self>;

    /// Append the payload to `buf`.
    fn write(&self, buf: &mut BytesMut);

    /// Serialize the payload.
    fn to_payload(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.write(&mut buf);
        buf.to_vec()
    }
}

fn need(atom: AtomType, data: &[u8], len: usize) -> Result<()> {
    if data.len() < len {
        return Err(Error::BufferUnderflow {
            atom: atom_name(atom),
            need: len,
            have: data.len(),
        });
    }
    Ok(())
}

fn atom_name(atom: AtomType) -> &'static str {
    match atom {
        AtomType::MVHD => "mvhd",
        AtomType::TKHD => "tkhd",
        AtomType::MDHD => "mdhd",
        AtomType::STTS => "stts",
        AtomType::CTTS => "ctts",
        AtomType::ELST => "elst",
        AtomType::STSZ => "stsz",
        AtomType::STZ2 => "stz2",
        AtomType::STCO => "stco",
        AtomType::CO64 => "co64",
        _ => "atom",
    }
}

/// Version byte and 24-bit flags of a full box.
fn read_full_header(data: &mut &[u8]) -> (u8, u32) {
    let word = data.get_u32();
    ((word >> 24) as u8, word & 0x00ff_ffff)
}

fn write_full_header(buf: &mut BytesMut, version: u8, flags: u32) {
    buf.put_u32((u32::from(version) << 24) | (flags & 0x00ff_ffff));
}

/// Entry count of a table box, checked against the payload length.
fn read_entry_count(atom: AtomType, data: &mut &[u8], entry_size: usize) -> Result<usize> {
    need(atom, *data, 4)?;
    let count = data.get_u32() as usize;
    let bytes = count
        .checked_mul(entry_size)
        .ok_or_else(|| Error::invalid_mp4(format!("{} entry count {} too large", atom, count)))?;
    need(atom, *data, bytes)?;
    Ok(count)
}

fn fits_u32(value: u64) -> bool {
    value <= u64::from(u32::MAX)
}

/// Creation/modification times, time scale and duration shared by the
/// `mvhd` and `mdhd` layouts.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TimedHeader {
    version: u8,
    flags: u32,
    creation_time: u64,
    modification_time: u64,
    time_scale: u32,
    duration: u64,
    rest: Vec<u8>,
}

impl TimedHeader {
    fn parse(atom: AtomType, data: &[u8]) -> Result<Self> {
        let mut data = data;
        need(atom, data, 4)?;
        let (version, flags) = read_full_header(&mut data);
        let (creation_time, modification_time, time_scale, duration) = if version == 1 {
            need(atom, data, 28)?;
            (data.get_u64(), data.get_u64(), data.get_u32(), data.get_u64())
        } else {
            need(atom, data, 16)?;
            (
                u64::from(data.get_u32()),
                u64::from(data.get_u32()),
                data.get_u32(),
                u64::from(data.get_u32()),
            )
        };
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            time_scale,
            duration,
            rest: data.to_vec(),
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        let long = self.version == 1
            || !fits_u32(self.creation_time)
            || !fits_u32(self.modification_time)
            || !fits_u32(self.duration);
        if long {
            write_full_header(buf, 1, self.flags);
            buf.put_u64(self.creation_time);
            buf.put_u64(self.modification_time);
            buf.put_u32(self.time_scale);
            buf.put_u64(self.duration);
        } else {
            write_full_header(buf, 0, self.flags);
            buf.put_u32(self.creation_time as u32);
            buf.put_u32(self.modification_time as u32);
            buf.put_u32(self.time_scale);
            buf.put_u32(self.duration as u32);
        }
        buf.put_slice(&self.rest);
    }
}

/// Movie header (`mvhd`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieHeader(TimedHeader);

impl MovieHeader {
    /// Movie time scale, units per second.
    pub fn time_scale(&self) -> u32 {
        self.0.time_scale
    }

    /// Movie duration in movie time-scale units.
    pub fn duration(&self) -> u64 {
        self.0.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.0.duration = duration;
    }

    pub fn modification_time(&self) -> u64 {
        self.0.modification_time
    }

    pub fn set_modification_time(&mut self, time: u64) {
        self.0.modification_time = time;
    }
}

impl BoxCodec for MovieHeader {
    const TYPE: AtomType = AtomType::MVHD;

    fn parse(data: &[u8]) -> Result<Self> {
        TimedHeader::parse(Self::TYPE, data).map(Self)
    }

    fn write(&self, buf: &mut BytesMut) {
        self.0.write(buf)
    }
}

/// Media header (`mdhd`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHeader(TimedHeader);

impl MediaHeader {
    /// Media time scale, units per second.
    pub fn time_scale(&self) -> u32 {
        self.0.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: u32) {
        self.0.time_scale = time_scale;
    }

    /// Media duration in media time-scale units.
    pub fn duration(&self) -> u64 {
        self.0.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.0.duration = duration;
    }

    pub fn modification_time(&self) -> u64 {
        self.0.modification_time
    }

    pub fn set_modification_time(&mut self, time: u64) {
        self.0.modification_time = time;
    }
}

impl BoxCodec for MediaHeader {
    const TYPE: AtomType = AtomType::MDHD;

    fn parse(data: &[u8]) -> Result<Self> {
        TimedHeader::parse(Self::TYPE, data).map(Self)
    }

    fn write(&self, buf: &mut BytesMut) {
        self.0.write(buf)
    }
}

/// Track header (`tkhd`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackHeader {
    version: u8,
    flags: u32,
    creation_time: u64,
    modification_time: u64,
    pub track_id: u32,
    reserved: u32,
    duration: u64,
    rest: Vec<u8>,
}

impl TrackHeader {
    /// Track duration in movie time-scale units.
    pub fn duration(&self) -> u64 {
        self.duration
    }

    pub fn set_duration(&mut self, duration: u64) {
        self.duration = duration;
    }

    pub fn modification_time(&self) -> u64 {
        self.modification_time
    }

    pub fn set_modification_time(&mut self, time: u64) {
        self.modification_time = time;
    }
}

impl BoxCodec for TrackHeader {
    const TYPE: AtomType = AtomType::TKHD;

    fn parse(data: &[u8]) -> Result<Self> {
        let mut data = data;
        need(Self::TYPE, data, 4)?;
        let (version, flags) = read_full_header(&mut data);
        let (creation_time, modification_time, track_id, reserved, duration) = if version == 1 {
            need(Self::TYPE, data, 32)?;
            (
                data.get_u64(),
                data.get_u64(),
                data.get_u32(),
                data.get_u32(),
                data.get_u64(),
            )
        } else {
            need(Self::TYPE, data, 20)?;
            (
                u64::from(data.get_u32()),
                u64::from(data.get_u32()),
                data.get_u32(),
                data.get_u32(),
                u64::from(data.get_u32()),
            )
        };
        Ok(Self {
            version,
            flags,
            creation_time,
            modification_time,
            track_id,
            reserved,
            duration,
            rest: data.to_vec(),
        })
    }

    fn write(&self, buf: &mut BytesMut) {
        let long = self.version == 1
            || !fits_u32(self.creation_time)
            || !fits_u32(self.modification_time)
            || !fits_u32(self.duration);
        if long {
            write_full_header(buf, 1, self.flags);
            buf.put_u64(self.creation_time);
            buf.put_u64(self.modification_time);
            buf.put_u32(self.track_id);
            buf.put_u32(self.reserved);
            buf.put_u64(self.duration);
        } else {
            write_full_header(buf, 0, self.flags);
            buf.put_u32(self.creation_time as u32);
            buf.put_u32(self.modification_time as u32);
            buf.put_u32(self.track_id);
            buf.put_u32(self.reserved);
            buf.put_u32(self.duration as u32);
        }
        buf.put_slice(&self.rest);
    }
}

/// Decoding time to sample (`stts`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeToSampleBox {
    pub entries: Vec<TimeToSample>,
}

impl BoxCodec for TimeToSampleBox {
    const TYPE: AtomType = AtomType::STTS;

    fn parse(data: &[u8]) -> Result<Self> {
        let mut data = data;
        need(Self::TYPE, data, 4)?;
        read_full_header(&mut data);
        let count = read_entry_count(Self::TYPE, &mut data, 8)?;
        let entries = (0..count)
            .map(|_| SampleRun::new(data.get_u32(), data.get_u32()))
            .collect();
        Ok(Self { entries })
    }

    fn write(&self, buf: &mut BytesMut) {
        write_full_header(buf, 0, 0);
        buf.put_u32(self.entries.len() as u32);
        for entry in &self.entries {
            buf.put_u32(entry.count);
            buf.put_u32(entry.value);
        }
    }
}

/// Composition time to sample (`ctts`).
///
/// Version 0 stores offsets as unsigned, version 1 as signed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompositionOffsetBox {
    pub version: u8,
    pub entries: Vec<CompositionOffset>,
}

impl BoxCodec for CompositionOffsetBox {
    const TYPE: AtomType = AtomType::CTTS;

    fn parse(data: &[u8]) -> Result<Self> {
        let mut data = data;
        need(Self::TYPE, data, 4)?;
        let (version, _) = read_full_header(&mut data);
        let count = read_entry_count(Self::TYPE, &mut data, 8)?;
        let entries = (0..count)
            .map(|_| {
                let sample_count = data.get_u32();
                let offset = if version == 0 {
                    // Unsigned in the file; offsets past i32::MAX do not occur in practice.
                    data.get_u32() as i32
                } else {
                    data.get_i32()
                };
                SampleRun::new(sample_count, offset)
            })
            .collect();
        Ok(Self { version, entries })
    }

    fn write(&self, buf: &mut BytesMut) {
        let version = if self.entries.iter().any(|e| e.value < 0) {
            1
        } else {
            self.version
        };
        write_full_header(buf, version, 0);
        buf.put_u32(self.entries.len() as u32);
        for entry in &self.entries {
            buf.put_u32(entry.count);
            buf.put_i32(entry.value);
        }
    }
}

/// Edit list (`elst`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditListBox {
    pub version: u8,
    pub entries: Vec<EditEntry>,
}

impl EditListBox {
    /// An edit list holding one entry.
    pub fn single(entry: EditEntry) -> Self {
        Self {
            version: 0,
            entries: vec![entry],
        }
    }
}

impl BoxCodec for EditListBox {
    const TYPE: AtomType = AtomType::ELST;

    fn parse(data: &[u8]) -> Result<Self> {
        let mut data = data;
        need(Self::TYPE, data, 4)?;
        let (version, _) = read_full_header(&mut data);
        let entry_size = if version == 1 { 20 } else { 12 };
        let count = read_entry_count(Self::TYPE, &mut data, entry_size)?;
        let entries = (0..count)
            .map(|_| {
                let (segment_duration, media_time) = if version == 1 {
                    (data.get_u64(), data.get_i64())
                } else {
                    (u64::from(data.get_u32()), i64::from(data.get_i32()))
                };
                EditEntry {
                    segment_duration,
                    media_time,
                    media_rate: data.get_i32(),
                }
            })
            .collect();
        Ok(Self { version, entries })
    }

    fn write(&self, buf: &mut BytesMut) {
        let long = self.version == 1
            || self.entries.iter().any(|e| {
                !fits_u32(e.segment_duration) || i32::try_from(e.media_time).is_err()
            });
        write_full_header(buf, u8::from(long), 0);
        buf.put_u32(self.entries.len() as u32);
        for entry in &self.entries {
            if long {
                buf.put_u64(entry.segment_duration);
                buf.put_i64(entry.media_time);
            } else {
                buf.put_u32(entry.segment_duration as u32);
                buf.put_i32(entry.media_time as i32);
            }
            buf.put_i32(entry.media_rate);
        }
    }
}

/// Sample count from an `stsz` or `stz2` payload.
///
/// Both layouts keep the count at bytes 8..12.
pub fn sample_count(atom: AtomType, data: &[u8]) -> Result<u32> {
    need(atom, data, 12)?;
    let mut count = &data[8..12];
    Ok(count.get_u32())
}

/// Chunk offsets (`stco` or `co64`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkOffsets {
    /// Whether offsets are 64-bit (`co64`).
    pub large: bool,
    pub offsets: Vec<u64>,
}

impl ChunkOffsets {
    /// Parse an `stco` or `co64` payload.
    pub fn parse(atom: AtomType, data: &[u8]) -> Result<Self> {
        let large = atom == AtomType::CO64;
        let mut data = data;
        need(atom, data, 4)?;
        read_full_header(&mut data);
        let count = read_entry_count(atom, &mut data, if large { 8 } else { 4 })?;
        let offsets = (0..count)
            .map(|_| {
                if large {
                    data.get_u64()
                } else {
                    u64::from(data.get_u32())
                }
            })
            .collect();
        Ok(Self { large, offsets })
    }

    /// Append the payload to `buf`.
    ///
    /// Fails if a 32-bit table holds an offset past 4 GiB.
    pub fn write(&self, buf: &mut BytesMut) -> Result<()> {
        write_full_header(buf, 0, 0);
        buf.put_u32(self.offsets.len() as u32);
        for &offset in &self.offsets {
            if self.large {
                buf.put_u64(offset);
            } else {
                let offset = u32::try_from(offset).map_err(|_| {
                    Error::unsupported(format!(
                        "chunk offset {} does not fit in stco; the file would need co64",
                        offset
                    ))
                })?;
                buf.put_u32(offset);
            }
        }
        Ok(())
    }
}
