//! Shared fixtures for integration tests.
//!
//! Provides [`Movie`], a builder for small but structurally complete MP4
//! files with one video track, and a timecode file writer.

#![allow(dead_code)]

use bytes::{BufMut, BytesMut};
use std::fs;
use std::path::{Path, PathBuf};

/// Bytes per synthetic sample.
pub const SAMPLE_SIZE: u32 = 64;

/// Movie time scale of every fixture.
pub const MOVIE_TIME_SCALE: u32 = 600;

/// Builder for a one-video-track MP4.
#[derive(Debug, Clone)]
pub struct Movie {
    /// Number of video frames.
    pub frames: u32,
    /// Media time scale of the video track.
    pub time_scale: u32,
    /// Duration of every frame, media units.
    pub frame_delta: u32,
    /// Give the track an I P B B composition pattern.
    pub reordered: bool,
    /// Put `moov` before `mdat`.
    pub moov_first: bool,
}

impl Default for Movie {
    fn default() -> Self {
        Self {
            frames: 48,
            time_scale: 12800,
            frame_delta: 512,
            reordered: false,
            moov_first: true,
        }
    }
}

fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(body.len() + 8);
    buf.put_u32(body.len() as u32 + 8);
    buf.put_slice(kind);
    buf.put_slice(body);
    buf.to_vec()
}

fn full_box(kind: &[u8; 4], write: impl FnOnce(&mut BytesMut)) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(0);
    write(&mut buf);
    atom(kind, &buf)
}

impl Movie {
    pub fn frames(mut self, frames: u32) -> Self {
        self.frames = frames;
        self
    }

    pub fn reordered(mut self) -> Self {
        self.reordered = true;
        self
    }

    pub fn moov_last(mut self) -> Self {
        self.moov_first = false;
        self
    }

    fn media_duration(&self) -> u32 {
        self.frames * self.frame_delta
    }

    fn moov(&self, chunk_offset: u32) -> Vec<u8> {
        let track_duration = (u64::from(self.media_duration()) * u64::from(MOVIE_TIME_SCALE)
            / u64::from(self.time_scale)) as u32;

        let mvhd = full_box(b"mvhd", |b| {
            b.put_u32(0);
            b.put_u32(0);
            b.put_u32(MOVIE_TIME_SCALE);
            b.put_u32(track_duration);
            b.put_u32(0x0001_0000); // rate
            b.put_u16(0x0100); // volume
            b.put_slice(&[0; 10]);
            b.put_slice(&[0; 36]); // matrix
            b.put_slice(&[0; 24]);
            b.put_u32(2); // next track id
        });
        let tkhd = full_box(b"tkhd", |b| {
            b.put_u32(0);
            b.put_u32(0);
            b.put_u32(1);
            b.put_u32(0);
            b.put_u32(track_duration);
            b.put_slice(&[0; 52]);
            b.put_u32(640 << 16);
            b.put_u32(360 << 16);
        });
        let mdhd = full_box(b"mdhd", |b| {
            b.put_u32(0);
            b.put_u32(0);
            b.put_u32(self.time_scale);
            b.put_u32(self.media_duration());
            b.put_u16(0x55c4);
            b.put_u16(0);
        });
        let hdlr = full_box(b"hdlr", |b| {
            b.put_u32(0);
            b.put_slice(b"vide");
            b.put_slice(&[0; 12]);
            b.put_slice(b"VideoHandler\0");
        });

        let mut stbl = Vec::new();
        stbl.extend(full_box(b"stsd", |b| b.put_u32(0)));
        stbl.extend(full_box(b"stts", |b| {
            b.put_u32(1);
            b.put_u32(self.frames);
            b.put_u32(self.frame_delta);
        }));
        if self.reordered {
            // I P B B: P shown after both B frames
            let pattern = [
                (1, self.frame_delta),
                (1, 3 * self.frame_delta),
                (2, 0),
            ];
            let groups = self.frames / 4;
            stbl.extend(full_box(b"ctts", |b| {
                b.put_u32(groups * 3);
                for _ in 0..groups {
                    for (count, offset) in pattern {
                        b.put_u32(count);
                        b.put_u32(offset);
                    }
                }
            }));
        }
        stbl.extend(full_box(b"stsc", |b| {
            b.put_u32(1);
            b.put_u32(1);
            b.put_u32(self.frames);
            b.put_u32(1);
        }));
        stbl.extend(full_box(b"stsz", |b| {
            b.put_u32(SAMPLE_SIZE);
            b.put_u32(self.frames);
        }));
        stbl.extend(full_box(b"stco", |b| {
            b.put_u32(1);
            b.put_u32(chunk_offset);
        }));

        let minf = atom(b"minf", &atom(b"stbl", &stbl));
        let mdia = atom(b"mdia", &[mdhd, hdlr, minf].concat());
        let trak = atom(b"trak", &[tkhd, mdia].concat());
        atom(b"moov", &[mvhd, trak].concat())
    }

    /// Sample payload bytes, distinct per sample.
    pub fn media(&self) -> Vec<u8> {
        (0..self.frames * SAMPLE_SIZE)
            .map(|i| (i / SAMPLE_SIZE + i % 7) as u8)
            .collect()
    }

    /// Serialize the movie.
    pub fn build(&self) -> Vec<u8> {
        let ftyp = atom(b"ftyp", b"isom\0\0\x02\0isomiso2avc1mp41");
        let mdat = atom(b"mdat", &self.media());

        if self.moov_first {
            let moov_len = self.moov(0).len();
            let offset = (ftyp.len() + moov_len + 8) as u32;
            [ftyp, self.moov(offset), mdat].concat()
        } else {
            let offset = (ftyp.len() + 8) as u32;
            [ftyp, mdat, self.moov(offset)].concat()
        }
    }

    /// Write the movie to `dir/name`.
    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

/// Write a timecode v2 file.
pub fn write_timecodes(dir: &Path, name: &str, stamps: &[f64]) -> PathBuf {
    let mut text = String::from("# timecode format v2\n");
    for stamp in stamps {
        text.push_str(&format!("{}\n", stamp));
    }
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}
