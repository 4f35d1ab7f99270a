//! Round-trip tests against synthetic MP4 files.

use bytes::{BufMut, BytesMut};
use mp4fpsmod_media::mp4::boxes::{BoxCodec, ChunkOffsets, EditListBox, MovieHeader};
use mp4fpsmod_media::mp4::AtomType;
use mp4fpsmod_media::{Error, Mp4File};
use mp4fpsmod_timing::{FpsRange, Rate, SampleRun, TimingEditor, TrackTiming};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAMPLE_SIZE: u32 = 100;

fn atom(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(body.len() as u32 + 8);
    buf.put_slice(kind);
    buf.put_slice(body);
    buf.to_vec()
}

fn concat(parts: &[Vec<u8>]) -> Vec<u8> {
    parts.concat()
}

fn full(version_flags: u32, body: impl FnOnce(&mut BytesMut)) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(version_flags);
    body(&mut buf);
    buf.to_vec()
}

fn tkhd(track_id: u32, duration: u32) -> Vec<u8> {
    atom(
        b"tkhd",
        &full(3, |b| {
            b.put_u32(0);
            b.put_u32(0);
            b.put_u32(track_id);
            b.put_u32(0);
            b.put_u32(duration);
            b.put_slice(&[0; 60]);
        }),
    )
}

fn mdhd(time_scale: u32, duration: u32) -> Vec<u8> {
    atom(
        b"mdhd",
        &full(0, |b| {
            b.put_u32(0);
            b.put_u32(0);
            b.put_u32(time_scale);
            b.put_u32(duration);
            b.put_u16(0x55c4);
            b.put_u16(0);
        }),
    )
}

fn hdlr(handler: &[u8; 4]) -> Vec<u8> {
    atom(
        b"hdlr",
        &full(0, |b| {
            b.put_u32(0);
            b.put_slice(handler);
            b.put_slice(&[0; 12]);
            b.put_slice(b"Handler\0");
        }),
    )
}

/// Movie with an audio track followed by an 8-frame I P B B video track
/// (12800 units/s, 512 per frame), `moov` before `mdat`.
fn build_movie(with_video: bool) -> Vec<u8> {
    let frames = 8u32;
    let ftyp = atom(b"ftyp", b"isom\0\0\x02\0isomavc1");

    let moov_for = |chunk_offset: u32| {
        let mvhd = atom(
            b"mvhd",
            &full(0, |b| {
                b.put_u32(0);
                b.put_u32(0);
                b.put_u32(600);
                b.put_u32(300);
                b.put_slice(&[0; 80]);
            }),
        );

        let audio = atom(
            b"trak",
            &concat(&[
                tkhd(2, 300),
                atom(
                    b"mdia",
                    &concat(&[mdhd(48000, 24000), hdlr(b"soun"), atom(b"minf", &[])]),
                ),
            ]),
        );

        let stts = atom(
            b"stts",
            &full(0, |b| {
                b.put_u32(1);
                b.put_u32(frames);
                b.put_u32(512);
            }),
        );
        let ctts = atom(
            b"ctts",
            &full(0, |b| {
                b.put_u32(6);
                for _ in 0..2 {
                    for (count, offset) in [(1, 512), (1, 1536), (2, 0)] {
                        b.put_u32(count);
                        b.put_u32(offset);
                    }
                }
            }),
        );
        let stsz = atom(
            b"stsz",
            &full(0, |b| {
                b.put_u32(SAMPLE_SIZE);
                b.put_u32(frames);
            }),
        );
        let stco = atom(
            b"stco",
            &full(0, |b| {
                b.put_u32(1);
                b.put_u32(chunk_offset);
            }),
        );
        let stbl = atom(b"stbl", &concat(&[stts, ctts, stsz, stco]));
        let video = atom(
            b"trak",
            &concat(&[
                tkhd(1, 240),
                atom(
                    b"mdia",
                    &concat(&[
                        mdhd(12800, frames * 512),
                        hdlr(if with_video { b"vide" } else { b"text" }),
                        atom(b"minf", &stbl),
                    ]),
                ),
            ]),
        );

        atom(b"moov", &concat(&[mvhd, audio, video]))
    };

    let moov_len = moov_for(0).len();
    let chunk_offset = (ftyp.len() + moov_len + 8) as u32;
    let moov = moov_for(chunk_offset);

    let media: Vec<u8> = (0..frames * SAMPLE_SIZE).map(|i| (i % 251) as u8).collect();
    concat(&[ftyp, moov, atom(b"mdat", &media)])
}

fn write_movie(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, bytes).unwrap();
    path
}

fn chunk_offset(file: &Mp4File) -> u64 {
    let trak = file
        .moov()
        .children()
        .iter()
        .filter(|c| c.atom_type == AtomType::TRAK)
        .nth(1)
        .unwrap();
    let payload = trak
        .find(&[AtomType::MDIA, AtomType::MINF, AtomType::STBL, AtomType::STCO])
        .and_then(|n| n.payload())
        .unwrap();
    ChunkOffsets::parse(AtomType::STCO, payload).unwrap().offsets[0]
}

fn media_at(path: &Path, offset: u64) -> Vec<u8> {
    let bytes = fs::read(path).unwrap();
    let start = offset as usize;
    bytes[start..start + (8 * SAMPLE_SIZE) as usize].to_vec()
}

#[test]
fn test_open_reads_video_track() {
    let dir = TempDir::new().unwrap();
    let src = write_movie(&dir, "in.mp4", &build_movie(true));

    let file = Mp4File::open(&src).unwrap();
    assert_eq!(file.time_scale(), 600);
    assert_eq!(file.atoms().len(), 3);

    let track = file.video_track().unwrap();
    assert_eq!(track.track_id(), 1);
    assert_eq!(track.sample_count(), 8);
    assert_eq!(track.time_scale(), 12800);
    assert_eq!(track.time_to_sample(), &[SampleRun::new(8, 512)]);
    assert_eq!(track.composition_offsets().map(|c| c.len()), Some(6));
    assert_eq!(track.track_duration(), 240);
    assert!(track.edit().is_none());
}

#[test]
fn test_retime_and_save() {
    let dir = TempDir::new().unwrap();
    let src = write_movie(&dir, "in.mp4", &build_movie(true));
    let dst = dir.path().join("out.mp4");

    let mut file = Mp4File::open(&src).unwrap();
    let original_offset = chunk_offset(&file);
    let mut track = file.video_track().unwrap();

    let summary = TimingEditor::new(&mut track)
        .unwrap()
        .set_fps(&[FpsRange::new(0, Rate::NTSC_FILM)])
        .unwrap();
    assert_eq!(summary.time_scale, 24000);
    assert_eq!(summary.duration, 8 * 1001);

    file.commit(&track).unwrap();
    file.save_to(&dst).unwrap();

    let out = Mp4File::open(&dst).unwrap();
    let edited = out.video_track().unwrap();
    assert_eq!(edited.time_scale(), 24000);
    assert_eq!(edited.media_duration(), 8008);
    assert_eq!(edited.time_to_sample(), &[SampleRun::new(8, 1001)]);
    assert_eq!(
        edited.composition_offsets().unwrap(),
        &[
            SampleRun::new(1, 1001),
            SampleRun::new(1, 3003),
            SampleRun::new(2, 0),
            SampleRun::new(1, 1001),
            SampleRun::new(1, 3003),
            SampleRun::new(2, 0),
        ]
    );

    // 8008 / 24000 s in a 600 units/s movie
    assert_eq!(edited.track_duration(), 200);
    let edit = edited.edit().unwrap();
    assert_eq!(edit.media_time, 1001);
    assert_eq!(edit.segment_duration, 200);

    // audio track is longer, so the movie keeps its duration
    let mvhd = out
        .moov()
        .child(AtomType::MVHD)
        .and_then(|n| n.payload())
        .unwrap();
    assert_eq!(MovieHeader::parse(mvhd).unwrap().duration(), 300);

    // new edts (8) + elst (8 + 4 + 4 + 12) moved mdat by 36 bytes
    let new_offset = chunk_offset(&out);
    assert_eq!(new_offset, original_offset + 36);
    assert_eq!(media_at(&dst, new_offset), media_at(&src, original_offset));
}

#[test]
fn test_edit_list_is_inserted_after_tkhd() {
    let dir = TempDir::new().unwrap();
    let src = write_movie(&dir, "in.mp4", &build_movie(true));
    let dst = dir.path().join("out.mp4");

    let mut file = Mp4File::open(&src).unwrap();
    let mut track = file.video_track().unwrap();
    TimingEditor::new(&mut track)
        .unwrap()
        .set_fps(&[FpsRange::new(8, Rate::PAL)])
        .unwrap();
    file.commit(&track).unwrap();
    file.save_to(&dst).unwrap();

    let out = Mp4File::open(&dst).unwrap();
    let trak = &out.moov().children()[track.trak_index()];
    let order: Vec<AtomType> = trak.children().iter().map(|c| c.atom_type).collect();
    assert_eq!(order, vec![AtomType::TKHD, AtomType::EDTS, AtomType::MDIA]);

    let elst = trak
        .find(&[AtomType::EDTS, AtomType::ELST])
        .and_then(|n| n.payload())
        .unwrap();
    let elst = EditListBox::parse(elst).unwrap();
    assert_eq!(elst.entries.len(), 1);
    assert_eq!(elst.entries[0].media_time, 1);
}

#[test]
fn test_modification_time_is_stamped() {
    let dir = TempDir::new().unwrap();
    let src = write_movie(&dir, "in.mp4", &build_movie(true));
    let dst = dir.path().join("out.mp4");

    let mut file = Mp4File::open(&src).unwrap();
    let mut track = file.video_track().unwrap();
    TimingEditor::new(&mut track)
        .unwrap()
        .set_timecodes(&[0.0, 40.0, 80.0, 120.0, 160.0, 200.0, 240.0, 280.0], 1000)
        .unwrap();
    file.commit(&track).unwrap();
    file.save_to(&dst).unwrap();

    let out = Mp4File::open(&dst).unwrap();
    let trak = &out.moov().children()[track.trak_index()];
    let tkhd = trak.child(AtomType::TKHD).and_then(|n| n.payload()).unwrap();
    let modified = u32::from_be_bytes([tkhd[8], tkhd[9], tkhd[10], tkhd[11]]);
    // 2020-01-01 in MP4 epoch seconds
    assert!(u64::from(modified) > 3_660_681_600);
}

#[test]
fn test_no_video_track() {
    let dir = TempDir::new().unwrap();
    let src = write_movie(&dir, "in.mp4", &build_movie(false));
    let file = Mp4File::open(&src).unwrap();
    assert!(matches!(file.video_track(), Err(Error::NoVideoTrack)));
}

#[test]
fn test_missing_moov() {
    let dir = TempDir::new().unwrap();
    let bytes = concat(&[atom(b"ftyp", b"isom\0\0\0\0"), atom(b"mdat", &[0; 16])]);
    let src = write_movie(&dir, "in.mp4", &bytes);
    assert!(matches!(
        Mp4File::open(&src),
        Err(Error::MissingAtom("moov"))
    ));
}

#[test]
fn test_refuses_to_overwrite_source() {
    let dir = TempDir::new().unwrap();
    let bytes = build_movie(true);
    let src = write_movie(&dir, "in.mp4", &bytes);

    let file = Mp4File::open(&src).unwrap();
    assert!(matches!(
        file.save_to(&src),
        Err(Error::SameSourceAndDestination)
    ));
    assert_eq!(fs::read(&src).unwrap(), bytes);
}

#[test]
fn test_unedited_save_is_identical() {
    let dir = TempDir::new().unwrap();
    let bytes = build_movie(true);
    let src = write_movie(&dir, "in.mp4", &bytes);
    let dst = dir.path().join("copy.mp4");

    Mp4File::open(&src).unwrap().save_to(&dst).unwrap();
    assert_eq!(fs::read(&dst).unwrap(), bytes);
}
