//! MP4 container editing.
//!
//! Only the `moov` atom is held in memory. Media data stays in the source
//! file and is copied through when the edited movie is saved.

mod atoms;
pub mod boxes;
mod reader;
mod track;
mod writer;

pub use atoms::{Atom, AtomContent, AtomNode, AtomType, HandlerType};
pub use reader::Mp4Reader;
pub use track::VideoTrack;
pub use writer::{serialize_atom, shift_chunk_offsets};

use crate::{Error, Result};
use boxes::{mp4_timestamp_now, BoxCodec, MovieHeader, TrackHeader};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// An MP4 file opened for timing edits.
#[derive(Debug)]
pub struct Mp4File {
    path: PathBuf,
    atoms: Vec<Atom>,
    moov_index: usize,
    moov: AtomNode,
    movie_header: MovieHeader,
}

impl Mp4File {
    /// Index the file at `path` and load its `moov`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mut reader = Mp4Reader::new(BufReader::new(file))?;

        let atoms = reader.top_level_atoms()?;
        let moov_index = atoms
            .iter()
            .position(|a| a.atom_type == AtomType::MOOV)
            .ok_or(Error::MissingAtom("moov"))?;
        let moov = reader.read_tree(&atoms[moov_index])?;

        let mvhd = moov
            .child(AtomType::MVHD)
            .and_then(AtomNode::payload)
            .ok_or(Error::MissingAtom("mvhd"))?;
        let movie_header = MovieHeader::parse(mvhd)?;

        tracing::debug!(
            path = %path.display(),
            atoms = atoms.len(),
            moov_offset = atoms[moov_index].offset(),
            moov_size = atoms[moov_index].size,
            time_scale = movie_header.time_scale(),
            "Loaded movie"
        );

        Ok(Self {
            path,
            atoms,
            moov_index,
            moov,
            movie_header,
        })
    }

    /// Path the movie was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Top-level atoms of the source file.
    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    /// The in-memory `moov` tree.
    pub fn moov(&self) -> &AtomNode {
        &self.moov
    }

    /// Movie time scale, units per second.
    pub fn time_scale(&self) -> u32 {
        self.movie_header.time_scale()
    }

    /// Movie duration in movie time-scale units.
    pub fn duration(&self) -> u64 {
        self.movie_header.duration()
    }

    /// The first track whose handler is `vide`.
    pub fn video_track(&self) -> Result<VideoTrack> {
        let (index, trak) = self
            .moov
            .children()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.atom_type == AtomType::TRAK)
            .find(|(_, trak)| {
                trak.find(&[AtomType::MDIA, AtomType::HDLR])
                    .and_then(AtomNode::payload)
                    .and_then(HandlerType::from_hdlr)
                    .is_some_and(|h| h.is_video())
            })
            .ok_or(Error::NoVideoTrack)?;
        VideoTrack::from_trak(index, trak, self.time_scale())
    }

    /// Write an edited track back into the `moov` tree.
    ///
    /// Track and media headers are stamped with the current time and the
    /// movie duration becomes the longest track duration.
    pub fn commit(&mut self, track: &VideoTrack) -> Result<()> {
        let mut track = track.clone();
        track.set_modification_time(mp4_timestamp_now());

        let trak = self
            .moov
            .children_mut()
            .and_then(|c| c.get_mut(track.trak_index()))
            .filter(|t| t.atom_type == AtomType::TRAK)
            .ok_or_else(|| Error::invalid_mp4("edited track no longer matches a trak"))?;
        track.write_into(trak)?;

        let mut duration = 0u64;
        for trak in self.moov.children().iter().filter(|c| c.atom_type == AtomType::TRAK) {
            if let Some(tkhd) = trak.child(AtomType::TKHD).and_then(AtomNode::payload) {
                duration = duration.max(TrackHeader::parse(tkhd)?.duration());
            }
        }
        self.movie_header.set_duration(duration);
        self.moov
            .child_mut(AtomType::MVHD)
            .ok_or(Error::MissingAtom("mvhd"))?
            .set_payload(self.movie_header.to_payload());

        tracing::debug!(
            track_id = track.track_id(),
            movie_duration = duration,
            "Committed track timing"
        );
        Ok(())
    }

    /// Save the movie, as edited so far, to `dest`.
    ///
    /// `dest` must not be the source file.
    pub fn save_to<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let dest = dest.as_ref();
        if dest.exists() && dest.canonicalize()? == self.path.canonicalize()? {
            return Err(Error::SameSourceAndDestination);
        }
        writer::write_movie(&self.path, &self.atoms, self.moov_index, &self.moov, dest)
    }
}
