//! Timing view of a video track.

use super::boxes::{
    sample_count, BoxCodec, CompositionOffsetBox, EditListBox, MediaHeader, TimeToSampleBox,
    TrackHeader,
};
use super::{AtomNode, AtomType};
use crate::{Error, Result};
use mp4fpsmod_timing::{CompositionOffset, EditEntry, TimeToSample, TrackTiming};

const STBL_PATH: [AtomType; 3] = [AtomType::MDIA, AtomType::MINF, AtomType::STBL];

/// Payload of a required leaf atom.
fn required<'a>(node: Option<&'a AtomNode>, name: &'static str) -> Result<&'a [u8]> {
    node.and_then(AtomNode::payload)
        .ok_or(Error::MissingAtom(name))
}

/// Timing boxes of one `trak`, detached from the atom tree for editing.
///
/// Changes are written back with
/// [`Mp4File::commit`](super::Mp4File::commit).
#[derive(Debug, Clone)]
pub struct VideoTrack {
    trak_index: usize,
    movie_time_scale: u32,
    sample_count: u32,
    track_header: TrackHeader,
    media_header: MediaHeader,
    time_to_sample: TimeToSampleBox,
    composition_offsets: Option<CompositionOffsetBox>,
    edit_list: Option<EditListBox>,
}

impl VideoTrack {
    /// Decode the timing boxes of `trak`, the `trak_index`-th child of
    /// `moov`.
    pub fn from_trak(trak_index: usize, trak: &AtomNode, movie_time_scale: u32) -> Result<Self> {
        let track_header = TrackHeader::parse(required(trak.child(AtomType::TKHD), "tkhd")?)?;
        let media_header = MediaHeader::parse(required(
            trak.find(&[AtomType::MDIA, AtomType::MDHD]),
            "mdhd",
        )?)?;

        let stbl = trak.find(&STBL_PATH).ok_or(Error::MissingAtom("stbl"))?;
        let time_to_sample = TimeToSampleBox::parse(required(stbl.child(AtomType::STTS), "stts")?)?;
        let composition_offsets = stbl
            .child(AtomType::CTTS)
            .and_then(AtomNode::payload)
            .map(CompositionOffsetBox::parse)
            .transpose()?;

        let sample_count = match (stbl.child(AtomType::STSZ), stbl.child(AtomType::STZ2)) {
            (Some(stsz), _) => sample_count(AtomType::STSZ, required(Some(stsz), "stsz")?)?,
            (None, Some(stz2)) => sample_count(AtomType::STZ2, required(Some(stz2), "stz2")?)?,
            (None, None) => return Err(Error::MissingAtom("stsz")),
        };

        let edit_list = trak
            .find(&[AtomType::EDTS, AtomType::ELST])
            .and_then(AtomNode::payload)
            .map(EditListBox::parse)
            .transpose()?;

        tracing::debug!(
            track_id = track_header.track_id,
            samples = sample_count,
            time_scale = media_header.time_scale(),
            stts_entries = time_to_sample.entries.len(),
            has_ctts = composition_offsets.is_some(),
            has_elst = edit_list.is_some(),
            "Loaded video track"
        );

        Ok(Self {
            trak_index,
            movie_time_scale,
            sample_count,
            track_header,
            media_header,
            time_to_sample,
            composition_offsets,
            edit_list,
        })
    }

    /// Position of the `trak` among the children of `moov`.
    pub fn trak_index(&self) -> usize {
        self.trak_index
    }

    pub fn track_id(&self) -> u32 {
        self.track_header.track_id
    }

    /// Media duration in media time-scale units.
    pub fn media_duration(&self) -> u64 {
        self.media_header.duration()
    }

    /// Stamp the track and media headers as modified at `time` (MP4 epoch
    /// seconds).
    pub fn set_modification_time(&mut self, time: u64) {
        self.track_header.set_modification_time(time);
        self.media_header.set_modification_time(time);
    }

    /// Write the timing boxes back into `trak`.
    pub fn write_into(&self, trak: &mut AtomNode) -> Result<()> {
        trak.child_mut(AtomType::TKHD)
            .ok_or(Error::MissingAtom("tkhd"))?
            .set_payload(self.track_header.to_payload());
        trak.find_mut(&[AtomType::MDIA, AtomType::MDHD])
            .ok_or(Error::MissingAtom("mdhd"))?
            .set_payload(self.media_header.to_payload());

        let stbl = trak.find_mut(&STBL_PATH).ok_or(Error::MissingAtom("stbl"))?;
        stbl.child_mut(AtomType::STTS)
            .ok_or(Error::MissingAtom("stts"))?
            .set_payload(self.time_to_sample.to_payload());
        if let Some(ctts) = &self.composition_offsets {
            let payload = ctts.to_payload();
            match stbl.child_mut(AtomType::CTTS) {
                Some(node) => node.set_payload(payload),
                None => stbl.insert_child_after(
                    AtomType::STTS,
                    AtomNode::leaf(AtomType::CTTS, payload),
                ),
            }
        }

        if let Some(elst) = &self.edit_list {
            let payload = elst.to_payload();
            match trak.find_mut(&[AtomType::EDTS, AtomType::ELST]) {
                Some(node) => node.set_payload(payload),
                None => match trak.child_mut(AtomType::EDTS) {
                    Some(edts) => edts
                        .children_mut()
                        .ok_or_else(|| Error::invalid_mp4("edts is not a container"))?
                        .insert(0, AtomNode::leaf(AtomType::ELST, payload)),
                    None => trak.insert_child_after(
                        AtomType::TKHD,
                        AtomNode::container(
                            AtomType::EDTS,
                            vec![AtomNode::leaf(AtomType::ELST, payload)],
                        ),
                    ),
                },
            }
        }
        Ok(())
    }
}

impl TrackTiming for VideoTrack {
    fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn time_to_sample(&self) -> &[TimeToSample] {
        &self.time_to_sample.entries
    }

    fn composition_offsets(&self) -> Option<&[CompositionOffset]> {
        self.composition_offsets.as_ref().map(|c| c.entries.as_slice())
    }

    fn set_time_to_sample(&mut self, runs: Vec<TimeToSample>) -> mp4fpsmod_timing::Result<()> {
        self.time_to_sample.entries = runs;
        Ok(())
    }

    fn set_composition_offsets(
        &mut self,
        runs: Vec<CompositionOffset>,
    ) -> mp4fpsmod_timing::Result<()> {
        match &mut self.composition_offsets {
            Some(ctts) => ctts.entries = runs,
            None => {
                self.composition_offsets = Some(CompositionOffsetBox {
                    version: 0,
                    entries: runs,
                })
            }
        }
        Ok(())
    }

    fn time_scale(&self) -> u32 {
        self.media_header.time_scale()
    }

    fn set_time_scale(&mut self, time_scale: u32) -> mp4fpsmod_timing::Result<()> {
        if time_scale == 0 {
            return Err(Error::invalid_mp4("media time scale must be positive").into());
        }
        self.media_header.set_time_scale(time_scale);
        Ok(())
    }

    /// Also rescales the `tkhd` duration into the movie time scale.
    fn set_media_duration(&mut self, duration: u64) -> mp4fpsmod_timing::Result<()> {
        self.media_header.set_duration(duration);

        let media_scale = u128::from(self.media_header.time_scale().max(1));
        let track_duration =
            u128::from(duration) * u128::from(self.movie_time_scale) / media_scale;
        let track_duration = u64::try_from(track_duration).map_err(|_| {
            Error::unsupported(format!("track duration {} exceeds 64 bits", track_duration))
        })?;
        self.track_header.set_duration(track_duration);
        Ok(())
    }

    fn track_duration(&self) -> u64 {
        self.track_header.duration()
    }

    fn edit(&self) -> Option<EditEntry> {
        self.edit_list.as_ref()?.entries.first().copied()
    }

    fn add_edit(&mut self) -> mp4fpsmod_timing::Result<EditEntry> {
        let edit = EditEntry::full_track(self.track_duration());
        self.edit_list = Some(EditListBox::single(edit));
        tracing::debug!(track_id = self.track_id(), "Created edit list");
        Ok(edit)
    }

    fn set_edit(&mut self, edit: EditEntry) -> mp4fpsmod_timing::Result<()> {
        match &mut self.edit_list {
            Some(list) if !list.entries.is_empty() => list.entries[0] = edit,
            _ => self.edit_list = Some(EditListBox::single(edit)),
        }
        Ok(())
    }
}
