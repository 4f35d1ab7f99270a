//! Serializing the edited movie.

use super::boxes::ChunkOffsets;
use super::{Atom, AtomContent, AtomNode, AtomType};
use crate::{Error, Result};
use bytes::{BufMut, BytesMut};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

fn write_header(buf: &mut BytesMut, atom_type: AtomType, size: u64) {
    match u32::try_from(size) {
        Ok(size) => {
            buf.put_u32(size);
            buf.put_slice(&atom_type.0);
        }
        Err(_) => {
            buf.put_u32(1);
            buf.put_slice(&atom_type.0);
            buf.put_u64(size);
        }
    }
}

/// Append `node` and its descendants to `buf`.
pub fn serialize_atom(node: &AtomNode, buf: &mut BytesMut) {
    write_header(buf, node.atom_type, node.encoded_size());
    match &node.content {
        AtomContent::Children(children) => {
            for child in children {
                serialize_atom(child, buf);
            }
        }
        AtomContent::Payload(payload) => buf.put_slice(payload),
    }
}

/// Shift every `stco`/`co64` entry at or past `from` by `delta` bytes.
///
/// Returns the number of entries changed.
pub fn shift_chunk_offsets(moov: &mut AtomNode, from: u64, delta: i64) -> Result<usize> {
    let mut shifted = 0usize;
    moov.for_each_mut(&mut |node: &mut AtomNode| -> Result<()> {
        if node.atom_type != AtomType::STCO && node.atom_type != AtomType::CO64 {
            return Ok(());
        }
        let Some(payload) = node.payload() else {
            return Ok(());
        };

        let mut table = ChunkOffsets::parse(node.atom_type, payload)?;
        let mut changed = false;
        for offset in table.offsets.iter_mut().filter(|o| **o >= from) {
            *offset = offset.checked_add_signed(delta).ok_or_else(|| {
                Error::invalid_mp4(format!("chunk offset {} cannot move by {}", offset, delta))
            })?;
            shifted += 1;
            changed = true;
        }

        if changed {
            let mut buf = BytesMut::new();
            table.write(&mut buf)?;
            node.set_payload(buf.to_vec());
        }
        Ok(())
    })?;
    Ok(shifted)
}

/// Write a copy of `source` to `dest` with `moov` replaced.
///
/// Top-level atoms other than `moov` are stream-copied. Chunk offsets are
/// moved to follow the data when the new `moov` has a different size.
pub fn write_movie(
    source: &Path,
    atoms: &[Atom],
    moov_index: usize,
    moov: &AtomNode,
    dest: &Path,
) -> Result<()> {
    let old_moov = atoms
        .get(moov_index)
        .ok_or(Error::MissingAtom("moov"))?;

    let mut moov = moov.clone();
    let new_size = moov.encoded_size();
    let delta = i64::try_from(new_size)
        .ok()
        .zip(i64::try_from(old_moov.size).ok())
        .map(|(new, old)| new - old)
        .ok_or_else(|| Error::unsupported("moov size exceeds 63 bits"))?;
    if delta != 0 {
        let shifted = shift_chunk_offsets(&mut moov, old_moov.end(), delta)?;
        tracing::debug!(delta, shifted, "Moved chunk offsets after moov resize");
    }

    let mut moov_bytes = BytesMut::with_capacity(new_size as usize);
    serialize_atom(&moov, &mut moov_bytes);

    let mut input = BufReader::new(File::open(source)?);
    let mut output = BufWriter::new(File::create(dest)?);
    for (index, atom) in atoms.iter().enumerate() {
        if index == moov_index {
            output.write_all(&moov_bytes)?;
            continue;
        }
        input.seek(SeekFrom::Start(atom.offset()))?;
        let copied = io::copy(&mut (&mut input).take(atom.size), &mut output)?;
        if copied < atom.size {
            tracing::warn!(
                atom = %atom.atom_type,
                expected = atom.size,
                copied,
                "Source atom is truncated"
            );
        }
    }
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stco(offsets: &[u32]) -> AtomNode {
        let mut buf = BytesMut::new();
        buf.put_u32(0);
        buf.put_u32(offsets.len() as u32);
        for &o in offsets {
            buf.put_u32(o);
        }
        AtomNode::leaf(AtomType::STCO, buf.to_vec())
    }

    #[test]
    fn test_serialize_atom() {
        let node = AtomNode::container(
            AtomType::EDTS,
            vec![AtomNode::leaf(AtomType::ELST, vec![1, 2, 3, 4])],
        );
        let mut buf = BytesMut::new();
        serialize_atom(&node, &mut buf);

        assert_eq!(buf.len() as u64, node.encoded_size());
        assert_eq!(&buf[..8], &[0, 0, 0, 20, b'e', b'd', b't', b's']);
        assert_eq!(&buf[8..16], &[0, 0, 0, 12, b'e', b'l', b's', b't']);
        assert_eq!(&buf[16..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_shift_chunk_offsets() {
        let mut moov = AtomNode::container(
            AtomType::MOOV,
            vec![AtomNode::container(
                AtomType::STBL,
                vec![stco(&[100, 500, 900])],
            )],
        );
        let shifted = shift_chunk_offsets(&mut moov, 500, 24).unwrap();
        assert_eq!(shifted, 2);

        let payload = moov
            .find(&[AtomType::STBL, AtomType::STCO])
            .and_then(AtomNode::payload)
            .unwrap();
        let table = ChunkOffsets::parse(AtomType::STCO, payload).unwrap();
        assert_eq!(table.offsets, vec![100, 524, 924]);
    }

    #[test]
    fn test_shift_chunk_offsets_overflow() {
        let mut moov = AtomNode::container(AtomType::MOOV, vec![stco(&[u32::MAX - 4])]);
        assert!(matches!(
            shift_chunk_offsets(&mut moov, 0, 8),
            Err(Error::Unsupported(_))
        ));
    }
}
