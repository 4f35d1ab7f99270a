//! MP4 file reader with atom parsing.

use super::{Atom, AtomNode, AtomType};
use crate::{Error, Result};
use std::io::{Read, Seek, SeekFrom};

/// Maximum allowed atom data size (64 MB) to prevent OOM on malformed files.
const MAX_ATOM_DATA_SIZE: u64 = 64 * 1024 * 1024;

/// Deepest container nesting accepted inside `moov`.
const MAX_DEPTH: usize = 16;

/// MP4 file reader.
pub struct Mp4Reader<R> {
    reader: R,
    file_size: u64,
}

impl<R: Read + Seek> Mp4Reader<R> {
    /// Create a new MP4 reader.
    pub fn new(mut reader: R) -> Result<Self> {
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, file_size })
    }

    /// Size of the underlying file.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Index the top-level atoms of the file.
    pub fn top_level_atoms(&mut self) -> Result<Vec<Atom>> {
        self.read_atoms(0, self.file_size, false)
    }

    /// Load an atom and everything below it into memory.
    pub fn read_tree(&mut self, atom: &Atom) -> Result<AtomNode> {
        self.read_node(atom, 0)
    }

    fn read_node(&mut self, atom: &Atom, depth: usize) -> Result<AtomNode> {
        if !atom.atom_type.is_container() {
            let data = self.read_atom_data(atom)?;
            return Ok(AtomNode::leaf(atom.atom_type, data));
        }
        if depth >= MAX_DEPTH {
            return Err(Error::invalid_mp4(format!(
                "Atom {} nested deeper than {} levels",
                atom.atom_type, MAX_DEPTH
            )));
        }

        let children = self.read_atoms(atom.data_offset, atom.end(), true)?;
        let mut nodes = Vec::with_capacity(children.len());
        for child in &children {
            nodes.push(self.read_node(child, depth + 1)?);
        }
        Ok(AtomNode::container(atom.atom_type, nodes))
    }

    /// Read atoms at the given level.
    ///
    /// With `within`, every atom must end inside `end`. Otherwise the last
    /// atom may claim more bytes than remain, as a truncated top-level
    /// `mdat` does.
    fn read_atoms(&mut self, start: u64, end: u64, within: bool) -> Result<Vec<Atom>> {
        let mut atoms = Vec::new();
        let mut pos = start;

        while pos < end && end - pos >= 8 {
            self.reader.seek(SeekFrom::Start(pos))?;

            // Read atom header
            let mut header = [0u8; 8];
            if self.reader.read_exact(&mut header).is_err() {
                break;
            }

            let size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
            let atom_type = AtomType::from_bytes([header[4], header[5], header[6], header[7]]);

            let (actual_size, header_size) = if size == 1 {
                // 64-bit extended size
                let mut ext = [0u8; 8];
                self.reader.read_exact(&mut ext)?;
                (u64::from_be_bytes(ext), 16u8)
            } else if size == 0 {
                // Atom extends to end of enclosing range
                (end - pos, 8u8)
            } else {
                (size, 8u8)
            };

            if actual_size < header_size as u64 {
                break;
            }

            let atom_end = pos.checked_add(actual_size).ok_or_else(|| {
                Error::invalid_mp4(format!(
                    "Atom {} at offset {} has impossible size {}",
                    atom_type, pos, actual_size
                ))
            })?;
            if within && atom_end > end {
                return Err(Error::invalid_mp4(format!(
                    "Atom {} at offset {} overruns its parent ({} > {})",
                    atom_type, pos, atom_end, end
                )));
            }

            atoms.push(Atom {
                atom_type,
                size: actual_size,
                data_offset: pos + header_size as u64,
                header_size,
            });

            pos = atom_end;
        }

        Ok(atoms)
    }

    /// Read and validate atom data, rejecting oversized atoms.
    fn read_atom_data(&mut self, atom: &Atom) -> Result<Vec<u8>> {
        let size = atom.data_size();
        if size > MAX_ATOM_DATA_SIZE {
            return Err(Error::InvalidMp4(format!(
                "Atom {} data size {} exceeds maximum {}",
                atom.atom_type, size, MAX_ATOM_DATA_SIZE
            )));
        }
        self.reader.seek(SeekFrom::Start(atom.data_offset))?;
        let mut data = vec![0u8; size as usize];
        self.reader.read_exact(&mut data)?;
        Ok(data)
    }
}
