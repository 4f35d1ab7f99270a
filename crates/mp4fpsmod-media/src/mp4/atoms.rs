//! MP4 atom definitions and the editable atom tree.

/// Four-character atom type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AtomType(pub [u8; 4]);

impl AtomType {
    pub const FTYP: Self = Self(*b"ftyp");
    pub const MOOV: Self = Self(*b"moov");
    pub const MDAT: Self = Self(*b"mdat");
    pub const FREE: Self = Self(*b"free");
    pub const MVHD: Self = Self(*b"mvhd");
    pub const TRAK: Self = Self(*b"trak");
    pub const TKHD: Self = Self(*b"tkhd");
    pub const EDTS: Self = Self(*b"edts");
    pub const ELST: Self = Self(*b"elst");
    pub const MDIA: Self = Self(*b"mdia");
    pub const MDHD: Self = Self(*b"mdhd");
    pub const HDLR: Self = Self(*b"hdlr");
    pub const MINF: Self = Self(*b"minf");
    pub const STBL: Self = Self(*b"stbl");
    pub const STTS: Self = Self(*b"stts");
    pub const CTTS: Self = Self(*b"ctts");
    pub const STSZ: Self = Self(*b"stsz");
    pub const STZ2: Self = Self(*b"stz2");
    pub const STCO: Self = Self(*b"stco");
    pub const CO64: Self = Self(*b"co64");

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Get the 4-char code as a string.
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Whether atoms of this type hold only child atoms.
    pub fn is_container(&self) -> bool {
        matches!(
            *self,
            Self::MOOV | Self::TRAK | Self::EDTS | Self::MDIA | Self::MINF | Self::STBL
        )
    }
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsed atom header.
#[derive(Debug, Clone)]
pub struct Atom {
    /// Atom type code.
    pub atom_type: AtomType,
    /// Atom size including header.
    pub size: u64,
    /// File offset where atom data starts (after header).
    pub data_offset: u64,
    /// Size of the header (8 or 16 bytes).
    pub header_size: u8,
}

impl Atom {
    /// File offset of the atom header.
    pub fn offset(&self) -> u64 {
        self.data_offset.saturating_sub(self.header_size as u64)
    }

    /// File offset just past the atom, saturating at `u64::MAX`.
    pub fn end(&self) -> u64 {
        self.offset().saturating_add(self.size)
    }

    /// Get the data size (size - header).
    pub fn data_size(&self) -> u64 {
        self.size.saturating_sub(self.header_size as u64)
    }
}

/// Handler type for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerType {
    Video,
    Other([u8; 4]),
}

impl HandlerType {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        match &bytes {
            b"vide" => Self::Video,
            _ => Self::Other(bytes),
        }
    }

    /// Handler type of an `hdlr` payload.
    pub fn from_hdlr(payload: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = payload.get(8..12)?.try_into().ok()?;
        Some(Self::from_bytes(bytes))
    }

    pub fn is_video(&self) -> bool {
        matches!(self, Self::Video)
    }
}

/// Body of an atom in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtomContent {
    /// Child atoms of a container.
    Children(Vec<AtomNode>),
    /// Raw payload (everything after the header).
    Payload(Vec<u8>),
}

/// An atom held in memory for editing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtomNode {
    pub atom_type: AtomType,
    pub content: AtomContent,
}

impl AtomNode {
    /// A container atom.
    pub fn container(atom_type: AtomType, children: Vec<AtomNode>) -> Self {
        Self {
            atom_type,
            content: AtomContent::Children(children),
        }
    }

    /// A leaf atom with a raw payload.
    pub fn leaf(atom_type: AtomType, payload: Vec<u8>) -> Self {
        Self {
            atom_type,
            content: AtomContent::Payload(payload),
        }
    }

    /// Child atoms; empty for leaves.
    pub fn children(&self) -> &[AtomNode] {
        match &self.content {
            AtomContent::Children(children) => children,
            AtomContent::Payload(_) => &[],
        }
    }

    /// Mutable child list, if this is a container.
    pub fn children_mut(&mut self) -> Option<&mut Vec<AtomNode>> {
        match &mut self.content {
            AtomContent::Children(children) => Some(children),
            AtomContent::Payload(_) => None,
        }
    }

    /// Raw payload, if this is a leaf.
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.content {
            AtomContent::Payload(payload) => Some(payload),
            AtomContent::Children(_) => None,
        }
    }

    /// Replace the content with a raw payload.
    pub fn set_payload(&mut self, payload: Vec<u8>) {
        self.content = AtomContent::Payload(payload);
    }

    /// Insert `node` right after the first child of type `after`, or first
    /// if there is none. Does nothing on a leaf.
    pub fn insert_child_after(&mut self, after: AtomType, node: AtomNode) {
        if let Some(children) = self.children_mut() {
            let index = children
                .iter()
                .position(|c| c.atom_type == after)
                .map_or(0, |i| i + 1);
            children.insert(index, node);
        }
    }

    /// First child of the given type.
    pub fn child(&self, atom_type: AtomType) -> Option<&AtomNode> {
        self.children().iter().find(|c| c.atom_type == atom_type)
    }

    /// First child of the given type, mutably.
    pub fn child_mut(&mut self, atom_type: AtomType) -> Option<&mut AtomNode> {
        self.children_mut()?
            .iter_mut()
            .find(|c| c.atom_type == atom_type)
    }

    /// Descend through `path`, taking the first match at each level.
    pub fn find(&self, path: &[AtomType]) -> Option<&AtomNode> {
        path.iter().try_fold(self, |node, &t| node.child(t))
    }

    /// Mutable variant of [`find`](Self::find).
    pub fn find_mut(&mut self, path: &[AtomType]) -> Option<&mut AtomNode> {
        path.iter().try_fold(self, |node, &t| node.child_mut(t))
    }

    /// Visit this atom and every descendant, depth first.
    pub fn for_each_mut<E>(
        &mut self,
        f: &mut impl FnMut(&mut AtomNode) -> std::result::Result<(), E>,
    ) -> std::result::Result<(), E> {
        f(self)?;
        if let AtomContent::Children(children) = &mut self.content {
            for child in children {
                child.for_each_mut(f)?;
            }
        }
        Ok(())
    }

    /// Size of the serialized atom, header included.
    pub fn encoded_size(&self) -> u64 {
        let body: u64 = match &self.content {
            AtomContent::Children(children) => children.iter().map(|c| c.encoded_size()).sum(),
            AtomContent::Payload(payload) => payload.len() as u64,
        };
        if body + 8 > u64::from(u32::MAX) {
            body + 16
        } else {
            body + 8
        }
    }
}
