use crate::{
    Result,
    error::WriteError,
};

/// A single auxiliary tag attached to a read.
///
/// Tags follow the SAM optional-field convention: a two-byte key, a one-byte
/// type code, and a variable-length value whose interpretation is up to the
/// producing front-end. The container treats the value as opaque bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxTag {
    pub key: [u8; 2],
    pub ty: u8,
    pub value: Vec<u8>,
}

impl AuxTag {
    #[must_use]
    pub fn new(key: [u8; 2], ty: u8, value: Vec<u8>) -> Self {
        Self { key, ty, value }
    }

    /// Uncompressed byte accounting for this tag: 2-byte key + 1-byte type
    /// code + value bytes.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        3 + self.value.len()
    }
}

/// An owned sequencing read: identifier, auxiliary tags, nucleotide sequence,
/// and per-base quality scores.
///
/// Invariant: `seq` and `qual` are equal in length. `id` and `aux` may be
/// empty. The sequence alphabet is `{A, C, G, T, N}` in either case; the
/// container round-trips all four fields byte-exactly.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadRecord {
    pub id: Vec<u8>,
    pub aux: Vec<AuxTag>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

impl ReadRecord {
    /// Uncompressed byte accounting for the auxiliary field of this read.
    #[must_use]
    pub fn aux_bytes(&self) -> usize {
        self.aux.iter().map(AuxTag::wire_len).sum()
    }

    pub(crate) fn clear(&mut self) {
        self.id.clear();
        self.aux.clear();
        self.seq.clear();
        self.qual.clear();
    }
}

/// Builder for [`ReadRecord`] instances.
///
/// The builder validates the sequence/quality length invariant on `build`,
/// which writers otherwise check at admission time.
///
/// # Examples
///
/// ```
/// use quip::ReadRecordBuilder;
///
/// let record = ReadRecordBuilder::default()
///     .id(b"read-1")
///     .seq(b"ACGT")
///     .qual(b"IIII")
///     .build()
///     .unwrap();
/// assert_eq!(record.seq.len(), record.qual.len());
/// ```
#[derive(Default)]
pub struct ReadRecordBuilder {
    id: Vec<u8>,
    aux: Vec<AuxTag>,
    seq: Vec<u8>,
    qual: Vec<u8>,
}

impl ReadRecordBuilder {
    #[must_use]
    pub fn id(mut self, id: &[u8]) -> Self {
        self.id = id.to_vec();
        self
    }

    #[must_use]
    pub fn aux(mut self, tag: AuxTag) -> Self {
        self.aux.push(tag);
        self
    }

    #[must_use]
    pub fn seq(mut self, seq: &[u8]) -> Self {
        self.seq = seq.to_vec();
        self
    }

    #[must_use]
    pub fn qual(mut self, qual: &[u8]) -> Self {
        self.qual = qual.to_vec();
        self
    }

    pub fn build(self) -> Result<ReadRecord> {
        if self.seq.len() != self.qual.len() {
            return Err(WriteError::MismatchedQualityLength {
                seq: self.seq.len(),
                qual: self.qual.len(),
            }
            .into());
        }
        Ok(ReadRecord {
            id: self.id,
            aux: self.aux,
            seq: self.seq,
            qual: self.qual,
        })
    }
}
