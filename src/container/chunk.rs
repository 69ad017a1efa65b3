use crate::record::{AuxTag, ReadRecord};

/// Columnar staging buffer for one chunk of reads.
///
/// The four fields live in separate per-slot columns so that each codec
/// worker can take an exclusive view of exactly one column during the
/// parallel phase; no cross-field sharing exists, so no locking is needed.
/// Slots are reused across chunks: `clear` resets the logical length
/// without freeing slot allocations.
#[derive(Default)]
pub(crate) struct ChunkBuffer {
    ids: Vec<Vec<u8>>,
    auxs: Vec<Vec<AuxTag>>,
    seqs: Vec<Vec<u8>>,
    quals: Vec<Vec<u8>>,
    len: usize,
}

impl ChunkBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy a record into the next slot.
    pub(crate) fn push(&mut self, record: &ReadRecord) {
        self.ensure_slots(self.len + 1);
        let i = self.len;
        self.ids[i].clear();
        self.ids[i].extend_from_slice(&record.id);
        self.auxs[i].clear();
        self.auxs[i].extend_from_slice(&record.aux);
        self.seqs[i].clear();
        self.seqs[i].extend_from_slice(&record.seq);
        self.quals[i].clear();
        self.quals[i].extend_from_slice(&record.qual);
        self.len += 1;
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    /// Make `n` slots addressable for decoding, reusing allocations.
    pub(crate) fn reset_for(&mut self, n: usize) {
        self.ensure_slots(n);
        self.len = n;
    }

    fn ensure_slots(&mut self, n: usize) {
        while self.ids.len() < n {
            self.ids.push(Vec::new());
            self.auxs.push(Vec::new());
            self.seqs.push(Vec::new());
            self.quals.push(Vec::new());
        }
    }

    pub(crate) fn ids(&self) -> &[Vec<u8>] {
        &self.ids[..self.len]
    }

    pub(crate) fn auxs(&self) -> &[Vec<AuxTag>] {
        &self.auxs[..self.len]
    }

    pub(crate) fn seqs(&self) -> &[Vec<u8>] {
        &self.seqs[..self.len]
    }

    pub(crate) fn quals(&self) -> &[Vec<u8>] {
        &self.quals[..self.len]
    }

    /// Disjoint mutable views of the four columns for the decode workers.
    pub(crate) fn split_mut(
        &mut self,
    ) -> (
        &mut [Vec<u8>],
        &mut [Vec<AuxTag>],
        &mut [Vec<u8>],
        &mut [Vec<u8>],
    ) {
        (
            &mut self.ids[..self.len],
            &mut self.auxs[..self.len],
            &mut self.seqs[..self.len],
            &mut self.quals[..self.len],
        )
    }

    /// Copy slot `i` out into a caller-owned record.
    pub(crate) fn assign_to(&self, i: usize, record: &mut ReadRecord) {
        record.clear();
        record.id.extend_from_slice(&self.ids[i]);
        record.aux.extend_from_slice(&self.auxs[i]);
        record.seq.extend_from_slice(&self.seqs[i]);
        record.qual.extend_from_slice(&self.quals[i]);
    }
}
