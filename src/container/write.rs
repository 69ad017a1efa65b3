use std::io::Write;
use std::sync::Arc;
use std::thread;

use tracing::debug;

use crate::codec::aux::AuxEncoder;
use crate::codec::id::IdEncoder;
use crate::codec::qual::QualEncoder;
use crate::codec::seq::SeqEncoder;
use crate::error::{CodecError, Error, Result, WriteError};
use crate::record::ReadRecord;
use crate::refset::ReferenceSet;
use crate::rle::RunLengthList;
use crate::{CRC64, wire};

use super::chunk::ChunkBuffer;
use super::header::{AuxPayload, StreamHeader};
use super::{BLOCK_THRESHOLD, CHUNK_CAP, QUAL_WINDOW};

type CrcDigest = crc::Digest<'static, u64>;

/// Builder for [`ContainerWriter`] instances.
///
/// # Examples
///
/// ```
/// # use quip::{ContainerWriterBuilder, Result};
/// # fn main() -> Result<()> {
/// let writer = ContainerWriterBuilder::default().build(Vec::new())?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ContainerWriterBuilder {
    /// Optional reference set; its binding is written into the header
    reference: Option<Arc<ReferenceSet>>,
    /// Optional assembly parameter; sets the assembly flag when present
    assembly_n: Option<u64>,
    /// Auxiliary payload carried in the header
    aux: AuxPayload,
}

impl ContainerWriterBuilder {
    #[must_use]
    pub fn reference(mut self, reference: Arc<ReferenceSet>) -> Self {
        self.reference = Some(reference);
        self
    }

    #[must_use]
    pub fn assembly_n(mut self, n: u64) -> Self {
        self.assembly_n = Some(n);
        self
    }

    #[must_use]
    pub fn aux(mut self, aux: AuxPayload) -> Self {
        self.aux = aux;
        self
    }

    /// Build the writer, emitting the container prefix to `inner`.
    pub fn build<W: Write>(self, mut inner: W) -> Result<ContainerWriter<W>> {
        StreamHeader::write(
            &mut inner,
            self.reference.as_deref(),
            self.assembly_n,
            &self.aux,
        )?;
        Ok(ContainerWriter {
            inner,
            chunk: ChunkBuffer::new(),
            id_enc: IdEncoder::new()?,
            aux_enc: AuxEncoder::new()?,
            seq_enc: SeqEncoder::new()?,
            qual_enc: QualEncoder::new()?,
            id_crc: CRC64.digest(),
            aux_crc: CRC64.digest(),
            seq_crc: CRC64.digest(),
            qual_crc: CRC64.digest(),
            id_bytes: 0,
            aux_bytes: 0,
            seq_bytes: 0,
            qual_bytes: 0,
            buffered_reads: 0,
            buffered_bases: 0,
            readlens: RunLengthList::new(),
            schemes: RunLengthList::new(),
            total_reads: 0,
            total_bases: 0,
            finished: false,
        })
    }
}

/// Streaming container encoder.
///
/// Reads are admitted one at a time in input order. They accumulate into a
/// chunk of up to [`CHUNK_CAP`] reads; a full chunk is handed to the four
/// field codecs, which encode their columns concurrently. Once a block's
/// uncompressed base count exceeds [`BLOCK_THRESHOLD`] the block is framed
/// and written out. [`finish`](Self::finish) flushes any partial state and
/// writes the stream terminator; closing twice is a no-op.
pub struct ContainerWriter<W: Write> {
    inner: W,

    /// Staged reads awaiting the next parallel encode
    chunk: ChunkBuffer,

    id_enc: IdEncoder,
    aux_enc: AuxEncoder,
    seq_enc: SeqEncoder,
    qual_enc: QualEncoder,

    /// Per-field checksums over raw bytes for the current block
    id_crc: CrcDigest,
    aux_crc: CrcDigest,
    seq_crc: CrcDigest,
    qual_crc: CrcDigest,

    /// Per-field uncompressed byte counts for the current block
    id_bytes: u32,
    aux_bytes: u32,
    seq_bytes: u32,
    qual_bytes: u32,

    buffered_reads: u32,
    buffered_bases: u64,

    /// Run-length encoded read lengths for the current block
    readlens: RunLengthList<u32>,
    /// Run-length encoded quality scheme guesses; the active scheme is
    /// carried across block boundaries as a zero-run entry
    schemes: RunLengthList<u8>,

    total_reads: u64,
    total_bases: u64,

    finished: bool,
}

impl<W: Write> ContainerWriter<W> {
    /// Create a writer with no reference, no assembly parameter, and an
    /// empty auxiliary payload.
    pub fn new(inner: W) -> Result<Self> {
        ContainerWriterBuilder::default().build(inner)
    }

    /// Number of reads admitted so far.
    #[must_use]
    pub fn total_reads(&self) -> u64 {
        self.total_reads
    }

    /// Number of bases admitted so far.
    #[must_use]
    pub fn total_bases(&self) -> u64 {
        self.total_bases
    }

    /// Admit one read.
    pub fn push(&mut self, record: &ReadRecord) -> Result<()> {
        if record.seq.len() != record.qual.len() {
            return Err(WriteError::MismatchedQualityLength {
                seq: record.seq.len(),
                qual: record.qual.len(),
            }
            .into());
        }
        if self.buffered_bases > BLOCK_THRESHOLD {
            self.flush_block()?;
        }
        if self.chunk.len() == CHUNK_CAP {
            self.flush_chunk()?;
        }
        self.chunk.push(record);
        Ok(())
    }

    /// Flush pending state and write the stream terminator.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        if !self.chunk.is_empty() {
            self.flush_chunk()?;
        }
        if self.buffered_reads > 0 {
            self.flush_block()?;
        }
        wire::write_u32(&mut self.inner, 0)?;
        self.inner.flush()?;
        self.finished = true;
        Ok(())
    }

    /// Finish the container and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        Ok(self.inner)
    }

    /// Pick the quality scheme for the staged chunk.
    ///
    /// A scheme is valid while every observed quality lies in
    /// `[base, base + QUAL_WINDOW)`. The first chunk of a stream always
    /// opens a concrete scheme; later chunks extend the active scheme's run
    /// or open a new one at the chunk's observed minimum.
    fn update_scheme_guess(&mut self) -> Result<()> {
        let mut min = b'~';
        let mut max = b'!';
        for qual in self.chunk.quals() {
            for &q in qual {
                min = min.min(q);
                max = max.max(q);
            }
        }
        if min < b'!' || max > b'~' {
            return Err(WriteError::QualitySchemeOverflow { min, max }.into());
        }

        let run = self.chunk.len() as u32;
        match self.schemes.last_value() {
            Some(active) if min >= active && max < active + QUAL_WINDOW => {
                self.schemes.extend_last(run);
                self.qual_enc.set_base_qual(active);
            }
            _ => {
                self.schemes.push_run(min, run);
                self.qual_enc.set_base_qual(min);
            }
        }
        Ok(())
    }

    /// Encode the staged chunk: four workers, one per field column, each
    /// owning its codec and CRC accumulator. Joined before accounting.
    fn flush_chunk(&mut self) -> Result<()> {
        self.update_scheme_guess()?;

        {
            let ids = self.chunk.ids();
            let auxs = self.chunk.auxs();
            let seqs = self.chunk.seqs();
            let quals = self.chunk.quals();
            let id_enc = &mut self.id_enc;
            let aux_enc = &mut self.aux_enc;
            let seq_enc = &mut self.seq_enc;
            let qual_enc = &mut self.qual_enc;
            let id_crc = &mut self.id_crc;
            let aux_crc = &mut self.aux_crc;
            let seq_crc = &mut self.seq_crc;
            let qual_crc = &mut self.qual_crc;

            thread::scope(|s| -> Result<()> {
                let handles = [
                    s.spawn(move || {
                        for id in ids {
                            id_enc.encode(id);
                            id_crc.update(id);
                        }
                    }),
                    s.spawn(move || {
                        for tags in auxs {
                            aux_enc.encode(tags);
                            for tag in tags {
                                aux_crc.update(&tag.key);
                                aux_crc.update(&[tag.ty]);
                                aux_crc.update(&tag.value);
                            }
                        }
                    }),
                    s.spawn(move || {
                        for seq in seqs {
                            seq_enc.encode(seq);
                            seq_crc.update(seq);
                        }
                    }),
                    s.spawn(move || {
                        for qual in quals {
                            qual_enc.encode(qual);
                            qual_crc.update(qual);
                        }
                    }),
                ];
                for handle in handles {
                    handle
                        .join()
                        .map_err(|_| Error::from(CodecError::WorkerPanicked))?;
                }
                Ok(())
            })?;
        }

        for i in 0..self.chunk.len() {
            let slen = self.chunk.seqs()[i].len() as u32;
            let id_len = self.chunk.ids()[i].len() as u32;
            let aux_len: usize = self.chunk.auxs()[i].iter().map(|t| t.wire_len()).sum();
            self.readlens.push(slen);
            self.id_bytes += id_len;
            self.aux_bytes += aux_len as u32;
            self.seq_bytes += slen;
            self.qual_bytes += slen;
            self.buffered_bases += u64::from(slen);
            self.total_bases += u64::from(slen);
        }
        self.buffered_reads += self.chunk.len() as u32;
        self.total_reads += self.chunk.len() as u64;
        self.chunk.clear();
        Ok(())
    }

    /// Frame the accumulated block: counts, the two run-length lists, the
    /// twelve per-field metadata values, then the four compressed payloads.
    fn flush_block(&mut self) -> Result<()> {
        debug!(
            reads = self.buffered_reads,
            bases = self.buffered_bases,
            "writing block"
        );

        wire::write_u32(&mut self.inner, self.buffered_reads)?;
        wire::write_u32(&mut self.inner, self.buffered_bases as u32)?;

        for (value, run) in self.readlens.iter() {
            wire::write_u32(&mut self.inner, value)?;
            wire::write_u32(&mut self.inner, run)?;
        }
        for (base, run) in self.schemes.iter() {
            wire::write_u8(&mut self.inner, base)?;
            wire::write_u32(&mut self.inner, run)?;
        }

        let z_id = self.id_enc.finish()? as u32;
        let z_aux = self.aux_enc.finish()? as u32;
        let z_seq = self.seq_enc.finish()? as u32;
        let z_qual = self.qual_enc.finish()? as u32;

        let id_crc = std::mem::replace(&mut self.id_crc, CRC64.digest()).finalize();
        let aux_crc = std::mem::replace(&mut self.aux_crc, CRC64.digest()).finalize();
        let seq_crc = std::mem::replace(&mut self.seq_crc, CRC64.digest()).finalize();
        let qual_crc = std::mem::replace(&mut self.qual_crc, CRC64.digest()).finalize();

        for (raw, z, crc) in [
            (self.id_bytes, z_id, id_crc),
            (self.aux_bytes, z_aux, aux_crc),
            (self.seq_bytes, z_seq, seq_crc),
            (self.qual_bytes, z_qual, qual_crc),
        ] {
            wire::write_u32(&mut self.inner, raw)?;
            wire::write_u32(&mut self.inner, z)?;
            wire::write_u64(&mut self.inner, crc)?;
        }

        self.id_enc.flush(&mut self.inner)?;
        self.aux_enc.flush(&mut self.inner)?;
        self.seq_enc.flush(&mut self.inner)?;
        self.qual_enc.flush(&mut self.inner)?;

        debug!(
            id = self.id_bytes,
            id_z = z_id,
            aux = self.aux_bytes,
            aux_z = z_aux,
            seq = self.seq_bytes,
            seq_z = z_seq,
            qual = self.qual_bytes,
            qual_z = z_qual,
            "block field sizes"
        );

        self.buffered_reads = 0;
        self.buffered_bases = 0;
        self.id_bytes = 0;
        self.aux_bytes = 0;
        self.seq_bytes = 0;
        self.qual_bytes = 0;
        self.readlens.clear();
        self.schemes.carry_last();
        Ok(())
    }
}
