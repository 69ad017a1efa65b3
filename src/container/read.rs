use std::io::Read;
use std::thread;

use tracing::warn;

use crate::codec::aux::AuxDecoder;
use crate::codec::id::IdDecoder;
use crate::codec::qual::QualDecoder;
use crate::codec::seq::SeqDecoder;
use crate::error::{CodecError, Error, Result};
use crate::record::ReadRecord;
use crate::refset::ReferenceSet;
use crate::rle::{RleCursor, RunLengthList};
use crate::{CRC64, wire};

use super::chunk::ChunkBuffer;
use super::header::{AuxPayload, StreamHeader};
use super::CHUNK_CAP;

type CrcDigest = crc::Digest<'static, u64>;

/// Streaming container decoder.
///
/// The header is read and validated on construction; reference-based
/// streams fail fast unless the caller supplies the matching reference
/// set. Records are then served in input order, decoding one chunk at a
/// time with the four field decoders running concurrently. Per-field
/// checksums are verified when a block is fully served; a mismatch is a
/// warning, not an error, and decoding continues with the possibly corrupt
/// bytes.
pub struct ContainerReader<R: Read> {
    inner: R,
    header: StreamHeader,

    /// Decoded reads being served out of the current chunk
    chunk: ChunkBuffer,
    chunk_pos: usize,

    id_dec: IdDecoder,
    aux_dec: AuxDecoder,
    seq_dec: SeqDecoder,
    qual_dec: QualDecoder,

    /// Per-field compressed payload buffers, grown as blocks require
    id_payload: Vec<u8>,
    aux_payload: Vec<u8>,
    seq_payload: Vec<u8>,
    qual_payload: Vec<u8>,

    /// Reads of the current block not yet decoded into a chunk
    pending_reads: u32,
    /// 1-based index of the current block
    block_num: u32,

    /// Expected per-field checksums from the block header
    exp_id_crc: u64,
    exp_aux_crc: u64,
    exp_seq_crc: u64,
    exp_qual_crc: u64,

    /// Observed per-field checksums over decoded bytes
    id_crc: CrcDigest,
    aux_crc: CrcDigest,
    seq_crc: CrcDigest,
    qual_crc: CrcDigest,

    readlens: RunLengthList<u32>,
    readlen_cur: RleCursor,
    schemes: RunLengthList<u8>,
    scheme_cur: RleCursor,

    end_of_stream: bool,
}

impl<R: Read> ContainerReader<R> {
    /// Open a container, validating the prefix and, for reference-based
    /// streams, the reference binding.
    pub fn new(mut inner: R, reference: Option<&ReferenceSet>) -> Result<Self> {
        let header = StreamHeader::read(&mut inner, reference)?;
        Ok(Self {
            inner,
            header,
            chunk: ChunkBuffer::new(),
            chunk_pos: 0,
            id_dec: IdDecoder::new(),
            aux_dec: AuxDecoder::new(),
            seq_dec: SeqDecoder::new(),
            qual_dec: QualDecoder::new(),
            id_payload: Vec::new(),
            aux_payload: Vec::new(),
            seq_payload: Vec::new(),
            qual_payload: Vec::new(),
            pending_reads: 0,
            block_num: 0,
            exp_id_crc: 0,
            exp_aux_crc: 0,
            exp_seq_crc: 0,
            exp_qual_crc: 0,
            id_crc: CRC64.digest(),
            aux_crc: CRC64.digest(),
            seq_crc: CRC64.digest(),
            qual_crc: CRC64.digest(),
            readlens: RunLengthList::new(),
            readlen_cur: RleCursor::default(),
            schemes: RunLengthList::new(),
            scheme_cur: RleCursor::default(),
            end_of_stream: false,
        })
    }

    /// The container version byte (2 or 3).
    #[must_use]
    pub fn version(&self) -> u8 {
        self.header.version
    }

    #[must_use]
    pub fn is_reference_based(&self) -> bool {
        self.header.is_reference_based()
    }

    #[must_use]
    pub fn is_assembly_based(&self) -> bool {
        self.header.is_assembly_based()
    }

    /// The assembly parameter, present when the assembly flag is set.
    #[must_use]
    pub fn assembly_n(&self) -> Option<u64> {
        self.header.assembly_n
    }

    /// The auxiliary payload carried in the header.
    #[must_use]
    pub fn aux(&self) -> &AuxPayload {
        &self.header.aux
    }

    /// Decode the next read into `record`. Returns `false` at end of
    /// stream.
    pub fn next_into(&mut self, record: &mut ReadRecord) -> Result<bool> {
        if self.chunk_pos < self.chunk.len() {
            self.chunk.assign_to(self.chunk_pos, record);
            self.chunk_pos += 1;
            return Ok(true);
        }
        if self.end_of_stream {
            return Ok(false);
        }
        if self.pending_reads == 0 {
            if self.block_num > 0 {
                self.check_block_crcs();
            }
            self.read_block_header()?;
            if self.end_of_stream {
                return Ok(false);
            }
        }
        self.decode_chunk()?;
        self.chunk.assign_to(0, record);
        self.chunk_pos = 1;
        Ok(true)
    }

    /// Iterate over the remaining records, cloning each into an owned
    /// [`ReadRecord`].
    pub fn records(&mut self) -> Records<'_, R> {
        Records {
            reader: self,
            record: ReadRecord::default(),
        }
    }

    /// Compare observed and expected checksums for the block just served.
    /// Mismatches warn per field and decoding continues.
    fn check_block_crcs(&mut self) {
        let block = self.block_num;
        let observed = [
            std::mem::replace(&mut self.id_crc, CRC64.digest()).finalize(),
            std::mem::replace(&mut self.aux_crc, CRC64.digest()).finalize(),
            std::mem::replace(&mut self.seq_crc, CRC64.digest()).finalize(),
            std::mem::replace(&mut self.qual_crc, CRC64.digest()).finalize(),
        ];
        let expected = [
            self.exp_id_crc,
            self.exp_aux_crc,
            self.exp_seq_crc,
            self.exp_qual_crc,
        ];
        for (field, (observed, expected)) in ["id", "aux", "seq", "qual"]
            .into_iter()
            .zip(observed.into_iter().zip(expected))
        {
            if observed != expected {
                warn!(
                    block,
                    field, "checksums do not match; field data may be corrupt"
                );
            }
        }
    }

    /// Read one block header: counts, the two run-length lists, per-field
    /// segment metadata, and the four compressed payloads. Decoders are
    /// reset and restarted on the new payloads.
    fn read_block_header(&mut self) -> Result<()> {
        let reads = wire::read_u32(&mut self.inner)?;
        if reads == 0 {
            self.end_of_stream = true;
            return Ok(());
        }
        // block base count, needed only for inventory purposes
        let _bases = wire::read_u32(&mut self.inner)?;

        self.readlens.clear();
        while self.readlens.total() < u64::from(reads) {
            let value = wire::read_u32(&mut self.inner)?;
            let run = wire::read_u32(&mut self.inner)?;
            self.readlens.push_run(value, run);
        }

        self.schemes.clear();
        while self.schemes.total() < u64::from(reads) {
            let base = wire::read_u8(&mut self.inner)?;
            let run = wire::read_u32(&mut self.inner)?;
            self.schemes.push_run(base, run);
        }

        let (_, z_id, exp_id) = read_segment_meta(&mut self.inner)?;
        let (_, z_aux, exp_aux) = read_segment_meta(&mut self.inner)?;
        let (_, z_seq, exp_seq) = read_segment_meta(&mut self.inner)?;
        let (_, z_qual, exp_qual) = read_segment_meta(&mut self.inner)?;
        self.exp_id_crc = exp_id;
        self.exp_aux_crc = exp_aux;
        self.exp_seq_crc = exp_seq;
        self.exp_qual_crc = exp_qual;

        fill_payload(&mut self.inner, &mut self.id_payload, z_id)?;
        fill_payload(&mut self.inner, &mut self.aux_payload, z_aux)?;
        fill_payload(&mut self.inner, &mut self.seq_payload, z_seq)?;
        fill_payload(&mut self.inner, &mut self.qual_payload, z_qual)?;

        self.readlen_cur = self.readlens.start_cursor();
        // leading zero-run entries are the writer's block-boundary carry
        self.scheme_cur = self.schemes.start_cursor();
        self.qual_dec
            .set_base_qual(self.schemes.value_at(self.scheme_cur));

        self.id_dec.reset();
        self.id_dec.start(&self.id_payload)?;
        self.aux_dec.reset();
        self.aux_dec.start(&self.aux_payload)?;
        self.seq_dec.reset();
        self.seq_dec.start(&self.seq_payload)?;
        self.qual_dec.reset();
        self.qual_dec.start(&self.qual_payload)?;

        self.pending_reads = reads;
        self.block_num += 1;
        Ok(())
    }

    /// Decode the next chunk of the current block: four workers, one per
    /// field column. The sequence and quality workers walk snapshots of
    /// the run-length cursors; the authoritative cursors advance after the
    /// join.
    fn decode_chunk(&mut self) -> Result<()> {
        let cnt = (self.pending_reads as usize).min(CHUNK_CAP);
        self.chunk.reset_for(cnt);

        let readlen_snapshot = self.readlen_cur;
        let scheme_snapshot = self.scheme_cur;
        {
            let (ids, auxs, seqs, quals) = self.chunk.split_mut();
            let readlens = &self.readlens;
            let schemes = &self.schemes;
            let id_dec = &mut self.id_dec;
            let aux_dec = &mut self.aux_dec;
            let seq_dec = &mut self.seq_dec;
            let qual_dec = &mut self.qual_dec;
            let id_crc = &mut self.id_crc;
            let aux_crc = &mut self.aux_crc;
            let seq_crc = &mut self.seq_crc;
            let qual_crc = &mut self.qual_crc;

            thread::scope(|s| -> Result<()> {
                let handles = [
                    s.spawn(move || -> Result<()> {
                        for out in ids.iter_mut() {
                            id_dec.decode(out)?;
                            id_crc.update(out);
                        }
                        Ok(())
                    }),
                    s.spawn(move || -> Result<()> {
                        for out in auxs.iter_mut() {
                            aux_dec.decode(out)?;
                            for tag in out.iter() {
                                aux_crc.update(&tag.key);
                                aux_crc.update(&[tag.ty]);
                                aux_crc.update(&tag.value);
                            }
                        }
                        Ok(())
                    }),
                    s.spawn(move || -> Result<()> {
                        let mut cur = readlen_snapshot;
                        for out in seqs.iter_mut() {
                            let n = readlens.value_at(cur) as usize;
                            readlens.advance(&mut cur);
                            seq_dec.decode(out, n)?;
                            seq_crc.update(out);
                        }
                        Ok(())
                    }),
                    s.spawn(move || -> Result<()> {
                        let mut rcur = readlen_snapshot;
                        let mut scur = scheme_snapshot;
                        let mut active = qual_dec.base();
                        for out in quals.iter_mut() {
                            let base = schemes.value_at(scur);
                            if base != active {
                                qual_dec.set_base_qual(base);
                                active = base;
                            }
                            let n = readlens.value_at(rcur) as usize;
                            readlens.advance(&mut rcur);
                            qual_dec.decode(out, n)?;
                            qual_crc.update(out);
                            schemes.advance(&mut scur);
                        }
                        Ok(())
                    }),
                ];
                for handle in handles {
                    handle
                        .join()
                        .map_err(|_| Error::from(CodecError::WorkerPanicked))??;
                }
                Ok(())
            })?;
        }

        // kept consistent with the per-worker cursors by construction
        for _ in 0..cnt {
            self.readlens.advance(&mut self.readlen_cur);
            self.schemes.advance(&mut self.scheme_cur);
        }
        self.pending_reads -= cnt as u32;
        self.chunk_pos = 0;
        Ok(())
    }
}

fn read_segment_meta<R: Read>(reader: &mut R) -> Result<(u32, u32, u64)> {
    let uncompressed = wire::read_u32(reader)?;
    let compressed = wire::read_u32(reader)?;
    let crc = wire::read_u64(reader)?;
    Ok((uncompressed, compressed, crc))
}

fn fill_payload<R: Read>(reader: &mut R, payload: &mut Vec<u8>, n: u32) -> Result<()> {
    payload.resize(n as usize, 0);
    wire::read_exact(reader, payload)
}

/// Iterator over the remaining records of a [`ContainerReader`].
pub struct Records<'a, R: Read> {
    reader: &'a mut ContainerReader<R>,
    record: ReadRecord,
}

impl<R: Read> Iterator for Records<'_, R> {
    type Item = Result<ReadRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.next_into(&mut self.record) {
            Ok(true) => Some(Ok(self.record.clone())),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
