//! Nucleotide sequence codec.
//!
//! Sequences for a whole block are concatenated and two-bit packed, with
//! the positions of ambiguous bases (`N`) tracked in an Elias-Fano index
//! and restored after decoding. Blocks containing soft-masked (lowercase)
//! bases fall back to a raw byte frame so that every input round-trips
//! byte-exactly. Both frames are zstd-compressed.
//!
//! Decoding is driven by the caller: the per-read lengths come from the
//! block's run-length encoded read-length list.

use std::io::Write;

use memchr::memchr_iter;
use sucds::Serializable;
use sucds::mii_sequences::{EliasFano, EliasFanoBuilder};
use zstd::zstd_safe;

use crate::error::{CodecError, Result};

use super::{decompress_into, new_cctx, put_u64, sized_compress, take_slice, take_u8, take_u64};

/// Frame holds a two-bit packed sequence plus an N-position index.
const MODE_TWOBIT: u8 = 0;
/// Frame holds the raw sequence bytes.
const MODE_RAW: u8 = 1;

fn is_packable(b: u8) -> bool {
    matches!(b, b'A' | b'C' | b'G' | b'T' | b'N')
}

pub(crate) struct SeqEncoder {
    /// Raw bases staged for the current block
    staged: Vec<u8>,
    /// Framed representation built by `finish`
    frame: Vec<u8>,
    /// Two-bit packed words
    ebuf: Vec<u64>,
    /// Serialized Elias-Fano N-position index
    ef_bytes: Vec<u8>,
    z: Vec<u8>,
    cctx: zstd_safe::CCtx<'static>,
}

impl SeqEncoder {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            staged: Vec::new(),
            frame: Vec::new(),
            ebuf: Vec::new(),
            ef_bytes: Vec::new(),
            z: Vec::new(),
            cctx: new_cctx()?,
        })
    }

    pub(crate) fn encode(&mut self, seq: &[u8]) {
        self.staged.extend_from_slice(seq);
    }

    pub(crate) fn finish(&mut self) -> Result<usize> {
        self.frame.clear();
        if self.staged.iter().copied().all(is_packable) {
            self.frame.push(MODE_TWOBIT);
            put_u64(&mut self.frame, self.staged.len() as u64);

            self.ef_bytes.clear();
            let npos: Vec<usize> = memchr_iter(b'N', &self.staged).collect();
            if !npos.is_empty() {
                let mut builder = EliasFanoBuilder::new(self.staged.len(), npos.len())
                    .map_err(|e| CodecError::NposEncoding(e.to_string()))?;
                builder
                    .extend(npos.iter().copied())
                    .map_err(|e| CodecError::NposEncoding(e.to_string()))?;
                let ef = builder.build();
                ef.serialize_into(&mut self.ef_bytes)
                    .map_err(|e| CodecError::NposEncoding(e.to_string()))?;
            }
            put_u64(&mut self.frame, self.ef_bytes.len() as u64);
            self.frame.extend_from_slice(&self.ef_bytes);

            self.ebuf.clear();
            bitnuc::twobit::encode_with_invalid(&self.staged, &mut self.ebuf)?;
            for word in &self.ebuf {
                self.frame.extend_from_slice(&word.to_le_bytes());
            }
        } else {
            self.frame.push(MODE_RAW);
            put_u64(&mut self.frame, self.staged.len() as u64);
            self.frame.extend_from_slice(&self.staged);
        }

        sized_compress(&mut self.z, &self.frame, &mut self.cctx)?;
        self.staged.clear();
        self.frame.clear();
        Ok(self.z.len())
    }

    pub(crate) fn flush<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.z)?;
        self.z.clear();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct SeqDecoder {
    /// Decompressed frame for the current block
    staged: Vec<u8>,
    /// Flat decoded bases for the current block
    bases: Vec<u8>,
    ebuf: Vec<u64>,
    /// Cursor into `bases`
    pos: usize,
}

impl SeqDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.staged.clear();
        self.bases.clear();
        self.ebuf.clear();
        self.pos = 0;
    }

    pub(crate) fn start(&mut self, payload: &[u8]) -> Result<()> {
        decompress_into(&mut self.staged, payload)?;

        let mut fp = 0;
        let mode = take_u8(&self.staged, &mut fp)?;
        let nuclen = take_u64(&self.staged, &mut fp)? as usize;
        self.bases.clear();
        match mode {
            MODE_TWOBIT => {
                let len_nef = take_u64(&self.staged, &mut fp)? as usize;
                let ef = if len_nef > 0 {
                    let ef_bytes = take_slice(&self.staged, &mut fp, len_nef)?;
                    let ef = EliasFano::deserialize_from(ef_bytes).map_err(|_| {
                        CodecError::MalformedPayload("invalid ambiguous-base index")
                    })?;
                    Some(ef)
                } else {
                    None
                };

                let words = take_slice(&self.staged, &mut fp, nuclen.div_ceil(32) * 8)?;
                self.ebuf.clear();
                self.ebuf.extend(
                    words
                        .chunks_exact(8)
                        .map(|chunk| u64::from_le(bytemuck::pod_read_unaligned(chunk))),
                );
                bitnuc::twobit::decode(&self.ebuf, nuclen, &mut self.bases)?;

                if let Some(ef) = ef {
                    for idx in ef.iter(0) {
                        if let Some(base) = self.bases.get_mut(idx) {
                            *base = b'N';
                        }
                    }
                }
            }
            MODE_RAW => {
                let raw = take_slice(&self.staged, &mut fp, nuclen)?;
                self.bases.extend_from_slice(raw);
            }
            _ => {
                return Err(CodecError::MalformedPayload("unknown sequence frame mode").into());
            }
        }
        self.pos = 0;
        Ok(())
    }

    /// Serve the next read's `n` bases.
    pub(crate) fn decode(&mut self, out: &mut Vec<u8>, n: usize) -> Result<()> {
        let end = self.pos.checked_add(n).ok_or(CodecError::TruncatedPayload)?;
        let bases = self
            .bases
            .get(self.pos..end)
            .ok_or(CodecError::TruncatedPayload)?;
        out.clear();
        out.extend_from_slice(bases);
        self.pos = end;
        Ok(())
    }
}
