//! Identifier codec.
//!
//! Read identifiers within a run of reads are usually near-identical
//! (instrument, lane, and tile prefixes with a varying trailing index), so
//! each identifier is framed as the length of the prefix it shares with the
//! previous identifier plus the differing suffix, and the framed stream is
//! zstd-compressed per block.

use std::io::Write;

use zstd::zstd_safe;

use crate::error::{CodecError, Result};

use super::{decompress_into, new_cctx, put_u32, sized_compress, take_slice, take_u32};

pub(crate) struct IdEncoder {
    /// Previous identifier within the current block
    prev: Vec<u8>,
    /// Delta-framed identifiers staged for the current block
    staged: Vec<u8>,
    /// Compressed segment produced by `finish`
    z: Vec<u8>,
    cctx: zstd_safe::CCtx<'static>,
}

impl IdEncoder {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            prev: Vec::new(),
            staged: Vec::new(),
            z: Vec::new(),
            cctx: new_cctx()?,
        })
    }

    pub(crate) fn encode(&mut self, id: &[u8]) {
        let shared = self
            .prev
            .iter()
            .zip(id)
            .take_while(|(a, b)| a == b)
            .count();
        put_u32(&mut self.staged, shared as u32);
        put_u32(&mut self.staged, (id.len() - shared) as u32);
        self.staged.extend_from_slice(&id[shared..]);
        self.prev.clear();
        self.prev.extend_from_slice(id);
    }

    /// Compress the staged block and return the compressed byte count.
    pub(crate) fn finish(&mut self) -> Result<usize> {
        sized_compress(&mut self.z, &self.staged, &mut self.cctx)?;
        self.staged.clear();
        self.prev.clear();
        Ok(self.z.len())
    }

    /// Write the compressed segment produced by the last `finish`.
    pub(crate) fn flush<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.z)?;
        self.z.clear();
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct IdDecoder {
    prev: Vec<u8>,
    /// Decompressed delta frame for the current block
    staged: Vec<u8>,
    pos: usize,
}

impl IdDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self) {
        self.prev.clear();
        self.staged.clear();
        self.pos = 0;
    }

    pub(crate) fn start(&mut self, payload: &[u8]) -> Result<()> {
        decompress_into(&mut self.staged, payload)?;
        self.pos = 0;
        Ok(())
    }

    pub(crate) fn decode(&mut self, out: &mut Vec<u8>) -> Result<()> {
        let shared = take_u32(&self.staged, &mut self.pos)? as usize;
        let suffix_len = take_u32(&self.staged, &mut self.pos)? as usize;
        if shared > self.prev.len() {
            return Err(
                CodecError::MalformedPayload("identifier prefix exceeds previous identifier")
                    .into(),
            );
        }
        out.clear();
        out.extend_from_slice(&self.prev[..shared]);
        let suffix = take_slice(&self.staged, &mut self.pos, suffix_len)?;
        out.extend_from_slice(suffix);
        self.prev.clear();
        self.prev.extend_from_slice(out);
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    fn roundtrip(ids: &[&[u8]]) -> Result<Vec<Vec<u8>>> {
        let mut enc = IdEncoder::new()?;
        for id in ids {
            enc.encode(id);
        }
        enc.finish()?;
        let mut payload = Vec::new();
        enc.flush(&mut payload)?;

        let mut dec = IdDecoder::new();
        dec.reset();
        dec.start(&payload)?;
        let mut out = Vec::new();
        for _ in ids {
            let mut id = Vec::new();
            dec.decode(&mut id)?;
            out.push(id);
        }
        Ok(out)
    }

    #[test]
    fn test_roundtrip_shared_prefixes() -> Result<()> {
        let ids: Vec<&[u8]> = vec![
            b"SRR001.1/1",
            b"SRR001.2/1",
            b"SRR001.10/1",
            b"SRR002.1/1",
        ];
        let decoded = roundtrip(&ids)?;
        assert_eq!(decoded, ids);
        Ok(())
    }

    #[test]
    fn test_roundtrip_empty_ids() -> Result<()> {
        let ids: Vec<&[u8]> = vec![b"", b"a", b"", b""];
        let decoded = roundtrip(&ids)?;
        assert_eq!(decoded, ids);
        Ok(())
    }

    #[test]
    fn test_finish_clears_delta_state() -> Result<()> {
        let mut enc = IdEncoder::new()?;
        enc.encode(b"prefix.1");
        enc.finish()?;
        let mut first = Vec::new();
        enc.flush(&mut first)?;

        // The next block must not delta against the previous block's ids.
        enc.encode(b"prefix.2");
        enc.finish()?;
        let mut second = Vec::new();
        enc.flush(&mut second)?;

        let mut dec = IdDecoder::new();
        dec.reset();
        dec.start(&second)?;
        let mut id = Vec::new();
        dec.decode(&mut id)?;
        assert_eq!(id, b"prefix.2");
        Ok(())
    }

    #[test]
    fn test_corrupt_prefix_is_error() -> Result<()> {
        let mut enc = IdEncoder::new()?;
        enc.encode(b"abcdef");
        enc.encode(b"abcxyz");
        enc.finish()?;
        let mut payload = Vec::new();
        enc.flush(&mut payload)?;

        let mut dec = IdDecoder::new();
        dec.start(&payload)?;
        // Skipping the first record desynchronizes the prefix chain.
        let mut id = Vec::new();
        dec.decode(&mut id)?;
        dec.prev.clear();
        assert!(dec.decode(&mut id).is_err());
        Ok(())
    }
}
