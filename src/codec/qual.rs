//! Quality score codec.
//!
//! Quality bytes are rebased against the active scheme's base character so
//! that each block's staged symbols sit in a small range, then
//! zstd-compressed. The container drives scheme changes through
//! `set_base_qual` at chunk granularity on the writer and through the
//! quality-scheme run-length list on the reader; round-trip correctness
//! depends on both sides walking the schemes identically.

use std::io::Write;

use zstd::zstd_safe;

use crate::error::{CodecError, Result};

use super::{decompress_into, new_cctx, sized_compress};

pub(crate) struct QualEncoder {
    /// Active scheme base character
    base: u8,
    staged: Vec<u8>,
    z: Vec<u8>,
    cctx: zstd_safe::CCtx<'static>,
}

impl QualEncoder {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            base: b'!',
            staged: Vec::new(),
            z: Vec::new(),
            cctx: new_cctx()?,
        })
    }

    pub(crate) fn set_base_qual(&mut self, base: u8) {
        self.base = base;
    }

    pub(crate) fn encode(&mut self, qual: &[u8]) {
        let base = self.base;
        self.staged.extend(qual.iter().map(|q| q.wrapping_sub(base)));
    }

    pub(crate) fn finish(&mut self) -> Result<usize> {
        sized_compress(&mut self.z, &self.staged, &mut self.cctx)?;
        self.staged.clear();
        Ok(self.z.len())
    }

    pub(crate) fn flush<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.z)?;
        self.z.clear();
        Ok(())
    }
}

pub(crate) struct QualDecoder {
    base: u8,
    staged: Vec<u8>,
    pos: usize,
}

impl QualDecoder {
    pub(crate) fn new() -> Self {
        Self {
            base: b'!',
            staged: Vec::new(),
            pos: 0,
        }
    }

    pub(crate) fn base(&self) -> u8 {
        self.base
    }

    pub(crate) fn set_base_qual(&mut self, base: u8) {
        self.base = base;
    }

    pub(crate) fn reset(&mut self) {
        self.staged.clear();
        self.pos = 0;
    }

    pub(crate) fn start(&mut self, payload: &[u8]) -> Result<()> {
        decompress_into(&mut self.staged, payload)?;
        self.pos = 0;
        Ok(())
    }

    /// Serve the next read's `n` quality scores.
    pub(crate) fn decode(&mut self, out: &mut Vec<u8>, n: usize) -> Result<()> {
        let end = self.pos.checked_add(n).ok_or(CodecError::TruncatedPayload)?;
        let symbols = self
            .staged
            .get(self.pos..end)
            .ok_or(CodecError::TruncatedPayload)?;
        let base = self.base;
        out.clear();
        out.extend(symbols.iter().map(|s| s.wrapping_add(base)));
        self.pos = end;
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;

    #[test]
    fn test_roundtrip_single_scheme() -> Result<()> {
        let quals: Vec<&[u8]> = vec![b"IIII", b"FFII", b"####"];

        let mut enc = QualEncoder::new()?;
        enc.set_base_qual(b'#');
        for qual in &quals {
            enc.encode(qual);
        }
        enc.finish()?;
        let mut payload = Vec::new();
        enc.flush(&mut payload)?;

        let mut dec = QualDecoder::new();
        dec.set_base_qual(b'#');
        dec.start(&payload)?;
        for qual in &quals {
            let mut decoded = Vec::new();
            dec.decode(&mut decoded, qual.len())?;
            assert_eq!(&decoded, qual);
        }
        Ok(())
    }

    #[test]
    fn test_roundtrip_scheme_change() -> Result<()> {
        let mut enc = QualEncoder::new()?;
        enc.set_base_qual(b'#');
        enc.encode(b"#$%&");
        enc.set_base_qual(b'@');
        enc.encode(b"@ABC");
        enc.finish()?;
        let mut payload = Vec::new();
        enc.flush(&mut payload)?;

        let mut dec = QualDecoder::new();
        dec.start(&payload)?;
        let mut decoded = Vec::new();
        dec.set_base_qual(b'#');
        dec.decode(&mut decoded, 4)?;
        assert_eq!(decoded, b"#$%&");
        dec.set_base_qual(b'@');
        dec.decode(&mut decoded, 4)?;
        assert_eq!(decoded, b"@ABC");
        Ok(())
    }

    #[test]
    fn test_overrun_is_error() -> Result<()> {
        let mut enc = QualEncoder::new()?;
        enc.encode(b"III");
        enc.finish()?;
        let mut payload = Vec::new();
        enc.flush(&mut payload)?;

        let mut dec = QualDecoder::new();
        dec.start(&payload)?;
        let mut out = Vec::new();
        assert!(dec.decode(&mut out, 4).is_err());
        Ok(())
    }
}
