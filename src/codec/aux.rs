//! Auxiliary tag codec.
//!
//! Each read's tag block is framed as a tag count followed by
//! `key(2) type(1) value_len(4) value` records, and the framed stream is
//! zstd-compressed per block. Values are opaque bytes; their interpretation
//! belongs to the front-end that produced them.

use std::io::Write;

use zstd::zstd_safe;

use crate::error::Result;
use crate::record::AuxTag;

use super::{decompress_into, new_cctx, put_u32, sized_compress, take_slice, take_u8, take_u32};

pub(crate) struct AuxEncoder {
    staged: Vec<u8>,
    z: Vec<u8>,
    cctx: zstd_safe::CCtx<'static>,
}

impl AuxEncoder {
    pub(crate) fn new() -> Result<Self> {
        Ok(Self {
            staged: Vec::new(),
            z: Vec::new(),
            cctx: new_cctx()?,
        })
    }

    pub(crate) fn encode(&mut self, tags: &[AuxTag]) {
        put_u32(&mut self.staged, tags.len() as u32);
        for tag in tags {
            self.staged.extend_from_slice(&tag.key);
            self.staged.push(tag.ty);
            put_u32(&mut self.staged, tag.value.len() as u32);
            self.staged.extend_from_slice(&tag.value);
        }
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

#[derive(Default)]
pub(crate) struct AuxDecoder {
    staged: Vec<u8>,
    pos: usize,
}

impl AuxDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
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

    pub(crate) fn decode(&mut self, out: &mut Vec<AuxTag>) -> Result<()> {
        out.clear();
        let count = take_u32(&self.staged, &mut self.pos)? as usize;
        for _ in 0..count {
            let key_bytes = take_slice(&self.staged, &mut self.pos, 2)?;
            let key = [key_bytes[0], key_bytes[1]];
            let ty = take_u8(&self.staged, &mut self.pos)?;
            let value_len = take_u32(&self.staged, &mut self.pos)? as usize;
            let value = take_slice(&self.staged, &mut self.pos, value_len)?.to_vec();
            out.push(AuxTag { key, ty, value });
        }
        Ok(())
    }
}
