//! Per-field codecs and their shared plumbing.
//!
//! Each of a read's four fields (identifier, auxiliary tags, sequence,
//! quality) is compressed by its own codec. Encoders stage raw field data
//! for the current block and produce a self-contained compressed segment on
//! `finish`; decoders are handed a block's segment, decompress it up front,
//! and serve per-read values in input order. `finish` returns every encoder
//! to its pre-block state so that the reader's reset-per-block mirrors the
//! writer exactly.

pub(crate) mod aux;
pub(crate) mod id;
pub(crate) mod qual;
pub(crate) mod seq;

use std::io;

use zstd::zstd_safe;

use crate::error::{CodecError, Error, Result};

/// Compression level handed to every codec context. Zero selects the zstd
/// default.
const COMPRESSION_LEVEL: i32 = 0;

pub(crate) fn zstd_error(code: zstd_safe::ErrorCode) -> Error {
    io::Error::other(zstd_safe::get_error_name(code)).into()
}

/// Create a compression context configured like the rest of the crate:
/// default level, long distance matching enabled.
pub(crate) fn new_cctx() -> Result<zstd_safe::CCtx<'static>> {
    let mut cctx = zstd_safe::CCtx::create();
    cctx.set_parameter(zstd_safe::CParameter::CompressionLevel(COMPRESSION_LEVEL))
        .map_err(zstd_error)?;
    cctx.set_parameter(zstd_safe::CParameter::EnableLongDistanceMatching(true))
        .map_err(zstd_error)?;
    Ok(cctx)
}

/// Compress `src` into `dst`, sizing `dst` to the exact compressed length.
pub(crate) fn sized_compress(
    dst: &mut Vec<u8>,
    src: &[u8],
    cctx: &mut zstd_safe::CCtx,
) -> Result<()> {
    let bound = zstd_safe::compress_bound(src.len());
    dst.resize(bound, 0);
    let true_size = cctx.compress2(&mut dst[..], src).map_err(zstd_error)?;
    dst.truncate(true_size);
    Ok(())
}

/// Decompress a whole segment into `dst`, replacing its contents.
pub(crate) fn decompress_into(dst: &mut Vec<u8>, src: &[u8]) -> Result<()> {
    dst.clear();
    zstd::stream::copy_decode(src, &mut *dst)?;
    Ok(())
}

pub(crate) fn put_u32(dst: &mut Vec<u8>, x: u32) {
    dst.extend_from_slice(&x.to_be_bytes());
}

pub(crate) fn put_u64(dst: &mut Vec<u8>, x: u64) {
    dst.extend_from_slice(&x.to_be_bytes());
}

pub(crate) fn take_u8(buf: &[u8], pos: &mut usize) -> Result<u8> {
    let byte = *buf.get(*pos).ok_or(CodecError::TruncatedPayload)?;
    *pos += 1;
    Ok(byte)
}

pub(crate) fn take_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    let bytes: [u8; 4] = take_slice(buf, pos, 4)?
        .try_into()
        .map_err(|_| CodecError::TruncatedPayload)?;
    Ok(u32::from_be_bytes(bytes))
}

pub(crate) fn take_u64(buf: &[u8], pos: &mut usize) -> Result<u64> {
    let bytes: [u8; 8] = take_slice(buf, pos, 8)?
        .try_into()
        .map_err(|_| CodecError::TruncatedPayload)?;
    Ok(u64::from_be_bytes(bytes))
}

pub(crate) fn take_slice<'a>(buf: &'a [u8], pos: &mut usize, n: usize) -> Result<&'a [u8]> {
    let end = pos.checked_add(n).ok_or(CodecError::TruncatedPayload)?;
    let slice = buf.get(*pos..end).ok_or(CodecError::TruncatedPayload)?;
    *pos = end;
    Ok(slice)
}
