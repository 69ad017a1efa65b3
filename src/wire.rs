//! Fixed-width big-endian integer primitives used throughout the container.
//!
//! All multi-byte integers on the wire are unsigned big-endian with no
//! alignment or padding. A short read on any required field is surfaced as
//! [`ReadError::UnexpectedEof`](crate::error::ReadError::UnexpectedEof).

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Error, ReadError, Result};

pub(crate) fn write_u8<W: Write>(writer: &mut W, x: u8) -> Result<()> {
    writer.write_u8(x)?;
    Ok(())
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, x: u32) -> Result<()> {
    writer.write_u32::<BigEndian>(x)?;
    Ok(())
}

pub(crate) fn write_u64<W: Write>(writer: &mut W, x: u64) -> Result<()> {
    writer.write_u64::<BigEndian>(x)?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    reader.read_u8().map_err(eof_guard)
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader.read_u32::<BigEndian>().map_err(eof_guard)
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    reader.read_u64::<BigEndian>().map_err(eof_guard)
}

/// Fill `buf` exactly, mapping short reads to the container's EOF error.
pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(eof_guard)
}

fn eof_guard(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::UnexpectedEof.into()
    } else {
        e.into()
    }
}
