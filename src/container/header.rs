use std::io::{Read, Write};

use crate::error::{HeaderError, ReadError, Result};
use crate::refset::ReferenceSet;
use crate::wire;

use super::{FLAG_ASSEMBLED, FLAG_REFERENCE, MAGIC, VERSION};

/// The source format a container's auxiliary payload was taken from.
///
/// The tag is recorded by the compressing front-end and surfaced verbatim
/// on decompression; the container itself never interprets the payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceFormat {
    #[default]
    None,
    Fastq,
    Sam,
    Bam,
    Other(u8),
}

impl SourceFormat {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Fastq => 1,
            Self::Sam => 2,
            Self::Bam => 3,
            Self::Other(v) => v,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::None,
            1 => Self::Fastq,
            2 => Self::Sam,
            3 => Self::Bam,
            v => Self::Other(v),
        }
    }
}

/// Opaque auxiliary payload carried in the container header, e.g. a SAM
/// header block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuxPayload {
    pub format: SourceFormat,
    pub data: Vec<u8>,
}

/// Decoded fixed-prefix fields of a container.
#[derive(Debug)]
pub(crate) struct StreamHeader {
    pub(crate) version: u8,
    pub(crate) flags: u8,
    pub(crate) assembly_n: Option<u64>,
    pub(crate) aux: AuxPayload,
}

impl StreamHeader {
    pub(crate) fn is_reference_based(&self) -> bool {
        self.flags & FLAG_REFERENCE != 0
    }

    pub(crate) fn is_assembly_based(&self) -> bool {
        self.flags & FLAG_ASSEMBLED != 0
    }

    /// Emit the container prefix: magic, version, flags, optional reference
    /// binding, optional assembly parameter, auxiliary payload.
    pub(crate) fn write<W: Write>(
        writer: &mut W,
        reference: Option<&ReferenceSet>,
        assembly_n: Option<u64>,
        aux: &AuxPayload,
    ) -> Result<()> {
        writer.write_all(&MAGIC)?;
        wire::write_u8(writer, VERSION)?;

        let mut flags = 0u8;
        if reference.is_some() {
            flags |= FLAG_REFERENCE;
        }
        if assembly_n.is_some() {
            flags |= FLAG_ASSEMBLED;
        }
        wire::write_u8(writer, flags)?;

        if let Some(reference) = reference {
            reference.write_binding(writer)?;
        }
        if let Some(n) = assembly_n {
            wire::write_u64(writer, n)?;
        }

        wire::write_u8(writer, aux.format.as_u8())?;
        wire::write_u64(writer, aux.data.len() as u64)?;
        writer.write_all(&aux.data)?;
        Ok(())
    }

    /// Read and validate the container prefix.
    ///
    /// Reference-based streams require a caller-supplied reference set whose
    /// binding is verified byte-for-byte before any block is decoded.
    pub(crate) fn read<R: Read>(
        reader: &mut R,
        reference: Option<&ReferenceSet>,
    ) -> Result<Self> {
        let mut prefix = [0u8; 8];
        wire::read_exact(reader, &mut prefix)?;
        if prefix[..6] != MAGIC {
            return Err(HeaderError::BadMagic.into());
        }
        let version = prefix[6];
        check_version(version)?;
        let flags = prefix[7];

        if flags & FLAG_REFERENCE != 0 {
            let Some(reference) = reference else {
                return Err(ReadError::MissingReference.into());
            };
            reference.verify_binding(reader)?;
        }

        let assembly_n = if flags & FLAG_ASSEMBLED != 0 {
            Some(wire::read_u64(reader)?)
        } else {
            None
        };

        let format = SourceFormat::from_u8(wire::read_u8(reader)?);
        let len = wire::read_u64(reader)? as usize;
        let mut data = vec![0u8; len];
        wire::read_exact(reader, &mut data)?;

        Ok(Self {
            version,
            flags,
            assembly_n,
            aux: AuxPayload { format, data },
        })
    }
}

/// Version gate: versions 2 and 3 are readable, version 1 is rejected with
/// a dedicated message, anything else is rejected as newer.
pub(crate) fn check_version(version: u8) -> Result<()> {
    match version {
        2 | 3 => Ok(()),
        1 => Err(HeaderError::VersionTooOld(1).into()),
        v => Err(HeaderError::VersionTooNew(v).into()),
    }
}
