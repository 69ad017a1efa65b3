#![doc = include_str!("../README.md")]
//!
//! # Library structure
//!
//! - [`container`]: the framed on-disk format: header gating, the
//!   chunk/block pipeline, and the [`ContainerWriter`]/[`ContainerReader`]
//!   pair
//! - [`refset`]: FASTA-loaded reference sets and the CRC64 binding that
//!   ties a stream to the reference it was compressed against
//! - [`record`]: the four-field [`ReadRecord`] data model
//! - [`error`]: the error taxonomy and crate [`Result`]
//!
//! Four per-field codecs (identifier, auxiliary tags, sequence, quality)
//! run concurrently over each chunk of reads; they are internal to the
//! crate and are driven entirely by the container pipeline.

/// Container framing and the block pipeline
pub mod container;

/// Error definitions
pub mod error;

/// Prelude - commonly used types
pub mod prelude;

/// Read records and auxiliary tags
pub mod record;

/// Reference sets and header bindings
pub mod refset;

/// Per-field codecs
mod codec;

/// Run-length lists for per-block metadata
mod rle;

/// Big-endian wire primitives
mod wire;

pub use container::{
    AuxPayload, BLOCK_THRESHOLD, CHUNK_CAP, ContainerReader, ContainerWriter,
    ContainerWriterBuilder, MAGIC, QUAL_WINDOW, Records, SourceFormat, VERSION,
};
pub use error::{Error, IntoQuipError, Result};
pub use record::{AuxTag, ReadRecord, ReadRecordBuilder};
pub use refset::{ReferenceEntry, ReferenceSet};

use crc::{CRC_64_XZ, Crc};

/// CRC64 algorithm shared by field checksums and reference fingerprints.
pub(crate) static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);
