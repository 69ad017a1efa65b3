//! # Container format
//!
//! A container is a self-describing archive for an ordered stream of
//! sequencing reads. Reads accumulate into fixed-capacity *chunks* (the
//! unit of parallelism: the four field codecs each encode or decode one
//! field column of a chunk concurrently), and chunks accumulate into
//! *blocks* (the unit of integrity checking: each block carries per-field
//! byte counts and CRC64 checksums).
//!
//! ## File structure
//!
//! ```text
//! ┌─────────────────────────┐
//! │ magic(6) FF 'QUIP' 00   │
//! │ version(1)  flags(1)    │
//! ├─────────────────────────┤
//! │ reference binding       │ if flags.ref: crc64, filename,
//! │                         │ per-entry name + length
//! ├─────────────────────────┤
//! │ assembly_n(8)           │ if flags.asm
//! ├─────────────────────────┤
//! │ aux: fmt(1) len(8) data │
//! ├─────────────────────────┤
//! │ block                   │ repeated; see below
//! ├─────────────────────────┤
//! │ terminator: u32 zero    │ at the block read-count position
//! └─────────────────────────┘
//! ```
//!
//! ## Block structure
//!
//! ```text
//! reads(4) bases(4)
//! readlen RLE:     value(4) run(4) ... until runs sum to `reads`
//! qual-scheme RLE: base(1)  run(4) ... until runs sum to `reads`
//! per field in [id, aux, seq, qual]:
//!     uncompressed(4) compressed(4) crc64(8)
//! per field in [id, aux, seq, qual]:
//!     compressed payload
//! ```
//!
//! All integers are big-endian. No valid block begins with zero reads, so
//! a zero read count doubles as the stream terminator.

mod chunk;
mod header;
mod read;
mod write;

pub use header::{AuxPayload, SourceFormat};
pub use read::{ContainerReader, Records};
pub use write::{ContainerWriter, ContainerWriterBuilder};

/// The magic number opening every container.
pub const MAGIC: [u8; 6] = [0xFF, b'Q', b'U', b'I', b'P', 0x00];

/// The container version written by this library.
pub const VERSION: u8 = 0x03;

/// Maximum number of reads staged per parallel encode/decode round.
pub const CHUNK_CAP: usize = 5000;

/// Number of uncompressed bases in a block that forces a flush.
pub const BLOCK_THRESHOLD: u64 = 5_000_000;

/// Width of a quality score scheme window.
pub const QUAL_WINDOW: u8 = 64;

/// Header flag: the stream was compressed against an external reference.
pub(crate) const FLAG_REFERENCE: u8 = 1;

/// Header flag: the stream uses assembly-based sequence compression.
pub(crate) const FLAG_ASSEMBLED: u8 = 2;
