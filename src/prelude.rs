//! Commonly used types and traits.

pub use crate::container::{
    AuxPayload, ContainerReader, ContainerWriter, ContainerWriterBuilder, SourceFormat,
};
pub use crate::error::{Error, Result};
pub use crate::record::{AuxTag, ReadRecord, ReadRecordBuilder};
pub use crate::refset::ReferenceSet;
