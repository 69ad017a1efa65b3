use std::error::Error as StdError;

/// Custom Result type for quip operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the quip library, encompassing all possible error
/// cases that can occur while encoding or decoding containers.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to the container header
    #[error("Error processing header: {0}")]
    HeaderError(#[from] HeaderError),

    /// Errors that occur while decoding a container
    #[error("Error reading container: {0}")]
    ReadError(#[from] ReadError),

    /// Errors that occur while encoding a container
    #[error("Error writing container: {0}")]
    WriteError(#[from] WriteError),

    /// Errors related to reference set loading
    #[error("Error loading reference: {0}")]
    ReferenceError(#[from] ReferenceError),

    /// Errors raised by a per-field codec
    #[error("Error in field codec: {0}")]
    CodecError(#[from] CodecError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// Errors from the bitnuc dependency for nucleotide encoding/decoding
    #[error("Bitnuc error: {0}")]
    BitnucError(#[from] bitnuc::Error),

    /// Conversion errors from anyhow errors
    #[cfg(feature = "anyhow")]
    #[error("Generic error: {0}")]
    AnyhowError(#[from] anyhow::Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}

/// Errors specific to validating the fixed container prefix
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The stream does not begin with the QUIP magic bytes
    #[error("Input is not a QUIP container")]
    BadMagic,

    /// The container was produced by a format revision that is no longer
    /// readable
    ///
    /// # Arguments
    /// * `u8` - The unsupported version number that was found
    #[error("Container version {0} is no longer supported")]
    VersionTooOld(u8),

    /// The container was produced by a newer format revision
    #[error("Container version {0} is newer than this library understands")]
    VersionTooNew(u8),
}

/// Errors that can occur while decoding a container
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The reader returned fewer bytes than a required field needs
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// The stream is reference-based but the caller supplied no reference
    #[error("A reference set is needed for decompression")]
    MissingReference,

    /// The reference binding in the stream does not match the supplied
    /// reference set
    #[error("Incorrect reference: a different sequence set was used for compression")]
    ReferenceMismatch,
}

/// Errors that can occur while encoding a container
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// A chunk contained quality scores outside the printable ASCII range
    ///
    /// # Fields
    /// * `min` - The smallest quality byte observed in the chunk
    /// * `max` - The largest quality byte observed in the chunk
    #[error("Quality scores outside the printable range (min: {min}, max: {max})")]
    QualitySchemeOverflow { min: u8, max: u8 },

    /// The length of a record's quality string does not match its sequence
    #[error("Sequence length ({seq}) does not match quality length ({qual})")]
    MismatchedQualityLength { seq: usize, qual: usize },
}

/// Errors raised while parsing a FASTA reference
#[derive(thiserror::Error, Debug)]
pub enum ReferenceError {
    /// A sequence line contained a character outside the nucleotide set
    #[error("Unexpected character {0:?} in FASTA sequence")]
    UnexpectedChar(char),

    /// Two entries in the reference share a name
    #[error("Reference contains multiple sequences named {0:?}")]
    DuplicateName(String),
}

/// Errors raised by the per-field codecs
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// A decompressed payload ran out of bytes mid-record
    #[error("Compressed payload ended unexpectedly")]
    TruncatedPayload,

    /// A decompressed payload failed structural validation
    ///
    /// # Arguments
    /// * `&str` - Description of the malformed structure
    #[error("Compressed payload is malformed: {0}")]
    MalformedPayload(&'static str),

    /// Encoding the sparse N-position index failed
    #[error("Failed to encode ambiguous base positions: {0}")]
    NposEncoding(String),

    /// A field worker thread panicked during a chunk
    #[error("A field worker panicked during a chunk")]
    WorkerPanicked,
}

/// Trait for converting arbitrary errors into [`Error`]
pub trait IntoQuipError {
    fn into_quip_error(self) -> Error;
}

impl<E> IntoQuipError for E
where
    E: StdError + Send + Sync + 'static,
{
    fn into_quip_error(self) -> Error {
        Error::GenericError(Box::new(self))
    }
}
