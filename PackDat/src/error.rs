//! Error types for `PackDat`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `PackDat` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A read needed more bytes than the source had left.
    #[error("unexpected end of file in {file} at byte {position}")]
    UnexpectedEof {
        /// File name (or stream label) being read.
        file: String,
        /// Absolute position at which the failed read started.
        position: u64,
    },

    // ==================== Record Errors ====================
    /// A record field is outside its valid range.
    #[error("malformed record in {file} at byte {position}: {reason}")]
    MalformedRecord {
        /// File name (or stream label) being read.
        file: String,
        /// Absolute position of the offending field.
        position: u64,
        /// What was wrong with the field.
        reason: String,
    },

    // ==================== PACK Errors ====================
    /// A pack chunk breaks the chunk-chain invariants.
    #[error("malformed chunk at offset {offset} in {path}: {reason}")]
    MalformedChunk {
        /// The pack file.
        path: PathBuf,
        /// Offset of the offending chunk.
        offset: u64,
        /// Which invariant was violated.
        reason: String,
    },

    /// A pack offset or size no longer fits the 32-bit index fields.
    #[error("pack capacity exceeded while writing {name}: limit is {limit} bytes")]
    CapacityExceeded {
        /// Asset being written when the limit was hit.
        name: String,
        /// The byte limit.
        limit: u64,
    },

    // ==================== DAT Errors ====================
    /// The manifest length is not a whole number of records.
    #[error("malformed manifest {path}: length {length} is not a multiple of 148")]
    MalformedManifest {
        /// The manifest file.
        path: PathBuf,
        /// Its length in bytes.
        length: u64,
    },

    /// A data file before the last one is shorter than the cap.
    #[error("data file {index} ({path}) is {length} bytes, expected exactly {cap}")]
    MalformedDataSequence {
        /// The data file.
        path: PathBuf,
        /// Its position in the sequence.
        index: usize,
        /// Its length in bytes.
        length: u64,
        /// The data file cap.
        cap: u64,
    },

    /// A data file is larger than the cap.
    #[error("data file {path} is {length} bytes, larger than the {cap} byte cap")]
    OversizedDataFile {
        /// The data file.
        path: PathBuf,
        /// Its length in bytes.
        length: u64,
        /// The data file cap.
        cap: u64,
    },

    /// An asset's content continues into a data file that does not exist.
    #[error("data file {index} for asset {asset} is missing: {path}")]
    MissingDataFile {
        /// Asset being read.
        asset: String,
        /// Index of the missing data file.
        index: usize,
        /// Where the data file was expected.
        path: PathBuf,
    },

    // ==================== Asset Errors ====================
    /// Fewer content bytes are stored than the asset record declares.
    #[error("asset {name} is truncated: expected {expected} bytes, found {available}")]
    TruncatedAsset {
        /// Asset name.
        name: String,
        /// Declared size.
        expected: u32,
        /// Bytes actually available.
        available: u64,
    },

    /// Asset names are limited to 128 UTF-8 bytes.
    #[error("asset name is {length} bytes, maximum is 128: {name}")]
    NameTooLong {
        /// The rejected name.
        name: String,
        /// Its UTF-8 length.
        length: usize,
    },

    /// Asset names must not be empty.
    #[error("asset name is empty")]
    EmptyName,

    /// Stored content does not hash to the indexed CRC-32.
    #[error("CRC mismatch for {name}: indexed {expected:08x}, computed {actual:08x}")]
    CrcMismatch {
        /// Asset name.
        name: String,
        /// CRC-32 from the index.
        expected: u32,
        /// CRC-32 of the stored bytes.
        actual: u32,
    },

    // ==================== Container Errors ====================
    /// The path does not look like any known container.
    #[error("not a pack or dat container: {path}")]
    UnknownContainer {
        /// The path that could not be classified.
        path: PathBuf,
    },

    /// The operation does not apply to this kind of container.
    #[error("{operation} is not supported for {path}")]
    UnsupportedOperation {
        /// Name of the rejected operation.
        operation: &'static str,
        /// The container path.
        path: PathBuf,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Whether this is a structural decode failure (bad field, short read,
    /// broken chunk) as opposed to an I/O or caller error.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedEof { .. } | Self::MalformedRecord { .. } | Self::MalformedChunk { .. }
        )
    }

    /// Wrap this error for a `Read` impl; [`Error::from_stream`] unwraps it.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            Self::Io(e) => e,
            Self::MissingDataFile { .. } => std::io::Error::new(std::io::ErrorKind::NotFound, self),
            other => std::io::Error::other(other),
        }
    }

    /// Recover an error that travelled through a `Read` adapter.
    pub(crate) fn from_stream(error: std::io::Error) -> Self {
        if !error.get_ref().is_some_and(|inner| inner.is::<Self>()) {
            return Self::Io(error);
        }
        let kind = error.kind();
        match error.into_inner().map(|inner| inner.downcast::<Self>()) {
            Some(Ok(inner)) => *inner,
            _ => Self::Io(kind.into()),
        }
    }

    pub(crate) fn malformed(
        file: impl Into<String>,
        position: u64,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedRecord {
            file: file.into(),
            position,
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for `PackDat` operations.
pub type Result<T> = std::result::Result<T, Error>;
