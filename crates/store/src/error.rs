//! Error types for the store.

use std::io;

use snafu::Snafu;
use tessera_types::{CodedError, ContextError, ErrorCode};

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during store operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// I/O error from the underlying storage backend.
    #[snafu(display("I/O error: {source}"))]
    Io {
        /// The underlying I/O error.
        source: io::Error,
    },

    /// Database file is corrupted or has invalid format.
    #[snafu(display("Corrupted database: {reason}"))]
    Corrupted {
        /// Description of what was corrupted.
        reason: String,
    },

    /// Invalid magic number in database header.
    #[snafu(display("Invalid database magic number"))]
    InvalidMagic,

    /// Unsupported database format version.
    #[snafu(display("Unsupported format version: {version}"))]
    UnsupportedVersion {
        /// The unsupported version number.
        version: u16,
    },

    /// The committed image could not be encoded.
    #[snafu(display("Failed to encode committed image: {source}"))]
    ImageEncode {
        /// The underlying postcard error.
        source: postcard::Error,
    },

    /// Partition opened in a read-only transaction does not exist.
    #[snafu(display("Partition {} not found", String::from_utf8_lossy(name)))]
    PartitionNotFound {
        /// Name of the missing partition.
        name: Vec<u8>,
    },

    /// Partition names must not be empty.
    #[snafu(display("Partition name required"))]
    PartitionNameRequired,

    /// Keys must not be empty.
    #[snafu(display("Key required in partition {}", String::from_utf8_lossy(partition)))]
    KeyRequired {
        /// Partition the write targeted.
        partition: Vec<u8>,
    },

    /// Key exceeds the maximum key size.
    #[snafu(display("Key too large: {size} bytes (max {max})"))]
    KeyTooLarge {
        /// Actual size of the key in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// Value exceeds the maximum value size.
    #[snafu(display("Value too large: {size} bytes (max {max})"))]
    ValueTooLarge {
        /// Actual size of the value in bytes.
        size: usize,
        /// Maximum allowed size in bytes.
        max: usize,
    },

    /// The caller's context was cancelled or its deadline passed.
    #[snafu(display("Transaction aborted: {source}"))]
    Context {
        /// Why the context stopped admitting work.
        source: ContextError,
    },

    /// Internal lock was poisoned (another thread panicked while holding it).
    #[snafu(display("Internal lock poisoned"))]
    Poisoned,
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Error::Io { source }
    }
}

impl From<ContextError> for Error {
    fn from(source: ContextError) -> Self {
        Error::Context { source }
    }
}

impl CodedError for Error {
    fn code(&self) -> ErrorCode {
        match self {
            Self::PartitionNotFound { .. } => ErrorCode::NotFound,
            Self::PartitionNameRequired
            | Self::KeyRequired { .. }
            | Self::KeyTooLarge { .. }
            | Self::ValueTooLarge { .. } => ErrorCode::Invalid,
            Self::Context { source } => source.code(),
            Self::Io { .. }
            | Self::Corrupted { .. }
            | Self::InvalidMagic
            | Self::UnsupportedVersion { .. }
            | Self::ImageEncode { .. }
            | Self::Poisoned => ErrorCode::Internal,
        }
    }
}
