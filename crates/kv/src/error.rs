//! Error types for resource services and migrations.

use snafu::Snafu;
use tessera_types::{
    BucketFilter, CodecError, CodedError, ContextError, ErrorCode, Id, IdError, SnowflakeError,
};

/// Result type alias for resource service operations.
pub type Result<T> = std::result::Result<T, KvError>;

/// Errors returned by [`Service`](crate::Service).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KvError {
    /// The underlying store failed.
    #[snafu(display("{source}"))]
    Store {
        /// The store error.
        source: tessera_store::Error,
    },

    /// A legacy record could not be decoded during migration.
    #[snafu(display("unprocessable old {resource}: {raw}"))]
    Unprocessable {
        /// Resource type being migrated.
        resource: &'static str,
        /// The offending stored value, lossily decoded as UTF-8.
        raw: String,
        /// The decode failure.
        source: CodecError,
    },

    /// A current-schema record could not be decoded.
    #[snafu(display("corrupt bucket record at key {key}: {source}"))]
    CorruptRecord {
        /// Storage key of the record.
        key: String,
        /// The decode failure.
        source: CodecError,
    },

    /// A record could not be encoded.
    #[snafu(display("failed to encode bucket {id}: {source}"))]
    Encode {
        /// Bucket being written.
        id: Id,
        /// The encode failure.
        source: CodecError,
    },

    /// No bucket matched the filter.
    #[snafu(display("bucket not found"))]
    BucketNotFound {
        /// The filter that matched nothing.
        filter: BucketFilter,
    },

    /// Another bucket in the organization already has the name.
    #[snafu(display("bucket with name {name} already exists"))]
    BucketNameConflict {
        /// The contested name.
        name: String,
    },

    /// The bucket is not acceptable as written.
    #[snafu(display("invalid bucket: {message}"))]
    InvalidBucket {
        /// What is wrong with it.
        message: String,
    },

    /// An identifier was malformed.
    #[snafu(display("{source}"))]
    InvalidId {
        /// The id error.
        source: IdError,
    },

    /// A new identifier could not be generated.
    #[snafu(display("failed to generate bucket id: {source}"))]
    IdGeneration {
        /// The generator error.
        source: SnowflakeError,
    },

    /// The caller's context was cancelled or its deadline passed.
    #[snafu(display("{source}"))]
    Context {
        /// Why the context stopped admitting work.
        source: ContextError,
    },
}

impl From<tessera_store::Error> for KvError {
    fn from(source: tessera_store::Error) -> Self {
        match source {
            // Keep cancellation distinguishable whichever layer noticed it.
            tessera_store::Error::Context { source } => KvError::Context { source },
            source => KvError::Store { source },
        }
    }
}

impl From<ContextError> for KvError {
    fn from(source: ContextError) -> Self {
        KvError::Context { source }
    }
}

impl From<IdError> for KvError {
    fn from(source: IdError) -> Self {
        KvError::InvalidId { source }
    }
}

impl CodedError for KvError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Store { source } => source.code(),
            Self::Unprocessable { .. } => ErrorCode::Unprocessable,
            Self::CorruptRecord { .. } | Self::Encode { .. } | Self::IdGeneration { .. } => {
                ErrorCode::Internal
            },
            Self::BucketNotFound { .. } => ErrorCode::NotFound,
            Self::BucketNameConflict { .. } => ErrorCode::Conflict,
            Self::InvalidBucket { .. } | Self::InvalidId { .. } => ErrorCode::Invalid,
            Self::Context { source } => source.code(),
        }
    }
}
