//! Pre-authorization errors.

use snafu::Snafu;
use tessera_types::{
    Action, BucketFilter, CodedError, ContextError, ErrorCode, PermissionError,
};

/// Result type alias for pre-authorization.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Errors returned by a [`PreAuthorizer`](crate::PreAuthorizer).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QueryError {
    /// A referenced bucket could not be resolved.
    ///
    /// The lookup error is kept as its code and message so the pre-authorizer
    /// does not depend on the finder's concrete error type.
    #[snafu(display("could not find {action} bucket with filter: {filter}: {message}"))]
    BucketLookup {
        /// Whether the bucket was read or written.
        action: Action,
        /// The filter that failed to resolve.
        filter: BucketFilter,
        /// Classification of the lookup failure.
        lookup_code: ErrorCode,
        /// Message of the lookup failure.
        message: String,
    },

    /// A resolved bucket carries ids a permission cannot be built from.
    #[snafu(display("could not create {action} bucket permission: {source}"))]
    Permission {
        /// Whether the bucket was read or written.
        action: Action,
        /// Why the permission was rejected.
        source: PermissionError,
    },

    /// The authorizer does not grant access to a referenced bucket.
    #[snafu(display("no {action} permission for bucket: \"{name}\""))]
    Denied {
        /// The denied action.
        action: Action,
        /// Name of the bucket.
        name: String,
    },

    /// The caller's context was cancelled or its deadline passed.
    #[snafu(display("{source}"))]
    Context {
        /// Why the context stopped admitting work.
        source: ContextError,
    },
}

impl From<ContextError> for QueryError {
    fn from(source: ContextError) -> Self {
        QueryError::Context { source }
    }
}

impl CodedError for QueryError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::BucketLookup { lookup_code, .. } => *lookup_code,
            Self::Permission { .. } => ErrorCode::Internal,
            Self::Denied { .. } => ErrorCode::Forbidden,
            Self::Context { source } => source.code(),
        }
    }
}
