//! Machine-readable error classification.
//!
//! Every error type in the workspace maps to an [`ErrorCode`]. The code is
//! what the HTTP layer (an external collaborator) turns into a status and a
//! `{"code": ..., "message": ...}` body; this crate only supplies the code
//! and the message text.

use core::fmt;

/// Machine-readable error codes for programmatic error handling.
///
/// | Code            | Wire string              | Typical source                          |
/// |-----------------|--------------------------|-----------------------------------------|
/// | `Internal`      | `internal error`         | Store I/O, corruption, codec encode     |
/// | `NotFound`      | `not found`              | Bucket lookup misses                    |
/// | `Conflict`      | `conflict`               | Duplicate bucket name in organization   |
/// | `Invalid`       | `invalid`                | Malformed id, filter or permission      |
/// | `Unprocessable` | `unprocessable entity`   | Legacy record that cannot be decoded    |
/// | `Unavailable`   | `unavailable`            | Cancelled or past deadline              |
/// | `Forbidden`     | `forbidden`              | Pre-authorization denial                |
/// | `Unauthorized`  | `unauthorized`           | Inactive or expired authorizer          |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Unexpected failure inside the system.
    Internal,
    /// The referenced resource does not exist.
    NotFound,
    /// The write collides with existing state.
    Conflict,
    /// The request is malformed.
    Invalid,
    /// Stored or submitted data cannot be processed.
    Unprocessable,
    /// The operation was cancelled or ran out of time.
    Unavailable,
    /// The identity lacks a required permission.
    Forbidden,
    /// The identity could not be established.
    Unauthorized,
}

impl ErrorCode {
    /// Returns the wire string for this code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal error",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::Invalid => "invalid",
            Self::Unprocessable => "unprocessable entity",
            Self::Unavailable => "unavailable",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
        }
    }

    /// Whether an operation failing with this code may succeed on retry.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable | Self::Conflict)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error that can be classified with an [`ErrorCode`].
///
/// Implemented by every public error type so callers holding a boxed or
/// generic error can still classify it.
pub trait CodedError: std::error::Error {
    /// Returns the machine-readable code for this error.
    fn code(&self) -> ErrorCode;
}
