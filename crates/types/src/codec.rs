//! Resource codec.
//!
//! Resource records are stored in the transactional store as JSON documents.
//! JSON keeps the legacy layout readable: older records carry fields that
//! no longer exist in the current schema, and decoding a superset schema
//! tolerates both generations.

use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

use crate::error::{CodedError, ErrorCode};

/// Error type for codec operations.
#[derive(Debug, Snafu)]
pub enum CodecError {
    /// Encoding failed.
    #[snafu(display("Encoding failed: {source}"))]
    Encode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// Decoding failed.
    #[snafu(display("Decoding failed: {source}"))]
    Decode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },
}

impl CodedError for CodecError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Encode { .. } => ErrorCode::Internal,
            Self::Decode { .. } => ErrorCode::Unprocessable,
        }
    }
}

/// Encodes a record to bytes.
///
/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|source| CodecError::Encode { source })
}

/// Decodes bytes to a record.
///
/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are not a valid encoding of `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|source| CodecError::Decode { source })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Record {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alias: Option<String>,
    }

    #[test]
    fn test_encode_omits_absent_optional_fields() {
        let bytes = encode(&Record { name: "b1".to_string(), alias: None }).expect("encode");
        assert_eq!(bytes, br#"{"name":"b1"}"#);
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let decoded: Record = decode(br#"{"name":"b1","retired":true}"#).expect("decode");
        assert_eq!(decoded, Record { name: "b1".to_string(), alias: None });
    }

    #[test]
    fn test_decode_malformed_input() {
        let result: Result<Record, _> = decode(&[0xFF, 0x00, 0x13]);
        let err = result.unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
        assert!(err.to_string().starts_with("Decoding failed:"));
        assert_eq!(err.code(), ErrorCode::Unprocessable);
    }

    #[test]
    fn test_decode_empty_input() {
        let result: Result<Record, _> = decode(&[]);
        assert!(matches!(result, Err(CodecError::Decode { .. })));
    }

    #[test]
    fn test_codec_error_source_chain() {
        use std::error::Error;

        let err = decode::<Record>(b"{").unwrap_err();
        assert!(err.source().is_some(), "CodecError should keep the JSON error as source");
    }
}
