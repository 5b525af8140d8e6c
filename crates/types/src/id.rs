//! Resource identifiers.
//!
//! Every resource is keyed by an [`Id`]: a 64-bit unsigned integer whose
//! canonical text form is exactly 16 lowercase hexadecimal digits. The same
//! 16 ASCII bytes are used as the storage key, so lexicographic key order in
//! the store equals numeric order.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::Snafu;

use crate::error::{CodedError, ErrorCode};

/// Errors produced when decoding or encoding an [`Id`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum IdError {
    /// The encoded form does not have exactly [`Id::ENCODED_LEN`] bytes.
    #[snafu(display("id must have a length of {} bytes, got {length}", Id::ENCODED_LEN))]
    InvalidLength {
        /// Length of the rejected input.
        length: usize,
    },

    /// The encoded form contains a byte that is not a hex digit.
    #[snafu(display("id contains non-hexadecimal character at offset {offset}"))]
    InvalidCharacter {
        /// Byte offset of the first offending character.
        offset: usize,
    },

    /// The identifier is zero, which is reserved as "unset".
    #[snafu(display("invalid ID"))]
    Zero,
}

impl CodedError for IdError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Invalid
    }
}

/// A resource identifier.
///
/// `Id(0)` is representable but never valid: [`Id::encode`] rejects it and
/// [`Id::decode`] never produces it.
///
/// # Display
///
/// Formats as 16 lowercase hex digits: `020f755c3c082000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Id(u64);

impl Id {
    /// Length of the canonical hex encoding in bytes.
    pub const ENCODED_LEN: usize = 16;

    /// Creates an identifier from a raw value.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw numeric value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Whether this identifier may be used as a key.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// Encodes the identifier as its 16 ASCII hex bytes.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::Zero`] if the identifier is not valid.
    pub fn encode(self) -> Result<[u8; Self::ENCODED_LEN], IdError> {
        if !self.is_valid() {
            return Err(IdError::Zero);
        }

        const DIGITS: &[u8; 16] = b"0123456789abcdef";
        let mut buf = [0u8; Self::ENCODED_LEN];
        for (i, slot) in buf.iter_mut().enumerate() {
            let shift = (Self::ENCODED_LEN - 1 - i) * 4;
            *slot = DIGITS[((self.0 >> shift) & 0xF) as usize];
        }
        Ok(buf)
    }

    /// Decodes an identifier from its hex encoding.
    ///
    /// Accepts upper- and lowercase digits.
    ///
    /// # Errors
    ///
    /// Returns [`IdError::InvalidLength`] unless the input is exactly 16 bytes,
    /// [`IdError::InvalidCharacter`] for non-hex input, and [`IdError::Zero`]
    /// for the all-zero identifier.
    pub fn decode(bytes: &[u8]) -> Result<Self, IdError> {
        if bytes.len() != Self::ENCODED_LEN {
            return Err(IdError::InvalidLength { length: bytes.len() });
        }

        let mut value: u64 = 0;
        for (offset, &b) in bytes.iter().enumerate() {
            let nibble = match b {
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                _ => return Err(IdError::InvalidCharacter { offset }),
            };
            value = (value << 4) | u64::from(nibble);
        }

        if value == 0 {
            return Err(IdError::Zero);
        }
        Ok(Self(value))
    }
}

impl From<u64> for Id {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Id> for u64 {
    #[inline]
    fn from(id: Id) -> Self {
        id.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s.as_bytes())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
