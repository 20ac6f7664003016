//! 128-bit ULID value type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::{DecodeError, Ulid};

use crate::error::UlidDecodeError;

/// Number of bits in the timestamp field.
pub const TIMESTAMP_BITS: u32 = 48;

/// Number of bits in the monotonic tail (16 low bits of `msb` plus all of `lsb`).
pub const TAIL_BITS: u32 = 80;

/// Largest encodable millisecond timestamp.
pub const MAX_TIMESTAMP: i64 = (1 << TIMESTAMP_BITS) - 1;

/// Mask covering the 80-bit tail.
pub const TAIL_MASK: u128 = (1 << TAIL_BITS) - 1;

/// Immutable 128-bit ULID split into its most and least significant halves.
///
/// Ordering is lexicographic over `(msb, lsb)`, which matches the ordering of
/// the Crockford string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ulid128 {
    msb: u64,
    lsb: u64,
}

impl Ulid128 {
    /// Create a ULID from its two halves.
    #[must_use]
    pub const fn new(msb: u64, lsb: u64) -> Self {
        Self { msb, lsb }
    }

    /// Compose a ULID from a millisecond timestamp and an 80-bit tail.
    ///
    /// Bits of `timestamp` above 48 and of `tail` above 80 are discarded.
    #[must_use]
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    pub const fn from_parts(timestamp: i64, tail: u128) -> Self {
        let ts = (timestamp as u64) & (MAX_TIMESTAMP as u64);
        let tail = tail & TAIL_MASK;
        Self {
            msb: (ts << 16) | ((tail >> 64) as u64),
            lsb: tail as u64,
        }
    }

    /// Most significant 64 bits.
    #[must_use]
    pub const fn msb(&self) -> u64 {
        self.msb
    }

    /// Least significant 64 bits.
    #[must_use]
    pub const fn lsb(&self) -> u64 {
        self.lsb
    }

    /// Millisecond timestamp stored in the upper 48 bits.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub const fn timestamp_millis(&self) -> i64 {
        (self.msb >> 16) as i64
    }

    /// The 80-bit tail.
    #[must_use]
    pub const fn tail(&self) -> u128 {
        ((self.msb as u128 & 0xFFFF) << 64) | self.lsb as u128
    }

    /// The whole value as one integer.
    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        ((self.msb as u128) << 64) | self.lsb as u128
    }

    /// Build from one integer.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_u128(value: u128) -> Self {
        Self {
            msb: (value >> 64) as u64,
            lsb: value as u64,
        }
    }

    /// 16 bytes, big-endian, `msb` first.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; 16] {
        self.as_u128().to_be_bytes()
    }

    /// Inverse of [`Ulid128::to_bytes`].
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self::from_u128(u128::from_be_bytes(bytes))
    }

    /// Decode a 26-character Crockford string (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns the first failing check: length, alphabet, then overflow.
    pub fn parse(encoded: &str) -> Result<Self, UlidDecodeError> {
        let ulid = Ulid::from_string(encoded).map_err(|e| match e {
            DecodeError::InvalidLength => UlidDecodeError::InvalidLength { len: encoded.len() },
            DecodeError::InvalidChar => {
                first_invalid_character(encoded).unwrap_or(UlidDecodeError::Overflow)
            }
        })?;

        // Crockford aliases (I, L, O) are not accepted.
        if let Some(err) = first_invalid_character(encoded) {
            return Err(err);
        }
        // 26 characters carry 130 bits; the leading one may only hold three.
        if !matches!(encoded.as_bytes().first(), Some(b'0'..=b'7')) {
            return Err(UlidDecodeError::Overflow);
        }

        Ok(Self::from_u128(ulid.0))
    }
}

fn first_invalid_character(encoded: &str) -> Option<UlidDecodeError> {
    let is_crockford = |b: u8| {
        b.is_ascii_alphanumeric() && !matches!(b.to_ascii_uppercase(), b'I' | b'L' | b'O' | b'U')
    };
    encoded
        .bytes()
        .enumerate()
        .find(|&(_, byte)| !is_crockford(byte))
        .map(|(index, byte)| UlidDecodeError::InvalidCharacter { byte, index })
}

impl fmt::Display for Ulid128 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ulid::from(self.as_u128()), f)
    }
}

impl FromStr for Ulid128 {
    type Err = UlidDecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; 16]> for Ulid128 {
    fn from(bytes: [u8; 16]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Ulid128> for [u8; 16] {
    fn from(ulid: Ulid128) -> Self {
        ulid.to_bytes()
    }
}

impl Serialize for Ulid128 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ulid128 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
