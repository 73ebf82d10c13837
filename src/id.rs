use std::{fmt, str};

use fstr::FStr;

use crate::ParseError;

/// Number of bits of the `timestamp_offset` field.
pub const TIMESTAMP_BITS: u32 = 41;

/// Number of bits of the `datacenter_id` field.
pub const DATACENTER_ID_BITS: u32 = 3;

/// Number of bits of the `node_id` field.
pub const NODE_ID_BITS: u32 = 7;

/// Number of bits of the `sequence` field.
pub const SEQUENCE_BITS: u32 = 12;

/// Largest `timestamp_offset` value (about 69 years in milliseconds).
pub const MAX_TIMESTAMP_OFFSET: u64 = (1 << TIMESTAMP_BITS) - 1;

/// Largest `datacenter_id` value.
pub const MAX_DATACENTER_ID: u8 = (1 << DATACENTER_ID_BITS) - 1;

/// Largest `node_id` value.
pub const MAX_NODE_ID: u8 = (1 << NODE_ID_BITS) - 1;

/// Largest `sequence` value.
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

const NODE_ID_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_ID_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + NODE_ID_BITS + DATACENTER_ID_BITS;

/// Represents a 64-bit snowflake identifier.
///
/// The most significant bit is always zero, so every `Id` also fits in an `i64` without turning
/// negative. Ids compare in the order of their packed `(timestamp_offset, datacenter_id, node_id,
/// sequence)` fields.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
pub struct Id(u64);

impl Id {
    /// Id with all fields set at zero.
    pub const MIN: Self = Self(0);

    /// Id with all fields set at their maximum values.
    pub const MAX: Self = Self(i64::MAX as u64);

    /// Creates an identifier from field values.
    ///
    /// # Panics
    ///
    /// Panics if any argument exceeds the width of its field.
    pub const fn from_fields(
        timestamp_offset: u64,
        datacenter_id: u8,
        node_id: u8,
        sequence: u16,
    ) -> Self {
        match Self::try_from_fields(timestamp_offset, datacenter_id, node_id, sequence) {
            Some(id) => id,
            None => panic!("invalid field value"),
        }
    }

    /// Creates an identifier from field values, returning `None` if any argument exceeds the
    /// width of its field.
    pub const fn try_from_fields(
        timestamp_offset: u64,
        datacenter_id: u8,
        node_id: u8,
        sequence: u16,
    ) -> Option<Self> {
        if timestamp_offset > MAX_TIMESTAMP_OFFSET
            || datacenter_id > MAX_DATACENTER_ID
            || node_id > MAX_NODE_ID
            || sequence > MAX_SEQUENCE
        {
            return None;
        }

        Some(Self(
            timestamp_offset << TIMESTAMP_SHIFT
                | (datacenter_id as u64) << DATACENTER_ID_SHIFT
                | (node_id as u64) << NODE_ID_SHIFT
                | sequence as u64,
        ))
    }

    /// Returns the milliseconds elapsed since the generator epoch.
    pub const fn timestamp_offset(&self) -> u64 {
        self.0 >> TIMESTAMP_SHIFT
    }

    /// Returns the datacenter id field.
    pub const fn datacenter_id(&self) -> u8 {
        ((self.0 >> DATACENTER_ID_SHIFT) & MAX_DATACENTER_ID as u64) as u8
    }

    /// Returns the node id field.
    pub const fn node_id(&self) -> u8 {
        ((self.0 >> NODE_ID_SHIFT) & MAX_NODE_ID as u64) as u8
    }

    /// Returns the per-millisecond sequence field.
    pub const fn sequence(&self) -> u16 {
        (self.0 & MAX_SEQUENCE as u64) as u16
    }

    /// Returns the Unix timestamp in milliseconds at which the identifier was issued, given the
    /// epoch of the generator that issued it.
    pub const fn unix_ts_ms(&self, epoch_ms: u64) -> u64 {
        epoch_ms + self.timestamp_offset()
    }

    /// Returns the packed integer value.
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the 16-digit zero-padded lowercase hexadecimal representation stored in a
    /// stack-allocated string.
    ///
    /// Unlike the decimal form, the hexadecimal form has a fixed width, so the lexicographic order
    /// of encoded strings matches the order of identifiers.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use snowflake_id::Id;
    ///
    /// let x = Id::from_fields(5, 2, 10, 0);
    /// assert_eq!(x.encode_hex().as_str(), "000000000150a000");
    /// assert_eq!(Id::from_hex("000000000150a000")?, x);
    /// # Ok::<(), snowflake_id::ParseError>(())
    /// ```
    pub fn encode_hex(&self) -> FStr<16> {
        const DIGITS: &[u8; 16] = b"0123456789abcdef";

        let mut buffer = [0u8; 16];
        for (i, e) in buffer.iter_mut().enumerate() {
            *e = DIGITS[((self.0 >> (60 - 4 * i)) & 15) as usize];
        }
        debug_assert!(buffer.is_ascii());
        // SAFETY: every byte is taken from `DIGITS`.
        unsafe { FStr::from_bytes_unchecked(buffer) }
    }

    /// Creates an identifier from the 16-digit hexadecimal representation.
    pub fn from_hex(src: &str) -> Result<Self, ParseError> {
        const ERR: ParseError = ParseError {};
        if src.len() != 16 {
            return Err(ERR);
        }
        let mut value = 0u64;
        for c in src.chars() {
            value = (value << 4) | c.to_digit(16).ok_or(ERR)? as u64;
        }
        Self::try_from(value)
    }
}

impl fmt::Display for Id {
    /// Returns the decimal representation of the packed value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl str::FromStr for Id {
    type Err = ParseError;

    /// Creates an object from the decimal representation.
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        const ERR: ParseError = ParseError {};
        if src.is_empty() || !src.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ERR);
        }
        src.parse::<u64>().map_err(|_| ERR)?.try_into()
    }
}

impl From<Id> for u64 {
    fn from(src: Id) -> Self {
        src.0
    }
}

impl TryFrom<u64> for Id {
    type Error = ParseError;

    fn try_from(src: u64) -> Result<Self, Self::Error> {
        if src > Self::MAX.0 {
            Err(ParseError {})
        } else {
            Ok(Self(src))
        }
    }
}

impl From<Id> for i64 {
    fn from(src: Id) -> Self {
        src.0 as i64
    }
}

impl TryFrom<i64> for Id {
    type Error = ParseError;

    fn try_from(src: i64) -> Result<Self, Self::Error> {
        u64::try_from(src)
            .map(Self)
            .map_err(|_| ParseError {})
    }
}

impl From<Id> for String {
    fn from(src: Id) -> Self {
        src.to_string()
    }
}

impl TryFrom<String> for Id {
    type Error = ParseError;

    fn try_from(src: String) -> Result<Self, Self::Error> {
        src.parse()
    }
}

#[cfg(feature = "serde")]
mod serde_support {
    use super::{fmt, Id};
    use serde::{de, Deserializer, Serializer};

    impl serde::Serialize for Id {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if serializer.is_human_readable() {
                serializer.collect_str(self)
            } else {
                serializer.serialize_u64(self.0)
            }
        }
    }

    impl<'de> serde::Deserialize<'de> for Id {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            if deserializer.is_human_readable() {
                deserializer.deserialize_str(VisitorImpl)
            } else {
                deserializer.deserialize_u64(VisitorImpl)
            }
        }
    }

    struct VisitorImpl;

    impl<'de> de::Visitor<'de> for VisitorImpl {
        type Value = Id;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(formatter, "a snowflake id representation")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            value.parse::<Self::Value>().map_err(de::Error::custom)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Self::Value::try_from(value).map_err(de::Error::custom)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Self::Value::try_from(value).map_err(de::Error::custom)
        }
    }

}
