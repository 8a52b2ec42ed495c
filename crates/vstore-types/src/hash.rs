use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Longest hash any backend produces (BLAKE3, 32 bytes).
pub const MAX_HASH_LEN: usize = 32;

/// Content address of a stored object.
///
/// A `Hash` is an opaque byte string between 1 and [`MAX_HASH_LEN`] bytes.
/// The in-memory and key/value backends address objects by 32-byte BLAKE3
/// hashes; the git backend uses 20-byte git object ids. The value is `Copy`
/// and serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash {
    len: u8,
    bytes: [u8; MAX_HASH_LEN],
}

impl Hash {
    /// Build a hash from raw bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, TypeError> {
        if data.is_empty() || data.len() > MAX_HASH_LEN {
            return Err(TypeError::InvalidHashLength(data.len()));
        }
        let mut bytes = [0u8; MAX_HASH_LEN];
        bytes[..data.len()].copy_from_slice(data);
        Ok(Self {
            len: data.len() as u8,
            bytes,
        })
    }

    /// Build a 32-byte hash from a pre-computed digest.
    pub fn from_digest(digest: [u8; MAX_HASH_LEN]) -> Self {
        Self {
            len: MAX_HASH_LEN as u8,
            bytes: digest,
        }
    }

    /// The significant bytes of this hash.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// Number of significant bytes.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always `false`: a hash carries at least one byte.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.as_bytes()[..self.len().min(4)])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
