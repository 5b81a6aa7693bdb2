use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Size of a content digest in bytes.
pub const DIGEST_SIZE: usize = 32;

/// Fixed-length content digest derived from a caller key.
///
/// A `Digest` is the BLAKE3 hash of the key bytes. The same key always
/// produces the same digest on every node and in every session, which is
/// what makes routing by identifier consistent across the cluster.
/// Uniqueness is probabilistic (digest collision space), not guaranteed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_SIZE]);

impl Digest {
    /// Derive a digest from raw key bytes.
    ///
    /// Deterministic and infallible for any input length, including empty.
    pub fn from_key(key: &[u8]) -> Self {
        Self(*blake3::hash(key).as_bytes())
    }

    /// Build a digest from pre-computed bytes.
    pub const fn from_raw(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }

    /// The all-zero digest. Lower bound of the full identifier interval.
    pub const fn zero() -> Self {
        Self([0u8; DIGEST_SIZE])
    }

    /// The all-ones digest. Upper bound of the full identifier interval.
    pub const fn max() -> Self {
        Self([0xff; DIGEST_SIZE])
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_SIZE] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != DIGEST_SIZE {
            return Err(TypeError::InvalidLength {
                expected: DIGEST_SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; DIGEST_SIZE];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.short_hex())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; DIGEST_SIZE]> for Digest {
    fn from(bytes: [u8; DIGEST_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Addressable identifier of one stored byte stream.
///
/// Combines a content [`Digest`] with a *column* (a logical sub-slot of the
/// same key, e.g. a compressed payload next to alternate representations)
/// and an optional type tag. Column and type are caller-supplied, never
/// derived from the key. Identifiers are immutable once built.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct Identifier {
    pub digest: Digest,
    pub column: u32,
    pub type_tag: u32,
}

impl Identifier {
    /// Transform a caller key into an identifier for the given column.
    pub fn transform(key: &[u8], column: u32) -> Self {
        Self {
            digest: Digest::from_key(key),
            column,
            type_tag: 0,
        }
    }

    /// Build an identifier from an existing digest.
    pub const fn from_digest(digest: Digest, column: u32) -> Self {
        Self {
            digest,
            column,
            type_tag: 0,
        }
    }

    /// Same digest, different column.
    pub const fn with_column(&self, column: u32) -> Self {
        Self {
            digest: self.digest,
            column,
            type_tag: self.type_tag,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.digest.short_hex(), self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_key_is_deterministic() {
        let key = b"some-key-1";
        assert_eq!(Digest::from_key(key), Digest::from_key(key));
    }

    #[test]
    fn different_keys_produce_different_digests() {
        assert_ne!(Digest::from_key(b"hello"), Digest::from_key(b"world"));
    }

    #[test]
    fn empty_key_is_valid() {
        let d = Digest::from_key(b"");
        assert_ne!(d, Digest::zero());
    }

    #[test]
    fn zero_and_max_bound_everything() {
        let d = Digest::from_key(b"anything");
        assert!(Digest::zero() <= d);
        assert!(d <= Digest::max());
    }

    #[test]
    fn hex_roundtrip() {
        let d = Digest::from_key(b"test");
        let parsed = Digest::from_hex(&d.to_hex()).unwrap();
        assert_eq!(d, parsed);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert!(matches!(err, TypeError::InvalidLength { .. }));
    }

    #[test]
    fn transform_keeps_column_independent_of_key() {
        let a = Identifier::transform(b"key", 0);
        let b = Identifier::transform(b"key", 2);
        assert_eq!(a.digest, b.digest);
        assert_ne!(a.column, b.column);
    }

    #[test]
    fn with_column_preserves_digest() {
        let id = Identifier::transform(b"key", 0);
        assert_eq!(id.with_column(3).digest, id.digest);
        assert_eq!(id.with_column(3).column, 3);
    }

    proptest! {
        #[test]
        fn transform_is_deterministic(key in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(
                Identifier::transform(&key, 0),
                Identifier::transform(&key, 0)
            );
        }
    }
}
