use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{Digest, Identifier};

/// Per-request io flag bits.
///
/// Carried on every [`IoRequest`] and echoed back in completion envelopes.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct IoFlags(u32);

impl IoFlags {
    /// Append to existing content instead of overwriting at the offset.
    pub const APPEND: IoFlags = IoFlags(1 << 0);
    /// Compress the payload before storage; the column is read back
    /// transparently decompressed.
    pub const COMPRESS: IoFlags = IoFlags(1 << 1);
    /// Skip checksum verification on read. Required when no metadata
    /// record was written for the object.
    pub const NOCSUM: IoFlags = IoFlags(1 << 2);
    /// More envelopes for the same logical operation are still pending.
    pub const MORE: IoFlags = IoFlags(1 << 3);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: IoFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn with(self, other: IoFlags) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for IoFlags {
    type Output = IoFlags;
    fn bitor(self, rhs: IoFlags) -> IoFlags {
        IoFlags(self.0 | rhs.0)
    }
}

/// Per-operation attribute flag bits.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
pub struct AttrFlags(u32);

impl AttrFlags {
    /// Request range results ordered by identifier ascending. Without it,
    /// order is storage-defined (typically insertion order).
    pub const SORT: AttrFlags = AttrFlags(1 << 0);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn contains(self, other: AttrFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// One write or read unit against a single identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoRequest {
    pub id: Identifier,
    pub offset: u64,
    /// Payload size. For reads, `0` means "whole object".
    pub size: u64,
    pub flags: IoFlags,
}

impl IoRequest {
    /// Build a request, rejecting `offset + size` overflow.
    pub fn new(id: Identifier, offset: u64, size: u64, flags: IoFlags) -> Result<Self, TypeError> {
        offset
            .checked_add(size)
            .ok_or(TypeError::OffsetOverflow { offset, size })?;
        Ok(Self {
            id,
            offset,
            size,
            flags,
        })
    }

    /// Whole-object read request for an identifier.
    pub fn whole(id: Identifier, flags: IoFlags) -> Self {
        Self {
            id,
            offset: 0,
            size: 0,
            flags,
        }
    }
}

/// Inclusive identifier interval for range queries.
///
/// Iterates stored identifiers with `lower <= digest <= upper` in the given
/// column. `start` skips that many matches, `num` caps the result count
/// (`0` = unbounded).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub lower: Digest,
    pub upper: Digest,
    pub column: u32,
    pub start: u64,
    pub num: u64,
}

impl RangeRequest {
    /// The full interval over every stored identifier in a column.
    pub fn all(column: u32) -> Self {
        Self {
            lower: Digest::zero(),
            upper: Digest::max(),
            column,
            start: 0,
            num: 0,
        }
    }

    /// Same interval with a skip count and result cap applied.
    #[must_use]
    pub fn limit(mut self, start: u64, num: u64) -> Self {
        self.start = start;
        self.num = num;
        self
    }

    /// Returns `true` if the digest falls inside this interval.
    pub fn contains(&self, digest: &Digest) -> bool {
        self.lower <= *digest && *digest <= self.upper
    }
}
