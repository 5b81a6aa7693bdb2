use cascade_types::{Digest, Identifier, IoFlags, RangeRequest};

use crate::error::StoreResult;
use crate::metadata::MetadataRecord;

/// Aggregate counters for one backend instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Visible objects currently stored.
    pub objects: u64,
    /// Logical bytes across all visible objects.
    pub bytes: u64,
}

/// Storage capability of a single node.
///
/// All implementations must satisfy these invariants:
/// - Objects are addressed by (digest, column); columns of the same digest
///   are fully independent byte streams.
/// - Staged objects (after `reserve`) stay invisible to reads until
///   `commit`; staged chunks must be contiguous with the write cursor.
/// - An aborted stage sequence is left as staged, never silently made
///   visible and never rolled back by the backend itself.
/// - Concurrent operations on different identifiers are independent.
pub trait StorageBackend: Send + Sync {
    /// Reserve `total` bytes for a staged write, resetting any previous
    /// staged state for the identifier. The object becomes invisible until
    /// committed.
    fn reserve(&self, id: &Identifier, total: u64) -> StoreResult<()>;

    /// Append a staged chunk at `offset`, which must equal the current
    /// write cursor. Returns the new cursor.
    fn stage_chunk(&self, id: &Identifier, offset: u64, data: &[u8]) -> StoreResult<u64>;

    /// Write a final (possibly empty) staged chunk and make the object
    /// visible. `final_size == 0` means "whatever the cursor reached".
    /// Returns the visible object size.
    fn commit(&self, id: &Identifier, offset: u64, data: &[u8], final_size: u64)
        -> StoreResult<u64>;

    /// Single-shot write, immediately visible. APPEND appends to existing
    /// content; COMPRESS stores the column compressed. Returns the
    /// resulting object size.
    fn write_at(&self, id: &Identifier, offset: u64, data: &[u8], flags: IoFlags)
        -> StoreResult<u64>;

    /// Read `size` bytes at `offset`; `size == 0` means "to the end".
    /// Compressed columns are decompressed transparently.
    fn read_at(&self, id: &Identifier, offset: u64, size: u64) -> StoreResult<Vec<u8>>;

    /// Visible logical size of the object.
    fn object_size(&self, id: &Identifier) -> StoreResult<u64>;

    /// Returns `true` if a visible object exists at the identifier.
    fn exists(&self, id: &Identifier) -> bool;

    /// CRC32 of the stored bytes, as a verified read would compute it.
    fn checksum(&self, id: &Identifier) -> StoreResult<u32>;

    /// Enumerate visible identifiers inside the interval, in storage
    /// (insertion) order, with their logical sizes. `start`/`num` windowing
    /// is the caller's concern.
    fn enumerate_range(&self, range: &RangeRequest) -> StoreResult<Vec<(Digest, u64)>>;

    /// Persist a placement/metadata record.
    fn put_metadata(&self, record: MetadataRecord) -> StoreResult<()>;

    /// Fetch the metadata record for a digest, if any.
    fn metadata(&self, digest: &Digest) -> StoreResult<Option<MetadataRecord>>;

    /// Aggregate counters.
    fn stats(&self) -> BackendStats;
}
