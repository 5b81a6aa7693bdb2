use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use cascade_types::{Digest, Identifier, IoFlags, RangeRequest};

use crate::backend::{BackendStats, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::metadata::MetadataRecord;

/// Largest reservation or per-column object size the in-memory backend
/// will accept. Caller-supplied sizes beyond this are rejected, never
/// allocated.
const MAX_RESERVE: u64 = 1 << 30;

type ObjectKey = (Digest, u32);

/// One column's byte stream and its staging state.
struct Slot {
    /// Stored bytes; compressed when `compressed` is set.
    data: Vec<u8>,
    /// Logical (decompressed) size.
    logical: u64,
    /// Bytes reserved by prepare.
    reserved: u64,
    /// Staged write cursor: next contiguous offset.
    cursor: u64,
    /// Staged objects stay invisible until commit.
    visible: bool,
    compressed: bool,
}

impl Slot {
    fn staged(reserved: u64) -> Self {
        Self {
            data: Vec::with_capacity(reserved as usize),
            logical: 0,
            reserved,
            cursor: 0,
            visible: false,
            compressed: false,
        }
    }
}

#[derive(Default)]
struct Inner {
    slots: HashMap<ObjectKey, Slot>,
    /// Insertion order of keys, the storage-defined enumeration order.
    order: Vec<ObjectKey>,
}

impl Inner {
    fn slot_entry(&mut self, key: ObjectKey) -> &mut Slot {
        if !self.slots.contains_key(&key) {
            self.order.push(key);
            self.slots.insert(key, Slot::staged(0));
        }
        self.slots.get_mut(&key).expect("just inserted")
    }
}

/// In-memory, HashMap-based storage backend.
///
/// Intended for tests and embedding. Columns of the same digest live in
/// independent slots; staged writes track a reservation and a contiguous
/// cursor and stay invisible until commit.
pub struct MemoryBackend {
    inner: RwLock<Inner>,
    metadata: RwLock<HashMap<Digest, MetadataRecord>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            metadata: RwLock::new(HashMap::new()),
        }
    }

    /// Number of visible objects.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().expect("lock poisoned");
        inner.slots.values().filter(|s| s.visible).count()
    }

    /// Returns `true` if no visible object is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all objects and metadata.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.slots.clear();
        inner.order.clear();
        self.metadata.write().expect("lock poisoned").clear();
    }

    /// Flip one stored byte without touching checksum records. Simulates
    /// on-media corruption for verification paths.
    pub fn tamper(&self, id: &Identifier, byte_index: usize) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let slot = inner
            .slots
            .get_mut(&(id.digest, id.column))
            .ok_or(StoreError::NotFound { id: *id })?;
        if byte_index >= slot.data.len() {
            return Err(StoreError::Invalid(format!(
                "tamper index {byte_index} beyond {} stored bytes",
                slot.data.len()
            )));
        }
        slot.data[byte_index] ^= 0xff;
        Ok(())
    }

    fn compress(id: &Identifier, data: &[u8]) -> StoreResult<Vec<u8>> {
        zstd::stream::encode_all(data, 0).map_err(|e| StoreError::Compression {
            id: *id,
            reason: e.to_string(),
        })
    }

    fn decompress(id: &Identifier, data: &[u8]) -> StoreResult<Vec<u8>> {
        zstd::stream::decode_all(data).map_err(|e| StoreError::Compression {
            id: *id,
            reason: e.to_string(),
        })
    }

    /// Logical bytes of a slot, decompressing when needed.
    fn logical_bytes(id: &Identifier, slot: &Slot) -> StoreResult<Vec<u8>> {
        if slot.compressed {
            Self::decompress(id, &slot.data)
        } else {
            Ok(slot.data.clone())
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn reserve(&self, id: &Identifier, total: u64) -> StoreResult<()> {
        if total > MAX_RESERVE {
            return Err(StoreError::Invalid(format!(
                "reservation of {total} bytes exceeds limit"
            )));
        }
        let mut inner = self.inner.write().expect("lock poisoned");
        let key = (id.digest, id.column);
        if !inner.slots.contains_key(&key) {
            inner.order.push(key);
        }
        // A fresh prepare resets any previous staged or visible state.
        inner.slots.insert(key, Slot::staged(total));
        debug!(id = %id, total, "reserved staged write");
        Ok(())
    }

    fn stage_chunk(&self, id: &Identifier, offset: u64, data: &[u8]) -> StoreResult<u64> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let slot = inner
            .slots
            .get_mut(&(id.digest, id.column))
            .filter(|s| !s.visible)
            .ok_or(StoreError::NotPrepared { id: *id })?;
        if offset != slot.cursor {
            return Err(StoreError::Sequence {
                id: *id,
                expected: slot.cursor,
                got: offset,
            });
        }
        slot.data.extend_from_slice(data);
        slot.cursor += data.len() as u64;
        Ok(slot.cursor)
    }

    fn commit(
        &self,
        id: &Identifier,
        offset: u64,
        data: &[u8],
        final_size: u64,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let slot = inner
            .slots
            .get_mut(&(id.digest, id.column))
            .filter(|s| !s.visible)
            .ok_or(StoreError::NotPrepared { id: *id })?;
        if offset != slot.cursor {
            return Err(StoreError::Sequence {
                id: *id,
                expected: slot.cursor,
                got: offset,
            });
        }
        slot.data.extend_from_slice(data);
        slot.cursor += data.len() as u64;

        // Zero means "whatever the cursor reached"; an explicit size
        // truncates or zero-fills to the declared length.
        let final_len = if final_size == 0 {
            slot.cursor
        } else {
            final_size
        };
        if final_len > MAX_RESERVE {
            return Err(StoreError::Invalid(format!(
                "commit size {final_len} exceeds limit"
            )));
        }
        slot.data.resize(final_len as usize, 0);
        slot.logical = final_len;
        slot.cursor = final_len;
        slot.visible = true;
        debug!(id = %id, size = final_len, "committed staged write");
        Ok(final_len)
    }

    fn write_at(
        &self,
        id: &Identifier,
        offset: u64,
        data: &[u8],
        flags: IoFlags,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().expect("lock poisoned");
        let key = (id.digest, id.column);

        if flags.contains(IoFlags::APPEND) {
            if !inner.slots.contains_key(&key) {
                inner.order.push(key);
                inner.slots.insert(key, Slot::staged(0));
            }
            let slot = inner.slots.get_mut(&key).expect("just ensured");
            if slot.compressed {
                return Err(StoreError::Invalid(
                    "append to a compressed column is not supported".into(),
                ));
            }
            if slot.data.len() as u64 + data.len() as u64 > MAX_RESERVE {
                return Err(StoreError::Invalid(format!(
                    "append past {MAX_RESERVE} byte limit"
                )));
            }
            slot.data.extend_from_slice(data);
            slot.logical = slot.data.len() as u64;
            slot.cursor = slot.logical;
            slot.visible = true;
            return Ok(slot.logical);
        }

        if flags.contains(IoFlags::COMPRESS) {
            let stored = Self::compress(id, data)?;
            let slot = inner.slot_entry(key);
            slot.data = stored;
            slot.compressed = true;
            slot.logical = data.len() as u64;
            slot.cursor = slot.logical;
            slot.visible = true;
            return Ok(slot.logical);
        }

        let slot = inner.slot_entry(key);
        if slot.compressed {
            return Err(StoreError::Invalid(
                "plain overwrite of a compressed column is not supported".into(),
            ));
        }
        let end = offset
            .checked_add(data.len() as u64)
            .ok_or_else(|| StoreError::Invalid("write offset + size overflows".into()))?;
        if end > MAX_RESERVE {
            return Err(StoreError::Invalid(format!(
                "write end {end} exceeds {MAX_RESERVE} byte limit"
            )));
        }
        let end = end as usize;
        if slot.data.len() < end {
            slot.data.resize(end, 0);
        }
        slot.data[offset as usize..end].copy_from_slice(data);
        slot.logical = slot.data.len() as u64;
        slot.cursor = slot.logical;
        slot.visible = true;
        Ok(slot.logical)
    }

    fn read_at(&self, id: &Identifier, offset: u64, size: u64) -> StoreResult<Vec<u8>> {
        let inner = self.inner.read().expect("lock poisoned");
        let slot = inner
            .slots
            .get(&(id.digest, id.column))
            .filter(|s| s.visible)
            .ok_or(StoreError::NotFound { id: *id })?;
        let bytes = Self::logical_bytes(id, slot)?;
        let len = bytes.len() as u64;

        if offset > len {
            return Err(StoreError::Truncated {
                id: *id,
                requested: size,
                available: 0,
            });
        }
        if size == 0 {
            return Ok(bytes[offset as usize..].to_vec());
        }
        if offset + size > len {
            return Err(StoreError::Truncated {
                id: *id,
                requested: size,
                available: len - offset,
            });
        }
        Ok(bytes[offset as usize..(offset + size) as usize].to_vec())
    }

    fn object_size(&self, id: &Identifier) -> StoreResult<u64> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .slots
            .get(&(id.digest, id.column))
            .filter(|s| s.visible)
            .map(|s| s.logical)
            .ok_or(StoreError::NotFound { id: *id })
    }

    fn exists(&self, id: &Identifier) -> bool {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .slots
            .get(&(id.digest, id.column))
            .is_some_and(|s| s.visible)
    }

    fn checksum(&self, id: &Identifier) -> StoreResult<u32> {
        let inner = self.inner.read().expect("lock poisoned");
        let slot = inner
            .slots
            .get(&(id.digest, id.column))
            .filter(|s| s.visible)
            .ok_or(StoreError::NotFound { id: *id })?;
        Ok(crc32fast::hash(&slot.data))
    }

    fn enumerate_range(&self, range: &RangeRequest) -> StoreResult<Vec<(Digest, u64)>> {
        let inner = self.inner.read().expect("lock poisoned");
        let mut out = Vec::new();
        for key in &inner.order {
            if key.1 != range.column || !range.contains(&key.0) {
                continue;
            }
            if let Some(slot) = inner.slots.get(key).filter(|s| s.visible) {
                out.push((key.0, slot.logical));
            }
        }
        Ok(out)
    }

    fn put_metadata(&self, record: MetadataRecord) -> StoreResult<()> {
        self.metadata
            .write()
            .expect("lock poisoned")
            .insert(record.digest, record);
        Ok(())
    }

    fn metadata(&self, digest: &Digest) -> StoreResult<Option<MetadataRecord>> {
        Ok(self
            .metadata
            .read()
            .expect("lock poisoned")
            .get(digest)
            .cloned())
    }

    fn stats(&self) -> BackendStats {
        let inner = self.inner.read().expect("lock poisoned");
        let mut stats = BackendStats::default();
        for slot in inner.slots.values().filter(|s| s.visible) {
            stats.objects += 1;
            stats.bytes += slot.logical;
        }
        stats
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("objects", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn id(key: &[u8], column: u32) -> Identifier {
        Identifier::transform(key, column)
    }

    // -----------------------------------------------------------------------
    // Single-shot writes
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read_back() {
        let be = MemoryBackend::new();
        let id = id(b"simple", 0);
        let size = be.write_at(&id, 0, b"hello world", IoFlags::empty()).unwrap();
        assert_eq!(size, 11);
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"hello world");
    }

    #[test]
    fn write_overwrites_at_offset() {
        let be = MemoryBackend::new();
        let id = id(b"offset", 0);
        be.write_at(&id, 0, b"aaaaaa", IoFlags::empty()).unwrap();
        be.write_at(&id, 2, b"bb", IoFlags::empty()).unwrap();
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"aabbaa");
    }

    #[test]
    fn write_beyond_end_zero_fills() {
        let be = MemoryBackend::new();
        let id = id(b"sparse", 0);
        be.write_at(&id, 4, b"xy", IoFlags::empty()).unwrap();
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"\0\0\0\0xy");
    }

    #[test]
    fn write_at_huge_offset_is_rejected() {
        let be = MemoryBackend::new();
        let id = id(b"huge-offset", 0);
        for offset in [MAX_RESERVE, u64::MAX - 1, u64::MAX] {
            let err = be.write_at(&id, offset, b"x", IoFlags::empty()).unwrap_err();
            assert!(matches!(err, StoreError::Invalid(_)), "offset {offset}");
        }
        assert!(!be.exists(&id));
    }

    #[test]
    fn write_past_size_limit_leaves_data_untouched() {
        let be = MemoryBackend::new();
        let id = id(b"limit-edge", 0);
        be.write_at(&id, 0, b"seed", IoFlags::empty()).unwrap();
        // One byte past the per-column limit is rejected before anything
        // is allocated or overwritten.
        let err = be
            .write_at(&id, MAX_RESERVE, &[0u8; 1], IoFlags::empty())
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"seed");
    }

    #[test]
    fn append_concatenates() {
        let be = MemoryBackend::new();
        let id = id(b"append-test", 0);
        be.write_at(&id, 0, b"first part of the message", IoFlags::empty())
            .unwrap();
        be.write_at(&id, 0, b"| second part of the message", IoFlags::APPEND)
            .unwrap();
        assert_eq!(
            be.read_at(&id, 0, 0).unwrap(),
            b"first part of the message| second part of the message"
        );
    }

    #[test]
    fn compressed_column_roundtrips() {
        let be = MemoryBackend::new();
        let id = id(b"some-key-1", 0);
        let data = b"some-compressed-data-in-column-0".repeat(8);
        be.write_at(&id, 0, &data, IoFlags::COMPRESS).unwrap();
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), data);
        assert_eq!(be.object_size(&id).unwrap(), data.len() as u64);
    }

    #[test]
    fn append_to_compressed_is_rejected() {
        let be = MemoryBackend::new();
        let id = id(b"czip", 0);
        be.write_at(&id, 0, b"data", IoFlags::COMPRESS).unwrap();
        let err = be.write_at(&id, 0, b"more", IoFlags::APPEND).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    // -----------------------------------------------------------------------
    // Column isolation
    // -----------------------------------------------------------------------

    #[test]
    fn columns_are_independent_streams() {
        let be = MemoryBackend::new();
        be.write_at(&id(b"some-key-1", 0), 0, b"column zero", IoFlags::empty())
            .unwrap();
        be.write_at(&id(b"some-key-1", 2), 0, b"column two", IoFlags::empty())
            .unwrap();
        be.write_at(&id(b"some-key-1", 3), 0, b"column three", IoFlags::empty())
            .unwrap();

        assert_eq!(be.read_at(&id(b"some-key-1", 0), 0, 0).unwrap(), b"column zero");
        assert_eq!(be.read_at(&id(b"some-key-1", 2), 0, 0).unwrap(), b"column two");
        assert_eq!(be.read_at(&id(b"some-key-1", 3), 0, 0).unwrap(), b"column three");
        assert!(matches!(
            be.read_at(&id(b"some-key-1", 1), 0, 0).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Staged writes
    // -----------------------------------------------------------------------

    fn staged_roundtrip(prepare: &[u8], plain: &[&[u8]], commit: &[u8]) {
        let be = MemoryBackend::new();
        let id = id(b"prepare-commit-test", 0);
        let mut written = Vec::new();
        let mut offset = 0u64;

        be.reserve(&id, 1024).unwrap();
        be.stage_chunk(&id, offset, prepare).unwrap();
        offset += prepare.len() as u64;
        written.extend_from_slice(prepare);

        for chunk in plain {
            be.stage_chunk(&id, offset, chunk).unwrap();
            offset += chunk.len() as u64;
            written.extend_from_slice(chunk);
        }

        be.commit(&id, offset, commit, 0).unwrap();
        written.extend_from_slice(commit);

        assert_eq!(be.read_at(&id, 0, 0).unwrap(), written);
    }

    #[test]
    fn staged_concatenation() {
        let plain: &[&[u8]] = &[b"plain data0|", b"plain data1|", b"plain data2|"];
        staged_roundtrip(b"prepare data|", plain, b"commit data");
        staged_roundtrip(b"", plain, b"commit data");
        staged_roundtrip(b"prepare data|", plain, b"");
        staged_roundtrip(b"", plain, b"");
    }

    #[test]
    fn staged_object_invisible_before_commit() {
        let be = MemoryBackend::new();
        let id = id(b"staged", 0);
        be.reserve(&id, 64).unwrap();
        be.stage_chunk(&id, 0, b"partial").unwrap();
        assert!(!be.exists(&id));
        assert!(matches!(
            be.read_at(&id, 0, 0).unwrap_err(),
            StoreError::NotFound { .. }
        ));

        be.commit(&id, 7, b"", 0).unwrap();
        assert!(be.exists(&id));
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"partial");
    }

    #[test]
    fn non_contiguous_chunk_is_sequence_error() {
        let be = MemoryBackend::new();
        let id = id(b"gap", 0);
        be.reserve(&id, 64).unwrap();
        be.stage_chunk(&id, 0, b"abc").unwrap();
        let err = be.stage_chunk(&id, 10, b"def").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Sequence {
                expected: 3,
                got: 10,
                ..
            }
        ));
        // Staged state is left exactly as it was, not rolled back.
        be.stage_chunk(&id, 3, b"def").unwrap();
        be.commit(&id, 6, b"", 0).unwrap();
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"abcdef");
    }

    #[test]
    fn commit_without_prepare_is_error() {
        let be = MemoryBackend::new();
        let err = be.commit(&id(b"orphan", 0), 0, b"data", 0).unwrap_err();
        assert!(matches!(err, StoreError::NotPrepared { .. }));
    }

    #[test]
    fn plain_without_prepare_is_error() {
        let be = MemoryBackend::new();
        let err = be.stage_chunk(&id(b"orphan", 0), 0, b"data").unwrap_err();
        assert!(matches!(err, StoreError::NotPrepared { .. }));
    }

    #[test]
    fn commit_with_explicit_size_truncates() {
        let be = MemoryBackend::new();
        let id = id(b"explicit", 0);
        be.reserve(&id, 64).unwrap();
        be.stage_chunk(&id, 0, b"0123456789").unwrap();
        let size = be.commit(&id, 10, b"", 4).unwrap();
        assert_eq!(size, 4);
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"0123");
    }

    #[test]
    fn oversized_reserve_rejected() {
        let be = MemoryBackend::new();
        let err = be.reserve(&id(b"big", 0), u64::MAX).unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
    }

    #[test]
    fn commit_with_huge_final_size_is_rejected() {
        let be = MemoryBackend::new();
        let id = id(b"huge-commit", 0);
        be.reserve(&id, 64).unwrap();
        be.stage_chunk(&id, 0, b"staged").unwrap();
        for final_size in [MAX_RESERVE + 1, u64::MAX] {
            let err = be.commit(&id, 6, b"", final_size).unwrap_err();
            assert!(matches!(err, StoreError::Invalid(_)), "size {final_size}");
        }
        // The staged state survives the rejection and still commits.
        assert_eq!(be.commit(&id, 6, b"", 0).unwrap(), 6);
        assert_eq!(be.read_at(&id, 0, 0).unwrap(), b"staged");
    }

    proptest! {
        // Concatenation law: any split of a byte string into
        // prepare ++ plain* ++ commit reads back as the original.
        #[test]
        fn staged_concatenation_law(
            parts in proptest::collection::vec(
                proptest::collection::vec(any::<u8>(), 0..64),
                2..6,
            )
        ) {
            let be = MemoryBackend::new();
            let id = Identifier::transform(b"law", 0);
            let expected: Vec<u8> = parts.concat();

            be.reserve(&id, 4096).unwrap();
            let mut offset = 0u64;
            for chunk in &parts[..parts.len() - 1] {
                be.stage_chunk(&id, offset, chunk).unwrap();
                offset += chunk.len() as u64;
            }
            be.commit(&id, offset, parts.last().expect("nonempty"), 0).unwrap();

            prop_assert_eq!(be.read_at(&id, 0, 0).unwrap(), expected);
        }
    }

    // -----------------------------------------------------------------------
    // Reads: sizes, truncation
    // -----------------------------------------------------------------------

    #[test]
    fn partial_read_with_explicit_size() {
        let be = MemoryBackend::new();
        let id = id(b"partial", 0);
        be.write_at(&id, 0, b"0123456789", IoFlags::empty()).unwrap();
        assert_eq!(be.read_at(&id, 2, 4).unwrap(), b"2345");
    }

    #[test]
    fn short_object_is_truncated_error() {
        let be = MemoryBackend::new();
        let id = id(b"short", 0);
        be.write_at(&id, 0, b"abc", IoFlags::empty()).unwrap();
        let err = be.read_at(&id, 0, 10).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Truncated {
                requested: 10,
                available: 3,
                ..
            }
        ));
    }

    #[test]
    fn read_offset_beyond_end_is_truncated() {
        let be = MemoryBackend::new();
        let id = id(b"beyond", 0);
        be.write_at(&id, 0, b"abc", IoFlags::empty()).unwrap();
        assert!(matches!(
            be.read_at(&id, 10, 0).unwrap_err(),
            StoreError::Truncated { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Range enumeration
    // -----------------------------------------------------------------------

    #[test]
    fn enumerate_full_interval_in_insertion_order() {
        let be = MemoryBackend::new();
        let ids: Vec<Identifier> = (0..4)
            .map(|i| {
                let id = Identifier::transform(format!("range{i}").as_bytes(), 0);
                be.write_at(&id, 0, format!("data{i}").as_bytes(), IoFlags::empty())
                    .unwrap();
                id
            })
            .collect();

        let got = be.enumerate_range(&RangeRequest::all(0)).unwrap();
        assert_eq!(got.len(), 4);
        let expected: Vec<Digest> = ids.iter().map(|i| i.digest).collect();
        let got_digests: Vec<Digest> = got.iter().map(|(d, _)| *d).collect();
        assert_eq!(got_digests, expected);
        assert!(got.iter().all(|(_, size)| *size == 5));
    }

    #[test]
    fn enumerate_excludes_other_columns_and_staged() {
        let be = MemoryBackend::new();
        be.write_at(&Identifier::transform(b"a", 0), 0, b"x", IoFlags::empty())
            .unwrap();
        be.write_at(&Identifier::transform(b"b", 2), 0, b"y", IoFlags::empty())
            .unwrap();
        be.reserve(&Identifier::transform(b"c", 0), 16).unwrap();

        let got = be.enumerate_range(&RangeRequest::all(0)).unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].0, Digest::from_key(b"a"));
    }

    #[test]
    fn enumerate_narrow_interval() {
        let be = MemoryBackend::new();
        let target = Identifier::transform(b"pivot", 0);
        be.write_at(&target, 0, b"x", IoFlags::empty()).unwrap();
        be.write_at(&Identifier::transform(b"other", 0), 0, b"y", IoFlags::empty())
            .unwrap();

        let range = RangeRequest {
            lower: target.digest,
            upper: target.digest,
            column: 0,
            start: 0,
            num: 0,
        };
        let got = be.enumerate_range(&range).unwrap();
        assert_eq!(got, vec![(target.digest, 1)]);
    }

    #[test]
    fn empty_interval_is_empty_not_error() {
        let be = MemoryBackend::new();
        assert!(be.enumerate_range(&RangeRequest::all(0)).unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Metadata and checksums
    // -----------------------------------------------------------------------

    #[test]
    fn metadata_roundtrip() {
        let be = MemoryBackend::new();
        let digest = Digest::from_key(b"meta");
        let record = MetadataRecord {
            digest,
            key: "meta".into(),
            placements: vec![],
            timestamp: 1234,
            checksum: Some(99),
        };
        be.put_metadata(record.clone()).unwrap();
        assert_eq!(be.metadata(&digest).unwrap(), Some(record));
        assert_eq!(be.metadata(&Digest::from_key(b"other")).unwrap(), None);
    }

    #[test]
    fn checksum_is_stable_until_tampered() {
        let be = MemoryBackend::new();
        let id = id(b"csum", 0);
        be.write_at(&id, 0, b"checksummed data", IoFlags::empty())
            .unwrap();
        let before = be.checksum(&id).unwrap();
        assert_eq!(be.checksum(&id).unwrap(), before);

        be.tamper(&id, 0).unwrap();
        assert_ne!(be.checksum(&id).unwrap(), before);
    }

    #[test]
    fn checksum_of_missing_object_is_not_found() {
        let be = MemoryBackend::new();
        assert!(matches!(
            be.checksum(&id(b"ghost", 0)).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Stats and housekeeping
    // -----------------------------------------------------------------------

    #[test]
    fn stats_count_visible_objects_only() {
        let be = MemoryBackend::new();
        be.write_at(&id(b"one", 0), 0, b"12345", IoFlags::empty())
            .unwrap();
        be.write_at(&id(b"two", 0), 0, b"123", IoFlags::empty())
            .unwrap();
        be.reserve(&id(b"staged", 0), 64).unwrap();

        let stats = be.stats();
        assert_eq!(stats.objects, 2);
        assert_eq!(stats.bytes, 8);
    }

    #[test]
    fn clear_removes_everything() {
        let be = MemoryBackend::new();
        be.write_at(&id(b"gone", 0), 0, b"x", IoFlags::empty()).unwrap();
        be.clear();
        assert!(be.is_empty());
    }

    #[test]
    fn concurrent_writers_on_distinct_ids() {
        use std::sync::Arc;
        use std::thread;

        let be = Arc::new(MemoryBackend::new());
        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let be = Arc::clone(&be);
                thread::spawn(move || {
                    let id = Identifier::transform(&[i], 0);
                    be.write_at(&id, 0, &[i; 32], IoFlags::empty()).unwrap();
                    assert_eq!(be.read_at(&id, 0, 0).unwrap(), vec![i; 32]);
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(be.len(), 8);
    }
}
