use serde::{Deserialize, Serialize};

use cascade_types::{Digest, GroupId, NodeAddr};

/// Placement record created at write-metadata time.
///
/// Consulted by lookup and by checksummed reads. An object written without
/// a metadata record (e.g. raw bulk writes) is orphaned from the metadata
/// index by design and must be read back with checksum verification
/// disabled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub digest: Digest,
    /// The caller key the digest was derived from, kept for diagnostics
    /// and lookup file info.
    pub key: String,
    /// Groups holding a copy, with the node address serving each.
    pub placements: Vec<(GroupId, NodeAddr)>,
    /// Unix seconds at record creation.
    pub timestamp: u64,
    /// CRC32 of the stored bytes at record time; `None` means the record
    /// exists but carries no checksum.
    pub checksum: Option<u32>,
}

impl MetadataRecord {
    /// Returns `true` if a checksummed read can be verified against this
    /// record.
    pub fn has_checksum(&self) -> bool {
        self.checksum.is_some()
    }

    /// The group list, in placement order.
    pub fn groups(&self) -> Vec<GroupId> {
        self.placements.iter().map(|(g, _)| *g).collect()
    }
}
