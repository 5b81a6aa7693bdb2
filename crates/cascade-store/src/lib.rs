//! Per-node storage backend for Cascade.
//!
//! Exposes the capability the data path invokes on each storage node:
//! reserve/write/read per (digest, column), staged-write bookkeeping with
//! commit-time visibility, checksum records, and range enumeration. The
//! physical storage engine behind the [`StorageBackend`] trait is out of
//! scope; [`MemoryBackend`] is the in-memory implementation used for tests
//! and embedding.

pub mod backend;
pub mod error;
pub mod memory;
pub mod metadata;

pub use backend::{BackendStats, StorageBackend};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use metadata::MetadataRecord;
