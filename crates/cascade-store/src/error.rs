use cascade_types::{Digest, Identifier};

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No visible data at the identifier and column.
    #[error("object not found: {id}")]
    NotFound { id: Identifier },

    /// A staged chunk is not contiguous with the write cursor.
    #[error("staged write out of sequence for {id}: cursor at {expected}, chunk at {got}")]
    Sequence {
        id: Identifier,
        expected: u64,
        got: u64,
    },

    /// Plain or commit stage without a matching prepare.
    #[error("no prepared stage for {id}")]
    NotPrepared { id: Identifier },

    /// Stored bytes fail checksum verification.
    #[error("checksum mismatch for {id}: recorded {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        id: Identifier,
        expected: u32,
        computed: u32,
    },

    /// No checksum was ever recorded for the object; a verified read is
    /// impossible. Distinct from missing data.
    #[error("no checksum recorded for {digest}")]
    ChecksumUnavailable { digest: Digest },

    /// Fewer bytes available than an explicit-size read requested.
    #[error("truncated read for {id}: requested {requested}, available {available}")]
    Truncated {
        id: Identifier,
        requested: u64,
        available: u64,
    },

    /// Compression or decompression failure.
    #[error("compression error for {id}: {reason}")]
    Compression { id: Identifier, reason: String },

    /// Malformed request rejected by the backend.
    #[error("invalid request: {0}")]
    Invalid(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
