/// Errors from wire encoding and decoding.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Frame header is malformed or incomplete.
    #[error("framing error: {0}")]
    FramingError(String),

    /// Message exceeds the wire size limit.
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization failure.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Response buffer is smaller than the minimum header for its layer.
    #[error("short envelope: {actual} bytes, need at least {min}")]
    ShortEnvelope { actual: usize, min: usize },

    /// Declared payload size exceeds the bytes actually present.
    #[error("short payload: declared {declared} bytes, only {actual} present")]
    ShortPayload { declared: u64, actual: usize },

    /// An embedded string field is not valid UTF-8.
    #[error("invalid utf-8 in {field}")]
    InvalidUtf8 { field: &'static str },
}

/// Result alias for protocol operations.
pub type ProtoResult<T> = Result<T, ProtoError>;
