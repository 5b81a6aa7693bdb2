/// Errors from foundation type construction and parsing.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A byte sequence has the wrong length for its type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// `offset + size` overflows u64.
    #[error("offset {offset} + size {size} overflows")]
    OffsetOverflow { offset: u64, size: u64 },
}
