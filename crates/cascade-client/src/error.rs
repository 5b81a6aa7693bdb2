use thiserror::Error;

use cascade_types::{status, Identifier};

/// Errors surfaced by the client session.
///
/// Remote failures are mapped from the terminal envelope's errno-style
/// status; the node-side message travels as the terminal payload and is
/// preserved here so callers can see what the node saw.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("object not found: {target}")]
    NotFound { target: String },

    #[error("checksum mismatch for {target}: {message}")]
    ChecksumMismatch { target: String, message: String },

    #[error("no checksum recorded for {target}; read with NOCSUM or write metadata first")]
    ChecksumUnavailable { target: String },

    #[error("read truncated for {target}: {message}")]
    Truncated { target: String, message: String },

    #[error("invalid request for {target}: {message}")]
    SequenceError { target: String, message: String },

    #[error("remote execution failed: {message}")]
    RemoteExecution { message: String },

    #[error("remote error {status} for {target}: {message}")]
    Remote {
        status: i32,
        target: String,
        message: String,
    },

    #[error("{op} timed out after {millis}ms")]
    Timeout { op: &'static str, millis: u64 },

    #[error("malformed response: {0}")]
    InvalidResponse(String),

    #[error("transport: {0}")]
    Transport(String),

    #[error("configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Proto(#[from] cascade_proto::ProtoError),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    /// Map a terminal envelope's status and message payload to a client
    /// error for the identifier the operation addressed.
    pub fn from_reply(reply_status: i32, message: String, id: &Identifier) -> Self {
        let target = format!("{id}");
        match reply_status {
            status::ENOENT => Self::NotFound { target },
            status::EILSEQ => Self::ChecksumMismatch { target, message },
            status::ENODATA => Self::ChecksumUnavailable { target },
            status::ERANGE => Self::Truncated { target, message },
            status::EINVAL => Self::SequenceError { target, message },
            status::EREMOTEIO => Self::RemoteExecution { message },
            other => Self::Remote {
                status: other,
                target,
                message,
            },
        }
    }
}
