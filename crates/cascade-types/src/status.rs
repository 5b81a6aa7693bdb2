//! Errno-style integer status codes carried in completion envelopes.
//!
//! Every response carries an `i32` status: `0` is success, negative values
//! are errors. The codes below are the ones the data path produces and
//! consumes; unknown negative codes are still surfaced as errors with a
//! generic message.

/// Operation completed successfully.
pub const OK: i32 = 0;
/// No data at the requested identifier and column.
pub const ENOENT: i32 = -2;
/// I/O failure at the storage backend.
pub const EIO: i32 = -5;
/// No usable replica group or node is configured.
pub const ENXIO: i32 = -6;
/// Malformed request, including a non-contiguous staged write.
pub const EINVAL: i32 = -22;
/// Fewer bytes available than the explicitly requested size.
pub const ERANGE: i32 = -34;
/// No checksum recorded for the object; checksummed read impossible.
pub const ENODATA: i32 = -61;
/// Transport-level delivery failure.
pub const ECOMM: i32 = -70;
/// Malformed or too-short response envelope.
pub const EBADMSG: i32 = -74;
/// Stored data failed checksum verification.
pub const EILSEQ: i32 = -84;
/// Operation did not complete within the wait bound.
pub const ETIMEDOUT: i32 = -110;
/// Remote script execution failed.
pub const EREMOTEIO: i32 = -121;

/// Human-readable description of a status code.
pub fn message(status: i32) -> &'static str {
    match status {
        OK => "success",
        ENOENT => "no data at identifier/column",
        EIO => "storage backend i/o failure",
        ENXIO => "no usable replica group or node",
        EINVAL => "invalid request or non-contiguous staged write",
        ERANGE => "fewer bytes available than requested",
        ENODATA => "no checksum recorded for object",
        ECOMM => "transport delivery failure",
        EBADMSG => "malformed response envelope",
        EILSEQ => "checksum verification failed",
        ETIMEDOUT => "operation timed out",
        EREMOTEIO => "remote execution failed",
        _ => "unknown status",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(message(OK), "success");
    }

    #[test]
    fn known_codes_have_messages() {
        for code in [
            ENOENT, EIO, ENXIO, EINVAL, ERANGE, ENODATA, ECOMM, EBADMSG, EILSEQ, ETIMEDOUT,
            EREMOTEIO,
        ] {
            assert!(code < 0);
            assert_ne!(message(code), "unknown status");
        }
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(message(-9999), "unknown status");
    }
}
