use cascade_types::{Digest, Identifier, IoFlags, DIGEST_SIZE};

use crate::error::{ProtoError, ProtoResult};

/// Fixed wire size of a [`CommandEnvelope`] header.
pub const ENVELOPE_SIZE: usize = DIGEST_SIZE + 4 + 4 + 8 + 4 + 4 + 8;

/// Fixed wire size of an [`IoHeader`].
pub const IO_HEADER_SIZE: usize = 8 + 8;

/// Minimum wire size of a [`DataEntry`] (digest + declared size).
pub const DATA_ENTRY_HEADER_SIZE: usize = DIGEST_SIZE + 8;

/// Header of every response frame a storage node produces.
///
/// A logical operation can produce zero or more intermediate envelopes (one
/// per contributing node, or one per data frame) followed by a terminal
/// envelope with the MORE flag unset. The `status` field is errno-style:
/// `0` success, negative error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub id: Identifier,
    /// Transaction id tying the frame back to its in-flight operation.
    pub trans: u64,
    pub status: i32,
    pub flags: IoFlags,
    /// Declared size of the payload following this header.
    pub size: u64,
}

impl CommandEnvelope {
    /// Terminal acknowledgement with no payload.
    pub fn ack(id: Identifier, trans: u64, status: i32) -> Self {
        Self {
            id,
            trans,
            status,
            flags: IoFlags::empty(),
            size: 0,
        }
    }

    /// Intermediate data frame header; MORE signals a terminal frame follows.
    pub fn data(id: Identifier, trans: u64, size: u64) -> Self {
        Self {
            id,
            trans,
            status: 0,
            flags: IoFlags::MORE,
            size,
        }
    }

    /// Returns `true` if more frames for this operation are pending.
    pub fn has_more(&self) -> bool {
        self.flags.contains(IoFlags::MORE)
    }

    /// Encode the header, big-endian fields in declaration order.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENVELOPE_SIZE);
        buf.extend_from_slice(self.id.digest.as_bytes());
        buf.extend_from_slice(&self.id.column.to_be_bytes());
        buf.extend_from_slice(&self.id.type_tag.to_be_bytes());
        buf.extend_from_slice(&self.trans.to_be_bytes());
        buf.extend_from_slice(&self.status.to_be_bytes());
        buf.extend_from_slice(&self.flags.bits().to_be_bytes());
        buf.extend_from_slice(&self.size.to_be_bytes());
        buf
    }

    /// Encode the header followed by `payload` as one frame.
    pub fn encode_frame(&self, payload: &[u8]) -> Vec<u8> {
        let mut buf = self.encode();
        buf.extend_from_slice(payload);
        buf
    }

    /// Decode a frame into its header and payload slice.
    ///
    /// The declared `size` is authoritative: the payload slice is exactly
    /// that long, and a buffer holding fewer bytes is a `ShortPayload`
    /// error. Trailing bytes beyond the declared size are ignored.
    pub fn decode(buf: &[u8]) -> ProtoResult<(Self, &[u8])> {
        if buf.len() < ENVELOPE_SIZE {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: ENVELOPE_SIZE,
            });
        }
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&buf[..DIGEST_SIZE]);
        let mut at = DIGEST_SIZE;

        let column = u32::from_be_bytes(buf[at..at + 4].try_into().expect("checked"));
        at += 4;
        let type_tag = u32::from_be_bytes(buf[at..at + 4].try_into().expect("checked"));
        at += 4;
        let trans = u64::from_be_bytes(buf[at..at + 8].try_into().expect("checked"));
        at += 8;
        let status = i32::from_be_bytes(buf[at..at + 4].try_into().expect("checked"));
        at += 4;
        let flags = IoFlags::from_bits(u32::from_be_bytes(
            buf[at..at + 4].try_into().expect("checked"),
        ));
        at += 4;
        let size = u64::from_be_bytes(buf[at..at + 8].try_into().expect("checked"));
        at += 8;

        let available = buf.len() - at;
        if (available as u64) < size {
            return Err(ProtoError::ShortPayload {
                declared: size,
                actual: available,
            });
        }
        let payload = &buf[at..at + size as usize];

        let envelope = Self {
            id: Identifier {
                digest: Digest::from_raw(digest),
                column,
                type_tag,
            },
            trans,
            status,
            flags,
            size,
        };
        Ok((envelope, payload))
    }
}

/// Per-io reply header reported inside a data frame: where the bytes landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IoHeader {
    pub offset: u64,
    pub size: u64,
}

impl IoHeader {
    pub fn encode(&self) -> [u8; IO_HEADER_SIZE] {
        let mut buf = [0u8; IO_HEADER_SIZE];
        buf[..8].copy_from_slice(&self.offset.to_be_bytes());
        buf[8..].copy_from_slice(&self.size.to_be_bytes());
        buf
    }

    /// Decode the header and return it with the remaining bytes.
    pub fn decode(buf: &[u8]) -> ProtoResult<(Self, &[u8])> {
        if buf.len() < IO_HEADER_SIZE {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: IO_HEADER_SIZE,
            });
        }
        let offset = u64::from_be_bytes(buf[..8].try_into().expect("checked"));
        let size = u64::from_be_bytes(buf[8..16].try_into().expect("checked"));
        Ok((Self { offset, size }, &buf[IO_HEADER_SIZE..]))
    }
}

/// One element of a range or bulk-read result.
///
/// Wire layout: digest, declared size (big-endian u64), payload. The
/// declared size is authoritative over the trailing slice length: padding
/// beyond it is dropped, and fewer bytes than declared is an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataEntry {
    pub digest: Digest,
    pub size: u64,
    pub data: Vec<u8>,
}

impl DataEntry {
    pub fn new(digest: Digest, data: Vec<u8>) -> Self {
        Self {
            digest,
            size: data.len() as u64,
            data,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DATA_ENTRY_HEADER_SIZE + self.data.len());
        buf.extend_from_slice(self.digest.as_bytes());
        buf.extend_from_slice(&self.size.to_be_bytes());
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn decode(buf: &[u8]) -> ProtoResult<Self> {
        if buf.len() < DATA_ENTRY_HEADER_SIZE {
            return Err(ProtoError::ShortEnvelope {
                actual: buf.len(),
                min: DATA_ENTRY_HEADER_SIZE,
            });
        }
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&buf[..DIGEST_SIZE]);
        let size = u64::from_be_bytes(
            buf[DIGEST_SIZE..DATA_ENTRY_HEADER_SIZE]
                .try_into()
                .expect("checked"),
        );
        let rest = &buf[DATA_ENTRY_HEADER_SIZE..];
        if (rest.len() as u64) < size {
            return Err(ProtoError::ShortPayload {
                declared: size,
                actual: rest.len(),
            });
        }
        Ok(Self {
            digest: Digest::from_raw(digest),
            size,
            data: rest[..size as usize].to_vec(),
        })
    }
}
